//! # Resource Model
//!
//! Plain data describing a unit of work for the [`Engine`](super::Engine):
//! what kind of resource it is, where it lives in a backup, and the handler
//! that produces or consumes its payload.

use super::error::EngineError;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Kind of a resource handled by the engine.
///
/// Each kind maps to a file name in a backup. Primary kinds (products and
/// customers) also own a root directory; the others live next to their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Product,
    ProductOption,
    ProductVariant,
    ProductMedia,
    ProductMetaField,
    Customer,
    CustomerMetaField,
}

impl ResourceType {
    /// Snake-case tag used in logs and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Product => "product",
            ResourceType::ProductOption => "product_option",
            ResourceType::ProductVariant => "product_variant",
            ResourceType::ProductMedia => "product_media",
            ResourceType::ProductMetaField => "product_metafield",
            ResourceType::Customer => "customer",
            ResourceType::CustomerMetaField => "customer_metafield",
        }
    }

    /// File name (without extension) the resource is stored under.
    /// Options are part of the product document.
    pub fn file(&self) -> &'static str {
        match self {
            ResourceType::Product | ResourceType::ProductOption => "product",
            ResourceType::ProductVariant => "product_variants",
            ResourceType::ProductMedia => "product_media",
            ResourceType::ProductMetaField => "product_metafields",
            ResourceType::Customer => "customer",
            ResourceType::CustomerMetaField => "customer_metafields",
        }
    }

    /// Top-level backup directory of a primary resource type.
    ///
    /// # Panics
    ///
    /// Panics when called on a dependent type. Only primary types are ever
    /// laid out at the root of a backup, so this is a programming error.
    pub fn root_dir(&self) -> &'static str {
        match self {
            ResourceType::Product => "products",
            ResourceType::Customer => "customers",
            other => panic!("{other} is not a root resource type"),
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, ResourceType::Product | ResourceType::Customer)
    }

    /// Primary types in processing order.
    pub fn primary() -> [ResourceType; 2] {
        [ResourceType::Product, ResourceType::Customer]
    }

    /// Product types in the order they are restored.
    pub fn product_types() -> [ResourceType; 5] {
        [
            ResourceType::Product,
            ResourceType::ProductOption,
            ResourceType::ProductMetaField,
            ResourceType::ProductVariant,
            ResourceType::ProductMedia,
        ]
    }

    /// Customer types in the order they are restored.
    pub fn customer_types() -> [ResourceType; 2] {
        [ResourceType::Customer, ResourceType::CustomerMetaField]
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(ResourceType::Product),
            "product_option" => Ok(ResourceType::ProductOption),
            "product_variant" => Ok(ResourceType::ProductVariant),
            "product_media" => Ok(ResourceType::ProductMedia),
            "product_metafield" => Ok(ResourceType::ProductMetaField),
            "customer" => Ok(ResourceType::Customer),
            "customer_metafield" => Ok(ResourceType::CustomerMetaField),
            other => Err(EngineError::UnknownResourceType(other.to_string())),
        }
    }
}

/// Produces or consumes the payload of a single resource.
///
/// `input` is `None` when the handler runs as a parent and carries the
/// parent's output when it runs as a child.
#[async_trait]
pub trait ResourceHandler<T>: Send + Sync {
    async fn handle(&self, ctx: &CancellationToken, input: Option<&T>) -> Result<T, EngineError>;
}

/// One schedulable unit of work.
pub struct Resource<T> {
    pub kind: ResourceType,
    pub path: PathBuf,
    pub handler: Arc<dyn ResourceHandler<T>>,
}

impl<T> Resource<T> {
    pub fn new(
        kind: ResourceType,
        path: impl Into<PathBuf>,
        handler: impl ResourceHandler<T> + 'static,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            path: self.path.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A parent resource plus the resources that depend on it.
///
/// Children only run after the parent succeeded, in the order given here.
#[derive(Debug)]
pub struct ResourceCollection<T> {
    pub parent: Resource<T>,
    pub children: Vec<Resource<T>>,
}

impl<T> ResourceCollection<T> {
    pub fn new(parent: Resource<T>) -> Self {
        Self {
            parent,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Resource<T>) -> Self {
        self.children.push(child);
        self
    }
}
