//! # Restore Handlers
//!
//! Each handler reads one stored document and pushes it back to the store.
//! Parents upsert the resource (matched by handle, or by email, phone or ID)
//! and return its ID in the target store; children sync their documents
//! against that ID.
//!
//! With [`RestoreOptions::dry_run`] every document is still read and
//! validated but nothing is sent: parents return the ID they were stored
//! under and children return right after parsing.

use super::filter::RestoreFilter;
use crate::api::{CustomerIdentity, GqlClient};
use crate::engine::{extract_numeric_id, EngineError, RemoteId, ResourceHandler, ResourceType};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Metafields accepted by a single `metafieldsSet` call.
const METAFIELDS_PER_CALL: usize = 25;

/// Options shared by every handler of a restore.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    pub dry_run: bool,
    pub filter: RestoreFilter,
}

/// A stored document that cannot be restored.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("{}: missing field `{field}`", file.display())]
    MissingField { file: PathBuf, field: &'static str },
}

async fn read_document(file: &Path) -> Result<Value, EngineError> {
    let raw = tokio::fs::read(file).await?;
    Ok(serde_json::from_slice(&raw)?)
}

fn required<'a>(document: &'a Value, file: &Path, field: &'static str) -> Result<&'a str, EngineError> {
    document.get(field).and_then(Value::as_str).ok_or_else(|| {
        EngineError::handler(DocumentError::MissingField {
            file: file.to_path_buf(),
            field,
        })
    })
}

fn parent(input: Option<&RemoteId>, kind: ResourceType) -> Result<&RemoteId, EngineError> {
    input.ok_or(EngineError::MissingInput(kind))
}

/// Nodes of the connection `name` in a stored child document.
fn nodes<'a>(document: &'a Value, name: &str) -> &'a [Value] {
    document
        .get(name)
        .and_then(|connection| connection.get("nodes"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Copies the non-null `fields` of `document`.
fn pick(document: &Value, fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|field| {
            document
                .get(*field)
                .filter(|value| !value.is_null())
                .map(|value| (field.to_string(), value.clone()))
        })
        .collect()
}

// =============================================================================
// PARENTS
// =============================================================================

const PRODUCT_FIELDS: &[&str] = &[
    "handle",
    "title",
    "descriptionHtml",
    "productType",
    "tags",
    "vendor",
    "status",
    "templateSuffix",
    "giftCardTemplateSuffix",
    "requiresSellingPlan",
    "combinedListingRole",
    "seo",
];

fn product_input(product: &Value) -> Map<String, Value> {
    let mut input = pick(product, PRODUCT_FIELDS);
    if let Some(gift_card) = product.get("isGiftCard").filter(|v| v.is_boolean()) {
        input.insert("giftCard".into(), gift_card.clone());
    }
    if let Some(category) = product.pointer("/category/id").filter(|v| v.is_string()) {
        input.insert("category".into(), category.clone());
    }
    input.insert("redirectNewHandle".into(), Value::Bool(true));
    input
}

/// Options can only be given when a product is created.
fn product_options(product: &Value) -> Vec<Value> {
    product
        .get("options")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .map(|option| {
                    let values: Vec<Value> = option
                        .get("values")
                        .and_then(Value::as_array)
                        .map(|values| values.iter().map(|name| json!({"name": name})).collect())
                        .unwrap_or_default();
                    json!({"name": option.get("name"), "position": option.get("position"), "values": values})
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Upserts a product, matched by handle.
pub struct ProductHandler {
    client: GqlClient,
    file: PathBuf,
    options: Arc<RestoreOptions>,
}

impl ProductHandler {
    pub fn new(client: GqlClient, file: PathBuf, options: Arc<RestoreOptions>) -> Self {
        Self { client, file, options }
    }
}

#[async_trait]
impl ResourceHandler<RemoteId> for ProductHandler {
    async fn handle(&self, ctx: &CancellationToken, _input: Option<&RemoteId>) -> Result<RemoteId, EngineError> {
        let product = read_document(&self.file).await?;
        if !self.options.filter.matches(&product) {
            debug!(file = %self.file.display(), "Product does not match filter");
            return Err(EngineError::SkipChildren);
        }
        let stored_id = required(&product, &self.file, "id")?;
        let handle = required(&product, &self.file, "handle")?;

        if self.options.dry_run {
            info!(id = stored_id, handle, "Dry run, product not restored");
            return Ok(RemoteId::new(stored_id));
        }

        let mut input = product_input(&product);
        let id = match self.client.product_id_by_handle(ctx, handle).await? {
            Some(existing) => {
                warn!(id = %existing, handle, "Product already exists, updating");
                input.insert("id".into(), Value::String(existing));
                self.client.update_product(ctx, Value::Object(input)).await?
            }
            None => {
                info!(old_id = stored_id, handle, "Creating product");
                input.insert("productOptions".into(), Value::Array(product_options(&product)));
                self.client.create_product(ctx, Value::Object(input)).await?
            }
        };
        Ok(RemoteId(id))
    }
}

const CUSTOMER_FIELDS: &[&str] = &["firstName", "lastName", "email", "phone", "locale", "note", "tags", "taxExempt"];
const ADDRESS_FIELDS: &[&str] = &[
    "firstName",
    "lastName",
    "company",
    "address1",
    "address2",
    "city",
    "provinceCode",
    "zip",
    "phone",
];

fn customer_input(customer: &Value) -> Map<String, Value> {
    let mut input = pick(customer, CUSTOMER_FIELDS);
    if let Some(addresses) = customer.get("addresses").and_then(Value::as_array) {
        let addresses = addresses
            .iter()
            .map(|address| {
                let mut mapped = pick(address, ADDRESS_FIELDS);
                if let Some(country) = address.get("countryCodeV2").filter(|v| v.is_string()) {
                    mapped.insert("countryCode".into(), country.clone());
                }
                Value::Object(mapped)
            })
            .collect();
        input.insert("addresses".into(), Value::Array(addresses));
    }
    input
}

/// Upserts a customer, matched by email, phone or ID.
pub struct CustomerHandler {
    client: GqlClient,
    file: PathBuf,
    options: Arc<RestoreOptions>,
}

impl CustomerHandler {
    pub fn new(client: GqlClient, file: PathBuf, options: Arc<RestoreOptions>) -> Self {
        Self { client, file, options }
    }
}

#[async_trait]
impl ResourceHandler<RemoteId> for CustomerHandler {
    async fn handle(&self, ctx: &CancellationToken, _input: Option<&RemoteId>) -> Result<RemoteId, EngineError> {
        let customer = read_document(&self.file).await?;
        if !self.options.filter.matches(&customer) {
            debug!(file = %self.file.display(), "Customer does not match filter");
            return Err(EngineError::SkipChildren);
        }
        let stored_id = required(&customer, &self.file, "id")?;

        if self.options.dry_run {
            info!(id = stored_id, "Dry run, customer not restored");
            return Ok(RemoteId::new(stored_id));
        }

        let mut input = customer_input(&customer);
        let identity = CustomerIdentity {
            email: customer.get("email").and_then(Value::as_str),
            phone: customer.get("phone").and_then(Value::as_str),
            id: Some(extract_numeric_id(stored_id)),
        };
        let existing = self.client.customer_id_by_identity(ctx, identity).await?;
        let id = match existing {
            Some(existing) => {
                warn!(id = %existing, "Customer already exists, updating");
                input.insert("id".into(), Value::String(existing));
                self.client.update_customer(ctx, Value::Object(input)).await?
            }
            None => {
                info!(old_id = stored_id, "Creating customer");
                self.client.create_customer(ctx, Value::Object(input)).await?
            }
        };
        Ok(RemoteId(id))
    }
}

// =============================================================================
// CHILDREN
// =============================================================================
//
// Children bring the restored parent in line with the backup: whatever only
// the store has is deleted, whatever only the backup has is added, and what
// both have is updated from the backup.

/// Key two resources are considered the same by, compared case-insensitively.
fn key(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(|s| s.trim().to_lowercase())
}

fn id_of(node: &Value) -> Option<&str> {
    node.get("id").and_then(Value::as_str)
}

fn metafield_key(node: &Value) -> Option<(String, String)> {
    Some((key(node.get("namespace"))?, key(node.get("key"))?))
}

#[derive(Debug, Clone, Copy)]
enum MetafieldOwner {
    Product,
    Customer,
}

/// Sets the stored metafields on the restored parent and deletes the ones
/// the backup does not have.
pub struct MetafieldsHandler {
    client: GqlClient,
    owner: MetafieldOwner,
    file: PathBuf,
    options: Arc<RestoreOptions>,
}

impl MetafieldsHandler {
    pub fn for_product(client: GqlClient, file: PathBuf, options: Arc<RestoreOptions>) -> Self {
        Self {
            client,
            owner: MetafieldOwner::Product,
            file,
            options,
        }
    }

    pub fn for_customer(client: GqlClient, file: PathBuf, options: Arc<RestoreOptions>) -> Self {
        Self {
            client,
            owner: MetafieldOwner::Customer,
            file,
            options,
        }
    }

    fn kind(&self) -> ResourceType {
        match self.owner {
            MetafieldOwner::Product => ResourceType::ProductMetaField,
            MetafieldOwner::Customer => ResourceType::CustomerMetaField,
        }
    }

    async fn upstream(&self, ctx: &CancellationToken, owner: &RemoteId) -> Result<Value, EngineError> {
        let document = match self.owner {
            MetafieldOwner::Product => self.client.product_metafields(ctx, owner.as_str()).await?,
            MetafieldOwner::Customer => self.client.customer_metafields(ctx, owner.as_str()).await?,
        };
        Ok(document)
    }
}

#[async_trait]
impl ResourceHandler<RemoteId> for MetafieldsHandler {
    async fn handle(&self, ctx: &CancellationToken, input: Option<&RemoteId>) -> Result<RemoteId, EngineError> {
        let owner = parent(input, self.kind())?;
        let document = read_document(&self.file).await?;

        let stored: Vec<&Value> = nodes(&document, "metafields")
            .iter()
            .filter(|node| metafield_key(node).is_some() && node.get("value").is_some())
            .collect();
        let to_set: Vec<Value> = stored
            .iter()
            .map(|node| {
                let mut metafield = pick(node, &["namespace", "key", "value", "type"]);
                metafield.insert("ownerId".into(), Value::String(owner.to_string()));
                Value::Object(metafield)
            })
            .collect();

        if self.options.dry_run {
            debug!(owner = %owner, count = to_set.len(), "Dry run, metafields not set");
            return Ok(owner.clone());
        }

        let upstream = self.upstream(ctx, owner).await?;
        let kept: HashSet<(String, String)> = stored.iter().filter_map(|node| metafield_key(node)).collect();
        let to_delete: Vec<Value> = nodes(&upstream, "metafields")
            .iter()
            .filter(|node| metafield_key(node).is_some_and(|k| !kept.contains(&k)))
            .map(|node| json!({"ownerId": owner.as_str(), "namespace": node.get("namespace"), "key": node.get("key")}))
            .collect();

        for chunk in to_set.chunks(METAFIELDS_PER_CALL) {
            let set = self.client.set_metafields(ctx, chunk.to_vec()).await?;
            debug!(owner = %owner, set, "Metafields set");
        }
        for chunk in to_delete.chunks(METAFIELDS_PER_CALL) {
            let deleted = self.client.delete_metafields(ctx, chunk.to_vec()).await?;
            info!(owner = %owner, deleted, "Metafields deleted");
        }
        Ok(owner.clone())
    }
}

/// Stored option as `(name, position, value names)`.
fn stored_option(option: &Value) -> Option<(&str, Option<&Value>, Vec<&str>)> {
    let name = option.get("name").and_then(Value::as_str)?;
    let values = option
        .get("values")
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    Some((name, option.get("position"), values))
}

/// Brings the options of the restored product in line with the ones in its
/// stored document, matched by name. Values are matched by name as well.
pub struct OptionsHandler {
    client: GqlClient,
    file: PathBuf,
    options: Arc<RestoreOptions>,
}

impl OptionsHandler {
    /// `file` is the product document; options are stored inside it.
    pub fn new(client: GqlClient, file: PathBuf, options: Arc<RestoreOptions>) -> Self {
        Self { client, file, options }
    }
}

#[async_trait]
impl ResourceHandler<RemoteId> for OptionsHandler {
    async fn handle(&self, ctx: &CancellationToken, input: Option<&RemoteId>) -> Result<RemoteId, EngineError> {
        let product = parent(input, ResourceType::ProductOption)?;
        let document = read_document(&self.file).await?;
        let Some(stored) = document.get("options").and_then(Value::as_array) else {
            debug!(product = %product, "No stored options");
            return Ok(product.clone());
        };
        let stored: Vec<_> = stored.iter().filter_map(stored_option).collect();

        if self.options.dry_run {
            debug!(product = %product, count = stored.len(), "Dry run, options not restored");
            return Ok(product.clone());
        }

        let upstream_doc = self.client.product_options(ctx, product.as_str()).await?;
        let upstream: Vec<&Value> = upstream_doc
            .get("options")
            .and_then(Value::as_array)
            .map(|options| options.iter().filter(|option| id_of(option).is_some()).collect())
            .unwrap_or_default();
        let by_name: HashMap<String, &Value> = upstream
            .iter()
            .filter_map(|option| Some((key(option.get("name"))?, *option)))
            .collect();
        let stored_names: HashSet<String> = stored.iter().map(|(name, ..)| name.trim().to_lowercase()).collect();

        let to_add: Vec<Value> = stored
            .iter()
            .filter(|(name, ..)| !by_name.contains_key(&name.trim().to_lowercase()))
            .map(|(name, position, values)| {
                let values: Vec<Value> = values.iter().map(|value| json!({"name": value})).collect();
                json!({"name": name, "position": position, "values": values})
            })
            .collect();
        let to_delete: Vec<String> = upstream
            .iter()
            .filter(|option| key(option.get("name")).is_some_and(|name| !stored_names.contains(&name)))
            .filter_map(|option| id_of(option).map(str::to_string))
            .collect();

        // Added first so the product never runs out of options.
        if !to_add.is_empty() {
            let count = to_add.len();
            self.client.create_product_options(ctx, product.as_str(), to_add).await?;
            info!(product = %product, count, "Options created");
        }
        if !to_delete.is_empty() {
            let count = to_delete.len();
            self.client.delete_product_options(ctx, product.as_str(), to_delete).await?;
            info!(product = %product, count, "Options deleted");
        }

        for (name, position, values) in &stored {
            let Some(current) = by_name.get(&name.trim().to_lowercase()) else {
                continue;
            };
            let current_values: Vec<&Value> = current
                .get("optionValues")
                .and_then(Value::as_array)
                .map(|values| values.iter().collect())
                .unwrap_or_default();
            let wanted: HashSet<String> = values.iter().map(|value| value.trim().to_lowercase()).collect();
            let existing: HashSet<String> = current_values.iter().filter_map(|value| key(value.get("name"))).collect();

            let values_to_add: Vec<Value> = values
                .iter()
                .filter(|value| !existing.contains(&value.trim().to_lowercase()))
                .map(|value| json!({"name": value}))
                .collect();
            let values_to_delete: Vec<String> = current_values
                .iter()
                .filter(|value| key(value.get("name")).is_some_and(|name| !wanted.contains(&name)))
                .filter_map(|value| id_of(value).map(str::to_string))
                .collect();
            let renamed = current.get("name").and_then(Value::as_str) != Some(*name);
            let moved = position.is_some_and(|position| current.get("position") != Some(position));

            if !(renamed || moved || !values_to_add.is_empty() || !values_to_delete.is_empty()) {
                continue;
            }
            let option = json!({"id": id_of(current), "name": name, "position": position});
            self.client
                .update_product_option(ctx, product.as_str(), option, values_to_add, values_to_delete)
                .await?;
            info!(product = %product, option = *name, "Option updated");
        }
        Ok(product.clone())
    }
}

fn variant_input(variant: &Value) -> Map<String, Value> {
    let mut input = pick(variant, &["price", "compareAtPrice", "barcode", "taxable", "inventoryPolicy"]);
    let option_values: Vec<Value> = variant
        .get("selectedOptions")
        .and_then(Value::as_array)
        .map(|selected| {
            selected
                .iter()
                .map(|option| json!({"optionName": option.get("name"), "name": option.get("value")}))
                .collect()
        })
        .unwrap_or_default();
    input.insert("optionValues".into(), Value::Array(option_values));
    if let Some(sku) = variant.get("sku").filter(|v| v.is_string()) {
        input.insert("inventoryItem".into(), json!({"sku": sku}));
    }
    input
}

/// Syncs the variants of the restored product with the stored ones,
/// matched by title.
pub struct VariantsHandler {
    client: GqlClient,
    file: PathBuf,
    options: Arc<RestoreOptions>,
}

impl VariantsHandler {
    pub fn new(client: GqlClient, file: PathBuf, options: Arc<RestoreOptions>) -> Self {
        Self { client, file, options }
    }
}

#[async_trait]
impl ResourceHandler<RemoteId> for VariantsHandler {
    async fn handle(&self, ctx: &CancellationToken, input: Option<&RemoteId>) -> Result<RemoteId, EngineError> {
        let product = parent(input, ResourceType::ProductVariant)?;
        let document = read_document(&self.file).await?;
        let stored: Vec<&Value> = nodes(&document, "variants")
            .iter()
            .filter(|variant| key(variant.get("title")).is_some())
            .collect();

        if self.options.dry_run {
            debug!(product = %product, count = stored.len(), "Dry run, variants not restored");
            return Ok(product.clone());
        }

        let upstream = self.client.product_variants(ctx, product.as_str()).await?;
        let by_title: HashMap<String, &str> = nodes(&upstream, "variants")
            .iter()
            .filter_map(|variant| Some((key(variant.get("title"))?, id_of(variant)?)))
            .collect();
        let titles: HashSet<String> = stored.iter().filter_map(|variant| key(variant.get("title"))).collect();

        let to_delete: Vec<String> = by_title
            .iter()
            .filter(|(title, _)| !titles.contains(*title))
            .map(|(_, id)| id.to_string())
            .collect();
        let mut to_add = Vec::new();
        let mut to_update = Vec::new();
        for variant in &stored {
            let mut input = variant_input(variant);
            match key(variant.get("title")).and_then(|title| by_title.get(&title)) {
                Some(id) => {
                    input.insert("id".into(), json!(id));
                    to_update.push(Value::Object(input));
                }
                None => to_add.push(Value::Object(input)),
            }
        }

        if !to_delete.is_empty() {
            let count = to_delete.len();
            self.client.delete_product_variants(ctx, product.as_str(), to_delete).await?;
            info!(product = %product, count, "Variants deleted");
        }
        if !to_add.is_empty() {
            let created = self.client.create_product_variants(ctx, product.as_str(), to_add).await?;
            info!(product = %product, created, "Variants created");
        }
        if !to_update.is_empty() {
            let updated = self.client.update_product_variants(ctx, product.as_str(), to_update).await?;
            debug!(product = %product, updated, "Variants updated");
        }
        Ok(product.clone())
    }
}

fn media_url(media: &Value) -> Option<&str> {
    media.pointer("/preview/image/url").and_then(Value::as_str)
}

/// Syncs the media of the restored product with the stored media, matched
/// by media ID or else by preview URL. Media cannot be edited in place, so
/// nothing is updated.
pub struct MediaHandler {
    client: GqlClient,
    file: PathBuf,
    options: Arc<RestoreOptions>,
}

impl MediaHandler {
    pub fn new(client: GqlClient, file: PathBuf, options: Arc<RestoreOptions>) -> Self {
        Self { client, file, options }
    }
}

#[async_trait]
impl ResourceHandler<RemoteId> for MediaHandler {
    async fn handle(&self, ctx: &CancellationToken, input: Option<&RemoteId>) -> Result<RemoteId, EngineError> {
        let product = parent(input, ResourceType::ProductMedia)?;
        let document = read_document(&self.file).await?;
        let stored = nodes(&document, "media");

        if self.options.dry_run {
            debug!(product = %product, count = stored.len(), "Dry run, media not restored");
            return Ok(product.clone());
        }

        let upstream = self.client.product_media(ctx, product.as_str()).await?;
        let upstream = nodes(&upstream, "media");
        let stored_ids: HashSet<&str> = stored.iter().filter_map(id_of).collect();
        let stored_urls: HashSet<&str> = stored.iter().filter_map(media_url).collect();
        let upstream_ids: HashSet<&str> = upstream.iter().filter_map(id_of).collect();
        let upstream_urls: HashSet<&str> = upstream.iter().filter_map(media_url).collect();

        let to_delete: Vec<String> = upstream
            .iter()
            .filter(|media| {
                !id_of(media).is_some_and(|id| stored_ids.contains(id))
                    && !media_url(media).is_some_and(|url| stored_urls.contains(url))
            })
            .filter_map(|media| id_of(media).map(str::to_string))
            .collect();
        let to_add: Vec<Value> = stored
            .iter()
            .filter(|media| !id_of(media).is_some_and(|id| upstream_ids.contains(id)))
            .filter_map(|media| {
                let url = media_url(media)?;
                if upstream_urls.contains(url) {
                    return None;
                }
                let alt = media
                    .get("alt")
                    .or_else(|| media.pointer("/preview/image/altText"))
                    .cloned()
                    .unwrap_or(Value::Null);
                Some(json!({
                    "originalSource": url,
                    "alt": alt,
                    "mediaContentType": media.get("mediaContentType").cloned().unwrap_or_else(|| json!("IMAGE")),
                }))
            })
            .collect();

        if to_delete.is_empty() && to_add.is_empty() {
            debug!(product = %product, "Media up to date");
            return Ok(product.clone());
        }
        if !to_delete.is_empty() {
            let deleted = self.client.delete_product_media(ctx, product.as_str(), to_delete).await?;
            info!(product = %product, deleted, "Media deleted");
        }
        if !to_add.is_empty() {
            let attached = self.client.create_product_media(ctx, product.as_str(), to_add).await?;
            info!(product = %product, attached, "Media attached");
        }
        Ok(product.clone())
    }
}
