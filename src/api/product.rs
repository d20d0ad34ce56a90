//! Product queries and mutations.
//!
//! Documents are returned as raw JSON: the backup stores them untouched and
//! the restore reads back exactly what was stored.

use super::client::{mutation_payload, page_cost, GqlClient, SINGLE_COST};
use super::error::ApiError;
use super::types::Page;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Products fetched per page.
pub const PRODUCTS_PER_PAGE: u32 = 250;

const PRODUCTS_QUERY: &str = r#"
query GetProducts($first: Int!, $after: String) {
  products(first: $first, after: $after) {
    nodes {
      id
      title
      handle
      description
      descriptionHtml
      productType
      isGiftCard
      status
      tags
      vendor
      templateSuffix
      giftCardTemplateSuffix
      requiresSellingPlan
      combinedListingRole
      createdAt
      updatedAt
      publishedAt
      seo { title description }
      category { id name }
      options { name position values }
      variantsCount { count }
      mediaCount { count }
    }
    pageInfo { hasNextPage endCursor }
  }
}"#;

const VARIANTS_QUERY: &str = r#"
query GetProductVariants($id: ID!) {
  product(id: $id) {
    id
    variants(first: 100) {
      nodes {
        id
        title
        displayName
        sku
        barcode
        price
        compareAtPrice
        taxable
        inventoryPolicy
        availableForSale
        selectedOptions { name value }
        createdAt
        updatedAt
      }
    }
  }
}"#;

const MEDIA_QUERY: &str = r#"
query GetProductMedia($id: ID!) {
  product(id: $id) {
    id
    media(first: 250) {
      nodes {
        id
        alt
        status
        mediaContentType
        preview { image { altText url height width } status }
      }
    }
  }
}"#;

const METAFIELDS_QUERY: &str = r#"
query GetProductMetafields($id: ID!) {
  product(id: $id) {
    id
    metafields(first: 250) {
      nodes { id namespace key value type description }
    }
  }
}"#;

const OPTIONS_QUERY: &str = r#"
query GetProductOptions($id: ID!) {
  product(id: $id) {
    id
    options {
      id
      name
      position
      optionValues { id name hasVariants }
    }
  }
}"#;

const ID_BY_HANDLE_QUERY: &str = r#"
query GetProductByHandle($identifier: ProductIdentifierInput!) {
  productByIdentifier(identifier: $identifier) { id handle }
}"#;

const CREATE_PRODUCT: &str = r#"
mutation productCreate($input: ProductInput!) {
  productCreate(input: $input) {
    product { id title }
    userErrors { field message }
  }
}"#;

const UPDATE_PRODUCT: &str = r#"
mutation productUpdate($input: ProductInput!) {
  productUpdate(input: $input) {
    product { id title }
    userErrors { field message }
  }
}"#;

const CREATE_VARIANTS: &str = r#"
mutation productVariantsBulkCreate($productId: ID!, $variants: [ProductVariantsBulkInput!]!) {
  productVariantsBulkCreate(productId: $productId, variants: $variants, strategy: REMOVE_STANDALONE_VARIANT) {
    productVariants { id title }
    userErrors { field message }
  }
}"#;

const UPDATE_VARIANTS: &str = r#"
mutation productVariantsBulkUpdate($productId: ID!, $variants: [ProductVariantsBulkInput!]!) {
  productVariantsBulkUpdate(productId: $productId, variants: $variants) {
    productVariants { id title }
    userErrors { field message }
  }
}"#;

const DELETE_VARIANTS: &str = r#"
mutation productVariantsBulkDelete($productId: ID!, $variantsIds: [ID!]!) {
  productVariantsBulkDelete(productId: $productId, variantsIds: $variantsIds) {
    product { id }
    userErrors { field message }
  }
}"#;

const CREATE_OPTIONS: &str = r#"
mutation productOptionsCreate($productId: ID!, $options: [OptionCreateInput!]!) {
  productOptionsCreate(productId: $productId, options: $options, variantStrategy: LEAVE_AS_IS) {
    product { id }
    userErrors { field message }
  }
}"#;

const UPDATE_OPTION: &str = r#"
mutation productOptionUpdate($productId: ID!, $option: OptionUpdateInput!, $optionValuesToAdd: [OptionValueCreateInput!], $optionValuesToDelete: [ID!]) {
  productOptionUpdate(productId: $productId, option: $option, optionValuesToAdd: $optionValuesToAdd, optionValuesToDelete: $optionValuesToDelete, variantStrategy: MANAGE) {
    product { id }
    userErrors { field message }
  }
}"#;

const DELETE_OPTIONS: &str = r#"
mutation productOptionsDelete($productId: ID!, $options: [ID!]!) {
  productOptionsDelete(productId: $productId, options: $options, strategy: POSITION) {
    deletedOptionsIds
    userErrors { field message }
  }
}"#;

const CREATE_MEDIA: &str = r#"
mutation productCreateMedia($productId: ID!, $media: [CreateMediaInput!]!) {
  productCreateMedia(productId: $productId, media: $media) {
    media { id status }
    mediaUserErrors { field message }
  }
}"#;

const DELETE_MEDIA: &str = r#"
mutation productDeleteMedia($productId: ID!, $mediaIds: [ID!]!) {
  productDeleteMedia(productId: $productId, mediaIds: $mediaIds) {
    deletedMediaIds
    mediaUserErrors { field message }
  }
}"#;

const SET_METAFIELDS: &str = r#"
mutation metafieldsSet($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields { id key namespace }
    userErrors { field message }
  }
}"#;

const DELETE_METAFIELDS: &str = r#"
mutation metafieldsDelete($metafields: [MetafieldIdentifierInput!]!) {
  metafieldsDelete(metafields: $metafields) {
    deletedMetafields { key namespace ownerId }
    userErrors { field message }
  }
}"#;

/// Length of the array `field` of a mutation payload.
fn count(payload: &Value, field: &str) -> usize {
    payload.get(field).and_then(Value::as_array).map_or(0, Vec::len)
}

fn take_product(mut data: Value) -> Result<Value, ApiError> {
    match data.get_mut("product").map(Value::take) {
        Some(product) if !product.is_null() => Ok(product),
        _ => Err(ApiError::MissingData),
    }
}

fn product_id(payload: &Value) -> Result<String, ApiError> {
    payload
        .pointer("/product/id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ApiError::MissingData)
}

impl GqlClient {
    /// One page of products, starting after `after`.
    pub async fn products_page(&self, ctx: &CancellationToken, first: u32, after: Option<&str>) -> Result<Page, ApiError> {
        let mut data: Value = self
            .execute(ctx, PRODUCTS_QUERY, json!({"first": first, "after": after}), Some(page_cost(first)))
            .await?;
        let products = data.get_mut("products").map(Value::take).ok_or(ApiError::MissingData)?;
        Ok(serde_json::from_value(products)?)
    }

    /// `{id, variants: {nodes}}` of a product.
    pub async fn product_variants(&self, ctx: &CancellationToken, id: &str) -> Result<Value, ApiError> {
        let data = self
            .execute(ctx, VARIANTS_QUERY, json!({"id": id}), Some(page_cost(100)))
            .await?;
        take_product(data)
    }

    /// `{id, media: {nodes}}` of a product.
    pub async fn product_media(&self, ctx: &CancellationToken, id: &str) -> Result<Value, ApiError> {
        let data = self
            .execute(ctx, MEDIA_QUERY, json!({"id": id}), Some(page_cost(250)))
            .await?;
        take_product(data)
    }

    /// `{id, metafields: {nodes}}` of a product.
    pub async fn product_metafields(&self, ctx: &CancellationToken, id: &str) -> Result<Value, ApiError> {
        let data = self
            .execute(ctx, METAFIELDS_QUERY, json!({"id": id}), Some(page_cost(250)))
            .await?;
        take_product(data)
    }

    /// ID of the product with `handle`, if the store has one.
    pub async fn product_id_by_handle(&self, ctx: &CancellationToken, handle: &str) -> Result<Option<String>, ApiError> {
        let data: Value = self
            .execute(
                ctx,
                ID_BY_HANDLE_QUERY,
                json!({"identifier": {"handle": handle}}),
                Some(SINGLE_COST),
            )
            .await?;
        Ok(data
            .pointer("/productByIdentifier/id")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Creates a product and returns its new ID.
    pub async fn create_product(&self, ctx: &CancellationToken, input: Value) -> Result<String, ApiError> {
        let data = self
            .execute(ctx, CREATE_PRODUCT, json!({"input": input}), Some(SINGLE_COST))
            .await?;
        product_id(&mutation_payload(data, "productCreate")?)
    }

    /// Updates a product; `input` must carry its `id`.
    pub async fn update_product(&self, ctx: &CancellationToken, input: Value) -> Result<String, ApiError> {
        let data = self
            .execute(ctx, UPDATE_PRODUCT, json!({"input": input}), Some(SINGLE_COST))
            .await?;
        product_id(&mutation_payload(data, "productUpdate")?)
    }

    /// Creates variants on a product. Returns how many were created.
    pub async fn create_product_variants(
        &self,
        ctx: &CancellationToken,
        product_id: &str,
        variants: Vec<Value>,
    ) -> Result<usize, ApiError> {
        let data = self
            .execute(
                ctx,
                CREATE_VARIANTS,
                json!({"productId": product_id, "variants": variants}),
                Some(SINGLE_COST),
            )
            .await?;
        Ok(count(&mutation_payload(data, "productVariantsBulkCreate")?, "productVariants"))
    }

    /// Attaches media to a product. Returns how many were accepted.
    pub async fn create_product_media(
        &self,
        ctx: &CancellationToken,
        product_id: &str,
        media: Vec<Value>,
    ) -> Result<usize, ApiError> {
        let data = self
            .execute(
                ctx,
                CREATE_MEDIA,
                json!({"productId": product_id, "media": media}),
                Some(SINGLE_COST),
            )
            .await?;
        Ok(count(&mutation_payload(data, "productCreateMedia")?, "media"))
    }

    /// Sets metafields on any owner. Returns how many were set.
    pub async fn set_metafields(&self, ctx: &CancellationToken, metafields: Vec<Value>) -> Result<usize, ApiError> {
        let data = self
            .execute(ctx, SET_METAFIELDS, json!({"metafields": metafields}), Some(SINGLE_COST))
            .await?;
        Ok(count(&mutation_payload(data, "metafieldsSet")?, "metafields"))
    }

    /// Deletes metafields identified by `{ownerId, namespace, key}`.
    /// Returns how many were deleted.
    pub async fn delete_metafields(&self, ctx: &CancellationToken, identifiers: Vec<Value>) -> Result<usize, ApiError> {
        let data = self
            .execute(ctx, DELETE_METAFIELDS, json!({"metafields": identifiers}), Some(SINGLE_COST))
            .await?;
        Ok(count(&mutation_payload(data, "metafieldsDelete")?, "deletedMetafields"))
    }

    /// Updates existing variants; each input must carry its `id`.
    pub async fn update_product_variants(
        &self,
        ctx: &CancellationToken,
        product_id: &str,
        variants: Vec<Value>,
    ) -> Result<usize, ApiError> {
        let data = self
            .execute(
                ctx,
                UPDATE_VARIANTS,
                json!({"productId": product_id, "variants": variants}),
                Some(SINGLE_COST),
            )
            .await?;
        Ok(count(&mutation_payload(data, "productVariantsBulkUpdate")?, "productVariants"))
    }

    pub async fn delete_product_variants(
        &self,
        ctx: &CancellationToken,
        product_id: &str,
        variant_ids: Vec<String>,
    ) -> Result<(), ApiError> {
        let data = self
            .execute(
                ctx,
                DELETE_VARIANTS,
                json!({"productId": product_id, "variantsIds": variant_ids}),
                Some(SINGLE_COST),
            )
            .await?;
        mutation_payload(data, "productVariantsBulkDelete")?;
        Ok(())
    }

    /// Detaches media from a product. Returns how many were deleted.
    pub async fn delete_product_media(
        &self,
        ctx: &CancellationToken,
        product_id: &str,
        media_ids: Vec<String>,
    ) -> Result<usize, ApiError> {
        let data = self
            .execute(
                ctx,
                DELETE_MEDIA,
                json!({"productId": product_id, "mediaIds": media_ids}),
                Some(SINGLE_COST),
            )
            .await?;
        Ok(count(&mutation_payload(data, "productDeleteMedia")?, "deletedMediaIds"))
    }

    /// `{id, options}` of a product, with option value IDs.
    pub async fn product_options(&self, ctx: &CancellationToken, id: &str) -> Result<Value, ApiError> {
        let data = self
            .execute(ctx, OPTIONS_QUERY, json!({"id": id}), Some(SINGLE_COST))
            .await?;
        take_product(data)
    }

    /// Adds options to a product, leaving its variants as they are.
    pub async fn create_product_options(
        &self,
        ctx: &CancellationToken,
        product_id: &str,
        options: Vec<Value>,
    ) -> Result<(), ApiError> {
        let data = self
            .execute(
                ctx,
                CREATE_OPTIONS,
                json!({"productId": product_id, "options": options}),
                Some(SINGLE_COST),
            )
            .await?;
        mutation_payload(data, "productOptionsCreate")?;
        Ok(())
    }

    /// Renames or moves one option and adds or removes its values.
    pub async fn update_product_option(
        &self,
        ctx: &CancellationToken,
        product_id: &str,
        option: Value,
        values_to_add: Vec<Value>,
        values_to_delete: Vec<String>,
    ) -> Result<(), ApiError> {
        let data = self
            .execute(
                ctx,
                UPDATE_OPTION,
                json!({
                    "productId": product_id,
                    "option": option,
                    "optionValuesToAdd": values_to_add,
                    "optionValuesToDelete": values_to_delete,
                }),
                Some(SINGLE_COST),
            )
            .await?;
        mutation_payload(data, "productOptionUpdate")?;
        Ok(())
    }

    pub async fn delete_product_options(
        &self,
        ctx: &CancellationToken,
        product_id: &str,
        option_ids: Vec<String>,
    ) -> Result<(), ApiError> {
        let data = self
            .execute(
                ctx,
                DELETE_OPTIONS,
                json!({"productId": product_id, "options": option_ids}),
                Some(SINGLE_COST),
            )
            .await?;
        mutation_payload(data, "productOptionsDelete")?;
        Ok(())
    }
}
