//! Customer queries and mutations.

use super::client::{mutation_payload, page_cost, GqlClient, SINGLE_COST};
use super::error::ApiError;
use super::types::Page;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Customers fetched per page.
pub const CUSTOMERS_PER_PAGE: u32 = 250;

const CUSTOMERS_QUERY: &str = r#"
query GetCustomers($first: Int!, $after: String) {
  customers(first: $first, after: $after) {
    nodes {
      id
      firstName
      lastName
      displayName
      email
      phone
      locale
      note
      state
      tags
      taxExempt
      verifiedEmail
      createdAt
      updatedAt
      defaultAddress { firstName lastName company address1 address2 city provinceCode countryCodeV2 zip phone }
      addresses { firstName lastName company address1 address2 city provinceCode countryCodeV2 zip phone }
      emailMarketingConsent { marketingState marketingOptInLevel consentUpdatedAt }
      smsMarketingConsent { marketingState marketingOptInLevel consentUpdatedAt }
    }
    pageInfo { hasNextPage endCursor }
  }
}"#;

const METAFIELDS_QUERY: &str = r#"
query GetCustomerMetafields($id: ID!) {
  customer(id: $id) {
    id
    metafields(first: 250) {
      nodes { id namespace key value type description }
    }
  }
}"#;

const ID_BY_IDENTITY_QUERY: &str = r#"
query CheckCustomerByIdentity($query: String!) {
  customers(first: 1, query: $query) {
    nodes { id email phone }
  }
}"#;

const CREATE_CUSTOMER: &str = r#"
mutation customerCreate($input: CustomerInput!) {
  customerCreate(input: $input) {
    customer { id email }
    userErrors { field message }
  }
}"#;

/// Fields a customer can be found by in another copy of the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerIdentity<'a> {
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    /// Numeric part of the customer ID.
    pub id: Option<&'a str>,
}

impl CustomerIdentity<'_> {
    /// Search query matching any of the known fields, `None` when none is known.
    pub fn search_query(&self) -> Option<String> {
        let terms: Vec<String> = [("email", self.email), ("phone", self.phone), ("id", self.id)]
            .into_iter()
            .filter_map(|(field, value)| {
                let value = value.map(str::trim).filter(|v| !v.is_empty())?;
                Some(format!("{field}:{value}"))
            })
            .collect();
        (!terms.is_empty()).then(|| terms.join(" OR "))
    }
}

const UPDATE_CUSTOMER: &str = r#"
mutation customerUpdate($input: CustomerInput!) {
  customerUpdate(input: $input) {
    customer { id email }
    userErrors { field message }
  }
}"#;

fn customer_id(payload: &Value) -> Result<String, ApiError> {
    payload
        .pointer("/customer/id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ApiError::MissingData)
}

impl GqlClient {
    /// One page of customers, starting after `after`.
    pub async fn customers_page(&self, ctx: &CancellationToken, first: u32, after: Option<&str>) -> Result<Page, ApiError> {
        let mut data: Value = self
            .execute(ctx, CUSTOMERS_QUERY, json!({"first": first, "after": after}), Some(page_cost(first)))
            .await?;
        let customers = data.get_mut("customers").map(Value::take).ok_or(ApiError::MissingData)?;
        Ok(serde_json::from_value(customers)?)
    }

    /// `{id, metafields: {nodes}}` of a customer.
    pub async fn customer_metafields(&self, ctx: &CancellationToken, id: &str) -> Result<Value, ApiError> {
        let mut data: Value = self
            .execute(ctx, METAFIELDS_QUERY, json!({"id": id}), Some(page_cost(250)))
            .await?;
        match data.get_mut("customer").map(Value::take) {
            Some(customer) if !customer.is_null() => Ok(customer),
            _ => Err(ApiError::MissingData),
        }
    }

    /// ID of the first customer matching any field of `identity`, if any.
    /// An identity without fields matches nothing and sends no request.
    pub async fn customer_id_by_identity(
        &self,
        ctx: &CancellationToken,
        identity: CustomerIdentity<'_>,
    ) -> Result<Option<String>, ApiError> {
        let Some(query) = identity.search_query() else {
            return Ok(None);
        };
        let data: Value = self
            .execute(ctx, ID_BY_IDENTITY_QUERY, json!({"query": query}), Some(page_cost(1)))
            .await?;
        Ok(data
            .pointer("/customers/nodes/0/id")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Creates a customer and returns its new ID.
    pub async fn create_customer(&self, ctx: &CancellationToken, input: Value) -> Result<String, ApiError> {
        let data = self
            .execute(ctx, CREATE_CUSTOMER, json!({"input": input}), Some(SINGLE_COST))
            .await?;
        customer_id(&mutation_payload(data, "customerCreate")?)
    }

    /// Updates a customer; `input` must carry its `id`.
    pub async fn update_customer(&self, ctx: &CancellationToken, input: Value) -> Result<String, ApiError> {
        let data = self
            .execute(ctx, UPDATE_CUSTOMER, json!({"input": input}), Some(SINGLE_COST))
            .await?;
        customer_id(&mutation_payload(data, "customerUpdate")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::ScriptedTransport;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_customer_lookup_by_email() {
        let transport = Arc::new(ScriptedTransport::new().on(
            "CheckCustomerByIdentity",
            json!({"data": {"customers": {"nodes": [{"id": "gid://shopify/Customer/7", "email": "jane@example.com"}]}}}),
        ));
        let client = GqlClient::new("teststore.example.com", "shpat_test", transport.clone());
        let identity = CustomerIdentity {
            email: Some("jane@example.com"),
            ..CustomerIdentity::default()
        };

        let id = client
            .customer_id_by_identity(&CancellationToken::new(), identity)
            .await
            .unwrap();

        assert_eq!(id.as_deref(), Some("gid://shopify/Customer/7"));
        assert_eq!(transport.requests()[0].variables()["query"], "email:jane@example.com");
    }

    #[test]
    fn test_identity_query_joins_known_fields() {
        let identity = CustomerIdentity {
            email: Some("jane@example.com"),
            phone: Some("+15550100"),
            id: Some("7"),
        };
        assert_eq!(
            identity.search_query().as_deref(),
            Some("email:jane@example.com OR phone:+15550100 OR id:7")
        );

        let phone_only = CustomerIdentity {
            phone: Some("+15550100"),
            email: Some("  "),
            ..CustomerIdentity::default()
        };
        assert_eq!(phone_only.search_query().as_deref(), Some("phone:+15550100"));
    }

    #[tokio::test]
    async fn test_empty_identity_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = GqlClient::new("teststore.example.com", "shpat_test", transport.clone());

        let id = client
            .customer_id_by_identity(&CancellationToken::new(), CustomerIdentity::default())
            .await
            .unwrap();

        assert_eq!(id, None);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_customers_page_without_more_pages() {
        let transport = Arc::new(ScriptedTransport::new().on(
            "GetCustomers",
            json!({"data": {"customers": {
                "nodes": [{"id": "gid://shopify/Customer/7"}, {"id": "gid://shopify/Customer/8"}],
                "pageInfo": {"hasNextPage": false, "endCursor": "c9"}
            }}}),
        ));
        let client = GqlClient::new("teststore.example.com", "shpat_test", transport);

        let page = client.customers_page(&CancellationToken::new(), 250, None).await.unwrap();
        assert_eq!(page.nodes.len(), 2);
        assert_eq!(page.next_cursor(), None);
    }
}
