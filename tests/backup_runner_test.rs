use serde_json::{json, Value};
use shop_sync::api::mock::ScriptedTransport;
use shop_sync::api::{GqlClient, ThrottledTransport, Throttler};
use shop_sync::config::Config;
use shop_sync::engine::ResourceType;
use shop_sync::lifecycle::{SyncSystem, SystemError};
use shop_sync::runner::Summary;
use std::path::Path;
use std::sync::Arc;

const STORE: &str = "teststore.myshopify.com";

fn system(transport: &Arc<ScriptedTransport>, dir: &Path) -> SyncSystem {
    let config = Config {
        store: STORE.to_string(),
        access_token: "shpat_test".to_string(),
        backup_dir: dir.to_path_buf(),
        backup_prefix: "nightly".to_string(),
        pool_size: 2,
        ..Config::default()
    };
    let throttler = Arc::new(Throttler::default());
    let throttled = ThrottledTransport::new(Arc::clone(transport), Arc::clone(&throttler));
    let client = GqlClient::new(STORE, "shpat_test", Arc::new(throttled));
    SyncSystem::from_parts(config, client, throttler)
}

fn product_node(id: u64, handle: &str) -> Value {
    json!({"id": format!("gid://shopify/Product/{id}"), "handle": handle, "title": handle})
}

fn throttle_status(available: f64) -> Value {
    json!({"cost": {
        "requestedQueryCost": 252,
        "actualQueryCost": 12,
        "throttleStatus": {"maximumAvailable": 2000.0, "currentlyAvailable": available, "restoreRate": 100.0}
    }})
}

fn read(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_product_backup_writes_every_resource() {
    let tmp = tempfile::tempdir().unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(
                "GetProducts",
                json!({
                    "data": {"products": {
                        "nodes": [product_node(1, "red-shirt")],
                        "pageInfo": {"hasNextPage": true, "endCursor": "c1"}
                    }},
                    "extensions": throttle_status(1990.0)
                }),
            )
            .on(
                "GetProducts",
                json!({"data": {"products": {
                    "nodes": [product_node(2, "blue-hat")],
                    "pageInfo": {"hasNextPage": false, "endCursor": null}
                }}}),
            )
            .always(
                "GetProductVariants",
                json!({"data": {"product": {"id": "gid://shopify/Product/1", "variants": {"nodes": [{"title": "S"}]}}}}),
            )
            .always(
                "GetProductMedia",
                json!({"data": {"product": {"id": "gid://shopify/Product/1", "media": {"nodes": []}}}}),
            )
            .always(
                "GetProductMetafields",
                json!({"data": {"product": {"id": "gid://shopify/Product/1", "metafields": {"nodes": []}}}}),
            ),
    );
    let system = system(&transport, tmp.path());

    let report = system.backup(&[ResourceType::Product]).await.unwrap();

    assert!(report.root.starts_with(tmp.path()));
    assert!(report.root.file_name().unwrap().to_string_lossy().starts_with("nightly_"));
    assert!(report.id.starts_with("bkp-"));

    for id in ["1", "2"] {
        let dir = report.root.join("products").join(id);
        for file in ["product", "product_variants", "product_media", "product_metafields"] {
            assert!(dir.join(format!("{file}.json")).is_file(), "missing {file} for product {id}");
        }
    }
    assert_eq!(read(&report.root.join("products/2/product.json"))["handle"], "blue-hat");
    assert_eq!(
        read(&report.root.join("products/1/product_variants.json"))["variants"]["nodes"][0]["title"],
        "S"
    );

    let [runner] = report.runners.as_slice() else {
        panic!("expected one runner report, got {}", report.runners.len());
    };
    assert!(runner.error.is_none());
    assert_eq!(runner.stats[&ResourceType::Product], Summary { count: 2, passed: 2, failed: 0, skipped: 0 });
    assert_eq!(runner.stats[&ResourceType::ProductVariant].passed, 2);

    let pages = transport.requests_for("GetProducts");
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].variables()["after"], "c1");
    assert_eq!(pages[0].headers["x-shopify-access-token"], "shpat_test");
}

#[tokio::test]
async fn test_failed_child_fetch_is_counted_and_others_continue() {
    let tmp = tempfile::tempdir().unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(
                "GetCustomers",
                json!({"data": {"customers": {
                    "nodes": [
                        {"id": "gid://shopify/Customer/7", "email": "a@example.com"},
                        {"id": "gid://shopify/Customer/8", "email": "b@example.com"}
                    ],
                    "pageInfo": {"hasNextPage": false}
                }}}),
            )
            // Only one metafields answer; the second request gets a 404.
            .on(
                "GetCustomerMetafields",
                json!({"data": {"customer": {"id": "gid://shopify/Customer/7", "metafields": {"nodes": []}}}}),
            ),
    );
    let system = system(&transport, tmp.path());

    let report = system.backup(&[ResourceType::Customer]).await.unwrap();

    let runner = &report.runners[0];
    assert_eq!(runner.kind, ResourceType::Customer);
    assert_eq!(runner.stats[&ResourceType::Customer].passed, 2);
    assert_eq!(
        runner.stats[&ResourceType::CustomerMetaField],
        Summary { count: 2, passed: 1, failed: 1, skipped: 0 }
    );
    assert_eq!(runner.failed(), 1);
    assert!(report.root.join("customers/7/customer.json").is_file());
    assert!(report.root.join("customers/8/customer.json").is_file());
}

#[tokio::test]
async fn test_failed_listing_ends_the_run_without_results() {
    let tmp = tempfile::tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().on(
        "GetProducts",
        json!({"errors": [{"message": "Access denied for products field."}]}),
    ));
    let system = system(&transport, tmp.path());

    let report = system.backup(&[ResourceType::Product]).await.unwrap();

    let runner = &report.runners[0];
    assert_eq!(runner.stats[&ResourceType::Product], Summary::default());
    assert!(transport.requests_for("GetProductVariants").is_empty());
}

#[tokio::test]
async fn test_dependent_types_cannot_be_backed_up_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let system = system(&Arc::new(ScriptedTransport::new()), tmp.path());

    let err = system.backup(&[ResourceType::ProductMedia]).await.unwrap_err();
    assert!(matches!(err, SystemError::NotPrimary(ResourceType::ProductMedia)));
}
