use inventory_ingest::{
    write_batches, Filter, InventoryRecord, RestStore, Row, StoreError, TableStore,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().expect("object literal")
}

#[tokio::test]
async fn insert_posts_rows_with_credentials() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let record = InventoryRecord::new(7, "Coca Cola Can");
    Mock::given(method("POST"))
        .and(path("/rest/v1/inventory"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .and(body_json(json!([record])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), "service-key")?;
    let inserted = store.insert("inventory", vec![record.to_row()]).await?;
    assert_eq!(inserted, 1);
    Ok(())
}

#[tokio::test]
async fn delete_sends_filters_and_counts_rows() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/inventory"))
        .and(query_param("id", "neq.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
        .mount(&server)
        .await;

    let store = RestStore::new(format!("{}/", server.uri()), "key")?;
    let removed = store
        .delete("inventory", &[Filter::neq("id", 0)])
        .await?;
    assert_eq!(removed, 2);
    Ok(())
}

#[tokio::test]
async fn select_and_update_use_postgrest_operators() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/inventory"))
        .and(query_param("category", "eq.Snacks"))
        .and(query_param("stock", "lt.5"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 3, "category": "Snacks", "stock": 2}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/inventory"))
        .and(query_param("id", "eq.3"))
        .and(body_json(json!({"stock": 40})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 3, "stock": 40}])))
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), "key")?;
    let low = store
        .select(
            "inventory",
            &[Filter::eq("category", "Snacks"), Filter::lt("stock", 5)],
        )
        .await?;
    assert_eq!(low, vec![row(json!({"id": 3, "category": "Snacks", "stock": 2}))]);

    let updated = store
        .update("inventory", &[Filter::eq("id", 3)], row(json!({"stock": 40})))
        .await?;
    assert_eq!(updated, 1);
    Ok(())
}

#[tokio::test]
async fn conflict_fails_one_batch_only() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let records: Vec<InventoryRecord> = (1..=60)
        .map(|id| InventoryRecord::new(id, "Item"))
        .collect();

    Mock::given(method("POST"))
        .and(path("/rest/v1/inventory"))
        .and(body_json(json!(records[..50])))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"inventory_pkey\""
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/inventory"))
        .and(body_json(json!(records[50..])))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), "key")?;
    let outcome = write_batches(&store, "inventory", &records, 50).await;

    assert_eq!(outcome.written, 10);
    assert_eq!(outcome.failed, 50);
    assert_eq!(
        outcome.failures[0].message,
        "store responded with 409: duplicate key value violates unique constraint \"inventory_pkey\""
    );
    Ok(())
}

#[test]
fn empty_url_is_rejected() {
    assert!(matches!(
        RestStore::new("  ", "key"),
        Err(StoreError::Config(_))
    ));
}
