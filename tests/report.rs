use inventory_ingest::report::fingerprint;
use inventory_ingest::{
    export_csv, export_json, BatchFailure, IngestReport, InventoryRecord, RowIssue, RowProblem,
    Spread, WriteOutcome,
};

fn record(id: u64, category: &str, price: f64, stock: u64) -> InventoryRecord {
    let mut r = InventoryRecord::new(id, format!("Item {id}"));
    r.category = category.into();
    r.price = price;
    r.stock = stock;
    r.recompute_value();
    r
}

#[test]
fn aggregates_skip_zero_prices_and_values() {
    let records = vec![
        record(1, "Snacks", 10.0, 4),
        record(2, "Snacks", 0.0, 9),
        record(3, "Liquor", 30.0, 0),
    ];
    let mut report = IngestReport::new("stock.csv", "current-stock");
    report.summarize(&records);

    assert_eq!(report.categories.get("Snacks"), Some(&2));
    assert_eq!(report.categories.get("Liquor"), Some(&1));
    assert_eq!(
        report.price,
        Some(Spread {
            min: 10.0,
            avg: 20.0,
            max: 30.0,
            sum: 40.0
        })
    );
    assert_eq!(report.stock_total, 13);
    assert!((report.stock_avg - 13.0 / 3.0).abs() < 1e-9);
    let value = report.value.expect("one positive value");
    assert_eq!((value.min, value.max, value.sum), (40.0, 40.0, 40.0));
}

#[test]
fn empty_run_has_no_spreads() {
    let mut report = IngestReport::new("empty.csv", "current-stock");
    report.summarize(&[]);
    assert_eq!(report.price, None);
    assert_eq!(report.value, None);
    assert_eq!(report.stock_avg, 0.0);
}

#[test]
fn text_lists_invalid_rows_and_failed_batches() {
    let mut report = IngestReport::new("stock.csv", "current-stock");
    report.rows_seen = 3;
    report.invalid = vec![RowIssue::new(4, RowProblem::DuplicateId(9))];
    report.record_write(WriteOutcome {
        written: 1,
        failed: 2,
        failures: vec![BatchFailure {
            batch_index: 1,
            ids: vec![5, 6],
            message: "store responded with 409: conflict".into(),
        }],
    });
    report.summarize(&[record(1, "Snacks", 10.0, 1)]);

    assert!(report.is_partial());
    let text = report.to_string();
    assert!(text.contains("status         PARTIAL"), "{text}");
    assert!(text.contains("line 4: id 9 already appeared earlier in the file"));
    assert!(text.contains("batch 2 (2 records, ids 5..6): store responded with 409: conflict"));
    assert!(text.contains("Snacks"));
}

#[test]
fn fingerprint_ignores_input_order() {
    let a = vec![record(1, "Snacks", 10.0, 4), record(2, "Liquor", 30.0, 1)];
    let b = vec![a[1].clone(), a[0].clone()];
    assert_eq!(fingerprint(&a), fingerprint(&b));

    let mut c = a.clone();
    c[0].stock = 5;
    c[0].recompute_value();
    assert_ne!(fingerprint(&a), fingerprint(&c));
}

#[tokio::test]
async fn exports_json_and_csv() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let records = vec![record(1, "Snacks", 10.5, 2), record(2, "Liquor", 30.0, 1)];

    let json_path = dir.path().join("inventory.json");
    export_json(&json_path, &records).await?;
    let back: Vec<InventoryRecord> = serde_json::from_slice(&std::fs::read(&json_path)?)?;
    assert_eq!(back, records);

    let csv_path = dir.path().join("inventory.csv");
    export_csv(&csv_path, &records).await?;
    let text = std::fs::read_to_string(&csv_path)?;
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("id,product_name,price,category,stock"));
    assert_eq!(lines.next().unwrap(), "1,Item 1,10.5,Snacks,2,,,,,,,,,21,");
    assert_eq!(lines.count(), 1);
    Ok(())
}
