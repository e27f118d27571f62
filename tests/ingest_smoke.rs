use inventory_ingest::{reader_from_path, MemoryStore, Pipeline, PipelineOptions};
use std::{fs::File, io::Write, path::PathBuf, process::Command};

#[tokio::test]
async fn loads_gzip_export_into_store() -> anyhow::Result<()> {
    // Create small inventory CSV
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("stock.csv");
    let mut f = File::create(&csv_path)?;
    writeln!(f, "id,Product Name,Price,Category,Stock")?;
    for i in 1..=1_000 {
        writeln!(f, "{i},item {i},{}.25,Snacks,{}", i % 50, i % 30)?;
    }

    // gzip it (use system gzip for speed)
    let gz_path: PathBuf = dir.path().join("stock.csv.gz");
    let status = Command::new("bash")
        .arg("-lc")
        .arg(format!(
            "gzip -c {} > {}",
            csv_path.display(),
            gz_path.display()
        ))
        .status()?;
    assert!(status.success());

    let store = MemoryStore::new();
    let options = PipelineOptions {
        confirmed: true,
        ..Default::default()
    };
    let (reader, meta) = reader_from_path(&gz_path, encoding_rs::UTF_8).await?;
    let output = Pipeline::new(&store, options)
        .run(reader, &meta.name_hint)
        .await?;

    assert_eq!(output.report.rows_seen, 1_000);
    assert_eq!(output.report.valid_rows, 1_000);
    assert_eq!(output.report.written, 1_000);
    assert!(!output.report.is_partial());
    assert_eq!(store.rows("inventory").await.len(), 1_000);
    assert_eq!(output.report.source, "stock.csv.gz");
    Ok(())
}

#[tokio::test]
async fn transcodes_windows_1252_export() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cafe.csv");
    let mut bytes = b"id,Product Name,Price,Category,Stock\n".to_vec();
    bytes.extend_from_slice(b"1,caf\xe9 latte,95,Hot Beverages,12\n");
    std::fs::write(&path, bytes)?;

    let charset = inventory_ingest::charset_for_label("windows-1252")?;
    let (reader, _meta) = reader_from_path(&path, charset).await?;
    let store = MemoryStore::new();
    let output = Pipeline::new(
        &store,
        PipelineOptions {
            confirmed: true,
            ..Default::default()
        },
    )
    .run(reader, "cafe.csv")
    .await?;

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].product_name, "Café Latte");
    assert_eq!(output.records[0].value, 95.0 * 12.0);
    Ok(())
}

#[test]
fn rejects_unknown_charset() {
    let err = inventory_ingest::charset_for_label("klingon-8").unwrap_err();
    assert_eq!(err.to_string(), "Unknown charset label: klingon-8");
}
