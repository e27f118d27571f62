use inventory_ingest::{IngestConfig, IngestError};
use std::io::Write;

fn write_config(body: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    file.write_all(body.as_bytes())?;
    Ok(file)
}

#[test]
fn loads_store_settings_from_file() -> anyhow::Result<()> {
    let file = write_config(
        r#"
        batch_size = 75
        delimiter = ";"

        [store]
        url = "https://resort.example.co"
        api_key = "service-key"
        table = "inventory_staging"
        "#,
    )?;
    let config = IngestConfig::load(Some(file.path()))?;

    assert_eq!(config.batch_size, 75);
    assert_eq!(config.store.table, "inventory_staging");
    assert_eq!(config.store.url.as_deref(), Some("https://resort.example.co"));
    assert!(config.store.rest_store().is_ok());

    let options = config.pipeline_options()?;
    assert_eq!(options.delimiter, b';');
    assert_eq!(options.batch_size, 75);
    assert!(!options.confirmed);
    Ok(())
}

#[test]
fn defaults_apply_when_file_is_sparse() -> anyhow::Result<()> {
    let file = write_config("[store]\n")?;
    let config = IngestConfig::load(Some(file.path()))?;

    assert_eq!(config.batch_size, 50);
    assert_eq!(config.delimiter, ",");
    assert_eq!(config.store.table, "inventory");
    Ok(())
}

#[test]
fn batch_size_must_stay_in_range() {
    let file = write_config("batch_size = 500\n").unwrap();
    let err = IngestConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, IngestError::InvalidConfig(_)), "{err}");
}

#[test]
fn missing_credentials_are_a_setup_error() {
    let config = IngestConfig::default();
    let err = config.store.rest_store().unwrap_err();
    assert!(err.to_string().contains("store.url and store.api_key are required"));
}

#[test]
fn delimiter_must_be_one_byte() {
    let config = IngestConfig {
        delimiter: "||".into(),
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn missing_explicit_file_is_an_error() {
    let err = IngestConfig::load(Some(std::path::Path::new("/nonexistent/ingest.toml")));
    assert!(matches!(err, Err(IngestError::Config(_))));
}
