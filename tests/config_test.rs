//! Integration tests for configuration loading

use std::io::Write;
use tempfile::NamedTempFile;
use tracksync::infra::Config;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[api]
base_url = "https://tracking.example.test"
email = "ci@example.test"
password = "secret"
page_size = 250
max_concurrency = 4

[window]
lookback_days = 30
watermark_file = "state/last_run.txt"

[store]
file = "state/shipments.jsonl"

[remap]
file = "data/carriers.toml"

[publish]
file = "state/status.csv"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.api_base_url(), "https://tracking.example.test");
    assert_eq!(config.api_email(), "ci@example.test");
    assert_eq!(config.api_page_size(), 250);
    assert_eq!(config.api_max_concurrency(), 4);
    assert_eq!(config.lookback_days(), 30);
    assert_eq!(config.watermark_file(), "state/last_run.txt");
    assert_eq!(config.store_file(), "state/shipments.jsonl");
    assert_eq!(config.publish_file(), "state/status.csv");
}

#[test]
fn test_omitted_sections_use_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(b"[api]\nemail = \"a@b.test\"\npassword = \"p\"\n")
        .unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.api_client_id(), 206);
    assert_eq!(config.api_product_id(), 1);
    assert_eq!(config.api_page_size(), 1000);
    assert_eq!(config.api_series_filter(), "1,4");
    assert_eq!(config.api_max_retries(), 3);
    assert_eq!(config.lookback_days(), 15);
    assert_eq!(config.store_file(), "out/shipments.jsonl");
}

#[test]
fn test_validate_rejects_missing_credentials() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[window]\nlookback_days = 5\n").unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("credentials"), "got: {err}");
}

#[test]
fn test_validate_rejects_missing_remap_table() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(
            b"[api]\nemail = \"a@b.test\"\npassword = \"p\"\n\n[remap]\nfile = \"/nonexistent/carriers.toml\"\n",
        )
        .unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("remap table"), "got: {err}");
}

#[test]
fn test_validate_rejects_zero_concurrency() {
    // max_concurrency = 0 would stall the page fan-out forever; it must be
    // fatal before the run starts.
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(
            b"[api]\nemail = \"a@b.test\"\npassword = \"p\"\nmax_concurrency = 0\n\n[remap]\nfile = \"data/carriers.toml\"\n",
        )
        .unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("max_concurrency"), "got: {err}");
}

#[test]
fn test_unreadable_config_is_an_error() {
    assert!(Config::from_file("/nonexistent/dev.toml").is_err());
}
