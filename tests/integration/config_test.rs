//! Loading configuration from disk

use std::io::Write;
use vcms_sync::shared::{ConfigError, SyncConfig};

#[test]
fn test_from_file_reads_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
apiBaseUrl = "https://port.example/api/v1"
pushChannelUrl = "wss://port.example/ws"
reconnectBaseDelayMs = 2000
debounceMs = 150
"#
    )
    .unwrap();

    let config = assert_ok!(SyncConfig::from_file(file.path()));
    assert_eq!(config.push_channel_url, "wss://port.example/ws");
    assert_eq!(config.reconnect_base_delay_ms, 2000);
    assert_eq!(config.debounce_ms, 150);
    assert_eq!(config.max_reconnect_attempts, SyncConfig::default().max_reconnect_attempts);
}

#[test]
fn test_from_file_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"pushChannelUrl = "ftp://port.example""#).unwrap();
    assert_err!(SyncConfig::from_file(file.path()), ConfigError::InvalidUrl(_));

    let missing = file.path().with_extension("missing");
    assert_err!(SyncConfig::from_file(&missing), ConfigError::Parse(_));
}
