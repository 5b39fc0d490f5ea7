//! Tests for configuration defaults, validation and loading

use std::collections::HashMap;
use std::time::Duration;

use parkbest_core::config::{
    GatewayConfig, ParkingConfig, StoreBackendConfig, StoreConfig, SweepConfig,
    MAX_PENDING_TTL_SECS,
};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_defaults_are_valid() {
    let cfg = ParkingConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.store.backend, StoreBackendConfig::InMemory);
    assert_eq!(cfg.gateway.timeout(), Duration::from_secs(30));
    assert_eq!(cfg.sweeps.booking_interval(), Duration::from_secs(300));
    assert_eq!(cfg.sweeps.payment_interval(), Duration::from_secs(600));
    assert_eq!(cfg.sweeps.pending_payment_ttl(), chrono::Duration::minutes(10));
}

#[test]
fn test_file_backend_requires_path() {
    let cfg = StoreConfig {
        backend: StoreBackendConfig::File,
        path: Some("  ".into()),
    };
    assert!(cfg.validate().is_err());

    let cfg = ParkingConfig {
        store: StoreConfig {
            backend: StoreBackendConfig::File,
            path: None,
        },
        ..ParkingConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.starts_with("store invalid:"), "{err}");
}

#[test]
fn test_gateway_validation() {
    let zero_timeout = GatewayConfig {
        timeout_secs: 0,
        ..GatewayConfig::default()
    };
    assert!(zero_timeout.validate().is_err());

    let bad_url = GatewayConfig {
        callback_base_url: "ftp://example.com".into(),
        ..GatewayConfig::default()
    };
    assert!(bad_url.validate().is_err());

    let no_prefix = GatewayConfig {
        account_prefix: String::new(),
        ..GatewayConfig::default()
    };
    assert!(no_prefix.validate().is_err());
}

#[test]
fn test_sweep_validation() {
    let zero = SweepConfig {
        booking_sweep_interval_secs: 0,
        ..SweepConfig::default()
    };
    assert!(zero.validate().is_err());

    let too_long = SweepConfig {
        pending_payment_ttl_secs: MAX_PENDING_TTL_SECS + 1,
        ..SweepConfig::default()
    };
    assert!(too_long.validate().is_err());
}

#[test]
fn test_callback_url_joins_base_and_path() {
    let cfg = GatewayConfig {
        callback_base_url: "https://parkbest.example/".into(),
        callback_path: "/hooks/mpesa".into(),
        ..GatewayConfig::default()
    };
    assert_eq!(cfg.callback_url(), "https://parkbest.example/hooks/mpesa");
}

#[test]
fn test_debug_redacts_credentials() {
    let cfg = GatewayConfig {
        consumer_key: "key-123".into(),
        consumer_secret: "secret-456".into(),
        ..GatewayConfig::default()
    };
    let printed = format!("{cfg:?}");
    assert!(!printed.contains("key-123"));
    assert!(!printed.contains("secret-456"));
    assert!(printed.contains("<redacted>"));
}

#[test]
fn test_from_json_str() {
    let cfg = ParkingConfig::from_json_str(
        r#"{"store":{"backend":"file","path":"/var/lib/parkbest"},"sweeps":{"pending_payment_ttl_secs":900}}"#,
    )
    .unwrap();
    assert_eq!(cfg.store.backend, StoreBackendConfig::File);
    assert_eq!(cfg.sweeps.pending_payment_ttl_secs, 900);
    assert_eq!(cfg.sweeps.booking_sweep_interval_secs, 300);

    assert!(ParkingConfig::from_json_str("{").unwrap_err().starts_with("parse error"));
    assert!(ParkingConfig::from_json_str(r#"{"gateway":{"timeout_secs":0}}"#).is_err());
}

#[test]
fn test_from_lookup_overrides_defaults() {
    let cfg = ParkingConfig::from_lookup(lookup(&[
        ("PARKBEST_STORE_BACKEND", "file"),
        ("PARKBEST_STORE_PATH", "/tmp/parkbest"),
        ("CALLBACK_BASE_URL", "https://api.parkbest.example"),
        ("GATEWAY_ACCOUNT_PREFIX", "PB"),
        ("GATEWAY_TIMEOUT_SECS", "15"),
        ("BOOKING_SWEEP_INTERVAL_SECS", " 60 "),
    ]))
    .unwrap();
    assert_eq!(cfg.store.backend, StoreBackendConfig::File);
    assert_eq!(cfg.store.path.as_deref(), Some("/tmp/parkbest"));
    assert_eq!(
        cfg.gateway.callback_url(),
        "https://api.parkbest.example/api/payments/mpesa/callback"
    );
    assert_eq!(cfg.gateway.account_prefix, "PB");
    assert_eq!(cfg.gateway.timeout_secs, 15);
    assert_eq!(cfg.sweeps.booking_sweep_interval_secs, 60);
}

#[test]
fn test_from_lookup_rejects_bad_values() {
    assert!(ParkingConfig::from_lookup(lookup(&[("GATEWAY_TIMEOUT_SECS", "soon")])).is_err());
    assert!(ParkingConfig::from_lookup(lookup(&[("PARKBEST_STORE_BACKEND", "redis")])).is_err());
    assert!(ParkingConfig::from_lookup(lookup(&[("PARKBEST_STORE_BACKEND", "file")])).is_err());
}
