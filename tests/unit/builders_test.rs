//! Tests for service wiring

use std::sync::Arc;

use parkbest_core::builders::build_service;
use parkbest_core::config::ParkingConfig;
use parkbest_core::core::ParkingError;
use parkbest_core::infra::{InMemoryStore, SandboxGateway};
use parkbest_core::util::SystemClock;

#[test]
fn test_build_service_from_defaults() {
    let parts = build_service(
        &ParkingConfig::default(),
        Arc::new(InMemoryStore::new()),
        SandboxGateway::new(),
        Arc::new(SystemClock),
    )
    .unwrap();
    assert!(!parts.scheduler.is_running());
    assert!(parts.service.list_zones().unwrap().is_empty());
}

#[test]
fn test_build_service_rejects_invalid_config() {
    let mut cfg = ParkingConfig::default();
    cfg.sweeps.payment_sweep_interval_secs = 0;
    let result = build_service(
        &cfg,
        Arc::new(InMemoryStore::new()),
        SandboxGateway::new(),
        Arc::new(SystemClock),
    );
    let Err(err) = result else {
        panic!("invalid config accepted");
    };
    assert_eq!(err.code(), "validation_error");
    assert!(matches!(err, ParkingError::Validation(msg) if msg.starts_with("config invalid: sweeps invalid")));
}
