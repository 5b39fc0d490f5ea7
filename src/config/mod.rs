//! Configuration models for the store, payment gateway and sweeps.

pub mod service;

pub use service::{
    GatewayConfig, ParkingConfig, StoreBackendConfig, StoreConfig, SweepConfig,
    MAX_PENDING_TTL_SECS,
};
