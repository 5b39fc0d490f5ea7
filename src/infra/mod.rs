//! Infrastructure adapters: store backends and payment gateways.

pub mod gateway;
pub mod store;

pub use gateway::{SandboxGateway, SandboxMode};
pub use store::{ConfiguredStore, FileStore, InMemoryStore};
