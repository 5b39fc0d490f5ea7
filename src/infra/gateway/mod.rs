//! Payment gateway implementations.

pub mod sandbox;

pub use sandbox::{RecordedPush, SandboxGateway, SandboxMode};
