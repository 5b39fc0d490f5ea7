//! Error types for reservation, payment and persistence operations.

use thiserror::Error;

use crate::core::model::ZoneId;

/// Failures raised by a [`ResourceStore`](crate::core::ResourceStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same key already exists.
    #[error("duplicate record: {0}")]
    Duplicate(String),
    /// A record referenced by a write does not exist.
    #[error("missing record: {0}")]
    MissingRecord(String),
    /// Filesystem failure while persisting a snapshot.
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors returned by the reservation core.
#[derive(Debug, Error)]
pub enum ParkingError {
    /// Input rejected before touching the store.
    #[error("validation failed: {0}")]
    Validation(String),
    /// No free spot in the zone.
    #[error("no available spot in zone {zone}")]
    ResourceExhausted {
        /// Zone that was full.
        zone: ZoneId,
    },
    /// Unknown zone, spot, booking or payment.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
    /// Transition attempted from a state that forbids it.
    #[error("{entity} {id} is {actual}, expected {expected}")]
    InvalidState {
        /// Kind of record.
        entity: &'static str,
        /// Record identifier.
        id: String,
        /// State found.
        actual: String,
        /// State(s) the operation requires.
        expected: &'static str,
    },
    /// Transport failure or timeout talking to the payment gateway.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    /// Every candidate spot was taken by a concurrent claim.
    #[error("lost {attempts} claim races in zone {zone}")]
    Conflict {
        /// Zone being claimed from.
        zone: ZoneId,
        /// Candidates tried.
        attempts: usize,
    },
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ParkingError {
    /// Stable machine-readable code for collaborators mapping errors to responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::ResourceExhausted { .. } => "resource_exhausted",
            Self::NotFound { .. } => "not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::GatewayUnavailable(_) => "gateway_unavailable",
            Self::Conflict { .. } => "conflict",
            Self::Store(_) => "internal_error",
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_state(
        entity: &'static str,
        id: impl ToString,
        actual: impl ToString,
        expected: &'static str,
    ) -> Self {
        Self::InvalidState {
            entity,
            id: id.to_string(),
            actual: actual.to_string(),
            expected,
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
