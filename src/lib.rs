//! # ParkBest Core
//!
//! Reservation core for a parking service: spots grouped into zones, claimed under
//! contention, paid for through an asynchronous mobile-money gateway, and reclaimed
//! automatically when bookings or payments go stale.
//!
//! ## Core Problem Solved
//!
//! - **No double-booking**: two clients racing for the last spot in a zone never both
//!   get it. Claims are compare-and-swap writes on the spot's flags.
//! - **No orphaned reservations**: claiming a spot and inserting the booking commit
//!   together or not at all.
//! - **No stuck payments**: gateway callbacks may arrive late, twice, or never. The
//!   reconciler treats them as at-least-once and the stale-payment sweep fails what
//!   never resolves.
//! - **Exact money**: costs are integer minor units, frozen at booking time.
//!
//! ## Components
//!
//! - [`core::SpotAllocator`]: claims the lowest-numbered free spot in a zone
//! - [`core::BookingLifecycleManager`]: `confirmed -> active -> completed`, or
//!   `confirmed -> cancelled`
//! - [`core::PaymentGatewayAdapter`]: push-payment initiation under a timeout, and pure
//!   callback interpretation
//! - [`core::PaymentReconciler`]: applies callbacks to payment and booking state
//! - [`core::ExpiryScheduler`]: periodic booking-expiry and stale-payment sweeps
//! - [`runtime::ParkingService`]: the facade collaborating layers call
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use parkbest_core::builders::build_service;
//! use parkbest_core::config::ParkingConfig;
//! use parkbest_core::infra::{InMemoryStore, SandboxGateway};
//! use parkbest_core::runtime::CreateBookingRequest;
//! use parkbest_core::util::SystemClock;
//!
//! let cfg = ParkingConfig::from_env()?;
//! let parts = build_service(
//!     &cfg,
//!     Arc::new(InMemoryStore::new()),
//!     SandboxGateway::new(),
//!     Arc::new(SystemClock),
//! )?;
//! parts.scheduler.start();
//!
//! let booking = parts.service.create_booking(CreateBookingRequest {
//!     user_id: "u1".into(),
//!     zone_id,
//!     plate: "KAA 123A".into(),
//!     duration_hours: 2,
//! })?;
//!
//! parts.scheduler.stop().await;
//! ```
//!
//! For complete flows, see the integration tests under `tests/`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Domain records, the store contract, and the reservation and payment state machines.
pub mod core;
/// Configuration models for the store, gateway and sweeps.
pub mod config;
/// Builders to construct the service from configuration.
pub mod builders;
/// Store backends and gateway implementations.
pub mod infra;
/// API surface for collaborating layers.
pub mod runtime;
/// Shared utilities.
pub mod util;
