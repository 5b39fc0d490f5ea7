//! Integration tests for the file-backed store.
//!
//! This test validates:
//! 1. Committed bookings, spot flags and payments survive a reopen
//! 2. A failed snapshot write rolls the in-memory tables back
//! 3. `ConfiguredStore` opens the backend named by configuration

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use parkbest_core::config::{StoreBackendConfig, StoreConfig};
use parkbest_core::core::{
    BookingStatus, ParkingError, PaymentStatus, ResourceStore, SpotFlags,
};
use parkbest_core::infra::{ConfiguredStore, FileStore};
use parkbest_core::runtime::InitiatePaymentRequest;

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("parkbest-{}", uuid::Uuid::new_v4()))
}

// ============================================================================
// Durability
// ============================================================================

#[tokio::test]
async fn test_reopen_restores_committed_state() {
    let dir = scratch_dir();
    let h = common::harness_with(Arc::new(FileStore::open(&dir).unwrap()));
    let zone = h.zone("Kilimani", 10_000, 2);
    let booking = h.book(zone, "u1", 2).unwrap();
    let initiated = h
        .service()
        .initiate_payment(InitiatePaymentRequest {
            booking_id: booking.id(),
            payer: "254712345678".into(),
        })
        .await
        .unwrap();
    assert!(h.store.snapshot_path().exists());

    let reopened = FileStore::open(&dir).unwrap();
    let spot = booking.spot_id().unwrap();
    let (status, flags, free, payment) = reopened
        .read(|t| {
            (
                t.booking(booking.id()).map(|b| b.status()),
                t.spot(spot).map(|s| s.flags()),
                t.free_spots(zone).len(),
                t.payment_by_correlation(&initiated.correlation_id)
                    .map(|p| (p.status(), p.amount())),
            )
        })
        .unwrap();
    assert_eq!(status, Some(BookingStatus::Confirmed));
    assert_eq!(flags, Some(SpotFlags::RESERVED));
    assert_eq!(free, 1);
    assert_eq!(payment, Some((PaymentStatus::Pending, booking.total_cost())));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_failed_snapshot_write_rolls_back() {
    let dir = scratch_dir();
    let h = common::harness_with(Arc::new(FileStore::open(&dir).unwrap()));
    let zone = h.zone("Parklands", 10_000, 1);

    // A directory in place of the temp file makes the next write fail.
    std::fs::create_dir(dir.join("parkbest.json.tmp")).unwrap();
    let err = h.book(zone, "u1", 1).unwrap_err();
    assert!(matches!(err, ParkingError::Store(_)));
    assert_eq!(err.code(), "internal_error");

    let (bookings, free) = h
        .store
        .read(|t| (t.bookings_where(|_| true).len(), t.free_spots(zone).len()))
        .unwrap();
    assert_eq!(bookings, 0);
    assert_eq!(free, 1);

    std::fs::remove_dir(dir.join("parkbest.json.tmp")).unwrap();
    let booking = h.book(zone, "u1", 1).unwrap();
    let reopened = FileStore::open(&dir).unwrap();
    assert!(reopened
        .read(|t| t.booking(booking.id()).is_some())
        .unwrap());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_corrupt_snapshot_is_rejected() {
    let dir = scratch_dir();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("parkbest.json"), b"{not json").unwrap();
    assert!(FileStore::open(&dir).is_err());
    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Configured backend
// ============================================================================

#[test]
fn test_configured_store_selects_backend() {
    let memory = ConfiguredStore::open(&StoreConfig::default()).unwrap();
    assert_eq!(memory.kind(), "in_memory");

    let dir = scratch_dir();
    let cfg = StoreConfig {
        backend: StoreBackendConfig::File,
        path: Some(dir.to_string_lossy().into_owned()),
    };
    let file = ConfiguredStore::open(&cfg).unwrap();
    assert_eq!(file.kind(), "file");

    let h = common::harness_with(Arc::new(file));
    let zone = h.zone("Karen", 5_000, 1);
    h.book(zone, "u1", 1).unwrap();
    assert!(dir.join("parkbest.json").exists());

    let missing_path = StoreConfig {
        backend: StoreBackendConfig::File,
        path: None,
    };
    assert!(ConfiguredStore::open(&missing_path).is_err());

    std::fs::remove_dir_all(&dir).ok();
}
