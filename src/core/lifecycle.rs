//! Booking state machine: `confirmed -> active -> completed`, or `confirmed -> cancelled`.
//!
//! Transitions happen only on explicit calls. Time-driven completion belongs to the
//! expiry sweeps. Every transition is a conditional update on the booking's status
//! paired with the matching spot flag change, inside one store transaction.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::core::allocator::{release_in, SpotAllocator};
use crate::core::error::{ParkingError, StoreError};
use crate::core::model::{Booking, BookingId, BookingStatus, SpotFlags, UserId, ZoneId};
use crate::core::store::{ResourceStore, Tables, Tx};
use crate::util::clock::Clock;

/// Shortest bookable duration in hours.
pub const MIN_DURATION_HOURS: u32 = 1;
/// Longest bookable duration in hours.
pub const MAX_DURATION_HOURS: u32 = 24;

/// Request to book a spot in a zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    /// Booking owner.
    pub user_id: UserId,
    /// Zone to claim a spot in.
    pub zone_id: ZoneId,
    /// Vehicle registration plate.
    pub vehicle_plate: String,
    /// Whole hours, `MIN_DURATION_HOURS..=MAX_DURATION_HOURS`.
    pub duration_hours: u32,
}

impl NewBooking {
    fn validate(&self) -> Result<String, ParkingError> {
        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&self.duration_hours) {
            return Err(ParkingError::Validation(format!(
                "duration must be between {MIN_DURATION_HOURS} and {MAX_DURATION_HOURS} hours, got {}",
                self.duration_hours
            )));
        }
        if self.user_id.as_str().trim().is_empty() {
            return Err(ParkingError::Validation("user id is required".into()));
        }
        let plate = self.vehicle_plate.trim().to_uppercase();
        if plate.is_empty() {
            return Err(ParkingError::Validation("vehicle plate is required".into()));
        }
        Ok(plate)
    }
}

/// Orchestrates booking creation, check-in, check-out and cancellation.
pub struct BookingLifecycleManager<S> {
    store: Arc<S>,
    allocator: SpotAllocator<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ResourceStore> BookingLifecycleManager<S> {
    /// Create a manager sharing the store with its allocator.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let allocator = SpotAllocator::new(Arc::clone(&store));
        Self {
            store,
            allocator,
            clock,
        }
    }

    /// Claim a spot and persist a `confirmed` booking in the same transaction.
    ///
    /// The cost is the zone's current hourly rate times the duration, frozen here.
    ///
    /// # Errors
    ///
    /// - `Validation` for a bad duration, plate or user
    /// - `NotFound` for an unknown zone
    /// - `InvalidState` for an inactive zone
    /// - `ResourceExhausted` when the zone is full
    /// - `Conflict` when every candidate was lost to concurrent claims
    pub fn create(&self, request: NewBooking) -> Result<Booking, ParkingError> {
        let plate = request.validate()?;
        let zone_id = request.zone_id;
        let hours = request.duration_hours;

        let zone = self
            .store
            .read(|tables| tables.zone(zone_id).cloned())?
            .ok_or_else(|| ParkingError::not_found("zone", zone_id))?;
        if !zone.is_active() {
            return Err(ParkingError::invalid_state("zone", zone_id, "inactive", "active"));
        }

        let booking = self.allocator.claim_with(zone_id, |tx, spot| {
            let zone = tx
                .zone(zone_id)
                .ok_or_else(|| ParkingError::not_found("zone", zone_id))?;
            if !zone.is_active() {
                return Err(ParkingError::invalid_state("zone", zone_id, "inactive", "active"));
            }
            let cost = zone.hourly_rate().checked_mul(hours).ok_or_else(|| {
                ParkingError::Validation(format!("cost overflows for {hours} hours"))
            })?;
            let start = self.clock.now();
            let end = start + Duration::hours(i64::from(hours));
            let booking = Booking::confirmed(
                request.user_id.clone(),
                spot.id(),
                plate.clone(),
                start,
                end,
                cost,
            );
            tx.insert_booking(booking.clone())?;
            Ok(booking)
        })?;

        tracing::info!(
            booking_id = %booking.id(),
            zone_id = %zone_id,
            user_id = %booking.user_id(),
            total_cost = %booking.total_cost(),
            "booking confirmed"
        );
        Ok(booking)
    }

    /// Move a confirmed booking to `active` and mark its spot occupied.
    ///
    /// # Errors
    ///
    /// `NotFound` if the booking does not exist or belongs to another user,
    /// `InvalidState` unless it is `confirmed` and its window has not ended.
    pub fn check_in(&self, booking_id: BookingId, user: &UserId) -> Result<Booking, ParkingError> {
        let now = self.clock.now();
        let booking = self.store.transaction(|tx| -> Result<Booking, ParkingError> {
            let current = owned_booking(tx, booking_id, user)?;
            if current.status() != BookingStatus::Confirmed {
                return Err(ParkingError::invalid_state(
                    "booking",
                    booking_id,
                    current.status(),
                    "confirmed",
                ));
            }
            if now >= current.end_time() {
                return Err(ParkingError::invalid_state(
                    "booking",
                    booking_id,
                    "past its end time",
                    "within its booked window",
                ));
            }
            let updated = transition(tx, booking_id, BookingStatus::Confirmed, |b| b.activate(now))?;
            if let Some(spot) = updated.spot_id() {
                tx.set_spot_flags(spot, SpotFlags::OCCUPIED)?;
            }
            Ok(updated)
        })?;
        tracing::info!(booking_id = %booking_id, user_id = %user, "booking checked in");
        Ok(booking)
    }

    /// Complete an active booking and free its spot.
    ///
    /// # Errors
    ///
    /// `NotFound` if the booking does not exist or belongs to another user,
    /// `InvalidState` unless it is `active`.
    pub fn check_out(&self, booking_id: BookingId, user: &UserId) -> Result<Booking, ParkingError> {
        let now = self.clock.now();
        let booking = self.store.transaction(|tx| -> Result<Booking, ParkingError> {
            let current = owned_booking(tx, booking_id, user)?;
            if current.status() != BookingStatus::Active {
                return Err(ParkingError::invalid_state(
                    "booking",
                    booking_id,
                    current.status(),
                    "active",
                ));
            }
            let updated = transition(tx, booking_id, BookingStatus::Active, |b| b.complete(now))?;
            if let Some(spot) = current.spot_id() {
                release_in(tx, spot)?;
            }
            Ok(updated)
        })?;
        tracing::info!(booking_id = %booking_id, user_id = %user, "booking checked out");
        Ok(booking)
    }

    /// Cancel a booking that has not been checked in and release its spot.
    ///
    /// Pending payments for the booking are left for the stale-payment sweep.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown booking, `InvalidState` unless it is `confirmed`.
    pub fn cancel(&self, booking_id: BookingId) -> Result<Booking, ParkingError> {
        let now = self.clock.now();
        let booking = self.store.transaction(|tx| -> Result<Booking, ParkingError> {
            let current = tx
                .booking(booking_id)
                .cloned()
                .ok_or_else(|| ParkingError::not_found("booking", booking_id))?;
            if current.status() != BookingStatus::Confirmed {
                return Err(ParkingError::invalid_state(
                    "booking",
                    booking_id,
                    current.status(),
                    "confirmed",
                ));
            }
            let updated = transition(tx, booking_id, BookingStatus::Confirmed, |b| b.cancel(now))?;
            if let Some(spot) = current.spot_id() {
                release_in(tx, spot)?;
            }
            Ok(updated)
        })?;
        tracing::info!(booking_id = %booking_id, "booking cancelled");
        Ok(booking)
    }

    /// Look up a booking.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown booking.
    pub fn booking(&self, booking_id: BookingId) -> Result<Booking, ParkingError> {
        self.store
            .read(|tables| tables.booking(booking_id).cloned())?
            .ok_or_else(|| ParkingError::not_found("booking", booking_id))
    }

    /// A user's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn bookings_for_user(&self, user: &UserId) -> Result<Vec<Booking>, ParkingError> {
        let mut bookings = self.store.read(|tables: &Tables| {
            tables
                .bookings_where(|b| b.user_id() == user)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()
        })?;
        bookings.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(bookings)
    }
}

fn owned_booking(tx: &Tx<'_>, booking_id: BookingId, user: &UserId) -> Result<Booking, ParkingError> {
    tx.booking(booking_id)
        .filter(|b| b.user_id() == user)
        .cloned()
        .ok_or_else(|| ParkingError::not_found("booking", booking_id))
}

fn transition<F>(
    tx: &mut Tx<'_>,
    booking_id: BookingId,
    from: BookingStatus,
    f: F,
) -> Result<Booking, ParkingError>
where
    F: FnOnce(&mut Booking),
{
    tx.update_booking_if(booking_id, &[from], f)?.ok_or_else(|| {
        ParkingError::Store(StoreError::Backend(format!(
            "booking {booking_id} left {from} during its own transaction"
        )))
    })
}
