//! Applies gateway callbacks to payment and booking state.
//!
//! Callbacks are delivered at least once. Unknown, duplicate and malformed deliveries
//! are logged and reported as a [`Reconciliation`] variant; none of them is an error.

use std::sync::Arc;

use crate::core::error::ParkingError;
use crate::core::gateway::{interpret_callback, CallbackOutcome, Outcome};
use crate::core::model::{
    BookingId, BookingStatus, Money, Payment, PaymentId, PaymentStatus,
};
use crate::core::store::ResourceStore;
use crate::util::clock::Clock;

/// What a callback delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Payment moved to `completed`.
    Completed {
        /// Payment that completed.
        payment_id: PaymentId,
        /// Booking it pays for.
        booking_id: BookingId,
        /// Whether the booking was still confirmed and got its paid flag set.
        booking_marked_paid: bool,
    },
    /// Payment moved to `failed`.
    Failed {
        /// Payment that failed.
        payment_id: PaymentId,
        /// Gateway result code.
        code: i64,
    },
    /// Payment was already terminal; nothing changed.
    Duplicate {
        /// Correlation id of the delivery.
        correlation_id: String,
        /// Status the payment already had.
        status: PaymentStatus,
    },
    /// No payment has this correlation id.
    Unknown {
        /// Correlation id of the delivery.
        correlation_id: String,
    },
    /// Payload could not be interpreted.
    Malformed {
        /// Decoder message.
        reason: String,
    },
}

/// Moves payments out of `pending` in response to gateway callbacks.
pub struct PaymentReconciler<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ResourceStore> PaymentReconciler<S> {
    /// Create a reconciler over a shared store.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record a gateway-accepted initiation as a `pending` payment.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown booking, `InvalidState` when the booking already has a
    /// completed payment, `Validation` when the amount differs from the booking's total
    /// cost, `Store` for a duplicate correlation id.
    pub fn register_pending(
        &self,
        booking_id: BookingId,
        amount: Money,
        payer: &str,
        correlation_id: &str,
    ) -> Result<Payment, ParkingError> {
        let now = self.clock.now();
        let payment = self.store.transaction(|tx| -> Result<Payment, ParkingError> {
            let booking = tx
                .booking(booking_id)
                .ok_or_else(|| ParkingError::not_found("booking", booking_id))?;
            if tx.completed_payment_for(booking_id).is_some() {
                return Err(ParkingError::invalid_state("booking", booking_id, "paid", "unpaid"));
            }
            if booking.total_cost() != amount {
                return Err(ParkingError::Validation(format!(
                    "payment amount {amount} does not match booking cost {}",
                    booking.total_cost()
                )));
            }
            let payment = Payment::pending(
                booking_id,
                amount,
                payer.to_owned(),
                correlation_id.to_owned(),
                now,
            );
            tx.insert_payment(payment.clone())?;
            Ok(payment)
        })?;
        tracing::info!(
            payment_id = %payment.id(),
            booking_id = %booking_id,
            correlation_id = %correlation_id,
            "payment pending"
        );
        Ok(payment)
    }

    /// Interpret and apply one raw callback delivery.
    ///
    /// # Errors
    ///
    /// Store failures only. Malformed, unknown and duplicate deliveries return `Ok`.
    pub fn on_callback(&self, raw: &[u8]) -> Result<Reconciliation, ParkingError> {
        match interpret_callback(raw) {
            Ok(outcome) => self.apply(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed payment callback");
                Ok(Reconciliation::Malformed {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Apply an interpreted callback.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn apply(&self, callback: CallbackOutcome) -> Result<Reconciliation, ParkingError> {
        let now = self.clock.now();
        let CallbackOutcome {
            correlation_id,
            outcome,
        } = callback;

        let result = self.store.transaction(|tx| -> Result<Reconciliation, ParkingError> {
            let Some(payment) = tx.payment_by_correlation(&correlation_id).cloned() else {
                return Ok(Reconciliation::Unknown {
                    correlation_id: correlation_id.clone(),
                });
            };
            if payment.status().is_terminal() {
                return Ok(Reconciliation::Duplicate {
                    correlation_id: correlation_id.clone(),
                    status: payment.status(),
                });
            }

            match outcome {
                Outcome::Success { receipt, amount } => {
                    if let Some(reported) = amount.filter(|a| *a != payment.amount()) {
                        tracing::warn!(
                            correlation_id = %correlation_id,
                            expected = %payment.amount(),
                            reported = %reported,
                            "callback amount differs from payment amount"
                        );
                    }
                    tx.update_payment_if(payment.id(), &[PaymentStatus::Pending], |p| {
                        p.complete(receipt, now);
                    })?;
                    let booking_marked_paid = tx
                        .update_booking_if(payment.booking_id(), &[BookingStatus::Confirmed], |b| {
                            b.mark_paid(now);
                        })?
                        .is_some();
                    Ok(Reconciliation::Completed {
                        payment_id: payment.id(),
                        booking_id: payment.booking_id(),
                        booking_marked_paid,
                    })
                }
                Outcome::Failure { code, reason } => {
                    tx.update_payment_if(payment.id(), &[PaymentStatus::Pending], Payment::fail)?;
                    tracing::debug!(correlation_id = %correlation_id, code, reason = %reason, "gateway reported failure");
                    Ok(Reconciliation::Failed {
                        payment_id: payment.id(),
                        code,
                    })
                }
            }
        })?;

        match &result {
            Reconciliation::Completed {
                payment_id,
                booking_id,
                booking_marked_paid,
            } => tracing::info!(
                payment_id = %payment_id,
                booking_id = %booking_id,
                booking_marked_paid,
                "payment completed"
            ),
            Reconciliation::Failed { payment_id, code } => {
                tracing::info!(payment_id = %payment_id, code, "payment failed");
            }
            Reconciliation::Duplicate {
                correlation_id,
                status,
            } => tracing::warn!(correlation_id = %correlation_id, status = %status, "duplicate payment callback"),
            Reconciliation::Unknown { correlation_id } => {
                tracing::warn!(correlation_id = %correlation_id, "callback for unknown payment");
            }
            Reconciliation::Malformed { .. } => {}
        }
        Ok(result)
    }

    /// Current state of a payment attempt.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown correlation id.
    pub fn payment_status(&self, correlation_id: &str) -> Result<Payment, ParkingError> {
        self.store
            .read(|tables| tables.payment_by_correlation(correlation_id).cloned())?
            .ok_or_else(|| ParkingError::not_found("payment", correlation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gateway::CallbackEnvelope;
    use crate::core::lifecycle::{BookingLifecycleManager, NewBooking};
    use crate::core::model::{BookingPaymentStatus, UserId};
    use crate::core::zones::{NewZone, ZoneDirectory};
    use crate::infra::store::InMemoryStore;
    use crate::util::clock::ManualClock;

    fn setup() -> (
        PaymentReconciler<InMemoryStore>,
        BookingLifecycleManager<InMemoryStore>,
        BookingId,
    ) {
        let store = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let zone = ZoneDirectory::new(Arc::clone(&store))
            .create_zone(NewZone {
                name: "A".into(),
                location: "CBD".into(),
                hourly_rate: Money::from_minor(10_000),
                total_spots: 1,
            })
            .unwrap();
        let lifecycle = BookingLifecycleManager::new(Arc::clone(&store), Arc::clone(&clock));
        let booking = lifecycle
            .create(NewBooking {
                user_id: UserId::new("u1"),
                zone_id: zone.id(),
                vehicle_plate: "KAA1".into(),
                duration_hours: 2,
            })
            .unwrap();
        (PaymentReconciler::new(store, clock), lifecycle, booking.id())
    }

    #[test]
    fn test_register_pending_rejects_wrong_amount() {
        let (reconciler, _, booking) = setup();
        let err = reconciler
            .register_pending(booking, Money::from_minor(1), "254700000000", "X")
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_success_marks_confirmed_booking_paid() {
        let (reconciler, lifecycle, booking) = setup();
        reconciler
            .register_pending(booking, Money::from_minor(20_000), "254700000000", "X")
            .unwrap();
        let raw = CallbackEnvelope::success("X", "R1", Money::from_minor(20_000))
            .to_bytes()
            .unwrap();
        let applied = reconciler.on_callback(&raw).unwrap();
        assert!(matches!(
            applied,
            Reconciliation::Completed {
                booking_marked_paid: true,
                ..
            }
        ));
        let payment = reconciler.payment_status("X").unwrap();
        assert_eq!(payment.receipt(), Some("R1"));
        let booking = lifecycle.booking(booking).unwrap();
        assert_eq!(booking.status(), BookingStatus::Confirmed);
        assert_eq!(booking.payment_status(), BookingPaymentStatus::Paid);
    }

    #[test]
    fn test_failure_leaves_booking_untouched() {
        let (reconciler, lifecycle, booking) = setup();
        reconciler
            .register_pending(booking, Money::from_minor(20_000), "254700000000", "X")
            .unwrap();
        let raw = CallbackEnvelope::failure("X", 1, "Insufficient funds")
            .to_bytes()
            .unwrap();
        assert!(matches!(
            reconciler.on_callback(&raw).unwrap(),
            Reconciliation::Failed { code: 1, .. }
        ));
        assert_eq!(
            reconciler.payment_status("X").unwrap().status(),
            PaymentStatus::Failed
        );
        assert_eq!(
            lifecycle.booking(booking).unwrap().payment_status(),
            BookingPaymentStatus::Unpaid
        );
    }

    #[test]
    fn test_malformed_callback_is_acknowledged() {
        let (reconciler, _, _) = setup();
        assert!(matches!(
            reconciler.on_callback(b"{}").unwrap(),
            Reconciliation::Malformed { .. }
        ));
    }
}
