//! API-facing request/response models and the [`ParkingService`] facade.
//!
//! Collaborating layers (HTTP handlers, admin tools) call into the core through this
//! module only. Errors come back as [`ParkingError`]; use [`ParkingError::code`] to map
//! them to responses.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::gateway::{normalize_payer, PaymentGateway, PaymentGatewayAdapter};
use crate::core::{
    Booking, BookingId, BookingLifecycleManager, BookingPaymentStatus, BookingStatus, Money,
    NewBooking, NewZone, ParkingError, PaymentId, PaymentReconciler, PaymentStatus,
    ResourceStore, Spot, UserId, Zone, ZoneAvailability, ZoneDirectory, ZoneId,
};
use crate::util::clock::Clock;

/// `create-booking` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    /// Booking owner.
    pub user_id: UserId,
    /// Zone to book in.
    pub zone_id: ZoneId,
    /// Vehicle plate.
    pub plate: String,
    /// Whole hours, 1 to 24.
    pub duration_hours: u32,
}

/// `check-in` and `check-out` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingActionRequest {
    /// Booking to transition.
    pub booking_id: BookingId,
    /// Caller; must own the booking.
    pub user_id: UserId,
}

/// `cancel-booking` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingRequest {
    /// Booking to cancel.
    pub booking_id: BookingId,
}

/// `initiate-payment` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    /// Booking to pay for.
    pub booking_id: BookingId,
    /// Payer phone number.
    pub payer: String,
}

/// `initiate-payment` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatePaymentResponse {
    /// Gateway correlation id.
    pub correlation_id: String,
    /// New pending payment.
    pub payment_id: PaymentId,
    /// Amount requested (the booking's frozen cost).
    pub amount: Money,
}

/// `payment-status` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    /// Gateway correlation id.
    pub correlation_id: String,
    /// Booking paid for.
    pub booking_id: BookingId,
    /// Attempt state.
    pub status: PaymentStatus,
    /// Receipt when completed.
    pub receipt: Option<String>,
    /// Amount requested.
    pub amount: Money,
}

/// Acknowledgement returned to the gateway for every callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck {
    /// Always `0`.
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    /// Always `"Accepted"`.
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    /// The acknowledgement that stops gateway retries.
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".into(),
        }
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Return a health payload.
#[must_use]
pub const fn health() -> Health {
    Health { ok: true }
}

/// Facade exposing every core operation to collaborating layers.
pub struct ParkingService<S, G> {
    store: Arc<S>,
    zones: ZoneDirectory<S>,
    lifecycle: BookingLifecycleManager<S>,
    payments: PaymentGatewayAdapter<G>,
    reconciler: PaymentReconciler<S>,
}

impl<S, G> ParkingService<S, G>
where
    S: ResourceStore,
    G: PaymentGateway,
{
    /// Wire the components over one shared store and clock.
    pub fn new(store: Arc<S>, payments: PaymentGatewayAdapter<G>, clock: Arc<dyn Clock>) -> Self {
        Self {
            zones: ZoneDirectory::new(Arc::clone(&store)),
            lifecycle: BookingLifecycleManager::new(Arc::clone(&store), Arc::clone(&clock)),
            reconciler: PaymentReconciler::new(Arc::clone(&store), clock),
            payments,
            store,
        }
    }

    /// Shared store.
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Zone administration.
    pub const fn zones(&self) -> &ZoneDirectory<S> {
        &self.zones
    }

    /// Booking state machine.
    pub const fn lifecycle(&self) -> &BookingLifecycleManager<S> {
        &self.lifecycle
    }

    /// Gateway adapter.
    pub const fn payments(&self) -> &PaymentGatewayAdapter<G> {
        &self.payments
    }

    /// Callback reconciler.
    pub const fn reconciler(&self) -> &PaymentReconciler<S> {
        &self.reconciler
    }

    /// `POST create-booking`.
    ///
    /// # Errors
    ///
    /// See [`BookingLifecycleManager::create`].
    pub fn create_booking(&self, req: CreateBookingRequest) -> Result<Booking, ParkingError> {
        self.lifecycle.create(NewBooking {
            user_id: req.user_id,
            zone_id: req.zone_id,
            vehicle_plate: req.plate,
            duration_hours: req.duration_hours,
        })
    }

    /// `POST check-in`.
    ///
    /// # Errors
    ///
    /// See [`BookingLifecycleManager::check_in`].
    pub fn check_in(&self, req: &BookingActionRequest) -> Result<Booking, ParkingError> {
        self.lifecycle.check_in(req.booking_id, &req.user_id)
    }

    /// `POST check-out`.
    ///
    /// # Errors
    ///
    /// See [`BookingLifecycleManager::check_out`].
    pub fn check_out(&self, req: &BookingActionRequest) -> Result<Booking, ParkingError> {
        self.lifecycle.check_out(req.booking_id, &req.user_id)
    }

    /// `POST cancel-booking`.
    ///
    /// # Errors
    ///
    /// See [`BookingLifecycleManager::cancel`].
    pub fn cancel_booking(&self, req: &CancelBookingRequest) -> Result<Booking, ParkingError> {
        self.lifecycle.cancel(req.booking_id)
    }

    /// `POST initiate-payment`: push a prompt for the booking's frozen cost and record a
    /// pending payment once the gateway accepts it.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown booking
    /// - `InvalidState` unless the booking is confirmed or active and unpaid
    /// - `Validation` for a malformed payer
    /// - `GatewayUnavailable` when the gateway fails or times out; nothing is persisted
    pub async fn initiate_payment(
        &self,
        req: InitiatePaymentRequest,
    ) -> Result<InitiatePaymentResponse, ParkingError> {
        let booking = self.lifecycle.booking(req.booking_id)?;
        if !matches!(booking.status(), BookingStatus::Confirmed | BookingStatus::Active) {
            return Err(ParkingError::invalid_state(
                "booking",
                booking.id(),
                booking.status(),
                "confirmed or active",
            ));
        }
        // The paid flag is only set while confirmed, so completed payments are the record.
        let settled = self
            .store
            .read(|t| t.completed_payment_for(booking.id()).is_some())?;
        if settled || booking.payment_status() == BookingPaymentStatus::Paid {
            return Err(ParkingError::invalid_state("booking", booking.id(), "paid", "unpaid"));
        }
        let payer = normalize_payer(&req.payer)?;
        let amount = booking.total_cost();

        let initiation = self.payments.initiate(booking.id(), amount, &payer).await?;
        let payment = self.reconciler.register_pending(
            booking.id(),
            amount,
            &payer,
            &initiation.correlation_id,
        )?;
        Ok(InitiatePaymentResponse {
            correlation_id: initiation.correlation_id,
            payment_id: payment.id(),
            amount,
        })
    }

    /// `POST gateway-callback`. Always acknowledges, whatever the payload did.
    pub fn gateway_callback(&self, raw: &[u8]) -> CallbackAck {
        if let Err(e) = self.reconciler.on_callback(raw) {
            tracing::error!(error = %e, "callback could not be applied, leaving payment to the stale sweep");
        }
        CallbackAck::accepted()
    }

    /// `GET payment-status`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown correlation id.
    pub fn payment_status(&self, correlation_id: &str) -> Result<PaymentStatusResponse, ParkingError> {
        let payment = self.reconciler.payment_status(correlation_id)?;
        Ok(PaymentStatusResponse {
            correlation_id: payment.correlation_id().to_owned(),
            booking_id: payment.booking_id(),
            status: payment.status(),
            receipt: payment.receipt().map(str::to_owned),
            amount: payment.amount(),
        })
    }

    /// `GET booking`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown booking.
    pub fn booking(&self, booking_id: BookingId) -> Result<Booking, ParkingError> {
        self.lifecycle.booking(booking_id)
    }

    /// `GET bookings`: a user's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn user_bookings(&self, user: &UserId) -> Result<Vec<Booking>, ParkingError> {
        self.lifecycle.bookings_for_user(user)
    }

    /// `GET zones`: active zones with free-spot counts.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn list_zones(&self) -> Result<Vec<ZoneAvailability>, ParkingError> {
        self.zones.availability()
    }

    /// `GET zone-spots`: free spots of a zone.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown zone.
    pub fn zone_spots(&self, zone: ZoneId) -> Result<Vec<Spot>, ParkingError> {
        self.zones.free_spots(zone)
    }

    /// Provision a zone and its spots.
    ///
    /// # Errors
    ///
    /// See [`ZoneDirectory::create_zone`].
    pub fn create_zone(&self, req: NewZone) -> Result<Zone, ParkingError> {
        self.zones.create_zone(req)
    }

    /// Change a zone's hourly rate.
    ///
    /// # Errors
    ///
    /// See [`ZoneDirectory::set_hourly_rate`].
    pub fn set_hourly_rate(&self, zone: ZoneId, rate: Money) -> Result<Zone, ParkingError> {
        self.zones.set_hourly_rate(zone, rate)
    }

    /// Open or close a zone.
    ///
    /// # Errors
    ///
    /// See [`ZoneDirectory::set_active`].
    pub fn set_zone_active(&self, zone: ZoneId, active: bool) -> Result<Zone, ParkingError> {
        self.zones.set_active(zone, active)
    }
}
