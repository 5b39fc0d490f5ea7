//! Domain records, the store contract, and the reservation and payment state machines.

pub mod allocator;
pub mod error;
pub mod expiry;
pub mod gateway;
pub mod lifecycle;
pub mod model;
pub mod reconciler;
pub mod store;
pub mod zones;

pub use allocator::SpotAllocator;
pub use error::{AppResult, ParkingError, StoreError};
pub use expiry::{ExpiryScheduler, ExpirySweeper};
pub use gateway::{
    interpret_callback, CallbackEnvelope, CallbackError, CallbackOutcome, GatewayError,
    Initiation, Outcome, PaymentGateway, PaymentGatewayAdapter, PushAccepted, PushRequest,
};
pub use lifecycle::{BookingLifecycleManager, NewBooking, MAX_DURATION_HOURS, MIN_DURATION_HOURS};
pub use model::{
    Booking, BookingId, BookingPaymentStatus, BookingStatus, Money, Payment, PaymentId,
    PaymentStatus, Spot, SpotFlags, SpotId, UserId, Zone, ZoneId,
};
pub use reconciler::{PaymentReconciler, Reconciliation};
pub use store::{ResourceStore, Snapshot, Tables, Tx};
pub use zones::{NewZone, ZoneAvailability, ZoneDirectory};
