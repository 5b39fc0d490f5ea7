//! API surface for collaborating layers.

pub mod api;

pub use api::{
    health, BookingActionRequest, CallbackAck, CancelBookingRequest, CreateBookingRequest, Health,
    InitiatePaymentRequest, InitiatePaymentResponse, ParkingService, PaymentStatusResponse,
};
