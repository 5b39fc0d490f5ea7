//! Tests for error codes and messages

use parkbest_core::core::{ParkingError, StoreError, ZoneId};

#[test]
fn test_error_codes() {
    let zone = ZoneId::new();
    let cases = [
        (ParkingError::Validation("plate".into()), "validation_error"),
        (ParkingError::ResourceExhausted { zone }, "resource_exhausted"),
        (
            ParkingError::NotFound {
                entity: "booking",
                id: "b1".into(),
            },
            "not_found",
        ),
        (ParkingError::GatewayUnavailable("timeout".into()), "gateway_unavailable"),
        (ParkingError::Conflict { zone, attempts: 3 }, "conflict"),
        (ParkingError::Store(StoreError::Backend("disk".into())), "internal_error"),
    ];
    for (err, code) in cases {
        assert_eq!(err.code(), code, "{err}");
    }
}

#[test]
fn test_error_display() {
    let err = ParkingError::NotFound {
        entity: "payment",
        id: "ws_CO_1".into(),
    };
    assert_eq!(err.to_string(), "payment not found: ws_CO_1");

    let err: ParkingError = StoreError::Duplicate("booking b1".into()).into();
    assert_eq!(err.to_string(), "duplicate record: booking b1");
}
