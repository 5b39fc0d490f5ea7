//! Tests for runtime response payloads

use parkbest_core::runtime::{health, CallbackAck};

#[test]
fn test_health() {
    let h = health();
    assert!(h.ok);
    assert_eq!(serde_json::to_string(&h).unwrap(), r#"{"ok":true}"#);
}

#[test]
fn test_callback_ack_wire_shape() {
    let ack = serde_json::to_value(CallbackAck::accepted()).unwrap();
    assert_eq!(ack, serde_json::json!({"ResultCode": 0, "ResultDesc": "Accepted"}));
}
