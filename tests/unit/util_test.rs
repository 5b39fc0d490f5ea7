//! Tests for utilities and value types

use chrono::{Duration, TimeZone, Utc};
use parkbest_core::core::Money;
use parkbest_core::util::{Clock, ManualClock};

#[test]
fn test_manual_clock() {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);
    clock.advance(Duration::minutes(90));
    assert_eq!(clock.now(), start + Duration::minutes(90));
    clock.set(start);
    assert_eq!(clock.now(), start);
}

#[test]
fn test_money_parsing_and_display() {
    assert_eq!(Money::parse_major("200"), Some(Money::from_minor(20_000)));
    assert_eq!(Money::parse_major("200.5"), Some(Money::from_minor(20_050)));
    assert_eq!(Money::parse_major("0.07"), Some(Money::from_minor(7)));
    assert_eq!(Money::parse_major("1.234"), None);
    assert_eq!(Money::parse_major("-5"), None);
    assert_eq!(Money::parse_major("1e3"), None);
    assert_eq!(Money::from_minor(25_100).to_string(), "251.00");
    assert_eq!(Money::from_minor(u64::MAX).checked_mul(2), None);
}
