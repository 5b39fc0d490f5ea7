//! Unit-level checks of configuration, errors, builders and utilities.

mod unit;
