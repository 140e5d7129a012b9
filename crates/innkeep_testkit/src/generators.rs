//! Property-based test generators using proptest.
//!
//! Generated values are JSON-representable: floats are finite and field
//! names are plain identifiers, so every backend can store them.

use innkeep_core::{Record, Value};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for field names other than `id` and `key`.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9_]{0,11}")
        .expect("Invalid regex")
        .prop_filter("key fields are reserved", |s| s != "id" && s != "key")
}

/// Strategy for scalar values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9f64..1.0e9f64)
            .prop_filter("integral floats read back as integers", |f| f.fract() != 0.0)
            .prop_map(Value::Float),
        "[ -~]{0,24}".prop_map(Value::Text),
    ]
}

/// Strategy for values, including shallow lists and objects.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4)
                .prop_map(Value::Object),
        ]
    })
}

/// Strategy for records without a key field.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 1..6)
        .prop_map(|fields: BTreeMap<String, Value>| Record::from(fields))
}

/// Strategy for booking-shaped records.
pub fn booking_strategy() -> impl Strategy<Value = Record> {
    (
        "G[0-9]{3}",
        (1u32..=12, 1u32..=28),
        prop_oneof![Just("pending"), Just("confirmed"), Just("cancelled")],
        0i64..10_000_000,
    )
        .prop_map(|(guest, (month, day), status, total)| {
            Record::new()
                .with("guestId", guest)
                .with("bookingDate", format!("2024-{month:02}-{day:02}"))
                .with("status", status)
                .with("total", total)
        })
}
