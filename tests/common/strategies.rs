#![allow(dead_code)]

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for field names of an alert record
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}"
}

/// Strategy for scalar JSON values
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 .:/-]{0,24}".prop_map(Value::String),
    ]
}

/// Strategy for alert-like objects, one level of nesting
pub fn alert_fields_strategy() -> impl Strategy<Value = Vec<(String, Value)>> {
    let nested = prop::collection::btree_map(field_name_strategy(), scalar_strategy(), 0..4)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>()));
    prop::collection::btree_map(
        field_name_strategy(),
        prop_oneof![3 => scalar_strategy(), 1 => nested],
        1..8,
    )
    .prop_map(|m| m.into_iter().collect())
}

/// Strategy for sweep bounds `(inf, sup, step)` with `inf <= sup`
pub fn sweep_bounds_strategy() -> impl Strategy<Value = (u64, u64, u64)> {
    (1u64..=300, 0u64..=300, 1u64..=80).prop_map(|(inf, span, step)| (inf, inf + span, step))
}
