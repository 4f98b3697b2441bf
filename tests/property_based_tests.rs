//! Property-based tests for partitioning, sweep progression and record hashing.

mod common;

use common::strategies::*;
use proptest::prelude::*;
use serde_json::{Map, Value};
use triage_core::benchmark::{next_value, sweep_values};
use triage_core::models::Record;
use triage_core::orchestration::partition;

fn record_from(fields: &[(String, Value)]) -> Record {
    Record::new(fields.iter().cloned().collect::<Map<String, Value>>())
}

/// Same fields inserted in reverse order, nested objects included
fn reversed(fields: &[(String, Value)]) -> Vec<(String, Value)> {
    fields
        .iter()
        .rev()
        .map(|(k, v)| {
            let v = match v {
                Value::Object(inner) => Value::Object(
                    inner
                        .iter()
                        .rev()
                        .map(|(ik, iv)| (ik.clone(), iv.clone()))
                        .collect(),
                ),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

proptest! {
    #[test]
    fn partition_covers_every_row_exactly_once(total_rows in 0u64..5_000, batch_size in 1u64..600) {
        let batches = partition(total_rows, batch_size).unwrap();

        prop_assert_eq!(batches.len() as u64, total_rows.div_ceil(batch_size));
        let mut next_row = 0;
        for (i, batch) in batches.iter().enumerate() {
            prop_assert_eq!(batch.batch_id, i as u64);
            prop_assert_eq!(batch.start_row, next_row);
            prop_assert!(batch.end_row > batch.start_row);
            prop_assert!(batch.len() <= batch_size);
            next_row = batch.end_row;
        }
        prop_assert_eq!(next_row, total_rows);
    }

    #[test]
    fn sweep_stays_in_bounds_and_ends_at_ceiling((inf, sup, step) in sweep_bounds_strategy()) {
        let values = sweep_values(inf, sup, step);

        prop_assert_eq!(values.first().copied(), Some(inf));
        prop_assert_eq!(values.last().copied(), Some(sup));
        prop_assert!(values.iter().all(|v| (inf..=sup).contains(v)));
        prop_assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn next_value_never_overshoots((inf, sup, step) in sweep_bounds_strategy()) {
        let mut current = inf;
        while current < sup {
            let next = next_value(current, sup, step);
            prop_assert!(next > current);
            prop_assert!(next <= sup);
            current = next;
        }
        prop_assert_eq!(next_value(sup, sup, step), sup + 1);
    }

    #[test]
    fn content_hash_ignores_field_order(fields in alert_fields_strategy()) {
        let forward = record_from(&fields);
        let backward = record_from(&reversed(&fields));

        prop_assert_eq!(forward.content_hash(), backward.content_hash());
        prop_assert_eq!(forward.content_hash().len(), 64);

        let reparsed = Record::parse_line(forward.canonical_json().as_bytes()).unwrap();
        prop_assert_eq!(reparsed.content_hash(), forward.content_hash());
    }

    #[test]
    fn content_hash_changes_with_content(fields in alert_fields_strategy()) {
        let original = record_from(&fields);
        let mut changed = fields.clone();
        changed.push(("zz_extra_marker".to_string(), Value::from("x")));
        prop_assert_ne!(original.content_hash(), record_from(&changed).content_hash());
    }
}
