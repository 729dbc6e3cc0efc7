//! Participant table merging
//!
//! Merges per-line participant records across all input files into one
//! table. Repeated fields for the same participant are resolved into
//! repetition-indexed columns by probing `-0`, `-1`, ... up to the
//! configured repeat cap; the first free slot wins and no slot is ever
//! overwritten.

use crate::config::StudyConfig;
use crate::types::{FieldValue, ParticipantRecord, ParticipantTable};
use std::collections::BTreeMap;
use tracing::debug;

/// Find the first unused repetition slot for `base`.
///
/// Returns `None` when all `num_repeat` slots are taken; the caller decides
/// whether that is an error or a drop.
pub fn probe_slot(
    fields: &BTreeMap<String, FieldValue>,
    base: &str,
    num_repeat: usize,
) -> Option<String> {
    (0..num_repeat)
        .map(|rep| format!("{base}-{rep}"))
        .find(|key| !fields.contains_key(key))
}

/// Merge one per-line record into the table under the repetition rules:
/// a new participant's fields get `-0` suffixes, a known participant's
/// fields probe for the first free slot, meta fields take the latest value.
/// A value with no free slot is dropped.
pub fn merge_record(table: &mut ParticipantTable, config: &StudyConfig, record: ParticipantRecord) {
    if table.get(&record.worker_code).is_none() {
        let mut fields = BTreeMap::new();
        for (key, value) in record.fields {
            if config.is_meta_key(&key) {
                fields.insert(key, value);
            } else {
                fields.insert(format!("{key}-0"), value);
            }
        }
        table.push(ParticipantRecord {
            worker_code: record.worker_code,
            fields,
        });
        return;
    }

    let worker_code = record.worker_code.clone();
    let Some(row) = table.get_mut(&worker_code) else {
        return;
    };
    for (key, value) in record.fields {
        if config.is_meta_key(&key) {
            row.fields.insert(key, value);
            continue;
        }
        match probe_slot(&row.fields, &key, config.num_repeat) {
            Some(slot) => {
                row.fields.insert(slot, value);
            }
            None => {
                debug!(
                    worker = %worker_code,
                    field = %key,
                    "no free repetition slot, dropping value"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(worker: &str, pairs: &[(&str, FieldValue)]) -> ParticipantRecord {
        let mut r = ParticipantRecord::new(worker);
        for (k, v) in pairs {
            r.fields.insert(k.to_string(), v.clone());
        }
        r
    }

    #[test]
    fn test_first_merge_suffixes_zero() {
        let config = StudyConfig::default();
        let mut table = ParticipantTable::new();
        merge_record(
            &mut table,
            &config,
            record(
                "W1",
                &[
                    ("video_0-dur", FieldValue::Number(800.0)),
                    ("browser_name", FieldValue::Text("Chrome".into())),
                ],
            ),
        );
        let row = table.get("W1").unwrap();
        assert_eq!(row.get("video_0-dur-0"), Some(&FieldValue::Number(800.0)));
        // meta fields stay unsuffixed
        assert_eq!(
            row.get("browser_name"),
            Some(&FieldValue::Text("Chrome".into()))
        );
        assert!(row.get("browser_name-0").is_none());
    }

    #[test]
    fn test_repetition_probing_never_overwrites() {
        let config = StudyConfig::default();
        let mut table = ParticipantTable::new();
        merge_record(
            &mut table,
            &config,
            record("W1", &[("video_0-dur", FieldValue::Number(1.0))]),
        );
        merge_record(
            &mut table,
            &config,
            record("W1", &[("video_0-dur", FieldValue::Number(2.0))]),
        );
        // third occurrence exceeds num_repeat=2 and is dropped
        merge_record(
            &mut table,
            &config,
            record("W1", &[("video_0-dur", FieldValue::Number(3.0))]),
        );
        let row = table.get("W1").unwrap();
        assert_eq!(row.get("video_0-dur-0"), Some(&FieldValue::Number(1.0)));
        assert_eq!(row.get("video_0-dur-1"), Some(&FieldValue::Number(2.0)));
        assert!(row.get("video_0-dur-2").is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_slot_assignment_is_injective() {
        let config = StudyConfig::default();
        let mut table = ParticipantTable::new();
        for i in 0..4 {
            merge_record(
                &mut table,
                &config,
                record("W1", &[("video_0-dur", FieldValue::Number(i as f64))]),
            );
        }
        let row = table.get("W1").unwrap();
        let slots: Vec<&String> = row
            .fields
            .keys()
            .filter(|k| k.starts_with("video_0-dur"))
            .collect();
        // exactly num_repeat distinct slots, no duplicates
        assert_eq!(slots, vec!["video_0-dur-0", "video_0-dur-1"]);
    }

    #[test]
    fn test_meta_overwritten_on_merge() {
        let config = StudyConfig::default();
        let mut table = ParticipantTable::new();
        merge_record(
            &mut table,
            &config,
            record("W1", &[("browser_name", FieldValue::Text("Chrome".into()))]),
        );
        merge_record(
            &mut table,
            &config,
            record("W1", &[("browser_name", FieldValue::Text("Firefox".into()))]),
        );
        assert_eq!(
            table.get("W1").unwrap().get("browser_name"),
            Some(&FieldValue::Text("Firefox".into()))
        );
    }

    #[test]
    fn test_rows_keep_first_encountered_order() {
        let config = StudyConfig::default();
        let mut table = ParticipantTable::new();
        merge_record(&mut table, &config, record("W2", &[]));
        merge_record(&mut table, &config, record("W1", &[]));
        merge_record(&mut table, &config, record("W2", &[]));
        let order: Vec<&str> = table.rows().iter().map(|r| r.worker_code.as_str()).collect();
        assert_eq!(order, vec!["W2", "W1"]);
    }

    #[test]
    fn test_probe_slot_reports_exhaustion() {
        let mut fields = BTreeMap::new();
        fields.insert("f-0".to_string(), FieldValue::Null);
        fields.insert("f-1".to_string(), FieldValue::Null);
        assert_eq!(probe_slot(&fields, "f", 2), None);
        assert_eq!(probe_slot(&fields, "f", 3), Some("f-2".to_string()));
        assert_eq!(probe_slot(&BTreeMap::new(), "f", 2), Some("f-0".to_string()));
    }
}
