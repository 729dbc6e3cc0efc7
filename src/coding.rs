//! Response coding layer
//!
//! Maps categorical free-text answer codes to ordinal integers for
//! downstream statistics, counts multi-select checkbox blobs, and derives
//! composite scores from marker-matched columns. A lookup miss propagates
//! null, never an error.

use crate::types::{FieldValue, ParticipantTable};
use std::collections::BTreeMap;

/// Fixed mapping from answer codes to ordinal values
#[derive(Debug, Clone, Default)]
pub struct CodingTable {
    map: BTreeMap<String, i64>,
}

impl CodingTable {
    pub fn new(pairs: impl IntoIterator<Item = (impl Into<String>, i64)>) -> Self {
        CodingTable {
            map: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Ordinal code for an answer, `None` on a lookup miss
    pub fn code(&self, answer: &str) -> Option<i64> {
        self.map.get(answer).copied()
    }
}

/// Five-point agreement scale used by the platform's Likert items
pub fn likert_agreement() -> CodingTable {
    CodingTable::new([
        ("strongly_disagree", 0),
        ("disagree", 1),
        ("neither_agree_nor_disagree", 2),
        ("agree", 3),
        ("strongly_agree", 4),
    ])
}

/// Frequency scale for the platform's behaviour items
pub fn likert_frequency() -> CodingTable {
    CodingTable::new([
        ("never", 0),
        ("rarely", 1),
        ("sometimes", 2),
        ("often", 3),
        ("always", 4),
    ])
}

/// Recode one text column into `out_column` using the coding table.
/// Rows whose value is missing or not in the table get null.
pub fn code_column(
    table: &mut ParticipantTable,
    column: &str,
    coding: &CodingTable,
    out_column: &str,
) {
    let coded: Vec<FieldValue> = table
        .rows()
        .iter()
        .map(|row| {
            row.get(column)
                .and_then(FieldValue::as_str)
                .and_then(|s| coding.code(s))
                .map(FieldValue::Integer)
                .unwrap_or(FieldValue::Null)
        })
        .collect();
    write_column(table, out_column, coded);
}

/// Count, per option, the rows whose checkbox blob contains the option.
///
/// The platform concatenates multiple selections into one string without a
/// separator, so each option is an independent substring test and one row
/// can increment several counters.
pub fn checkbox_counts(
    table: &ParticipantTable,
    column: &str,
    options: &[&str],
) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> =
        options.iter().map(|o| (o.to_string(), 0)).collect();
    for row in table.rows() {
        let Some(blob) = row.get(column).and_then(FieldValue::as_str) else {
            continue;
        };
        for option in options {
            if blob.contains(option) {
                if let Some(n) = counts.get_mut(*option) {
                    *n += 1;
                }
            }
        }
    }
    counts
}

/// Row-wise mean over all columns whose name contains `marker`,
/// written to `out_column`. Rows with no codable value get null.
pub fn composite_score(table: &mut ParticipantTable, marker: &str, out_column: &str) {
    let scores: Vec<FieldValue> = table
        .rows()
        .iter()
        .map(|row| {
            let values: Vec<f64> = row
                .fields
                .iter()
                .filter(|(name, _)| name.contains(marker))
                .filter_map(|(_, v)| v.as_f64())
                .collect();
            match crate::stats::nan_mean(&values) {
                Some(mean) => FieldValue::Number(mean),
                None => FieldValue::Null,
            }
        })
        .collect();
    write_column(table, out_column, scores);
}

fn write_column(table: &mut ParticipantTable, column: &str, values: Vec<FieldValue>) {
    let workers: Vec<String> = table
        .rows()
        .iter()
        .map(|r| r.worker_code.clone())
        .collect();
    for (worker, value) in workers.into_iter().zip(values) {
        if let Some(row) = table.get_mut(&worker) {
            row.fields.insert(column.to_string(), value);
        }
    }
}
