//! Core value and table types
//!
//! Defines the heterogeneous cell value used throughout the pipeline, the
//! per-participant flat record, the merged participant table and the derived
//! per-stimulus statistics.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Column name under which the participant key is stored
pub const WORKER_CODE: &str = "worker_code";

/// Flexible cell value (supports the value shapes seen in event logs)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Number(f64),
    Bool(bool),
    Text(String),
    List(Vec<FieldValue>),
    Null,
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl FieldValue {
    /// Convert a serde_json value into a cell value
    pub fn from_json(value: &serde_json::Value) -> FieldValue {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else {
                    FieldValue::Number(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => FieldValue::Text(s.clone()),
            serde_json::Value::Array(items) => {
                FieldValue::List(items.iter().map(FieldValue::from_json).collect())
            }
            serde_json::Value::Object(_) => FieldValue::Text(value.to_string()),
        }
    }

    /// Numeric view; text cells holding numbers are parsed, everything else
    /// is treated as missing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Append the other value's items (or the value itself) to this list.
    /// A scalar target is promoted to a list first.
    pub fn extend_with(&mut self, other: FieldValue) {
        if !matches!(self, FieldValue::List(_)) {
            let old = std::mem::replace(self, FieldValue::List(Vec::new()));
            if let FieldValue::List(items) = self {
                items.push(old);
            }
        }
        if let FieldValue::List(items) = self {
            match other {
                FieldValue::List(mut more) => items.append(&mut more),
                v => items.push(v),
            }
        }
    }
}

/// One participant's flat record: field name to value
///
/// Field keys follow the grammar `<context>-<kind>[-<repetition>]`, e.g.
/// `video_0-dur-0`. Meta fields (browser, window size) are unsuffixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub worker_code: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl ParticipantRecord {
    pub fn new(worker_code: impl Into<String>) -> Self {
        ParticipantRecord {
            worker_code: worker_code.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

/// Merged participant table: one row per distinct worker_code
///
/// Rows keep first-encountered order; columns are the union of all observed
/// field names, sorted lexicographically with `worker_code` pinned first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantTable {
    rows: Vec<ParticipantRecord>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ParticipantTable {
    pub fn new() -> Self {
        ParticipantTable::default()
    }

    /// Rebuild a table from previously materialized rows (snapshot reload)
    pub fn from_rows(rows: Vec<ParticipantRecord>) -> Self {
        let mut table = ParticipantTable {
            rows,
            index: HashMap::new(),
        };
        table.reindex();
        table
    }

    pub(crate) fn reindex(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.worker_code.clone(), i))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ParticipantRecord] {
        &self.rows
    }

    pub fn get(&self, worker_code: &str) -> Option<&ParticipantRecord> {
        self.index.get(worker_code).map(|&i| &self.rows[i])
    }

    pub(crate) fn get_mut(&mut self, worker_code: &str) -> Option<&mut ParticipantRecord> {
        let i = *self.index.get(worker_code)?;
        Some(&mut self.rows[i])
    }

    pub(crate) fn push(&mut self, record: ParticipantRecord) {
        self.index
            .insert(record.worker_code.clone(), self.rows.len());
        self.rows.push(record);
    }

    /// Drop rows that fail the predicate (disqualification hook)
    pub fn retain<F: FnMut(&ParticipantRecord) -> bool>(&mut self, f: F) {
        self.rows.retain(f);
        self.reindex();
    }

    /// Column names: `worker_code` first, then all field names sorted
    pub fn columns(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .rows
            .iter()
            .flat_map(|r| r.fields.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        let mut columns = Vec::with_capacity(names.len() + 1);
        columns.push(WORKER_CODE.to_string());
        columns.extend(names);
        columns
    }
}

/// Numeric or categorical summary for one question of one stimulus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSummary {
    /// Two-level aggregate: per-participant repetition values are collapsed
    /// to a participant mean first, then mean/std/median run over those
    /// per-participant values.
    Numeric {
        mean: Option<f64>,
        std: Option<f64>,
        median: Option<f64>,
    },
    /// Count of pooled answers equal to each configured option
    Categorical { counts: BTreeMap<String, usize> },
}

/// Aggregated answers for one question of one stimulus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionStats {
    pub question: String,
    /// All non-null answers across participants and repetitions,
    /// participant-major, repetition 0 before repetition 1
    pub raw_answers: Vec<FieldValue>,
    pub summary: QuestionSummary,
}

/// Derived per-stimulus aggregate across the whole batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusStats {
    pub stimulus: String,
    pub questions: Vec<QuestionStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_value_from_json() {
        let v: serde_json::Value = serde_json::json!({"a": 1});
        assert_eq!(
            FieldValue::from_json(&v["a"]),
            FieldValue::Integer(1)
        );
        assert_eq!(
            FieldValue::from_json(&serde_json::json!("x")),
            FieldValue::Text("x".into())
        );
        assert_eq!(
            FieldValue::from_json(&serde_json::json!([1, "a"])),
            FieldValue::List(vec![FieldValue::Integer(1), FieldValue::Text("a".into())])
        );
        assert_eq!(FieldValue::from_json(&serde_json::Value::Null), FieldValue::Null);
    }

    #[test]
    fn test_as_f64_parses_numeric_text() {
        assert_eq!(FieldValue::Text("45".into()).as_f64(), Some(45.0));
        assert_eq!(FieldValue::Text("4.5 ".into()).as_f64(), Some(4.5));
        assert_eq!(FieldValue::Text("yes".into()).as_f64(), None);
        assert_eq!(FieldValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Null.as_f64(), None);
    }

    #[test]
    fn test_extend_with_concatenates() {
        let mut v = FieldValue::List(vec![FieldValue::Integer(1)]);
        v.extend_with(FieldValue::List(vec![FieldValue::Integer(2), FieldValue::Integer(3)]));
        assert_eq!(
            v,
            FieldValue::List(vec![
                FieldValue::Integer(1),
                FieldValue::Integer(2),
                FieldValue::Integer(3)
            ])
        );
    }

    #[test]
    fn test_columns_pin_worker_code_first() {
        let mut table = ParticipantTable::new();
        let mut r = ParticipantRecord::new("W1");
        r.fields.insert("zulu-dur-0".into(), FieldValue::Number(1.0));
        r.fields.insert("alpha-key-0".into(), FieldValue::Null);
        table.push(r);
        assert_eq!(
            table.columns(),
            vec!["worker_code", "alpha-key-0", "zulu-dur-0"]
        );
    }

    #[test]
    fn test_from_rows_rebuilds_index() {
        let rows = vec![ParticipantRecord::new("W1"), ParticipantRecord::new("W2")];
        let table = ParticipantTable::from_rows(rows);
        assert_eq!(table.get("W2").map(|r| r.worker_code.as_str()), Some("W2"));
        assert_eq!(table.len(), 2);
    }
}
