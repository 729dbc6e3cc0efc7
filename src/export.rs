//! Materialized outputs
//!
//! CSV export for the participant table and the stimulus mapping table, and
//! JSON snapshots for fast reload between analysis runs.

use crate::error::ExtractError;
use crate::metadata::StimulusCatalogue;
use crate::types::{
    FieldValue, ParticipantRecord, ParticipantTable, QuestionSummary, StimulusStats,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Render one cell for CSV output. Lists become JSON text, missing values
/// become empty cells.
fn cell_to_string(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Number(n) => {
            if n.is_finite() {
                n.to_string()
            } else {
                String::new()
            }
        }
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::List(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn opt_to_string(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write the participant table: `worker_code` first, remaining columns
/// sorted, one row per participant in first-encountered order.
pub fn write_participants_csv(
    table: &ParticipantTable,
    path: impl AsRef<Path>,
) -> Result<(), ExtractError> {
    let path = path.as_ref();
    let columns = table.columns();
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record(&columns)?;
    for row in table.rows() {
        let mut record = Vec::with_capacity(columns.len());
        record.push(row.worker_code.clone());
        for column in &columns[1..] {
            record.push(
                row.get(column)
                    .map(cell_to_string)
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|e| ExtractError::io(path.display().to_string(), e))?;
    info!(rows = table.len(), path = %path.display(), "saved participant table");
    Ok(())
}

/// Write the stimulus mapping table: catalogue metadata joined with the
/// aggregated statistics. Numeric questions produce `<q>`, `<q>-std` and
/// `<q>-median` columns; categorical questions one `<q>-<option>` count
/// column per option; every question also gets a `<q>-raw` column with the
/// pooled answers as JSON.
pub fn write_stimuli_csv(
    stats: &[StimulusStats],
    catalogue: &StimulusCatalogue,
    path: impl AsRef<Path>,
) -> Result<(), ExtractError> {
    let path = path.as_ref();

    let mut extra_columns: Vec<String> = catalogue
        .stimuli
        .iter()
        .flat_map(|s| s.extra.keys().cloned())
        .collect();
    extra_columns.sort();
    extra_columns.dedup();

    let mut stat_columns: Vec<String> = Vec::new();
    for stim in stats {
        for q in &stim.questions {
            let cols = question_columns(q);
            for col in cols {
                if !stat_columns.contains(&col) {
                    stat_columns.push(col);
                }
            }
        }
    }

    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    let mut header = vec!["stimulus".to_string()];
    header.extend(extra_columns.iter().cloned());
    header.extend(stat_columns.iter().cloned());
    writer.write_record(&header)?;

    for stim in stats {
        let meta = catalogue.stimuli.iter().find(|m| m.name == stim.stimulus);
        let mut record = vec![stim.stimulus.clone()];
        for column in &extra_columns {
            record.push(
                meta.and_then(|m| m.extra.get(column))
                    .cloned()
                    .unwrap_or_default(),
            );
        }
        let mut cells: std::collections::BTreeMap<String, String> = Default::default();
        for q in &stim.questions {
            match &q.summary {
                QuestionSummary::Numeric { mean, std, median } => {
                    cells.insert(q.question.clone(), opt_to_string(*mean));
                    cells.insert(format!("{}-std", q.question), opt_to_string(*std));
                    cells.insert(format!("{}-median", q.question), opt_to_string(*median));
                }
                QuestionSummary::Categorical { counts } => {
                    for (option, n) in counts {
                        cells.insert(format!("{}-{}", q.question, option), n.to_string());
                    }
                }
            }
            cells.insert(
                format!("{}-raw", q.question),
                serde_json::to_string(&q.raw_answers).unwrap_or_default(),
            );
        }
        for column in &stat_columns {
            record.push(cells.get(column).cloned().unwrap_or_default());
        }
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|e| ExtractError::io(path.display().to_string(), e))?;
    info!(rows = stats.len(), path = %path.display(), "saved stimulus mapping table");
    Ok(())
}

fn question_columns(q: &crate::types::QuestionStats) -> Vec<String> {
    let mut cols = Vec::new();
    match &q.summary {
        QuestionSummary::Numeric { .. } => {
            cols.push(q.question.clone());
            cols.push(format!("{}-std", q.question));
            cols.push(format!("{}-median", q.question));
        }
        QuestionSummary::Categorical { counts } => {
            for option in counts.keys() {
                cols.push(format!("{}-{}", q.question, option));
            }
        }
    }
    cols.push(format!("{}-raw", q.question));
    cols
}

/// Participant-table snapshot for fast reload
#[derive(Debug, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub snapshot_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Name and version of the tool that wrote the snapshot
    pub producer: String,
    pub participants: usize,
    pub rows: Vec<ParticipantRecord>,
}

/// Save the participant table as a JSON snapshot
pub fn save_table_snapshot(
    table: &ParticipantTable,
    path: impl AsRef<Path>,
) -> Result<(), ExtractError> {
    let path = path.as_ref();
    let snapshot = TableSnapshot {
        snapshot_id: Uuid::new_v4(),
        created_at: Utc::now(),
        producer: format!("{} {}", crate::PRODUCER_NAME, crate::TRIALSCOPE_VERSION),
        participants: table.len(),
        rows: table.rows().to_vec(),
    };
    let json = serde_json::to_string(&snapshot)?;
    fs::write(path, json).map_err(|e| ExtractError::io(path.display().to_string(), e))?;
    info!(rows = snapshot.participants, path = %path.display(), "saved table snapshot");
    Ok(())
}

/// Reload a participant table from a JSON snapshot
pub fn load_table_snapshot(path: impl AsRef<Path>) -> Result<ParticipantTable, ExtractError> {
    let path = path.as_ref();
    let json =
        fs::read_to_string(path).map_err(|e| ExtractError::io(path.display().to_string(), e))?;
    let snapshot: TableSnapshot = serde_json::from_str(&json)?;
    if snapshot.rows.len() != snapshot.participants {
        return Err(ExtractError::SnapshotError(format!(
            "snapshot {} claims {} participants but holds {} rows",
            snapshot.snapshot_id,
            snapshot.participants,
            snapshot.rows.len()
        )));
    }
    info!(rows = snapshot.rows.len(), path = %path.display(), "loaded table snapshot");
    Ok(ParticipantTable::from_rows(snapshot.rows))
}
