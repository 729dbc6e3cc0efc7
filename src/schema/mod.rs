//! Raw input schema and NDJSON parse helpers

mod raw_event;

pub use raw_event::{InteractionSample, KeypressSample, RawEvent, SessionLine, StimulusField};

use crate::error::ExtractError;

/// Parse helpers for batches of session lines
pub struct SessionLineAdapter;

impl SessionLineAdapter {
    /// Parse NDJSON (one session line per text line). Blank lines are
    /// skipped; a malformed line aborts the batch with its line number.
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<SessionLine>, ExtractError> {
        let mut lines = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionLine>(trimmed) {
                Ok(parsed) => lines.push(parsed),
                Err(e) => {
                    return Err(ExtractError::ParseLine {
                        line: line_num + 1,
                        detail: e.to_string(),
                    });
                }
            }
        }
        Ok(lines)
    }

    /// Parse a JSON array of session lines
    pub fn parse_array(json: &str) -> Result<Vec<SessionLine>, ExtractError> {
        let lines: Vec<SessionLine> = serde_json::from_str(json)?;
        Ok(lines)
    }
}
