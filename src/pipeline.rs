//! Pipeline orchestration
//!
//! This module provides the public API for trialscope. It walks raw NDJSON
//! batches through the full pipeline: session-line parsing → event facts →
//! per-line accumulation → cross-file table merge → stimulus aggregation.

use crate::accumulator::TrialAccumulator;
use crate::aggregate::StimulusAggregator;
use crate::config::StudyConfig;
use crate::error::ExtractError;
use crate::metadata::StimulusCatalogue;
use crate::parser::{EventParser, LineState};
use crate::schema::{SessionLine, SessionLineAdapter};
use crate::table::merge_record;
use crate::types::{ParticipantRecord, ParticipantTable, StimulusStats};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Extract all given log files into one participant table.
///
/// # Example
/// ```ignore
/// let table = extract_files(
///     &["logs_1.ndjson", "logs_2.ndjson"],
///     StudyConfig::default(),
///     catalogue,
/// )?;
/// ```
pub fn extract_files<P: AsRef<Path>>(
    paths: &[P],
    config: StudyConfig,
    catalogue: StimulusCatalogue,
) -> Result<ParticipantTable, ExtractError> {
    let mut extractor = LogExtractor::new(config, catalogue);
    for path in paths {
        extractor.process_file(path)?;
    }
    Ok(extractor.finish())
}

/// Stateful extractor for incremental processing across multiple files.
///
/// Owns the only mutable state of a run: the per-worker previous-elapsed-time
/// lookup (the duration fallback reference) and the in-progress merged table.
pub struct LogExtractor {
    config: StudyConfig,
    catalogue: StimulusCatalogue,
    prev_elapsed: HashMap<String, f64>,
    table: ParticipantTable,
    lines_seen: usize,
}

impl LogExtractor {
    pub fn new(config: StudyConfig, catalogue: StimulusCatalogue) -> Self {
        LogExtractor {
            config,
            catalogue,
            prev_elapsed: HashMap::new(),
            table: ParticipantTable::new(),
            lines_seen: 0,
        }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn catalogue(&self) -> &StimulusCatalogue {
        &self.catalogue
    }

    /// Read one NDJSON log file into the batch
    pub fn process_file(&mut self, path: impl AsRef<Path>) -> Result<(), ExtractError> {
        let path = path.as_ref();
        info!(path = %path.display(), "reading log data");
        let text = fs::read_to_string(path)
            .map_err(|e| ExtractError::io(path.display().to_string(), e))?;
        self.process_str(&text)
    }

    /// Process an in-memory NDJSON batch
    pub fn process_str(&mut self, ndjson: &str) -> Result<(), ExtractError> {
        let lines = SessionLineAdapter::parse_ndjson(ndjson)?;
        for line in &lines {
            self.process_line(line);
        }
        Ok(())
    }

    /// Walk one session line's events and merge the result into the table
    pub fn process_line(&mut self, line: &SessionLine) {
        self.lines_seen += 1;
        let Some(worker_code) = line.worker_code() else {
            debug!("skipping session line without worker code");
            return;
        };
        debug!(worker = %worker_code, "working with session line");

        let parser = EventParser::new(&self.config);
        let mut accumulator = TrialAccumulator::new(&self.config, &self.catalogue);
        let mut state = LineState::default();
        let prev_elapsed = self.prev_elapsed.get(worker_code).copied();

        for event in &line.data {
            for fact in parser.parse_event(event, &mut state, prev_elapsed) {
                accumulator.fold(fact);
            }
        }

        self.prev_elapsed
            .insert(worker_code.to_string(), state.last_elapsed);
        if let Some(record) = accumulator.finish() {
            merge_record(&mut self.table, &self.config, record);
        }
    }

    /// Finalize the batch and hand over the merged table. The extractor can
    /// keep processing afterwards, starting a fresh table.
    pub fn finish(&mut self) -> ParticipantTable {
        info!(
            lines = self.lines_seen,
            participants = self.table.len(),
            "participants observed before filtering"
        );
        self.lines_seen = 0;
        std::mem::take(&mut self.table)
    }

    /// Finalize with a disqualification predicate applied
    pub fn finish_filtered(
        &mut self,
        keep: impl Fn(&ParticipantRecord) -> bool,
    ) -> ParticipantTable {
        let mut table = self.finish();
        table.retain(keep);
        table
    }

    /// Run the stimulus aggregation over a finished table
    pub fn aggregate(&self, table: &ParticipantTable) -> Vec<StimulusStats> {
        StimulusAggregator::new(&self.config).aggregate(table, &self.catalogue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{QuestionSpec, StimulusKind, StimulusMeta};
    use crate::types::{FieldValue, QuestionSummary};

    fn catalogue() -> StimulusCatalogue {
        StimulusCatalogue {
            stimuli: vec![StimulusMeta {
                name: "video_0".to_string(),
                kind: StimulusKind::Video,
                extra: Default::default(),
            }],
            video_questions: vec![
                QuestionSpec::categorical("q1", ["yes", "no"]),
                QuestionSpec::numeric("slider"),
            ],
            image_questions: Vec::new(),
            final_questions: Vec::new(),
        }
    }

    #[test]
    fn test_repeated_stimulus_across_files_fills_slots() {
        // two log files covering the same worker: the repeated presentation
        // of video_0 lands in repetition slots -0 and -1
        let file_1 = r#"{"data": [{"worker_code": "W1"}, {"stimulus": ["media/video_0.mp4"], "trial_index": 3, "time_elapsed": 1000}, {"responses": "{\"q1\": \"yes\"}"}]}"#;
        let file_2 = r#"{"data": [{"worker_code": "W1"}, {"stimulus": ["media/video_0.mp4"], "trial_index": 3, "time_elapsed": 1000}, {"responses": "{\"q1\": \"no\"}"}]}"#;

        let mut extractor = LogExtractor::new(StudyConfig::default(), catalogue());
        extractor.process_str(file_1).unwrap();
        extractor.process_str(file_2).unwrap();
        let table = extractor.finish();

        assert_eq!(table.len(), 1);
        let row = table.get("W1").unwrap();
        assert_eq!(row.get("video_0-q1-0"), Some(&FieldValue::Text("yes".into())));
        assert_eq!(row.get("video_0-q1-1"), Some(&FieldValue::Text("no".into())));
        assert!(row.get("video_0-q1-2").is_none());
    }

    #[test]
    fn test_duration_uses_cross_line_fallback() {
        // the second line's onset has no in-line elapsed reference, so the
        // duration falls back to the last elapsed time of the first line
        let ndjson = concat!(
            r#"{"data": [{"worker_code": "W1"}, {"time_elapsed": 500}]}"#,
            "\n",
            r#"{"data": [{"worker_code": "W1"}, {"stimulus": "video_0.mp4", "trial_index": 0, "time_elapsed": 1300}]}"#,
        );
        let mut extractor = LogExtractor::new(StudyConfig::default(), catalogue());
        extractor.process_str(ndjson).unwrap();
        let table = extractor.finish();
        let row = table.get("W1").unwrap();
        assert_eq!(row.get("video_0-dur-0"), Some(&FieldValue::Number(800.0)));
        // the -1 slot belongs to the second occurrence only
        assert!(row.get("video_0-dur-1").is_none());
    }

    #[test]
    fn test_end_to_end_extract_and_aggregate() {
        let ndjson = concat!(
            r#"{"data": ["#,
            r#"{"worker_code": "W1", "browser_name": "Chrome"},"#,
            r#"{"time_elapsed": 200},"#,
            r#"{"stimulus": "video_0.mp4", "trial_index": 1, "time_elapsed": 1200},"#,
            r#"{"rts": [{"key": "f", "rt": 400.0}]},"#,
            r#"{"responses": "{\"q1\": \"yes\", \"slider\": 40}"}"#,
            r#"]}"#,
            "\n",
            r#"{"data": ["#,
            r#"{"worker_code": "W1"},"#,
            r#"{"time_elapsed": 100},"#,
            r#"{"stimulus": "video_0.mp4", "trial_index": 2, "time_elapsed": 900},"#,
            r#"{"responses": "{\"q1\": \"no\", \"slider\": 60}"}"#,
            r#"]}"#,
            "\n",
            r#"{"data": ["#,
            r#"{"worker_code": "W2"},"#,
            r#"{"time_elapsed": 50},"#,
            r#"{"stimulus": "video_0.mp4", "trial_index": 1, "time_elapsed": 750},"#,
            r#"{"responses": "{\"q1\": \"yes\", \"slider\": 80}"}"#,
            r#"]}"#,
        );

        let mut extractor = LogExtractor::new(StudyConfig::default(), catalogue());
        extractor.process_str(ndjson).unwrap();
        let table = extractor.finish();
        assert_eq!(table.len(), 2);

        let w1 = table.get("W1").unwrap();
        assert_eq!(w1.get("video_0-dur-0"), Some(&FieldValue::Number(1000.0)));
        assert_eq!(w1.get("video_0-dur-1"), Some(&FieldValue::Number(800.0)));
        assert_eq!(
            w1.get("browser_name"),
            Some(&FieldValue::Text("Chrome".into()))
        );
        assert_eq!(
            w1.get("video_0-key-0"),
            Some(&FieldValue::List(vec![FieldValue::Text("f".into())]))
        );

        let stats = extractor.aggregate(&table);
        assert_eq!(stats.len(), 1);
        let q1 = &stats[0].questions[0];
        let QuestionSummary::Categorical { counts } = &q1.summary else {
            panic!("expected categorical summary");
        };
        assert_eq!(counts.get("yes"), Some(&2));
        assert_eq!(counts.get("no"), Some(&1));

        let slider = &stats[0].questions[1];
        let QuestionSummary::Numeric { mean, .. } = &slider.summary else {
            panic!("expected numeric summary");
        };
        // per-participant means: W1 (40+60)/2 = 50, W2 = 80
        assert_eq!(*mean, Some(65.0));
    }

    #[test]
    fn test_line_without_worker_code_is_skipped() {
        let ndjson = r#"{"data": [{"stimulus": "video_0.mp4", "trial_index": 0}]}"#;
        let mut extractor = LogExtractor::new(StudyConfig::default(), catalogue());
        extractor.process_str(ndjson).unwrap();
        assert!(extractor.finish().is_empty());
    }

    #[test]
    fn test_malformed_line_aborts_batch() {
        let ndjson = "{\"data\": []}\n{broken";
        let mut extractor = LogExtractor::new(StudyConfig::default(), catalogue());
        assert!(extractor.process_str(ndjson).is_err());
    }

    #[test]
    fn test_finish_filtered_drops_rows() {
        let ndjson = concat!(
            r#"{"data": [{"worker_code": "W1"}]}"#,
            "\n",
            r#"{"data": [{"worker_code": "W2"}]}"#,
        );
        let mut extractor = LogExtractor::new(StudyConfig::default(), catalogue());
        extractor.process_str(ndjson).unwrap();
        let table = extractor.finish_filtered(|row| row.worker_code == "W2");
        assert_eq!(table.len(), 1);
        assert!(table.get("W1").is_none());
    }
}
