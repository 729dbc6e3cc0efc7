//! Trial accumulator
//!
//! Folds the parsed facts of one session line into a flat per-participant
//! record. Keys follow the grammar `<context>-<kind>`, where the context is
//! the stimulus name (or `end` for facts outside any stimulus) and the kind
//! is one of `dur`, `key`, `rt`, `qs`, `as`, `event`, `time`, `qo`, `resp`,
//! or a catalogue-matched question short name.
//!
//! Folding rules:
//! - list-valued facts extend an existing key instead of overwriting it
//! - scalar facts are set once; duplicates within the line are dropped
//! - meta facts overwrite (latest value wins)
//!
//! Repetition suffixes (`-0`, `-1`, ...) are not applied here; the table
//! builder assigns them when records are merged across session lines.

use crate::config::StudyConfig;
use crate::metadata::StimulusCatalogue;
use crate::parser::ParsedFact;
use crate::types::{FieldValue, ParticipantRecord, WORKER_CODE};
use std::collections::BTreeMap;

/// Context prefix for facts recorded outside any stimulus
pub const END_CONTEXT: &str = "end";

/// Accumulates one session line's facts into a participant record
pub struct TrialAccumulator<'a> {
    config: &'a StudyConfig,
    catalogue: &'a StimulusCatalogue,
    worker_code: Option<String>,
    fields: BTreeMap<String, FieldValue>,
}

impl<'a> TrialAccumulator<'a> {
    pub fn new(config: &'a StudyConfig, catalogue: &'a StimulusCatalogue) -> Self {
        TrialAccumulator {
            config,
            catalogue,
            worker_code: None,
            fields: BTreeMap::new(),
        }
    }

    /// Fold one fact into the accumulating record
    pub fn fold(&mut self, fact: ParsedFact) {
        match fact {
            ParsedFact::Meta { key, value } => {
                if key == WORKER_CODE {
                    if let Some(code) = value.as_str() {
                        self.worker_code = Some(code.to_string());
                    }
                } else {
                    self.fields.insert(key, value);
                }
            }
            // onsets only move the parser's stimulus context
            ParsedFact::StimulusOnset { .. } => {}
            ParsedFact::Duration { stimulus, millis } => {
                self.set_scalar(key_for(&stimulus, "dur"), FieldValue::Number(millis));
            }
            ParsedFact::KeypressBatch {
                stimulus,
                keys,
                rts,
            } => {
                self.extend_list(
                    key_for(&stimulus, "key"),
                    keys.into_iter().map(FieldValue::Text).collect(),
                );
                self.extend_list(
                    key_for(&stimulus, "rt"),
                    rts.into_iter().map(FieldValue::Number).collect(),
                );
            }
            ParsedFact::QuestionnaireAnswer {
                stimulus,
                kind,
                questions,
                answers,
            } => {
                for (question, answer) in questions.iter().zip(answers.iter()) {
                    if *question == self.config.injection_question {
                        continue;
                    }
                    let known = self
                        .catalogue
                        .questions_for(kind)
                        .iter()
                        .any(|q| q.short_name == *question);
                    if known {
                        self.set_scalar(key_for(&stimulus, question), answer.clone());
                    }
                }
                self.extend_list(
                    key_for(&stimulus, "qs"),
                    questions.into_iter().map(FieldValue::Text).collect(),
                );
                self.extend_list(key_for(&stimulus, "as"), answers);
            }
            ParsedFact::InlineAnswer { stimulus, answer } => {
                self.set_scalar(key_for(&stimulus, "resp"), answer);
            }
            ParsedFact::InteractionLog {
                stimulus,
                events,
                times,
            } => {
                self.extend_list(
                    key_for(&stimulus, "event"),
                    events.into_iter().map(FieldValue::Text).collect(),
                );
                self.extend_list(
                    key_for(&stimulus, "time"),
                    times.into_iter().map(FieldValue::Number).collect(),
                );
            }
            ParsedFact::FinalQuestionnaire { questions, answers } => {
                for (question, answer) in questions.iter().zip(answers.iter()) {
                    let known = self
                        .catalogue
                        .final_questions
                        .iter()
                        .any(|q| q.short_name == *question);
                    if known {
                        self.set_scalar(key_for(END_CONTEXT, question), answer.clone());
                    }
                }
                self.extend_list(
                    key_for(END_CONTEXT, "qs"),
                    questions.into_iter().map(FieldValue::Text).collect(),
                );
                self.extend_list(key_for(END_CONTEXT, "as"), answers);
            }
            ParsedFact::QuestionOrder { order } => {
                self.extend_list(
                    key_for(END_CONTEXT, "qo"),
                    order.into_iter().map(FieldValue::Integer).collect(),
                );
            }
        }
    }

    /// Finalize the record. A line that never produced a worker code cannot
    /// be attributed and yields nothing.
    pub fn finish(self) -> Option<ParticipantRecord> {
        let worker_code = self.worker_code?;
        Some(ParticipantRecord {
            worker_code,
            fields: self.fields,
        })
    }

    fn set_scalar(&mut self, key: String, value: FieldValue) {
        self.fields.entry(key).or_insert(value);
    }

    fn extend_list(&mut self, key: String, items: Vec<FieldValue>) {
        self.fields
            .entry(key)
            .or_insert_with(|| FieldValue::List(Vec::new()))
            .extend_with(FieldValue::List(items));
    }
}

fn key_for(context: &str, kind: &str) -> String {
    format!("{context}-{kind}")
}
