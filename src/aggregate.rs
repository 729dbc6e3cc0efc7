//! Stimulus aggregator
//!
//! Joins the participant table against the stimulus catalogue and computes
//! one summary per stimulus and question across all participants and
//! repetitions.
//!
//! Numeric questions use a two-level aggregation: each participant's
//! repetition values are collapsed to a participant mean first, and the
//! stimulus-level mean/std/median run over those per-participant values.
//! This is not the same as flattening all raw values and must stay that way.

use crate::config::StudyConfig;
use crate::metadata::{QuestionKind, StimulusCatalogue};
use crate::stats::{nan_mean, nan_median, nan_std};
use crate::types::{ParticipantTable, QuestionStats, QuestionSummary, StimulusStats};
use std::collections::BTreeMap;
use tracing::info;

/// Computes per-stimulus summary statistics
pub struct StimulusAggregator<'a> {
    config: &'a StudyConfig,
}

impl<'a> StimulusAggregator<'a> {
    pub fn new(config: &'a StudyConfig) -> Self {
        StimulusAggregator { config }
    }

    /// Aggregate every catalogue stimulus over the table
    pub fn aggregate(
        &self,
        table: &ParticipantTable,
        catalogue: &StimulusCatalogue,
    ) -> Vec<StimulusStats> {
        info!(
            stimuli = catalogue.stimuli.len(),
            participants = table.len(),
            "aggregating post-stimulus questions"
        );
        catalogue
            .stimuli
            .iter()
            .map(|stim| StimulusStats {
                stimulus: stim.name.clone(),
                questions: catalogue
                    .questions_for(stim.kind)
                    .iter()
                    .map(|q| self.aggregate_question(table, &stim.name, q))
                    .collect(),
            })
            .collect()
    }

    fn aggregate_question(
        &self,
        table: &ParticipantTable,
        stimulus: &str,
        question: &crate::metadata::QuestionSpec,
    ) -> QuestionStats {
        let mut raw_answers = Vec::new();
        let mut per_participant = Vec::new();

        for row in table.rows() {
            let mut values = Vec::new();
            for rep in 0..self.config.num_repeat {
                let column = format!("{stimulus}-{}-{rep}", question.short_name);
                let Some(value) = row.get(&column) else {
                    continue;
                };
                if value.is_null() {
                    continue;
                }
                raw_answers.push(value.clone());
                if question.kind == QuestionKind::Numeric {
                    if let Some(v) = value.as_f64() {
                        values.push(v);
                    }
                }
            }
            if let Some(mean) = nan_mean(&values) {
                per_participant.push(mean);
            }
        }

        let summary = match question.kind {
            QuestionKind::Numeric => QuestionSummary::Numeric {
                mean: nan_mean(&per_participant),
                std: nan_std(&per_participant),
                median: nan_median(&per_participant),
            },
            QuestionKind::Categorical => {
                let mut counts = BTreeMap::new();
                for option in &question.options {
                    let n = raw_answers
                        .iter()
                        .filter(|v| v.as_str() == Some(option.as_str()))
                        .count();
                    counts.insert(option.clone(), n);
                }
                QuestionSummary::Categorical { counts }
            }
        };

        QuestionStats {
            question: question.short_name.clone(),
            raw_answers,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{QuestionSpec, StimulusKind, StimulusMeta};
    use crate::types::{FieldValue, ParticipantRecord, ParticipantTable};

    fn catalogue_one_video(question: QuestionSpec) -> StimulusCatalogue {
        StimulusCatalogue {
            stimuli: vec![StimulusMeta {
                name: "video_0".to_string(),
                kind: StimulusKind::Video,
                extra: Default::default(),
            }],
            video_questions: vec![question],
            image_questions: Vec::new(),
            final_questions: Vec::new(),
        }
    }

    fn table_with(rows: Vec<(&str, Vec<(&str, FieldValue)>)>) -> ParticipantTable {
        let mut records = Vec::new();
        for (worker, pairs) in rows {
            let mut r = ParticipantRecord::new(worker);
            for (k, v) in pairs {
                r.fields.insert(k.to_string(), v);
            }
            records.push(r);
        }
        ParticipantTable::from_rows(records)
    }

    #[test]
    fn test_two_level_aggregation_order() {
        // per-participant repetition pairs: (2,4), (6,missing), (missing,missing)
        let table = table_with(vec![
            (
                "W1",
                vec![
                    ("video_0-slider-0", FieldValue::Number(2.0)),
                    ("video_0-slider-1", FieldValue::Number(4.0)),
                ],
            ),
            ("W2", vec![("video_0-slider-0", FieldValue::Number(6.0))]),
            ("W3", vec![]),
        ]);
        let config = StudyConfig::default();
        let catalogue = catalogue_one_video(QuestionSpec::numeric("slider"));
        let stats = StimulusAggregator::new(&config).aggregate(&table, &catalogue);

        let QuestionSummary::Numeric { mean, .. } = &stats[0].questions[0].summary else {
            panic!("expected numeric summary");
        };
        // mean of per-participant means [3, 6]
        assert_eq!(*mean, Some(4.5));
        // and not the flat mean of [2, 4, 6]
        let flat = (2.0 + 4.0 + 6.0) / 3.0;
        assert_ne!(*mean, Some(flat));
    }

    #[test]
    fn test_raw_answers_pool_in_participant_major_order() {
        let table = table_with(vec![
            (
                "W1",
                vec![
                    ("video_0-slider-0", FieldValue::Number(2.0)),
                    ("video_0-slider-1", FieldValue::Number(4.0)),
                ],
            ),
            ("W2", vec![("video_0-slider-0", FieldValue::Number(6.0))]),
        ]);
        let config = StudyConfig::default();
        let catalogue = catalogue_one_video(QuestionSpec::numeric("slider"));
        let stats = StimulusAggregator::new(&config).aggregate(&table, &catalogue);
        assert_eq!(
            stats[0].questions[0].raw_answers,
            vec![
                FieldValue::Number(2.0),
                FieldValue::Number(4.0),
                FieldValue::Number(6.0)
            ]
        );
    }

    #[test]
    fn test_categorical_counts_by_equality() {
        let table = table_with(vec![
            (
                "W1",
                vec![
                    ("video_0-q1-0", FieldValue::Text("yes".into())),
                    ("video_0-q1-1", FieldValue::Text("no".into())),
                ],
            ),
            ("W2", vec![("video_0-q1-0", FieldValue::Text("yes".into()))]),
        ]);
        let config = StudyConfig::default();
        let catalogue = catalogue_one_video(QuestionSpec::categorical("q1", ["yes", "no", "maybe"]));
        let stats = StimulusAggregator::new(&config).aggregate(&table, &catalogue);

        let QuestionSummary::Categorical { counts } = &stats[0].questions[0].summary else {
            panic!("expected categorical summary");
        };
        assert_eq!(counts.get("yes"), Some(&2));
        assert_eq!(counts.get("no"), Some(&1));
        assert_eq!(counts.get("maybe"), Some(&0));
    }

    #[test]
    fn test_unparseable_numeric_text_contributes_nothing() {
        let table = table_with(vec![(
            "W1",
            vec![
                ("video_0-slider-0", FieldValue::Text("n/a".into())),
                ("video_0-slider-1", FieldValue::Text("8".into())),
            ],
        )]);
        let config = StudyConfig::default();
        let catalogue = catalogue_one_video(QuestionSpec::numeric("slider"));
        let stats = StimulusAggregator::new(&config).aggregate(&table, &catalogue);
        let QuestionSummary::Numeric { mean, std, median } = &stats[0].questions[0].summary else {
            panic!("expected numeric summary");
        };
        assert_eq!(*mean, Some(8.0));
        assert_eq!(*std, Some(0.0));
        assert_eq!(*median, Some(8.0));
    }

    #[test]
    fn test_empty_table_yields_empty_summary() {
        let table = ParticipantTable::new();
        let config = StudyConfig::default();
        let catalogue = catalogue_one_video(QuestionSpec::numeric("slider"));
        let stats = StimulusAggregator::new(&config).aggregate(&table, &catalogue);
        let QuestionSummary::Numeric { mean, std, median } = &stats[0].questions[0].summary else {
            panic!("expected numeric summary");
        };
        assert_eq!((*mean, *std, *median), (None, None, None));
        assert!(stats[0].questions[0].raw_answers.is_empty());
    }
}
