//! Event record parser
//!
//! Projects one raw trial event into zero or more typed facts, updating the
//! per-line running state (current stimulus, last elapsed time) as it goes.
//! Facts are consumed immediately by the trial accumulator; nothing here is
//! persisted.

use crate::config::StudyConfig;
use crate::literal;
use crate::metadata::{strip_stimulus_path, StimulusKind};
use crate::schema::RawEvent;
use crate::types::FieldValue;
use tracing::debug;

/// Typed projection of one raw event
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedFact {
    /// Allow-listed meta field (worker code, browser, window size)
    Meta { key: String, value: FieldValue },
    /// A non-instruction stimulus became current
    StimulusOnset {
        name: String,
        kind: StimulusKind,
        trial: i64,
    },
    /// Trial duration in milliseconds, from the onset's elapsed-time delta
    Duration { stimulus: String, millis: f64 },
    /// Keypresses recorded while the stimulus was active
    KeypressBatch {
        stimulus: String,
        keys: Vec<String>,
        rts: Vec<f64>,
    },
    /// Post-stimulus questionnaire answers
    QuestionnaireAnswer {
        stimulus: String,
        kind: StimulusKind,
        questions: Vec<String>,
        answers: Vec<FieldValue>,
    },
    /// Immediate single answer on an inline-response trial
    InlineAnswer { stimulus: String, answer: FieldValue },
    /// Browser events attributed to the current trial
    InteractionLog {
        stimulus: String,
        events: Vec<String>,
        times: Vec<f64>,
    },
    /// End-of-study questionnaire answers (no stimulus active)
    FinalQuestionnaire {
        questions: Vec<String>,
        answers: Vec<FieldValue>,
    },
    /// Presentation order of the final questions
    QuestionOrder { order: Vec<i64> },
}

/// Stimulus currently on screen within one session line
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentStimulus {
    pub name: String,
    pub kind: StimulusKind,
    pub trial: i64,
}

/// Running state while walking one session line's events
#[derive(Debug, Clone, Default)]
pub struct LineState {
    pub current: Option<CurrentStimulus>,
    /// Last elapsed-time value seen in this line, 0 until one is seen
    pub last_elapsed: f64,
}

/// Parser for one study's event streams
pub struct EventParser<'a> {
    config: &'a StudyConfig,
}

impl<'a> EventParser<'a> {
    pub fn new(config: &'a StudyConfig) -> Self {
        EventParser { config }
    }

    /// Project one event into facts.
    ///
    /// `prev_elapsed` is the participant's last elapsed time from any prior
    /// session line; it is the duration reference when no elapsed value has
    /// been seen in this line yet.
    pub fn parse_event(
        &self,
        ev: &RawEvent,
        state: &mut LineState,
        prev_elapsed: Option<f64>,
    ) -> Vec<ParsedFact> {
        let mut facts = Vec::new();

        for key in &self.config.meta_keys {
            if let Some(value) = ev.extra.get(key) {
                facts.push(ParsedFact::Meta {
                    key: key.clone(),
                    value: FieldValue::from_json(value),
                });
            }
        }

        if let Some(stim) = &ev.stimulus {
            if let Some(raw) = stim.first() {
                let name = strip_stimulus_path(raw);
                if let Some(kind) = self.config.classify_stimulus(&name) {
                    debug!(stimulus = %name, "found stimulus");
                    let trial = ev.trial_index.unwrap_or(-1);
                    state.current = Some(CurrentStimulus {
                        name: name.clone(),
                        kind,
                        trial,
                    });
                    facts.push(ParsedFact::StimulusOnset {
                        name: name.clone(),
                        kind,
                        trial,
                    });

                    if let Some(elapsed) = ev.time_elapsed {
                        let reference = if state.last_elapsed > 0.0 {
                            Some(state.last_elapsed)
                        } else {
                            prev_elapsed
                        };
                        if let Some(reference) = reference {
                            let millis = elapsed - reference;
                            if millis > 0.0 {
                                facts.push(ParsedFact::Duration {
                                    stimulus: name.clone(),
                                    millis,
                                });
                            }
                        }
                    }

                    if self.config.inline_responses && stim.is_single() {
                        if let Some(answer) = &ev.response {
                            facts.push(ParsedFact::InlineAnswer {
                                stimulus: name,
                                answer: FieldValue::from_json(answer),
                            });
                        }
                    }
                }
            }
        }

        if let Some(rts) = &ev.rts {
            if let Some(current) = &state.current {
                debug!(points = rts.len(), "found keypress data");
                facts.push(ParsedFact::KeypressBatch {
                    stimulus: current.name.clone(),
                    keys: rts.iter().map(|p| p.key.clone()).collect(),
                    rts: rts.iter().map(|p| p.rt).collect(),
                });
            }
        }

        if let Some(responses) = &ev.responses {
            match literal::extract_map(responses) {
                Ok(pairs) => {
                    let (questions, answers): (Vec<String>, Vec<FieldValue>) =
                        pairs.into_iter().unzip();
                    match &state.current {
                        Some(current) => facts.push(ParsedFact::QuestionnaireAnswer {
                            stimulus: current.name.clone(),
                            kind: current.kind,
                            questions,
                            answers,
                        }),
                        None => facts.push(ParsedFact::FinalQuestionnaire { questions, answers }),
                    }
                }
                Err(e) => {
                    debug!(error = %e, "skipping unparseable responses field");
                }
            }
        }

        if let Some(interactions) = &ev.interactions {
            if let Some(current) = &state.current {
                let mut events = Vec::new();
                let mut times = Vec::new();
                for sample in interactions {
                    if sample.trial == Some(current.trial) {
                        events.push(sample.event.clone());
                        times.push(sample.time);
                    }
                }
                facts.push(ParsedFact::InteractionLog {
                    stimulus: current.name.clone(),
                    events,
                    times,
                });
            }
        }

        if state.current.is_none() {
            if let Some(order) = &ev.question_order {
                match literal::extract_int_list(order) {
                    Ok(order) => facts.push(ParsedFact::QuestionOrder { order }),
                    Err(e) => {
                        debug!(error = %e, "skipping unparseable question order");
                    }
                }
            }
        }

        if let Some(elapsed) = ev.time_elapsed {
            state.last_elapsed = elapsed;
        }

        facts
    }
}
