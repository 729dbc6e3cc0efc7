//! Raw session-line schema
//!
//! One NDJSON line of platform output is a session line: a `data` array of
//! heterogeneous trial events emitted by the browser runtime. Events are
//! discriminated by which optional fields they carry:
//! - meta events (worker code, browser identification, window size)
//! - stimulus onsets (`stimulus` + `trial_index` + `time_elapsed`)
//! - keypress batches (`rts`)
//! - questionnaire responses (`responses`, a string-encoded mapping)
//! - browser interaction logs (`interactions`)
//! - question order (`question_order`)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One line of raw platform output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLine {
    /// Ordered trial events for one sitting of one participant
    pub data: Vec<RawEvent>,
}

impl SessionLine {
    /// The participant key, taken from the first event that carries one.
    /// Every well-formed line has at least one.
    pub fn worker_code(&self) -> Option<&str> {
        self.data
            .iter()
            .find_map(|ev| ev.extra.get("worker_code"))
            .and_then(|v| v.as_str())
    }
}

/// One heterogeneous trial event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    /// Stimulus reference: a path-like string, or a list of them for
    /// multi-source presentations (first element wins)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stimulus: Option<StimulusField>,

    /// Position of this trial in the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_index: Option<i64>,

    /// Milliseconds elapsed since session start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_elapsed: Option<f64>,

    /// Keypress samples recorded during the current stimulus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rts: Option<Vec<KeypressSample>>,

    /// String-encoded answer mapping (post-stimulus or final questionnaire)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses: Option<String>,

    /// Immediate single answer attached to an inline-response trial
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,

    /// Browser events (focus, blur, fullscreen) with trial attribution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactions: Option<Vec<InteractionSample>>,

    /// String-encoded bracketed list of final-question indices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_order: Option<String>,

    /// Everything else, including the meta keys
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A `stimulus` field is either one reference or a list of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StimulusField {
    One(String),
    Many(Vec<String>),
}

impl StimulusField {
    /// First referenced stimulus (lists use their first element)
    pub fn first(&self) -> Option<&str> {
        match self {
            StimulusField::One(s) => Some(s),
            StimulusField::Many(items) => items.first().map(String::as_str),
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, StimulusField::One(_))
    }
}

/// One keypress with its reaction time in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypressSample {
    pub key: String,
    pub rt: f64,
}

/// One browser interaction event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSample {
    pub event: String,
    pub time: f64,
    /// Trial the event is attributed to
    #[serde(default)]
    pub trial: Option<i64>,
}
