//! Trialscope - Log-to-table extraction and aggregation for crowdsourced
//! experiment event streams
//!
//! Trialscope turns raw browser-study event logs into analysis-ready tables
//! through a deterministic pipeline: session-line parsing → typed event facts
//! → per-participant accumulation → cross-file table merge → per-stimulus
//! aggregation.
//!
//! ## Modules
//!
//! - **Extraction**: parse heterogeneous NDJSON event streams into one flat
//!   participant table with repetition-indexed columns
//! - **Aggregation**: join the table against the stimulus catalogue and
//!   compute per-stimulus summary statistics
//! - **Coding**: recode categorical answers to ordinals and derive composite
//!   scores
//! - **Moderation**: flag disqualified participants on the panel provider

pub mod accumulator;
pub mod aggregate;
pub mod coding;
pub mod config;
pub mod error;
pub mod export;
pub mod literal;
pub mod metadata;
pub mod panel;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod stats;
pub mod table;
pub mod types;

pub use config::{StimulusPrefix, StudyConfig};
pub use error::ExtractError;
pub use pipeline::{extract_files, LogExtractor};

// Schema exports
pub use schema::{RawEvent, SessionLine, SessionLineAdapter};

// Catalogue and output exports
pub use metadata::{QuestionKind, QuestionSpec, StimulusCatalogue, StimulusKind};
pub use types::{FieldValue, ParticipantRecord, ParticipantTable, StimulusStats};

/// Trialscope version embedded in snapshots and CLI output
pub const TRIALSCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name recorded alongside materialized outputs
pub const PRODUCER_NAME: &str = "trialscope";
