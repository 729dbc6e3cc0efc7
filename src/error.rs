//! Error types for trialscope

use thiserror::Error;

/// Errors that can occur during extraction and aggregation
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse line {line}: {detail}")]
    ParseLine { line: usize, detail: String },

    #[error("Malformed responses literal: {0}")]
    MalformedResponses(#[from] crate::literal::LiteralError),

    #[error("Unsupported question type `{kind}` for question `{question}`")]
    UnsupportedQuestionKind { question: String, kind: String },

    #[error("Unknown stimulus kind `{0}`")]
    UnknownStimulusKind(String),

    #[error("Missing required column `{column}` in {path}")]
    MissingColumn { column: String, path: String },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    #[error("Moderation request failed for worker {worker_id}: {detail}")]
    ModerationError { worker_id: u64, detail: String },

    #[error("Missing secret: {0}")]
    MissingSecret(String),
}

impl ExtractError {
    /// Wrap a filesystem error with the path that triggered it
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }
}
