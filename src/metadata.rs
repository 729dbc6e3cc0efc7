//! Stimulus catalogue
//!
//! The catalogue carries one entry per stimulus (video or image) plus the
//! post-stimulus question lists, loaded from the study's mapping and
//! question CSV files.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Kind of stimulus shown to the participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusKind {
    Video,
    Image,
}

impl StimulusKind {
    pub fn parse(s: &str) -> Result<Self, ExtractError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(StimulusKind::Video),
            "image" | "img" => Ok(StimulusKind::Image),
            other => Err(ExtractError::UnknownStimulusKind(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StimulusKind::Video => "video",
            StimulusKind::Image => "image",
        }
    }
}

/// Kind of answer a question takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Numeric,
    Categorical,
}

impl QuestionKind {
    /// Parse the catalogue's type tag. Anything outside the two supported
    /// kinds is an explicit error naming the question, not a silent skip.
    pub fn parse(tag: &str, question: &str) -> Result<Self, ExtractError> {
        match tag.trim() {
            "num" | "numeric" => Ok(QuestionKind::Numeric),
            "str" | "categorical" => Ok(QuestionKind::Categorical),
            other => Err(ExtractError::UnsupportedQuestionKind {
                question: question.to_string(),
                kind: other.to_string(),
            }),
        }
    }
}

/// One post-stimulus (or final) question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSpec {
    /// Short name used in response mappings and column names
    pub short_name: String,
    pub kind: QuestionKind,
    /// Fixed option set for categorical questions, empty for numeric ones
    #[serde(default)]
    pub options: Vec<String>,
}

impl QuestionSpec {
    pub fn numeric(short_name: impl Into<String>) -> Self {
        QuestionSpec {
            short_name: short_name.into(),
            kind: QuestionKind::Numeric,
            options: Vec::new(),
        }
    }

    pub fn categorical(
        short_name: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        QuestionSpec {
            short_name: short_name.into(),
            kind: QuestionKind::Categorical,
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

/// Catalogue entry for one stimulus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusMeta {
    /// Bare stimulus identifier (path and extension stripped)
    pub name: String,
    pub kind: StimulusKind,
    /// Remaining mapping-file columns, carried through to the output table
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// Full stimulus catalogue: stimuli plus per-kind question lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StimulusCatalogue {
    pub stimuli: Vec<StimulusMeta>,
    #[serde(default)]
    pub video_questions: Vec<QuestionSpec>,
    #[serde(default)]
    pub image_questions: Vec<QuestionSpec>,
    #[serde(default)]
    pub final_questions: Vec<QuestionSpec>,
}

impl StimulusCatalogue {
    /// Questions shown after stimuli of the given kind
    pub fn questions_for(&self, kind: StimulusKind) -> &[QuestionSpec] {
        match kind {
            StimulusKind::Video => &self.video_questions,
            StimulusKind::Image => &self.image_questions,
        }
    }

    /// Look up a post-stimulus question by short name, any kind
    pub fn find_question(&self, short_name: &str) -> Option<&QuestionSpec> {
        self.video_questions
            .iter()
            .chain(self.image_questions.iter())
            .find(|q| q.short_name == short_name)
    }

    /// Read the stimulus mapping CSV.
    ///
    /// Required columns: `stimulus` (path-like, stripped to a bare name) and
    /// `kind` (`video`/`image`). All other columns land in `extra`.
    pub fn read_mapping(&mut self, path: impl AsRef<Path>) -> Result<(), ExtractError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers = reader.headers()?.clone();
        let stim_idx = headers
            .iter()
            .position(|h| h == "stimulus")
            .ok_or_else(|| ExtractError::MissingColumn {
                column: "stimulus".to_string(),
                path: path.display().to_string(),
            })?;
        let kind_idx = headers
            .iter()
            .position(|h| h == "kind")
            .ok_or_else(|| ExtractError::MissingColumn {
                column: "kind".to_string(),
                path: path.display().to_string(),
            })?;
        for row in reader.records() {
            let row = row?;
            let name = strip_stimulus_path(row.get(stim_idx).unwrap_or_default());
            let kind = StimulusKind::parse(row.get(kind_idx).unwrap_or_default())?;
            let mut extra = BTreeMap::new();
            for (i, header) in headers.iter().enumerate() {
                if i == stim_idx || i == kind_idx {
                    continue;
                }
                if let Some(value) = row.get(i) {
                    extra.insert(header.to_string(), value.to_string());
                }
            }
            self.stimuli.push(StimulusMeta { name, kind, extra });
        }
        Ok(())
    }

    /// Read a question list CSV.
    ///
    /// Columns: `kind` (`video`/`image`/`final`), `short_name`, `type`
    /// (`num`/`str`), `options` (pipe-separated, categorical only).
    pub fn read_questions(&mut self, path: impl AsRef<Path>) -> Result<(), ExtractError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        for row in reader.deserialize() {
            let row: QuestionRow = row?;
            let kind = QuestionKind::parse(&row.r#type, &row.short_name)?;
            let options = row
                .options
                .as_deref()
                .unwrap_or_default()
                .split('|')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            let spec = QuestionSpec {
                short_name: row.short_name,
                kind,
                options,
            };
            match row.kind.as_str() {
                "video" => self.video_questions.push(spec),
                "image" | "img" => self.image_questions.push(spec),
                "final" | "end" => self.final_questions.push(spec),
                other => return Err(ExtractError::UnknownStimulusKind(other.to_string())),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct QuestionRow {
    kind: String,
    short_name: String,
    r#type: String,
    options: Option<String>,
}

/// Strip directory path and file extension from a stimulus reference,
/// e.g. `media/videos/video_0.mp4` becomes `video_0`.
pub fn strip_stimulus_path(raw: &str) -> String {
    let no_dir = raw.rsplit('/').next().unwrap_or(raw);
    match no_dir.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
        _ => no_dir.to_string(),
    }
}
