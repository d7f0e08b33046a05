use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// One row of an index CSV: an audio clip paired with the directory of its
/// extracted video frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexRecord {
    pub audio_path: PathBuf,
    pub frame_dir: PathBuf,
    /// Number of JPEG frames in `frame_dir` at index-build time.
    pub frame_count: usize,
}

/// Category manifest: `{"videos": {"<category>": ["<video_id>", ...]}}`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct VideoManifest {
    pub videos: HashMap<String, Vec<String>>,
}

impl VideoManifest {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io("read video manifest", e))?;
        serde_json::from_str(&data).map_err(|e| PipelineError::json("parse video manifest", e))
    }
}

/// Per-split result of an index build.
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub n_accepted: usize,
    pub n_train: usize,
    pub n_val: usize,
    pub train_csv: PathBuf,
    pub val_csv: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatus {
    Good,
    MissingAudio,
    MissingFrameDir,
    CountMismatch { expected: usize, found: usize },
    MalformedRow { message: String },
}

/// Diagnostic for one index row. Rows are never fatal individually; the
/// validator reports and moves on.
#[derive(Debug, Clone)]
pub struct RowDiagnostic {
    /// 1-based CSV line number.
    pub line: usize,
    pub audio_path: PathBuf,
    pub frame_dir: PathBuf,
    pub status: RowStatus,
}

impl RowDiagnostic {
    pub fn is_good(&self) -> bool {
        self.status == RowStatus::Good
    }
}

impl fmt::Display for RowDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            RowStatus::Good => write!(f, "line {}: GOOD", self.line),
            RowStatus::MissingAudio => write!(
                f,
                "line {}: missing audio file: {}",
                self.line,
                self.audio_path.display()
            ),
            RowStatus::MissingFrameDir => write!(
                f,
                "line {}: missing frame directory: {}",
                self.line,
                self.frame_dir.display()
            ),
            RowStatus::CountMismatch { expected, found } => write!(
                f,
                "line {}: frame count mismatch in {}: expected {}, found {}",
                self.line,
                self.frame_dir.display(),
                expected,
                found
            ),
            RowStatus::MalformedRow { message } => {
                write!(f, "line {}: malformed row: {}", self.line, message)
            }
        }
    }
}
