use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::index::count_jpeg_files;
use crate::types::{RowDiagnostic, RowStatus};

/// Checks every row of an index CSV against the filesystem.
///
/// Returns one diagnostic per row; a bad row never aborts the scan. Fatal
/// only when the CSV itself cannot be opened.
pub fn validate_index(csv_path: &Path) -> Result<Vec<RowDiagnostic>, PipelineError> {
    tracing::info!(path = %csv_path.display(), "validating index file");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(csv_path)
        .map_err(|e| PipelineError::csv("open index csv", e))?;

    let mut diagnostics = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let line = i + 1;
        let diagnostic = match row {
            Ok(record) => check_row(line, &record),
            Err(e) => RowDiagnostic {
                line,
                audio_path: PathBuf::new(),
                frame_dir: PathBuf::new(),
                status: RowStatus::MalformedRow {
                    message: e.to_string(),
                },
            },
        };
        match &diagnostic.status {
            RowStatus::Good => tracing::debug!(line, "row ok"),
            status => tracing::warn!(line, ?status, "index row problem"),
        }
        diagnostics.push(diagnostic);
    }
    Ok(diagnostics)
}

fn check_row(line: usize, record: &csv::StringRecord) -> RowDiagnostic {
    let (audio, frames, count) = match (record.get(0), record.get(1), record.get(2)) {
        (Some(a), Some(f), Some(c)) if record.len() == 3 => (a, f, c),
        _ => {
            return RowDiagnostic {
                line,
                audio_path: PathBuf::new(),
                frame_dir: PathBuf::new(),
                status: RowStatus::MalformedRow {
                    message: format!("expected 3 fields, got {}", record.len()),
                },
            }
        }
    };

    let audio_path = absolutize(Path::new(audio));
    let frame_dir = absolutize(Path::new(frames));

    let expected: usize = match count.trim().parse() {
        Ok(n) => n,
        Err(_) => {
            return RowDiagnostic {
                line,
                audio_path,
                frame_dir,
                status: RowStatus::MalformedRow {
                    message: format!("frame count is not an integer: {count:?}"),
                },
            }
        }
    };

    let status = if !audio_path.exists() {
        RowStatus::MissingAudio
    } else if !frame_dir.is_dir() {
        RowStatus::MissingFrameDir
    } else {
        let found = count_jpeg_files(&frame_dir);
        if found != expected {
            RowStatus::CountMismatch { expected, found }
        } else {
            RowStatus::Good
        }
    };

    RowDiagnostic {
        line,
        audio_path,
        frame_dir,
        status,
    }
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
