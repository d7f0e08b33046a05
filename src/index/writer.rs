use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use walkdir::WalkDir;

use crate::config::IndexerConfig;
use crate::error::PipelineError;
use crate::index::count_jpeg_files;
use crate::types::{IndexRecord, IndexSummary, VideoManifest};

/// Recursively enumerates files with the given extension under `root`.
pub fn find_recursive(root: &Path, ext: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .collect()
}

/// Samples `min(num_samples, available)` video identifiers per category
/// without replacement. Categories are visited in sorted order so a seeded
/// run is reproducible.
pub fn sample_videos(
    manifest: &VideoManifest,
    num_samples: usize,
    rng: &mut impl Rng,
) -> Vec<String> {
    let mut categories: Vec<&String> = manifest.videos.keys().collect();
    categories.sort();

    let mut sampled = Vec::new();
    for category in categories {
        let pool = &manifest.videos[category];
        let take = num_samples.min(pool.len());
        sampled.extend(pool.choose_multiple(rng, take).cloned());
    }
    sampled
}

/// Builds the train/validation index CSVs.
///
/// Fatal on a missing or malformed manifest. A category with fewer videos
/// than requested contributes all of them. An entry is accepted iff its
/// frame directory holds strictly more than `fps * 20` JPEG files.
pub fn build_index(cfg: &IndexerConfig) -> Result<IndexSummary, PipelineError> {
    if !(cfg.trainset_ratio > 0.0 && cfg.trainset_ratio < 1.0) {
        return Err(PipelineError::invalid_input(format!(
            "trainset_ratio must be in (0, 1), got {}",
            cfg.trainset_ratio
        )));
    }

    let manifest = VideoManifest::load(&cfg.manifest_path)?;
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let audio_files = find_recursive(&cfg.root_audio, "mp3");
    tracing::info!(
        count = audio_files.len(),
        root = %cfg.root_audio.display(),
        "audio files discovered"
    );

    let min_count = cfg.min_frame_count();
    let mut records = Vec::new();
    for video_id in sample_videos(&manifest, cfg.num_samples, &mut rng) {
        let audio_path = cfg.root_audio.join(format!("{video_id}.mp3"));
        let frame_dir = cfg.root_frame.join(format!("{video_id}.mp4"));
        let frame_count = count_jpeg_files(&frame_dir);
        if frame_count > min_count {
            records.push(IndexRecord {
                audio_path,
                frame_dir,
                frame_count,
            });
        } else {
            tracing::debug!(
                %video_id,
                frame_count,
                min_count,
                "skipped: not enough frames"
            );
        }
    }
    tracing::info!(pairs = records.len(), "audio/frames pairs found");

    records.shuffle(&mut rng);
    let n_train = (records.len() as f64 * cfg.trainset_ratio) as usize;

    std::fs::create_dir_all(&cfg.path_output)
        .map_err(|e| PipelineError::io("create output directory", e))?;
    let train_csv = cfg.path_output.join("train.csv");
    let val_csv = cfg.path_output.join("val.csv");
    write_split(&train_csv, &records[..n_train])?;
    write_split(&val_csv, &records[n_train..])?;

    Ok(IndexSummary {
        n_accepted: records.len(),
        n_train,
        n_val: records.len() - n_train,
        train_csv,
        val_csv,
    })
}

fn write_split(path: &Path, records: &[IndexRecord]) -> Result<(), PipelineError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| PipelineError::csv("create index csv", e))?;
    for record in records {
        let count = record.frame_count.to_string();
        writer
            .write_record([
                record.audio_path.to_string_lossy().as_ref(),
                record.frame_dir.to_string_lossy().as_ref(),
                count.as_str(),
            ])
            .map_err(|e| PipelineError::csv("write index row", e))?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::io("flush index csv", e))?;
    tracing::info!(items = records.len(), path = %path.display(), "index split saved");
    Ok(())
}
