use std::collections::HashSet;
use std::path::{Path, PathBuf};

use soundpixel_rs::{build_index, validate_index, IndexRecord, IndexerConfig, RowStatus};

struct Fixture {
    root: PathBuf,
}

impl Fixture {
    fn new(tag: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "soundpixel_rs_it_{tag}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("audio")).expect("audio root");
        std::fs::create_dir_all(root.join("frames")).expect("frame root");
        Self { root }
    }

    fn add_clip(&self, video_id: &str, frames: usize) {
        std::fs::write(self.root.join(format!("audio/{video_id}.mp3")), b"mp3")
            .expect("audio file");
        let dir = self.root.join(format!("frames/{video_id}.mp4"));
        std::fs::create_dir_all(&dir).expect("frame dir");
        for i in 0..frames {
            std::fs::write(dir.join(format!("{i:06}.jpg")), b"jpg").expect("frame file");
        }
    }

    fn write_manifest(&self, json: &str) -> PathBuf {
        let path = self.root.join("video_info.json");
        std::fs::write(&path, json).expect("manifest");
        path
    }

    fn config(&self, manifest_path: PathBuf) -> IndexerConfig {
        IndexerConfig {
            root_audio: self.root.join("audio"),
            root_frame: self.root.join("frames"),
            fps: 1,
            path_output: self.root.join("out"),
            trainset_ratio: 0.8,
            manifest_path,
            num_samples: 10,
            seed: Some(42),
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn read_records(csv_path: &Path) -> Vec<IndexRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(csv_path)
        .expect("open csv");
    reader
        .records()
        .map(|row| {
            let row = row.expect("row");
            IndexRecord {
                audio_path: PathBuf::from(row.get(0).unwrap()),
                frame_dir: PathBuf::from(row.get(1).unwrap()),
                frame_count: row.get(2).unwrap().parse().unwrap(),
            }
        })
        .collect()
}

#[test]
fn index_roundtrips_through_the_validator() {
    let fx = Fixture::new("roundtrip");
    for (id, frames) in [("v1", 25), ("v2", 30), ("v3", 40), ("v4", 22), ("v5", 27)] {
        fx.add_clip(id, frames);
    }
    // Too short at fps=1 (threshold 20): must be filtered out.
    fx.add_clip("short", 10);
    let manifest = fx.write_manifest(
        r#"{"videos": {"cat": ["v1", "v2", "v3"], "dog": ["v4", "v5", "short"]}}"#,
    );

    let summary = build_index(&fx.config(manifest)).expect("build index");
    assert_eq!(summary.n_accepted, 5);
    assert_eq!(summary.n_train, 4); // floor(0.8 * 5)
    assert_eq!(summary.n_val, 1);
    assert_eq!(summary.n_train + summary.n_val, summary.n_accepted);

    // Round-trip: reading both CSVs reproduces exactly the accepted triples.
    let mut written: Vec<IndexRecord> = read_records(&summary.train_csv);
    written.extend(read_records(&summary.val_csv));
    assert_eq!(written.len(), 5);
    let ids: HashSet<String> = written
        .iter()
        .map(|r| {
            r.frame_dir
                .file_stem()
                .unwrap()
                .to_string_lossy()
                .to_string()
        })
        .collect();
    assert_eq!(
        ids,
        HashSet::from(["v1".into(), "v2".into(), "v3".into(), "v4".into(), "v5".into()])
    );

    // Every row validates GOOD against the live tree.
    for csv_path in [&summary.train_csv, &summary.val_csv] {
        let diags = validate_index(csv_path).expect("validate");
        assert!(diags.iter().all(|d| d.is_good()), "diags: {diags:?}");
    }
}

#[test]
fn validator_flags_drift_after_the_fact() {
    let fx = Fixture::new("drift");
    fx.add_clip("v1", 25);
    fx.add_clip("v2", 30);
    let manifest = fx.write_manifest(r#"{"videos": {"cat": ["v1", "v2"]}}"#);

    let summary = build_index(&fx.config(manifest)).expect("build index");
    assert_eq!(summary.n_accepted, 2);

    // Delete one frame of v1 and the audio of v2, then re-validate.
    std::fs::remove_file(fx.root.join("frames/v1.mp4/000000.jpg")).unwrap();
    std::fs::remove_file(fx.root.join("audio/v2.mp3")).unwrap();

    let mut diags = validate_index(&summary.train_csv).expect("validate train");
    diags.extend(validate_index(&summary.val_csv).expect("validate val"));
    assert_eq!(diags.len(), 2);

    let statuses: Vec<&RowStatus> = diags.iter().map(|d| &d.status).collect();
    assert!(statuses.contains(&&RowStatus::MissingAudio));
    assert!(statuses.contains(&&RowStatus::CountMismatch {
        expected: 25,
        found: 24
    }));
}

#[test]
fn undersized_categories_truncate_silently() {
    let fx = Fixture::new("truncate");
    fx.add_clip("v1", 25);
    let manifest = fx.write_manifest(r#"{"videos": {"cat": ["v1"]}}"#);

    let mut cfg = fx.config(manifest);
    cfg.num_samples = 50;
    let summary = build_index(&cfg).expect("build index");
    assert_eq!(summary.n_accepted, 1);
}

#[test]
fn seeded_builds_are_reproducible() {
    let fx = Fixture::new("seeded");
    for (id, frames) in [("v1", 25), ("v2", 30), ("v3", 40), ("v4", 22)] {
        fx.add_clip(id, frames);
    }
    let manifest =
        fx.write_manifest(r#"{"videos": {"cat": ["v1", "v2"], "dog": ["v3", "v4"]}}"#);

    let cfg = fx.config(manifest);
    let first = build_index(&cfg).expect("first build");
    let first_train = read_records(&first.train_csv);
    let second = build_index(&cfg).expect("second build");
    let second_train = read_records(&second.train_csv);
    assert_eq!(first_train, second_train);
}
