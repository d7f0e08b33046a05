use std::path::PathBuf;

use clap::Parser;
use soundpixel_rs::{build_index, IndexerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "create_index")]
#[command(about = "Build shuffled train/val index CSVs pairing audio clips with extracted video frames")]
struct Args {
    /// Root for extracted audio files.
    #[arg(long = "root_audio", default_value = "./data/audio")]
    root_audio: PathBuf,
    /// Root for extracted video frames.
    #[arg(long = "root_frame", default_value = "./data/frames")]
    root_frame: PathBuf,
    /// FPS of the extracted video frames.
    #[arg(long = "fps", default_value_t = 8)]
    fps: u32,
    /// Output directory for the index files.
    #[arg(long = "path_output", default_value = "./data")]
    path_output: PathBuf,
    /// Fraction of entries assigned to the training split, in (0, 1).
    #[arg(long = "trainset_ratio", default_value_t = 0.8)]
    trainset_ratio: f64,
    /// JSON manifest of video identifiers per category.
    #[arg(long = "json_file", default_value = "./data/video_info.json")]
    json_file: PathBuf,
    /// Number of videos to sample from each category.
    #[arg(long = "num_samples", default_value_t = 2)]
    num_samples: usize,
    /// Fixed RNG seed for reproducible sampling and shuffling.
    #[arg(long = "seed")]
    seed: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    println!("Resolved root_audio: {}", absolute(&args.root_audio));
    println!("Resolved root_frame: {}", absolute(&args.root_frame));

    let cfg = IndexerConfig {
        root_audio: args.root_audio,
        root_frame: args.root_frame,
        fps: args.fps,
        path_output: args.path_output,
        trainset_ratio: args.trainset_ratio,
        manifest_path: args.json_file,
        num_samples: args.num_samples,
        seed: args.seed,
    };

    match build_index(&cfg) {
        Ok(summary) => {
            println!("{} audio/frames pairs found.", summary.n_accepted);
            println!(
                "{} items saved to {}.",
                summary.n_train,
                summary.train_csv.display()
            );
            println!(
                "{} items saved to {}.",
                summary.n_val,
                summary.val_csv.display()
            );
            println!("Done!");
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn absolute(path: &std::path::Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
