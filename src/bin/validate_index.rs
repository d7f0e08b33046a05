use std::path::PathBuf;

use clap::Parser;
use soundpixel_rs::validate_index;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "validate_index")]
#[command(about = "Check index CSV rows against on-disk audio files and frame counts")]
struct Args {
    /// Index CSV files to validate.
    #[arg(value_name = "CSV")]
    index_files: Vec<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = Args::parse();
    if args.index_files.is_empty() {
        args.index_files = vec![PathBuf::from("data/train.csv"), PathBuf::from("data/val.csv")];
    }

    let mut exit_code = 0;
    for csv_path in &args.index_files {
        println!("Validating file: {}", csv_path.display());
        let diagnostics = match validate_index(csv_path) {
            Ok(diags) => diags,
            Err(err) => {
                eprintln!("error: {err}");
                exit_code = 1;
                continue;
            }
        };

        let mut bad = 0usize;
        for diag in &diagnostics {
            println!("{diag}");
            if !diag.is_good() {
                bad += 1;
            }
        }
        println!(
            "{}: {} rows, {} problems",
            csv_path.display(),
            diagnostics.len(),
            bad
        );
    }
    std::process::exit(exit_code);
}
