use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "extraction-bench",
    version,
    about = "Score document-extraction pipelines against ground-truth assertions"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Bench(BenchArgs),
    UpdateGt(UpdateGtArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    /// Data directory with *.jsonl datasets, a pdfs/ folder and one folder
    /// per candidate; may also name a single dataset file.
    #[arg(long, default_value = "bench_data")]
    pub dir: PathBuf,

    /// Exclude assertions whose generated documents are missing instead of
    /// failing the candidate.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[arg(long)]
    pub candidate: Option<String>,

    #[arg(long, default_value_t = false)]
    pub skip_baseline: bool,

    #[arg(long, default_value_t = false)]
    pub skip_math: bool,

    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..))]
    pub bootstrap_samples: u32,

    #[arg(long, default_value_t = 0.95)]
    pub confidence_level: f64,

    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u32).range(1..))]
    pub permutation_iterations: u32,

    /// Candidate pair to test for significance, as `first:second`.
    #[arg(long = "compare")]
    pub comparisons: Vec<String>,

    /// Evaluate a random sample of this many assertions.
    #[arg(long)]
    pub sample: Option<usize>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write assertions that failed for every candidate to this JSONL file.
    #[arg(long)]
    pub output_failed: Option<PathBuf>,

    /// Read generated documents from this folder instead of candidate folders.
    #[arg(long)]
    pub md_folder: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateGtArgs {
    /// Dataset file; a bare name is resolved inside --default-dir and
    /// gets a .jsonl extension when it has none.
    pub gt_file: PathBuf,

    #[arg(long, default_value = "bench_data")]
    pub default_dir: PathBuf,

    #[arg(long, num_args = 2, value_names = ["FIELD", "VALUE"])]
    pub remove_where: Option<Vec<String>>,

    #[arg(long, num_args = 3, value_names = ["FIELD", "OLD_VALUE", "NEW_VALUE"])]
    pub update_field: Option<Vec<String>>,

    /// Save changes; without this flag the command only previews them.
    #[arg(long, default_value_t = false)]
    pub no_dry_run: bool,
}
