use super::*;

/// How a candidate with missing generated documents is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationPolicy {
    /// Missing documents fail the candidate and every PDF page must carry
    /// at least one assertion.
    Strict,
    /// Assertions without documents are excluded from scoring.
    Forced,
}

impl EvaluationPolicy {
    pub fn from_force(force: bool) -> Self {
        if force { Self::Forced } else { Self::Strict }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Forced => "forced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BootstrapConfig {
    pub samples: usize,
    pub confidence_level: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchSettings {
    pub data_path: PathBuf,
    pub input_dir: PathBuf,
    pub policy: EvaluationPolicy,
    pub candidate: Option<String>,
    pub md_folder: Option<PathBuf>,
    pub skip_baseline: bool,
    pub skip_math: bool,
    pub bootstrap: BootstrapConfig,
    pub permutation_iterations: usize,
    pub comparisons: Vec<ComparisonPair>,
    pub sample: Option<usize>,
    pub seed: u64,
    pub workers: usize,
    #[serde(skip)]
    pub output_failed: Option<PathBuf>,
    #[serde(skip)]
    pub report_path: Option<PathBuf>,
}

impl BenchSettings {
    pub fn from_args(args: BenchArgs) -> Result<Self> {
        if !(args.confidence_level > 0.0 && args.confidence_level < 1.0) {
            bail!(
                "--confidence-level must be between 0 and 1, got {}",
                args.confidence_level
            );
        }

        let workers = args.workers.unwrap_or_else(default_workers);
        if workers == 0 {
            bail!("--workers must be at least 1");
        }

        let comparisons = args
            .comparisons
            .iter()
            .map(|raw| parse_comparison(raw))
            .collect::<Result<Vec<_>>>()?;

        let input_dir = if args.dir.is_file() {
            args.dir
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            args.dir.clone()
        };

        Ok(Self {
            data_path: args.dir,
            input_dir,
            policy: EvaluationPolicy::from_force(args.force),
            candidate: args.candidate,
            md_folder: args.md_folder,
            skip_baseline: args.skip_baseline,
            skip_math: args.skip_math,
            bootstrap: BootstrapConfig {
                samples: args.bootstrap_samples as usize,
                confidence_level: args.confidence_level,
            },
            permutation_iterations: args.permutation_iterations as usize,
            comparisons,
            sample: args.sample,
            seed: args.seed,
            workers,
            output_failed: args.output_failed,
            report_path: args.report_path,
        })
    }

    pub fn pdf_root(&self) -> PathBuf {
        self.input_dir.join("pdfs")
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
        .min(MAX_WORKERS)
}
