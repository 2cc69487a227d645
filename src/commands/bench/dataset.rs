use super::*;

/// Group assigned to injected default baseline assertions.
pub const BASELINE_GROUP: &str = "baseline";

static BACKUP_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\d{8}_\d{6}\.jsonl$").expect("valid backup file regex"));

#[derive(Debug, Clone, Serialize)]
pub struct DatasetFile {
    pub path: PathBuf,
    pub group: String,
    pub sha256: String,
    pub assertion_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub files: Vec<DatasetFile>,
    pub entries: Vec<DatasetEntry>,
}

impl Dataset {
    /// Appends `{pdf}_baseline` on page 1 for every PDF lacking a baseline.
    pub fn add_default_baselines(&mut self, pdfs: &[String]) -> usize {
        let covered: HashSet<&str> = self
            .entries
            .iter()
            .filter(|entry| matches!(entry.assertion.kind, AssertionKind::Baseline))
            .map(|entry| entry.assertion.pdf.as_str())
            .collect();
        let ids: HashSet<&str> = self
            .entries
            .iter()
            .map(|entry| entry.assertion.id.as_str())
            .collect();

        let mut injected = Vec::new();
        for pdf in pdfs {
            if covered.contains(pdf.as_str()) {
                continue;
            }
            let assertion = Assertion::baseline(pdf, 1);
            if ids.contains(assertion.id.as_str()) {
                warn!(id = %assertion.id, "assertion id already in use; not injecting default baseline");
                continue;
            }
            let record = json!({
                "id": assertion.id,
                "pdf": assertion.pdf,
                "page": assertion.page,
                "type": assertion.type_name(),
            });
            injected.push(DatasetEntry {
                assertion,
                group: BASELINE_GROUP.to_string(),
                record,
            });
        }

        let count = injected.len();
        self.entries.extend(injected);
        count
    }

    pub fn remove_baselines(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !matches!(entry.assertion.kind, AssertionKind::Baseline));
        before - self.entries.len()
    }

    /// Fails on the first page of a PDF that has no assertion at all.
    pub fn check_page_coverage(
        &self,
        pdf_root: &Path,
        pdfs: &[String],
        counter: &dyn PageCounter,
    ) -> Result<()> {
        let covered: HashSet<(&str, u32)> = self
            .entries
            .iter()
            .map(|entry| (entry.assertion.pdf.as_str(), entry.assertion.page))
            .collect();

        for pdf in pdfs {
            let page_count = counter.page_count(&pdf_root.join(pdf))?;
            for page in 1..=page_count {
                if !covered.contains(&(pdf.as_str(), page)) {
                    bail!("no dataset entry found for pdf {pdf} page {page}");
                }
            }
        }

        Ok(())
    }

    /// Keeps a seeded random sample of `size` entries, preserving load order.
    pub fn sample(&mut self, size: usize, seed: u64) {
        if size == 0 || size >= self.entries.len() {
            info!(
                sample = size,
                total = self.entries.len(),
                "sample size covers every assertion; using all of them"
            );
            return;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..self.entries.len()).collect();
        indices.shuffle(&mut rng);
        let keep: HashSet<usize> = indices.into_iter().take(size).collect();

        info!(sample = size, total = self.entries.len(), "sampling assertions");
        let mut index = 0;
        self.entries.retain(|_| {
            let kept = keep.contains(&index);
            index += 1;
            kept
        });
    }
}

/// `*.jsonl` directly under `data_path` (or `data_path` itself when it is a
/// file), skipping timestamped backups.
pub fn discover_dataset_files(data_path: &Path, skip_math: bool) -> Result<Vec<PathBuf>> {
    let mut files = if data_path.is_file() {
        vec![data_path.to_path_buf()]
    } else {
        let mut found = Vec::new();
        let entries = fs::read_dir(data_path)
            .with_context(|| format!("failed to read data directory {}", data_path.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| {
                format!("failed to read entry in data directory {}", data_path.display())
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !name.ends_with(".jsonl") || BACKUP_FILE_RE.is_match(name) {
                continue;
            }
            found.push(path);
        }
        found.sort();
        found
    };

    if skip_math {
        files.retain(|path| !group_name(path).to_lowercase().contains("math"));
    }

    Ok(files)
}

pub fn group_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Loads and validates every file; any malformed record or duplicate id is fatal.
pub fn load_dataset(files: &[PathBuf]) -> Result<Dataset> {
    let mut dataset = Dataset::default();
    let mut first_seen: HashMap<String, (String, usize)> = HashMap::new();

    for path in files {
        let group = group_name(path);
        let records: Vec<(usize, Value)> = read_jsonl_numbered(path)?;

        let mut entries = Vec::with_capacity(records.len());
        for (line, record) in records {
            let assertion: Assertion = serde_json::from_value(record.clone())
                .with_context(|| format!("invalid assertion on line {} of {}", line, path.display()))?;
            assertion
                .validate()
                .with_context(|| format!("invalid assertion on line {} of {}", line, path.display()))?;

            if let Some((other_group, other_line)) =
                first_seen.insert(assertion.id.clone(), (group.clone(), line))
            {
                bail!(
                    "duplicate assertion id '{}' on line {} of {} (first defined on line {} of {})",
                    assertion.id,
                    line,
                    path.display(),
                    other_line,
                    other_group
                );
            }

            entries.push(DatasetEntry {
                assertion,
                group: group.clone(),
                record,
            });
        }

        debug!(path = %path.display(), assertions = entries.len(), "loaded dataset file");
        dataset.files.push(DatasetFile {
            path: path.clone(),
            group: group.clone(),
            sha256: sha256_file(path)?,
            assertion_count: entries.len(),
        });
        dataset.entries.extend(entries);
    }

    Ok(dataset)
}

/// Every `*.pdf` under `pdf_root`, as sorted `/`-separated relative paths.
pub fn discover_pdfs(pdf_root: &Path) -> Result<Vec<String>> {
    let mut pdfs: Vec<String> = list_relative_files(pdf_root)?
        .into_iter()
        .filter(|relative| {
            Path::new(relative)
                .extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}
