use super::*;

/// A pipeline under evaluation and the folder holding its documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub name: String,
    pub search_root: PathBuf,
}

/// Candidate folders below the data directory, or the single folder
/// given by `--md-folder`.
pub fn discover_candidates(settings: &BenchSettings) -> Result<Vec<Candidate>> {
    if let Some(md_folder) = &settings.md_folder {
        if !md_folder.is_dir() {
            bail!("markdown folder {} does not exist", md_folder.display());
        }
        let name = md_folder
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| md_folder.display().to_string());
        return Ok(vec![Candidate {
            name,
            search_root: md_folder.clone(),
        }]);
    }

    let entries = fs::read_dir(&settings.input_dir).with_context(|| {
        format!(
            "failed to read data directory {}",
            settings.input_dir.display()
        )
    })?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| {
            format!(
                "failed to read entry in data directory {}",
                settings.input_dir.display()
            )
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "pdfs" {
            continue;
        }
        if let Some(selected) = &settings.candidate {
            if &name != selected {
                continue;
            }
        }
        candidates.push(Candidate {
            name,
            search_root: path,
        });
    }

    candidates.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(candidates)
}

/// Discovering, then Evaluating on a pool of `workers` threads. An unreadable
/// candidate folder, or a missing document under [`EvaluationPolicy::Strict`],
/// ends the candidate as failed. Only setup errors are returned as `Err`.
pub fn evaluate_candidate(
    candidate: &Candidate,
    entries: &[DatasetEntry],
    pdfs: &[String],
    policy: EvaluationPolicy,
    workers: usize,
) -> Result<CandidateSummary> {
    info!(
        candidate = %candidate.name,
        assertions = entries.len(),
        policy = policy.as_str(),
        "evaluating candidate"
    );

    // An unreadable candidate folder fails that candidate, not the run.
    let index = match DocumentIndex::build(&candidate.search_root, pdfs) {
        Ok(index) => index,
        Err(err) => {
            let message = format!("{err:#}");
            warn!(candidate = %candidate.name, error = %message, "failed to index candidate documents");
            return Ok(CandidateSummary::failed(&candidate.name, vec![message], Vec::new()));
        }
    };

    if policy == EvaluationPolicy::Strict {
        let errors: Vec<String> = pdfs
            .iter()
            .filter(|pdf| index.documents(pdf).is_none_or(PdfDocuments::is_empty))
            .map(|pdf| missing_pdf_message(&candidate.name, pdf))
            .collect();
        if !errors.is_empty() {
            warn!(
                candidate = %candidate.name,
                missing_pdfs = errors.len(),
                "candidate is missing generated documents"
            );
            return Ok(CandidateSummary::failed(&candidate.name, errors, Vec::new()));
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("failed to build evaluation thread pool")?;

    let evaluations: Vec<RepeatEvaluation> = pool.install(|| {
        entries
            .par_iter()
            .map(|entry| {
                let documents =
                    index.documents_for(&entry.assertion.pdf, entry.assertion.page);
                evaluate_repeats(&entry.assertion, &documents, policy, read_document)
            })
            .collect()
    });

    let mut builder = SummaryBuilder::new(&candidate.name);
    for (entry, evaluation) in entries.iter().zip(evaluations) {
        builder.record(entry, evaluation);
    }
    let summary = builder.finish();

    if summary.is_failed() {
        warn!(
            candidate = %candidate.name,
            errors = summary.errors.len(),
            "candidate failed during evaluation"
        );
    } else {
        if summary.excluded_count > 0 {
            warn!(
                candidate = %candidate.name,
                excluded = summary.excluded_count,
                "assertions excluded from scoring"
            );
        }
        info!(
            candidate = %candidate.name,
            score = summary.overall_score,
            evaluated = summary.evaluated_count,
            failures = summary.failures.len(),
            "candidate evaluated"
        );
    }

    Ok(summary)
}
