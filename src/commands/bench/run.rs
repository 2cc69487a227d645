use super::*;

pub fn run(args: BenchArgs) -> Result<()> {
    let settings = BenchSettings::from_args(args)?;
    let outcome = execute(&settings, &PdfinfoPageCounter)?;

    let mut output = BufWriter::new(io::stdout().lock());
    write_text_summary(&mut output, &outcome, &settings)?;
    output.flush()?;

    if let Some(report_path) = &settings.report_path {
        write_json_pretty(report_path, &BenchReport::new(&settings, &outcome))?;
        info!(path = %report_path.display(), "wrote bench report");
    }

    if let Some(failed_path) = &settings.output_failed {
        export_failed(&settings, &outcome, failed_path)?;
    }

    Ok(())
}

/// Loads the dataset, evaluates every candidate in name order and runs the
/// requested statistics.
pub fn execute(settings: &BenchSettings, page_counter: &dyn PageCounter) -> Result<BenchOutcome> {
    let pdf_root = settings.pdf_root();
    if !pdf_root.is_dir() {
        bail!(
            "a pdfs folder must exist in the data directory {}",
            settings.input_dir.display()
        );
    }

    let pdfs = discover_pdfs(&pdf_root)?;
    if pdfs.is_empty() {
        bail!("no PDF files found in {}", pdf_root.display());
    }

    let files = discover_dataset_files(&settings.data_path, settings.skip_math)?;
    if settings.skip_math {
        info!("skipping math dataset files");
    }
    if files.is_empty() {
        bail!("no .jsonl files found in {}", settings.input_dir.display());
    }

    let mut dataset = load_dataset(&files)?;
    if dataset.entries.is_empty() {
        bail!("no valid assertions found in {} dataset file(s)", files.len());
    }
    info!(
        files = dataset.files.len(),
        assertions = dataset.entries.len(),
        pdfs = pdfs.len(),
        "loaded dataset"
    );

    let injected = dataset.add_default_baselines(&pdfs);
    debug!(injected, "added default baseline assertions");

    if settings.policy == EvaluationPolicy::Strict {
        dataset.check_page_coverage(&pdf_root, &pdfs, page_counter)?;
    }

    if settings.skip_baseline {
        let removed = dataset.remove_baselines();
        info!(removed, "skipping baseline assertions");
    }

    let candidates = discover_candidates(settings)?;

    if let Some(size) = settings.sample {
        dataset.sample(size, settings.seed);
    }

    if candidates.is_empty() {
        bail!(
            "no candidate pipeline folders found in {} (subdirectories besides 'pdfs')",
            settings.input_dir.display()
        );
    }

    let mut reports = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let summary = evaluate_candidate(
            candidate,
            &dataset.entries,
            &pdfs,
            settings.policy,
            settings.workers,
        )?;

        let (scores, splits) = summary.grouped_binary_scores();
        let confidence_interval = bootstrap_ci(
            &scores,
            Some(&splits),
            settings.bootstrap.samples,
            settings.bootstrap.confidence_level,
            settings.seed,
        )?;

        reports.push(CandidateReport {
            summary,
            confidence_interval,
        });
    }

    let comparisons = run_comparisons(
        &settings.comparisons,
        &reports,
        settings.permutation_iterations,
        settings.seed,
    )?;

    Ok(BenchOutcome {
        dataset,
        pdf_count: pdfs.len(),
        candidates: reports,
        comparisons,
    })
}
