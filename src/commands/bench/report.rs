use super::*;

const REPORT_VERSION: u32 = 1;
const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    #[serde(flatten)]
    pub summary: CandidateSummary,
    pub confidence_interval: ConfidenceInterval,
}

/// Everything a bench run produced, before it is printed or saved.
#[derive(Debug, Clone)]
pub struct BenchOutcome {
    pub dataset: Dataset,
    pub pdf_count: usize,
    pub candidates: Vec<CandidateReport>,
    pub comparisons: Vec<ComparisonResult>,
}

#[derive(Debug, Serialize)]
pub struct BenchReport<'a> {
    pub report_version: u32,
    pub generated_at: String,
    pub settings: &'a BenchSettings,
    pub dataset_files: &'a [DatasetFile],
    pub assertion_count: usize,
    pub pdf_count: usize,
    pub candidates: &'a [CandidateReport],
    pub comparisons: &'a [ComparisonResult],
}

impl<'a> BenchReport<'a> {
    pub fn new(settings: &'a BenchSettings, outcome: &'a BenchOutcome) -> Self {
        Self {
            report_version: REPORT_VERSION,
            generated_at: now_utc_string(),
            settings,
            dataset_files: &outcome.dataset.files,
            assertion_count: outcome.dataset.entries.len(),
            pdf_count: outcome.pdf_count,
            candidates: &outcome.candidates,
            comparisons: &outcome.comparisons,
        }
    }
}

fn percent(value: f64) -> f64 {
    value * 100.0
}

pub fn write_text_summary<W: Write>(
    output: &mut W,
    outcome: &BenchOutcome,
    settings: &BenchSettings,
) -> Result<()> {
    let ci_label = format!("{:.0}% CI", percent(settings.bootstrap.confidence_level));

    for report in &outcome.candidates {
        let summary = &report.summary;
        writeln!(output)?;
        writeln!(output, "Candidate: {}", summary.name)?;

        if summary.is_failed() {
            for error in &summary.errors {
                writeln!(output, "  [ERROR] {error}")?;
            }
            continue;
        }

        for failure in &summary.failures {
            writeln!(output, "  [FAIL] {failure}")?;
        }
        if !summary.warnings.is_empty() {
            writeln!(
                output,
                "  [WARN] {} generated document(s) could not be read",
                summary.warnings.len()
            )?;
        }

        let ci = report.confidence_interval;
        write!(
            output,
            "  Average Score: {:.1}% ({ci_label}: [{:.1}%, {:.1}%]) over {} tests",
            percent(summary.overall_score),
            percent(ci.low),
            percent(ci.high),
            summary.evaluated_count
        )?;
        if summary.excluded_count > 0 {
            write!(output, " ({} excluded)", summary.excluded_count)?;
        }
        writeln!(output, ".")?;
    }

    writeln!(output)?;
    writeln!(output, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(output, "Final Summary with {ci_label}:")?;

    for report in &outcome.candidates {
        let summary = &report.summary;
        if summary.is_failed() {
            writeln!(output, "{:20} : Average Score: FAILED (errors)", summary.name)?;
            writeln!(output)?;
            continue;
        }

        writeln!(
            output,
            "{:20} : Average Score: {:.1}% \u{00B1} {:.1}% (average of per-group scores)",
            summary.name,
            percent(summary.overall_score),
            percent(report.confidence_interval.half_width())
        )?;

        for (type_name, scores) in &summary.type_breakdown {
            let average = if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            };
            writeln!(
                output,
                "    {:8}: {:.1}% average pass rate over {} tests",
                type_name,
                percent(average),
                scores.len()
            )?;
        }

        writeln!(output)?;
        writeln!(output, "    Results by dataset file:")?;
        for (group, tally) in &summary.group_breakdown {
            writeln!(
                output,
                "        {:30}: {:.1}% ({}/{} tests)",
                group,
                percent(tally.pass_rate()),
                tally.passed,
                tally.total
            )?;
        }
        writeln!(output)?;
    }

    if !outcome.comparisons.is_empty() {
        writeln!(output, "Pairwise permutation tests:")?;
        for comparison in &outcome.comparisons {
            writeln!(
                output,
                "    {} vs {}: difference {:+.1}% over {} paired tests, p = {:.4}",
                comparison.first,
                comparison.second,
                percent(comparison.outcome.observed_difference),
                comparison.paired_count,
                comparison.outcome.p_value
            )?;
        }
        writeln!(output)?;
    }

    Ok(())
}

/// Entries that at least one scored candidate evaluated and none passed.
pub fn failed_everywhere<'a>(
    entries: &'a [DatasetEntry],
    candidates: &[CandidateReport],
) -> Vec<&'a DatasetEntry> {
    let verdicts: Vec<HashMap<&str, bool>> = candidates
        .iter()
        .filter(|report| !report.summary.is_failed())
        .map(|report| {
            report
                .summary
                .scores
                .iter()
                .map(|score| (score.id.as_str(), score.final_passed))
                .collect()
        })
        .collect();

    entries
        .iter()
        .filter(|entry| {
            let results: Vec<bool> = verdicts
                .iter()
                .filter_map(|by_id| by_id.get(entry.assertion.id.as_str()).copied())
                .collect();
            !results.is_empty() && results.iter().all(|passed| !passed)
        })
        .collect()
}

/// Relative export paths resolve against the data directory.
pub fn export_failed(settings: &BenchSettings, outcome: &BenchOutcome, path: &Path) -> Result<()> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        settings.input_dir.join(path)
    };

    let failed = failed_everywhere(&outcome.dataset.entries, &outcome.candidates);
    if failed.is_empty() {
        info!("no assertions failed across all candidates; no output file created");
        return Ok(());
    }

    // Raw records keep curation fields such as `checked` for update-gt.
    let records: Vec<&Value> = failed.iter().map(|entry| &entry.record).collect();
    write_jsonl(&path, &records)?;
    info!(
        path = %path.display(),
        assertions = failed.len(),
        "wrote assertions that failed across all candidates"
    );
    Ok(())
}
