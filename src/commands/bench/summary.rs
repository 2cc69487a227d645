use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    Scored,
    /// Terminal: zero score and empty breakdowns.
    Failed,
}

/// One `(assertion, passed, explanation)` entry of `results_by_page`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub assertion: Assertion,
    pub passed: bool,
    pub explanation: String,
    pub pass_ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupTally {
    pub passed: usize,
    pub total: usize,
}

impl GroupTally {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionScore {
    pub id: String,
    pub group: String,
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub pass_ratio: f64,
    pub final_passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub name: String,
    pub status: CandidateStatus,
    /// Mean of per-group pass rates over evaluated assertions.
    pub overall_score: f64,
    pub evaluated_count: usize,
    pub excluded_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub failures: Vec<String>,
    /// Raw pass ratios per assertion type.
    pub type_breakdown: BTreeMap<String, Vec<f64>>,
    pub group_breakdown: BTreeMap<String, GroupTally>,
    /// Evaluated assertions in dataset order.
    pub scores: Vec<AssertionScore>,
    #[serde(skip)]
    pub results_by_page: BTreeMap<String, BTreeMap<u32, Vec<PageResult>>>,
}

impl CandidateSummary {
    pub fn failed(name: &str, errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CandidateStatus::Failed,
            overall_score: 0.0,
            evaluated_count: 0,
            excluded_count: 0,
            errors,
            warnings,
            failures: Vec::new(),
            type_breakdown: BTreeMap::new(),
            group_breakdown: BTreeMap::new(),
            scores: Vec::new(),
            results_by_page: BTreeMap::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == CandidateStatus::Failed
    }

    /// Binary `final_passed` scores ordered by group, with the group sizes
    /// as bootstrap splits.
    pub fn grouped_binary_scores(&self) -> (Vec<f64>, Vec<usize>) {
        let mut by_group: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for score in &self.scores {
            by_group
                .entry(score.group.as_str())
                .or_default()
                .push(if score.final_passed { 1.0 } else { 0.0 });
        }

        let splits = by_group.values().map(Vec::len).collect();
        let scores = by_group.into_values().flatten().collect();
        (scores, splits)
    }
}

/// Merges per-assertion evaluations on the owning thread.
pub struct SummaryBuilder {
    summary: CandidateSummary,
}

impl SummaryBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            summary: CandidateSummary {
                status: CandidateStatus::Scored,
                ..CandidateSummary::failed(name, Vec::new(), Vec::new())
            },
        }
    }

    pub fn record(&mut self, entry: &DatasetEntry, evaluation: RepeatEvaluation) {
        let summary = &mut self.summary;
        let assertion = &entry.assertion;

        for warning in &evaluation.warnings {
            warn!(candidate = %summary.name, warning = %warning, "could not read generated document");
        }
        summary.warnings.extend(evaluation.warnings);

        let (passed, explanation, pass_ratio) = match evaluation.status {
            RepeatStatus::Missing => {
                summary
                    .errors
                    .push(missing_page_message(&summary.name, &assertion.pdf, assertion.page));
                return;
            }
            RepeatStatus::Excluded { reason } => {
                summary.excluded_count += 1;
                (false, reason, None)
            }
            RepeatStatus::Scored {
                pass_ratio,
                passes,
                evaluated,
                explanation,
            } => {
                let final_passed = pass_ratio > 0.5;
                summary.evaluated_count += 1;

                if pass_ratio < 1.0 {
                    summary.failures.push(format!(
                        "Test {} on {} page {} average pass ratio: {:.3} ({}/{} repeats passed). Ex: {}",
                        assertion.id,
                        document_stem(&assertion.pdf),
                        assertion.page,
                        pass_ratio,
                        passes,
                        evaluated,
                        excerpt_for_failure(&explanation)
                    ));
                }

                summary
                    .type_breakdown
                    .entry(assertion.type_name().to_string())
                    .or_default()
                    .push(pass_ratio);

                let tally = summary.group_breakdown.entry(entry.group.clone()).or_default();
                tally.total += 1;
                if final_passed {
                    tally.passed += 1;
                }

                summary.scores.push(AssertionScore {
                    id: assertion.id.clone(),
                    group: entry.group.clone(),
                    type_name: assertion.type_name(),
                    pass_ratio,
                    final_passed,
                });

                (final_passed, explanation, Some(pass_ratio))
            }
        };

        summary
            .results_by_page
            .entry(assertion.pdf.clone())
            .or_default()
            .entry(assertion.page)
            .or_default()
            .push(PageResult {
                assertion: assertion.clone(),
                passed,
                explanation,
                pass_ratio,
            });
    }

    pub fn finish(self) -> CandidateSummary {
        let mut summary = self.summary;

        if !summary.errors.is_empty() {
            return CandidateSummary::failed(&summary.name, summary.errors, summary.warnings);
        }

        let (scores, splits) = summary.grouped_binary_scores();
        summary.overall_score = mean_of_group_means(&scores, &splits);
        summary
    }
}

pub fn missing_pdf_message(candidate: &str, pdf: &str) -> String {
    let stem = document_stem(pdf);
    format!(
        "Candidate '{candidate}' is missing generated documents for {pdf} \
         (expected files matching {stem}_pg{{page}}_repeat*.<ext> or {stem}.<ext>)"
    )
}

pub fn missing_page_message(candidate: &str, pdf: &str, page: u32) -> String {
    let stem = document_stem(pdf);
    format!(
        "Candidate '{candidate}' is missing generated documents for {pdf} page {page} \
         (expected files matching {stem}_pg{page}_repeat*.<ext> or {stem}.<ext>)"
    )
}

fn excerpt_for_failure(explanation: &str) -> String {
    if explanation.chars().count() <= FAILURE_EXCERPT_CHARS {
        return explanation.to_string();
    }
    let mut clipped: String = explanation.chars().take(FAILURE_EXCERPT_CHARS).collect();
    clipped.push_str("...");
    clipped
}
