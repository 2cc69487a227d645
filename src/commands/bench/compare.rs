use super::*;

/// An ordered `first:second` pair named with `--compare`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonPair {
    pub first: String,
    pub second: String,
}

pub fn parse_comparison(raw: &str) -> Result<ComparisonPair> {
    let Some((first, second)) = raw.split_once(':') else {
        bail!("comparison '{raw}' must be written as first:second");
    };
    let (first, second) = (first.trim(), second.trim());
    if first.is_empty() || second.is_empty() {
        bail!("comparison '{raw}' names an empty candidate");
    }
    if first == second {
        bail!("comparison '{raw}' compares a candidate with itself");
    }

    Ok(ComparisonPair {
        first: first.to_string(),
        second: second.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub first: String,
    pub second: String,
    pub paired_count: usize,
    pub first_mean: f64,
    pub second_mean: f64,
    #[serde(flatten)]
    pub outcome: PermutationOutcome,
}

/// Pass ratios of assertions both candidates evaluated, aligned by id.
pub fn paired_scores(first: &CandidateSummary, second: &CandidateSummary) -> (Vec<f64>, Vec<f64>) {
    let second_by_id: HashMap<&str, f64> = second
        .scores
        .iter()
        .map(|score| (score.id.as_str(), score.pass_ratio))
        .collect();

    first
        .scores
        .iter()
        .filter_map(|score| {
            second_by_id
                .get(score.id.as_str())
                .map(|other| (score.pass_ratio, *other))
        })
        .unzip()
}

pub fn compare_candidates(
    first: &CandidateSummary,
    second: &CandidateSummary,
    iterations: usize,
    seed: u64,
) -> Result<ComparisonResult> {
    let (first_scores, second_scores) = paired_scores(first, second);
    let outcome = permutation_test(&first_scores, &second_scores, iterations, seed)
        .with_context(|| format!("permutation test {} vs {} failed", first.name, second.name))?;

    let mean = |values: &[f64]| {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    Ok(ComparisonResult {
        first: first.name.clone(),
        second: second.name.clone(),
        paired_count: first_scores.len(),
        first_mean: mean(&first_scores),
        second_mean: mean(&second_scores),
        outcome,
    })
}

/// Runs every requested pair; pairs naming an unknown or failed candidate
/// are skipped with a warning.
pub fn run_comparisons(
    pairs: &[ComparisonPair],
    candidates: &[CandidateReport],
    iterations: usize,
    seed: u64,
) -> Result<Vec<ComparisonResult>> {
    let lookup = |name: &str| {
        candidates
            .iter()
            .map(|report| &report.summary)
            .find(|summary| summary.name == name)
    };

    let mut results = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let (Some(first), Some(second)) = (lookup(&pair.first), lookup(&pair.second)) else {
            warn!(first = %pair.first, second = %pair.second, "comparison names an unknown candidate; skipping");
            continue;
        };
        if first.is_failed() || second.is_failed() {
            warn!(first = %pair.first, second = %pair.second, "comparison involves a failed candidate; skipping");
            continue;
        }

        let result = compare_candidates(first, second, iterations, seed)?;
        info!(
            first = %result.first,
            second = %result.second,
            paired = result.paired_count,
            p_value = result.outcome.p_value,
            "permutation test complete"
        );
        results.push(result);
    }

    Ok(results)
}
