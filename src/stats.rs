//! Stratified bootstrap intervals and paired permutation tests over
//! per-assertion scores.

use anyhow::{Result, bail};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

impl ConfidenceInterval {
    pub fn half_width(&self) -> f64 {
        (self.high - self.low) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PermutationOutcome {
    pub observed_difference: f64,
    pub p_value: f64,
    pub iterations: usize,
}

fn iteration_seed(seed: u64, iteration: usize) -> u64 {
    seed ^ (iteration as u64)
        .wrapping_add(1)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Linear interpolation between closest ranks; `sorted` must be ascending.
fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let position = fraction.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of group means, the same formula as the candidate's primary score.
pub fn mean_of_group_means(scores: &[f64], splits: &[usize]) -> f64 {
    let mut offset = 0;
    let mut group_means = Vec::with_capacity(splits.len());
    for &size in splits {
        if size > 0 {
            group_means.push(mean(&scores[offset..offset + size]));
        }
        offset += size;
    }
    mean(&group_means)
}

fn group_slices<'a>(scores: &'a [f64], splits: Option<&[usize]>) -> Result<Vec<&'a [f64]>> {
    let Some(splits) = splits else {
        return Ok(vec![scores]);
    };

    let total: usize = splits.iter().sum();
    if total != scores.len() {
        bail!(
            "bootstrap splits cover {} scores but {} were provided",
            total,
            scores.len()
        );
    }

    let mut groups = Vec::with_capacity(splits.len());
    let mut offset = 0;
    for &size in splits {
        if size > 0 {
            groups.push(&scores[offset..offset + size]);
        }
        offset += size;
    }
    Ok(groups)
}

/// Percentile bootstrap interval. With `splits`, resampling happens within
/// each consecutive group of scores and the estimate is the mean of group
/// means; without, all scores form one group.
pub fn bootstrap_ci(
    scores: &[f64],
    splits: Option<&[usize]>,
    n_bootstrap: usize,
    ci_level: f64,
    seed: u64,
) -> Result<ConfidenceInterval> {
    if scores.is_empty() {
        return Ok(ConfidenceInterval {
            low: 0.0,
            high: 0.0,
        });
    }
    if n_bootstrap == 0 {
        bail!("bootstrap requires at least one iteration");
    }
    if !(ci_level > 0.0 && ci_level < 1.0) {
        bail!("confidence level must be in (0, 1), got {ci_level}");
    }

    let groups = group_slices(scores, splits)?;

    let mut estimates: Vec<f64> = (0..n_bootstrap)
        .into_par_iter()
        .map(|iteration| {
            let mut rng = StdRng::seed_from_u64(iteration_seed(seed, iteration));
            let group_means: Vec<f64> = groups
                .iter()
                .map(|group| {
                    let total: f64 = (0..group.len())
                        .map(|_| group[rng.random_range(0..group.len())])
                        .sum();
                    total / group.len() as f64
                })
                .collect();
            mean(&group_means)
        })
        .collect();

    estimates.sort_by(|left, right| left.total_cmp(right));
    let alpha = 1.0 - ci_level;
    Ok(ConfidenceInterval {
        low: percentile(&estimates, alpha / 2.0),
        high: percentile(&estimates, 1.0 - alpha / 2.0),
    })
}

/// Two-sided paired permutation test on the difference of means.
pub fn permutation_test(
    first: &[f64],
    second: &[f64],
    iterations: usize,
    seed: u64,
) -> Result<PermutationOutcome> {
    if first.len() != second.len() {
        bail!(
            "permutation test needs paired scores, got {} and {}",
            first.len(),
            second.len()
        );
    }
    if iterations == 0 {
        bail!("permutation test requires at least one iteration");
    }
    if first.is_empty() {
        return Ok(PermutationOutcome {
            observed_difference: 0.0,
            p_value: 1.0,
            iterations,
        });
    }

    let n = first.len() as f64;
    let deltas: Vec<f64> = first.iter().zip(second).map(|(a, b)| a - b).collect();
    let observed = deltas.iter().sum::<f64>() / n;
    let threshold = observed.abs() - 1e-12;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut extreme = 0_usize;
    for _ in 0..iterations {
        let permuted: f64 = deltas
            .iter()
            .map(|delta| if rng.random_bool(0.5) { -delta } else { *delta })
            .sum::<f64>()
            / n;
        if permuted.abs() >= threshold {
            extreme += 1;
        }
    }

    Ok(PermutationOutcome {
        observed_difference: observed,
        p_value: extreme as f64 / iterations as f64,
        iterations,
    })
}
