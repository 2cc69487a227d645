use super::*;

pub const ALL_REPEATS_PASSED: &str = "All repeats passed";

/// Result of checking one assertion against every repeat of its page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RepeatStatus {
    Scored {
        pass_ratio: f64,
        passes: usize,
        evaluated: usize,
        /// First failing explanation, or [`ALL_REPEATS_PASSED`].
        explanation: String,
    },
    Excluded {
        reason: String,
    },
    /// No document exists and the policy makes that fatal.
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatEvaluation {
    pub status: RepeatStatus,
    pub warnings: Vec<String>,
}

impl RepeatEvaluation {
    /// Strict majority; a tie fails.
    pub fn final_passed(&self) -> bool {
        matches!(self.status, RepeatStatus::Scored { pass_ratio, .. } if pass_ratio > 0.5)
    }
}

pub fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read generated document {}", path.display()))
}

/// Majority vote over `documents`. Unreadable repeats become warnings and
/// do not count towards the denominator.
pub fn evaluate_repeats<R>(
    assertion: &Assertion,
    documents: &[PathBuf],
    policy: EvaluationPolicy,
    read: R,
) -> RepeatEvaluation
where
    R: Fn(&Path) -> Result<String>,
{
    if documents.is_empty() {
        let status = match policy {
            EvaluationPolicy::Strict => RepeatStatus::Missing,
            EvaluationPolicy::Forced => RepeatStatus::Excluded {
                reason: "no generated documents".to_string(),
            },
        };
        return RepeatEvaluation {
            status,
            warnings: Vec::new(),
        };
    }

    let mut warnings = Vec::new();
    let mut passes = 0;
    let mut evaluated = 0;
    let mut first_failure: Option<String> = None;

    for path in documents {
        let text = match read(path) {
            Ok(text) => text,
            Err(error) => {
                warnings.push(format!("assertion {}: {error:#}", assertion.id));
                continue;
            }
        };

        evaluated += 1;
        let outcome = verify(assertion, &text);
        if outcome.passed {
            passes += 1;
        } else if first_failure.is_none() {
            first_failure = Some(outcome.explanation);
        }
    }

    let status = if evaluated == 0 {
        RepeatStatus::Excluded {
            reason: format!(
                "none of {} generated document(s) could be read",
                documents.len()
            ),
        }
    } else {
        RepeatStatus::Scored {
            pass_ratio: passes as f64 / evaluated as f64,
            passes,
            evaluated,
            explanation: first_failure.unwrap_or_else(|| ALL_REPEATS_PASSED.to_string()),
        }
    };

    RepeatEvaluation { status, warnings }
}
