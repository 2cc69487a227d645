//! Pass/fail checks of one assertion against the text of one generated document.

use std::any::Any;
use std::panic;
use std::sync::LazyLock;

use anyhow::{Result, bail};
use regex::Regex;
use serde::Serialize;

use crate::model::{Assertion, AssertionKind};

mod baseline;
mod fuzzy;
mod math;
mod normalize;
mod table;
mod text;

use baseline::*;
use fuzzy::*;
use math::*;
use normalize::*;
use table::*;
use text::*;

/// Minimum `1 - edits/len` for present, absent and order anchors.
pub const PRESENCE_SIMILARITY_MIN: f64 = 0.9;
/// Minimum normalized edit similarity for a table cell to match.
pub const TABLE_CELL_SIMILARITY_MIN: f64 = 0.9;
pub const BASELINE_MIN_ALNUM_CHARS: usize = 1;
pub const BASELINE_MAX_REPEATS: usize = 30;
pub const BASELINE_MAX_NGRAM: usize = 10;
const EXCERPT_MAX_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub passed: bool,
    pub explanation: String,
}

impl Outcome {
    pub fn pass(explanation: String) -> Self {
        Self {
            passed: true,
            explanation,
        }
    }

    pub fn fail(explanation: String) -> Self {
        Self {
            passed: false,
            explanation,
        }
    }
}

/// Never fails: matcher errors and panics become failing outcomes.
pub fn verify(assertion: &Assertion, document: &str) -> Outcome {
    match panic::catch_unwind(|| dispatch(&assertion.kind, document)) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(error)) => Outcome::fail(format!("error while matching: {error:#}")),
        Err(payload) => Outcome::fail(format!("matcher panicked: {}", panic_message(&*payload))),
    }
}

fn dispatch(kind: &AssertionKind, document: &str) -> Result<Outcome> {
    match kind {
        AssertionKind::Baseline => Ok(verify_baseline(document)),
        AssertionKind::Present { text } => {
            let normalized: Vec<char> = normalize_text(document).chars().collect();
            verify_presence(text, &normalized, true)
        }
        AssertionKind::Absent { text } => {
            let normalized: Vec<char> = normalize_text(document).chars().collect();
            verify_presence(text, &normalized, false)
        }
        AssertionKind::Order { before, after } => {
            let normalized: Vec<char> = normalize_text(document).chars().collect();
            verify_order(before, after, &normalized)
        }
        AssertionKind::Table {
            cell,
            up,
            down,
            left,
            right,
            top_heading,
            left_heading,
        } => {
            let relations = [
                (Relation::Up, up),
                (Relation::Down, down),
                (Relation::Left, left),
                (Relation::Right, right),
                (Relation::TopHeading, top_heading),
                (Relation::LeftHeading, left_heading),
            ]
            .into_iter()
            .filter_map(|(relation, expected)| expected.as_deref().map(|text| (relation, text)))
            .collect();

            let expectation = TableExpectation { cell, relations };
            verify_table(&expectation, document)
        }
        AssertionKind::Math { math } => verify_math(math, document),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
