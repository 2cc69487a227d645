use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::cli::BenchArgs;
use crate::model::{Assertion, AssertionKind, DatasetEntry};
use crate::stats::{
    ConfidenceInterval, PermutationOutcome, bootstrap_ci, mean_of_group_means, permutation_test,
};
use crate::util::{now_utc_string, read_jsonl_numbered, sha256_file, write_json_pretty, write_jsonl};
use crate::verify::verify;

/// Extensions recognised as generated documents.
const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "html"];
const MAX_WORKERS: usize = 64;
const FAILURE_EXCERPT_CHARS: usize = 240;

mod compare;
mod dataset;
mod discovery;
mod evaluate;
mod pages;
mod repeats;
mod report;
mod run;
mod settings;
mod summary;
#[cfg(test)]
mod tests;

pub use run::run;

use compare::*;
use dataset::*;
use discovery::*;
use evaluate::*;
use pages::*;
use repeats::*;
use report::*;
use settings::*;
use summary::*;
