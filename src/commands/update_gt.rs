use std::collections::HashSet;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::cli::UpdateGtArgs;
use crate::model::Assertion;
use crate::util::{backup_stamp, read_jsonl, write_jsonl};

const PREVIEW_RECORDS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Edits {
    remove_where: Option<(String, String)>,
    update_field: Option<(String, String, String)>,
}

impl Edits {
    fn from_args(args: &UpdateGtArgs) -> Result<Self> {
        let remove_where = match args.remove_where.as_deref() {
            None => None,
            Some([field, value]) => Some((field.clone(), value.clone())),
            Some(_) => bail!("--remove-where takes FIELD VALUE"),
        };
        let update_field = match args.update_field.as_deref() {
            None => None,
            Some([field, old, new]) => Some((field.clone(), old.clone(), new.clone())),
            Some(_) => bail!("--update-field takes FIELD OLD_VALUE NEW_VALUE"),
        };

        Ok(Self {
            remove_where,
            update_field,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EditCounts {
    removed: usize,
    updated: usize,
}

pub fn run(args: UpdateGtArgs) -> Result<()> {
    let path = resolve_gt_path(&args.gt_file, &args.default_dir);
    if !path.is_file() {
        bail!("dataset file not found: {}", path.display());
    }

    let edits = Edits::from_args(&args)?;
    let records: Vec<Value> = read_jsonl(&path)?;
    info!(path = %path.display(), entries = records.len(), "loaded dataset file");

    let (records, counts) = apply_edits(records, &edits);
    if let Some((field, value)) = &edits.remove_where {
        info!(removed = counts.removed, field = %field, value = %value, "removed matching records");
    }
    if let Some((field, old, new)) = &edits.update_field {
        info!(updated = counts.updated, field = %field, old = %old, new = %new, "updated field");
    }

    let assertions = validate_records(&records)
        .with_context(|| format!("edited dataset {} is no longer valid", path.display()))?;
    info!(entries = records.len(), "edited dataset is valid");

    if !args.no_dry_run {
        let mut output = BufWriter::new(io::stdout().lock());
        writeln!(output, "Dry run: {} is unchanged.", path.display())?;
        writeln!(output, "Sample of updated data:")?;
        for assertion in assertions.iter().take(PREVIEW_RECORDS) {
            let fields: Vec<String> = assertion
                .describe()
                .into_iter()
                .map(|(label, value)| format!("{label}={value}"))
                .collect();
            writeln!(output, "  {}", fields.join(" "))?;
        }
        writeln!(output, "Run again with --no-dry-run to save changes.")?;
        output.flush()?;
        return Ok(());
    }

    let backup_path = backup_file(&path, Utc::now())?;
    info!(path = %backup_path.display(), "backed up original dataset");

    write_jsonl(&path, &records)?;
    info!(path = %path.display(), entries = records.len(), "saved updated dataset");

    Ok(())
}

/// Bare names resolve inside `default_dir`; a missing extension becomes `.jsonl`.
fn resolve_gt_path(gt_file: &Path, default_dir: &Path) -> PathBuf {
    let has_directory = gt_file
        .parent()
        .is_some_and(|parent| !parent.as_os_str().is_empty());
    let mut path = if has_directory {
        gt_file.to_path_buf()
    } else {
        default_dir.join(gt_file)
    };

    if path.extension().is_none() {
        path.set_extension("jsonl");
    }
    path
}

/// Field value as compared on the command line: strings verbatim, other
/// JSON values in their JSON text form.
fn field_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn field_matches(record: &Value, field: &str, expected: &str) -> bool {
    record
        .get(field)
        .is_some_and(|value| field_text(value) == expected)
}

fn apply_edits(records: Vec<Value>, edits: &Edits) -> (Vec<Value>, EditCounts) {
    let mut counts = EditCounts::default();
    let mut records = records;

    if let Some((field, value)) = &edits.remove_where {
        let before = records.len();
        records.retain(|record| !field_matches(record, field, value));
        counts.removed = before - records.len();
    }

    if let Some((field, old, new)) = &edits.update_field {
        for record in &mut records {
            if !field_matches(record, field, old) {
                continue;
            }
            let Some(current) = record.get_mut(field) else {
                continue;
            };
            // Non-string fields keep their JSON type when the new value parses.
            *current = match current {
                Value::String(_) => Value::String(new.clone()),
                _ => serde_json::from_str(new).unwrap_or_else(|_| Value::String(new.clone())),
            };
            counts.updated += 1;
        }
    }

    (records, counts)
}

fn validate_records(records: &[Value]) -> Result<Vec<Assertion>> {
    let mut ids = HashSet::new();
    let mut assertions = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let assertion: Assertion = serde_json::from_value(record.clone())
            .with_context(|| format!("record {} does not match the assertion schema", index + 1))?;
        assertion
            .validate()
            .with_context(|| format!("record {} is invalid", index + 1))?;
        if !ids.insert(assertion.id.clone()) {
            bail!("record {} repeats assertion id '{}'", index + 1, assertion.id);
        }
        assertions.push(assertion);
    }

    Ok(assertions)
}

/// Copies `NAME.jsonl` to `NAME_YYYYMMDD_HHMMSS.jsonl` next to it.
fn backup_file(path: &Path, ts: DateTime<Utc>) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .with_context(|| format!("dataset path has no file name: {}", path.display()))?;
    let mut backup_name = format!("{stem}_{}", backup_stamp(ts));
    if let Some(extension) = path.extension() {
        backup_name.push('.');
        backup_name.push_str(&extension.to_string_lossy());
    }

    let backup_path = path.with_file_name(backup_name);
    fs::copy(path, &backup_path).with_context(|| {
        format!(
            "failed to back up {} to {}",
            path.display(),
            backup_path.display()
        )
    })?;

    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn records() -> Vec<Value> {
        vec![
            json!({"id": "a", "pdf": "doc.pdf", "page": 1, "type": "present", "text": "alpha", "checked": "verified"}),
            json!({"id": "b", "pdf": "doc.pdf", "page": 2, "type": "baseline"}),
            json!({"id": "c", "pdf": "doc.pdf", "page": 2, "type": "absent", "text": "footer"}),
        ]
    }

    fn args(gt_file: &Path, default_dir: &Path) -> UpdateGtArgs {
        UpdateGtArgs {
            gt_file: gt_file.to_path_buf(),
            default_dir: default_dir.to_path_buf(),
            remove_where: None,
            update_field: None,
            no_dry_run: false,
        }
    }

    #[test]
    fn bare_names_resolve_into_the_default_directory() {
        let default_dir = Path::new("bench_data");
        assert_eq!(
            resolve_gt_path(Path::new("headers"), default_dir),
            PathBuf::from("bench_data/headers.jsonl")
        );
        assert_eq!(
            resolve_gt_path(Path::new("data/tables.jsonl"), default_dir),
            PathBuf::from("data/tables.jsonl")
        );
    }

    #[test]
    fn remove_and_update_report_counts() {
        let edits = Edits {
            remove_where: Some(("type".to_string(), "baseline".to_string())),
            update_field: Some(("page".to_string(), "2".to_string(), "3".to_string())),
        };

        let (updated, counts) = apply_edits(records(), &edits);
        assert_eq!(
            counts,
            EditCounts {
                removed: 1,
                updated: 1
            }
        );
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[1]["page"], json!(3));
        assert_eq!(updated[0]["checked"], "verified");
    }

    #[test]
    fn validation_rejects_edits_that_break_the_schema() {
        let edits = Edits {
            remove_where: None,
            update_field: Some(("type".to_string(), "absent".to_string(), "missing".to_string())),
        };
        let (updated, _) = apply_edits(records(), &edits);

        let error = validate_records(&updated).expect_err("unknown type must be rejected");
        assert!(error.to_string().contains("record 3"), "unexpected error: {error}");
    }

    #[test]
    fn backup_name_carries_a_timestamp() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("headers.jsonl");
        fs::write(&path, "{}\n").expect("dataset written");

        let ts = Utc
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("valid timestamp");
        let backup = backup_file(&path, ts).expect("backup should be written");
        assert_eq!(backup, dir.path().join("headers_20240309_140507.jsonl"));
        assert_eq!(fs::read_to_string(&backup).expect("backup readable"), "{}\n");
    }

    #[test]
    fn dry_run_leaves_the_file_untouched_and_saving_backs_it_up() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("headers.jsonl");
        write_jsonl(&path, &records()).expect("dataset written");
        let original = fs::read_to_string(&path).expect("dataset readable");

        let mut dry_run = args(Path::new("headers"), dir.path());
        dry_run.remove_where = Some(vec!["id".to_string(), "c".to_string()]);
        run(dry_run.clone()).expect("dry run should succeed");
        assert_eq!(fs::read_to_string(&path).expect("dataset readable"), original);

        let mut save = dry_run;
        save.no_dry_run = true;
        run(save).expect("save should succeed");

        let saved: Vec<Value> = read_jsonl(&path).expect("saved dataset readable");
        assert_eq!(saved.len(), 2);

        let backups: Vec<String> = fs::read_dir(dir.path())
            .expect("dir readable")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("headers_"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join(&backups[0])).expect("backup readable"),
            original
        );
    }

    #[test]
    fn missing_dataset_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let error = run(args(Path::new("absent"), dir.path())).expect_err("file does not exist");
        assert!(error.to_string().contains("dataset file not found"), "{error}");
    }
}
