use tempfile::TempDir;

use super::*;
use crate::util::read_jsonl;

struct FixedPages(u32);

impl PageCounter for FixedPages {
    fn page_count(&self, _pdf_path: &Path) -> Result<u32> {
        Ok(self.0)
    }
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be created");
    }
    fs::write(path, contents).expect("file should be written");
}

fn present_line(id: &str, page: u32, text: &str) -> String {
    format!(r#"{{"id": "{id}", "pdf": "doc.pdf", "page": {page}, "type": "present", "text": "{text}"}}"#)
}

/// Data directory with `pdfs/doc.pdf` and one dataset file.
fn data_dir(dataset_lines: &[String]) -> TempDir {
    let dir = TempDir::new().expect("temp dir should be created");
    write_file(&dir.path().join("pdfs").join("doc.pdf"), "%PDF-1.4 stub");
    write_file(
        &dir.path().join("dataset.jsonl"),
        &format!("{}\n", dataset_lines.join("\n")),
    );
    dir
}

fn bench_args(dir: &Path) -> BenchArgs {
    BenchArgs {
        dir: dir.to_path_buf(),
        force: false,
        candidate: None,
        skip_baseline: false,
        skip_math: false,
        bootstrap_samples: 200,
        confidence_level: 0.95,
        permutation_iterations: 500,
        comparisons: Vec::new(),
        sample: None,
        seed: 42,
        output_failed: None,
        md_folder: None,
        report_path: None,
        workers: Some(2),
    }
}

fn settings(args: BenchArgs) -> BenchSettings {
    BenchSettings::from_args(args).expect("settings should be valid")
}

fn candidate<'a>(outcome: &'a BenchOutcome, name: &str) -> &'a CandidateSummary {
    &outcome
        .candidates
        .iter()
        .find(|report| report.summary.name == name)
        .expect("candidate should be reported")
        .summary
}

fn scored(pass_ratio: f64) -> RepeatEvaluation {
    RepeatEvaluation {
        status: RepeatStatus::Scored {
            pass_ratio,
            passes: 0,
            evaluated: 1,
            explanation: ALL_REPEATS_PASSED.to_string(),
        },
        warnings: Vec::new(),
    }
}

fn entry(id: &str, group: &str) -> DatasetEntry {
    DatasetEntry {
        assertion: Assertion {
            id: id.to_string(),
            pdf: "doc.pdf".to_string(),
            page: 1,
            kind: AssertionKind::Present {
                text: "alpha".to_string(),
            },
        },
        group: group.to_string(),
        record: json!({"id": id, "pdf": "doc.pdf", "page": 1, "type": "present", "text": "alpha"}),
    }
}

#[test]
fn strict_candidate_without_documents_fails_with_zero_score() {
    let dir = data_dir(&[present_line("p1", 1, "alpha")]);
    fs::create_dir_all(dir.path().join("empty_tool")).expect("candidate dir");

    let outcome = run::execute(&settings(bench_args(dir.path())), &FixedPages(1))
        .expect("run should complete");
    let summary = candidate(&outcome, "empty_tool");

    assert!(summary.is_failed());
    assert_eq!(summary.overall_score, 0.0);
    assert_eq!(summary.evaluated_count, 0);
    assert!(
        summary.errors[0].contains("missing generated documents for doc.pdf"),
        "unexpected error: {}",
        summary.errors[0]
    );
    assert!(summary.type_breakdown.is_empty());
    assert!(summary.group_breakdown.is_empty());
    assert!(summary.results_by_page.is_empty());
}

#[test]
fn forced_candidate_excludes_assertions_without_documents() {
    let dir = data_dir(&[present_line("p1", 1, "alpha")]);
    fs::create_dir_all(dir.path().join("empty_tool")).expect("candidate dir");

    let mut args = bench_args(dir.path());
    args.force = true;
    let outcome = run::execute(&settings(args), &FixedPages(1)).expect("run should complete");
    let summary = candidate(&outcome, "empty_tool");

    assert!(!summary.is_failed());
    assert_eq!(summary.evaluated_count, 0);
    assert_eq!(summary.excluded_count, 2, "present assertion and injected baseline");
    assert_eq!(summary.overall_score, 0.0);
}

#[test]
fn overall_score_is_the_mean_of_group_pass_rates() {
    let mut builder = SummaryBuilder::new("tool");
    builder.record(&entry("a0", "a.jsonl"), scored(1.0));
    for index in 0..99 {
        builder.record(&entry(&format!("b{index}"), "b.jsonl"), scored(0.0));
    }

    let summary = builder.finish();
    assert_eq!(summary.overall_score, 0.5);
    assert_eq!(
        summary.group_breakdown.get("b.jsonl"),
        Some(&GroupTally {
            passed: 0,
            total: 99
        })
    );

    let (scores, splits) = summary.grouped_binary_scores();
    assert_eq!(splits, vec![1, 99]);
    assert_eq!(scores[0], 1.0);
}

#[test]
fn half_passing_repeats_score_half_and_fail_the_majority_vote() {
    let dir = data_dir(&[present_line("p1", 1, "alpha"), present_line("p2", 2, "beta")]);
    let tool = dir.path().join("tool");
    write_file(&tool.join("doc_pg1_repeat1.md"), "The alpha section.");
    write_file(&tool.join("doc_pg1_repeat2.md"), "Nothing relevant here.");
    write_file(&tool.join("doc_pg2_repeat1.md"), "Nothing relevant here.");
    write_file(&tool.join("doc_pg2_repeat2.md"), "The beta section.");

    let mut args = bench_args(dir.path());
    args.skip_baseline = true;
    let outcome = run::execute(&settings(args), &FixedPages(2)).expect("run should complete");
    let summary = candidate(&outcome, "tool");

    assert_eq!(summary.evaluated_count, 2);
    for score in &summary.scores {
        assert_eq!(score.pass_ratio, 0.5, "assertion {}", score.id);
        assert!(!score.final_passed, "assertion {}", score.id);
    }
    assert_eq!(summary.overall_score, 0.0);
    assert_eq!(summary.type_breakdown.get("present"), Some(&vec![0.5, 0.5]));
    assert_eq!(summary.failures.len(), 2);
    assert!(
        summary.failures[0].contains("average pass ratio: 0.500 (1/2 repeats passed)"),
        "unexpected failure: {}",
        summary.failures[0]
    );

    let page_two = &summary.results_by_page["doc.pdf"][&2];
    assert_eq!(page_two.len(), 1);
    assert!(!page_two[0].passed);
}

#[test]
fn whole_document_covers_every_page() {
    let dir = data_dir(&[present_line("p1", 1, "alpha"), present_line("p2", 2, "beta")]);
    write_file(
        &dir.path().join("tool").join("doc.md"),
        "# Report\n\nThe alpha section.\n\nThe beta section.",
    );

    let outcome =
        run::execute(&settings(bench_args(dir.path())), &FixedPages(2)).expect("run should complete");
    let summary = candidate(&outcome, "tool");

    assert_eq!(summary.evaluated_count, 3);
    assert!(summary.scores.iter().all(|score| score.final_passed));
    assert_eq!(summary.overall_score, 1.0);
    assert_eq!(summary.group_breakdown.len(), 2);
}

#[test]
fn strict_run_requires_an_assertion_on_every_page() {
    let dir = data_dir(&[present_line("p1", 1, "alpha")]);
    fs::create_dir_all(dir.path().join("tool")).expect("candidate dir");

    let error = run::execute(&settings(bench_args(dir.path())), &FixedPages(2))
        .expect_err("page 2 has no assertion");
    assert!(
        error
            .to_string()
            .contains("no dataset entry found for pdf doc.pdf page 2"),
        "unexpected error: {error}"
    );

    let mut args = bench_args(dir.path());
    args.force = true;
    assert!(run::execute(&settings(args), &FixedPages(2)).is_ok());
}

#[test]
fn run_without_candidates_or_pdfs_is_an_error() {
    let dir = data_dir(&[present_line("p1", 1, "alpha")]);
    let error = run::execute(&settings(bench_args(dir.path())), &FixedPages(1))
        .expect_err("no candidate folders");
    assert!(error.to_string().contains("no candidate pipeline folders"), "{error}");

    fs::remove_dir_all(dir.path().join("pdfs")).expect("pdfs removed");
    let error = run::execute(&settings(bench_args(dir.path())), &FixedPages(1))
        .expect_err("no pdfs folder");
    assert!(error.to_string().contains("pdfs folder"), "{error}");
}

#[test]
fn unreadable_repeats_reduce_the_denominator() {
    let assertion = entry("p1", "dataset.jsonl").assertion;
    let documents = vec![
        PathBuf::from("r1.md"),
        PathBuf::from("r2.md"),
        PathBuf::from("r3.md"),
    ];
    let reader = |path: &Path| -> Result<String> {
        if path.ends_with("r2.md") {
            bail!("permission denied");
        }
        Ok("alpha".to_string())
    };

    let evaluation = evaluate_repeats(&assertion, &documents, EvaluationPolicy::Strict, reader);
    assert_eq!(
        evaluation.status,
        RepeatStatus::Scored {
            pass_ratio: 1.0,
            passes: 2,
            evaluated: 2,
            explanation: ALL_REPEATS_PASSED.to_string(),
        }
    );
    assert_eq!(evaluation.warnings.len(), 1);
    assert!(evaluation.warnings[0].contains("permission denied"));

    let unreadable = evaluate_repeats(&assertion, &documents, EvaluationPolicy::Strict, |_: &Path| {
        bail!("gone")
    });
    assert!(matches!(unreadable.status, RepeatStatus::Excluded { .. }));
    assert_eq!(unreadable.warnings.len(), 3);
}

#[test]
fn pass_ratio_is_bounded_and_needs_a_strict_majority() {
    let assertion = entry("p1", "dataset.jsonl").assertion;
    let documents: Vec<PathBuf> = (1..=4).map(|n| PathBuf::from(format!("r{n}.md"))).collect();

    for passing in 0..=4 {
        let reader = |path: &Path| -> Result<String> {
            let index: usize = path
                .to_string_lossy()
                .trim_start_matches('r')
                .trim_end_matches(".md")
                .parse()?;
            Ok(if index <= passing { "alpha" } else { "omega" }.to_string())
        };
        let evaluation = evaluate_repeats(&assertion, &documents, EvaluationPolicy::Strict, reader);
        assert_eq!(evaluation.final_passed(), passing >= 3);
        let RepeatStatus::Scored { pass_ratio, .. } = evaluation.status else {
            panic!("expected a scored evaluation");
        };
        assert!((0.0..=1.0).contains(&pass_ratio));
        assert_eq!(pass_ratio, passing as f64 / 4.0);
    }
}

#[test]
fn missing_documents_depend_on_policy() {
    let assertion = entry("p1", "dataset.jsonl").assertion;
    let strict = evaluate_repeats(&assertion, &[], EvaluationPolicy::Strict, read_document);
    assert_eq!(strict.status, RepeatStatus::Missing);

    let forced = evaluate_repeats(&assertion, &[], EvaluationPolicy::Forced, read_document);
    assert!(matches!(forced.status, RepeatStatus::Excluded { .. }));
}

#[test]
fn document_index_orders_repeats_and_falls_back_to_whole_file() {
    let root = TempDir::new().expect("temp dir");
    write_file(&root.path().join("sub/doc_pg1_repeat2.md"), "two");
    write_file(&root.path().join("sub/doc_pg1_repeat1.html"), "one");
    write_file(&root.path().join("sub/doc_pg1_repeat3.png"), "image");
    write_file(&root.path().join("sub/doc.txt"), "whole");
    write_file(&root.path().join("other_pg1_repeat1.md"), "other");

    let pdfs = vec!["sub/doc.pdf".to_string(), "missing.pdf".to_string()];
    let index = DocumentIndex::build(root.path(), &pdfs).expect("index should build");

    let page_one = index.documents_for("sub/doc.pdf", 1);
    assert_eq!(
        page_one,
        vec![
            root.path().join("sub/doc_pg1_repeat1.html"),
            root.path().join("sub/doc_pg1_repeat2.md"),
        ]
    );
    assert_eq!(
        index.documents_for("sub/doc.pdf", 2),
        vec![root.path().join("sub/doc.txt")]
    );
    assert!(
        index
            .documents("missing.pdf")
            .is_some_and(PdfDocuments::is_empty)
    );
}

#[test]
fn dataset_discovery_skips_backups_and_optionally_math() {
    let dir = TempDir::new().expect("temp dir");
    for name in [
        "headers.jsonl",
        "arxiv_math.jsonl",
        "headers_20240102_030405.jsonl",
        "notes.txt",
    ] {
        write_file(&dir.path().join(name), "");
    }

    let names = |skip_math: bool| -> Vec<String> {
        discover_dataset_files(dir.path(), skip_math)
            .expect("discovery should succeed")
            .iter()
            .map(|path| group_name(path))
            .collect()
    };

    assert_eq!(names(false), vec!["arxiv_math.jsonl", "headers.jsonl"]);
    assert_eq!(names(true), vec!["headers.jsonl"]);
}

#[test]
fn loading_rejects_duplicate_ids_and_invalid_records_with_line_numbers() {
    let dir = TempDir::new().expect("temp dir");
    let first = dir.path().join("a.jsonl");
    let second = dir.path().join("b.jsonl");
    write_file(&first, &format!("{}\n", present_line("p1", 1, "alpha")));
    write_file(&second, &format!("\n{}\n", present_line("p1", 2, "beta")));

    let error = load_dataset(&[first.clone(), second]).expect_err("duplicate id");
    assert!(
        error.to_string().contains("duplicate assertion id 'p1' on line 2"),
        "unexpected error: {error}"
    );

    let invalid = dir.path().join("c.jsonl");
    write_file(
        &invalid,
        &format!("{}\n{}\n", present_line("p2", 1, "alpha"), present_line("p3", 1, " ")),
    );
    let error = load_dataset(&[invalid]).expect_err("blank text");
    assert!(error.to_string().contains("line 2"), "unexpected error: {error}");

    let dataset = load_dataset(&[first]).expect("valid file");
    assert_eq!(dataset.entries[0].group, "a.jsonl");
    assert_eq!(dataset.files[0].assertion_count, 1);
    assert_eq!(dataset.files[0].sha256.len(), 64);
}

#[test]
fn default_baselines_are_injected_once_per_pdf() {
    let mut dataset = Dataset {
        files: Vec::new(),
        entries: vec![entry("p1", "dataset.jsonl")],
    };
    let pdfs = vec!["doc.pdf".to_string(), "other.pdf".to_string()];

    assert_eq!(dataset.add_default_baselines(&pdfs), 2);
    assert_eq!(dataset.add_default_baselines(&pdfs), 0);

    let baseline = dataset
        .entries
        .iter()
        .find(|entry| entry.assertion.id == "other.pdf_baseline")
        .expect("baseline injected");
    assert_eq!(baseline.group, BASELINE_GROUP);
    assert_eq!(baseline.assertion.page, 1);

    assert_eq!(dataset.remove_baselines(), 2);
    assert_eq!(dataset.entries.len(), 1);
}

#[test]
fn sampling_is_seeded_and_preserves_order() {
    let entries: Vec<DatasetEntry> = (0..20).map(|n| entry(&format!("p{n}"), "g")).collect();
    let sample = |seed: u64| {
        let mut dataset = Dataset {
            files: Vec::new(),
            entries: entries.clone(),
        };
        dataset.sample(5, seed);
        dataset
            .entries
            .into_iter()
            .map(|entry| entry.assertion.id)
            .collect::<Vec<_>>()
    };

    let first = sample(7);
    assert_eq!(first.len(), 5);
    assert_eq!(first, sample(7));

    let positions: Vec<usize> = first
        .iter()
        .map(|id| entries.iter().position(|entry| &entry.assertion.id == id).expect("known id"))
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn comparisons_pair_scores_by_assertion_id() {
    let mut first = SummaryBuilder::new("first");
    first.record(&entry("a", "g"), scored(1.0));
    first.record(&entry("b", "g"), scored(0.5));
    first.record(&entry("only_first", "g"), scored(1.0));
    let first = first.finish();

    let mut second = SummaryBuilder::new("second");
    second.record(&entry("b", "g"), scored(0.0));
    second.record(&entry("a", "g"), scored(1.0));
    let second = second.finish();

    assert_eq!(paired_scores(&first, &second), (vec![1.0, 0.5], vec![1.0, 0.0]));

    let result = compare_candidates(&first, &second, 200, 1).expect("comparison should run");
    assert_eq!(result.paired_count, 2);
    assert_eq!(result.outcome.observed_difference, 0.25);
}

#[test]
fn comparison_specs_must_name_two_candidates() {
    assert_eq!(
        parse_comparison("olmocr:marker").expect("valid pair"),
        ComparisonPair {
            first: "olmocr".to_string(),
            second: "marker".to_string(),
        }
    );
    assert!(parse_comparison("olmocr").is_err());
    assert!(parse_comparison("olmocr:").is_err());
    assert!(parse_comparison("same:same").is_err());
}

#[test]
fn failed_export_keeps_assertions_no_candidate_passed() {
    let dir = data_dir(&[present_line("p1", 1, "alpha"), present_line("p2", 1, "gamma")]);
    write_file(&dir.path().join("first/doc.md"), "The alpha section.");
    write_file(&dir.path().join("second/doc.md"), "Unrelated words only.");
    fs::create_dir_all(dir.path().join("broken")).expect("failing candidate dir");

    let mut args = bench_args(dir.path());
    args.comparisons = vec!["first:second".to_string(), "first:broken".to_string()];
    let settings = settings(args);
    let outcome = run::execute(&settings, &FixedPages(1)).expect("run should complete");

    assert!(candidate(&outcome, "broken").is_failed());
    assert_eq!(outcome.comparisons.len(), 1);

    let failed: Vec<String> = failed_everywhere(&outcome.dataset.entries, &outcome.candidates)
        .into_iter()
        .map(|entry| entry.assertion.id.clone())
        .collect();
    assert_eq!(failed, vec!["p2".to_string()]);

    export_failed(&settings, &outcome, Path::new("failed.jsonl")).expect("export should succeed");
    let exported: Vec<Assertion> =
        read_jsonl(&dir.path().join("failed.jsonl")).expect("export should be readable");
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].id, "p2");
}

#[test]
fn failed_export_keeps_fields_the_model_does_not_know() {
    let curated = r#"{"id": "p1", "pdf": "doc.pdf", "page": 1, "type": "present", "text": "zzz", "checked": "verified", "url": "http://x", "max_diffs": 2}"#;
    let dir = data_dir(&[curated.to_string()]);
    write_file(&dir.path().join("tool/doc.md"), "Nothing relevant here.");

    let mut args = bench_args(dir.path());
    args.skip_baseline = true;
    let settings = settings(args);
    let outcome = run::execute(&settings, &FixedPages(1)).expect("run should complete");

    export_failed(&settings, &outcome, Path::new("failed.jsonl")).expect("export should succeed");
    let exported: Vec<Value> =
        read_jsonl(&dir.path().join("failed.jsonl")).expect("export should be readable");
    let original: Value = serde_json::from_str(curated).expect("valid record");
    assert_eq!(exported, vec![original]);
}

#[test]
fn unreadable_candidate_folder_fails_only_that_candidate() {
    let dir = data_dir(&[present_line("p1", 1, "alpha")]);
    write_file(&dir.path().join("good/doc.md"), "alpha");
    let dataset = load_dataset(&[dir.path().join("dataset.jsonl")]).expect("dataset loads");
    let pdfs = vec!["doc.pdf".to_string()];

    let vanished = Candidate {
        name: "vanished".to_string(),
        search_root: dir.path().join("vanished"),
    };
    let summary = evaluate_candidate(
        &vanished,
        &dataset.entries,
        &pdfs,
        EvaluationPolicy::Forced,
        2,
    )
    .expect("folder errors stay with the candidate");
    assert!(summary.is_failed());
    assert!(summary.errors[0].contains("failed to read directory"), "{:?}", summary.errors);

    let good = Candidate {
        name: "good".to_string(),
        search_root: dir.path().join("good"),
    };
    let summary = evaluate_candidate(&good, &dataset.entries, &pdfs, EvaluationPolicy::Forced, 2)
        .expect("readable candidate evaluates");
    assert!(!summary.is_failed());
    assert_eq!(summary.overall_score, 1.0);
}

#[test]
fn text_summary_lists_scores_and_failed_candidates() {
    let dir = data_dir(&[present_line("p1", 1, "alpha")]);
    write_file(&dir.path().join("good/doc.md"), "alpha");
    fs::create_dir_all(dir.path().join("broken")).expect("failing candidate dir");

    let settings = settings(bench_args(dir.path()));
    let outcome = run::execute(&settings, &FixedPages(1)).expect("run should complete");

    let mut buffer = Vec::new();
    write_text_summary(&mut buffer, &outcome, &settings).expect("summary should render");
    let text = String::from_utf8(buffer).expect("utf-8 summary");

    assert!(text.contains("Candidate: good"), "{text}");
    assert!(text.contains("Average Score: 100.0% (95% CI: [100.0%, 100.0%]) over 2 tests."), "{text}");
    assert!(text.contains(&format!("{:20} : Average Score: FAILED (errors)", "broken")), "{text}");
    assert!(text.contains("dataset.jsonl"), "{text}");

    let report = serde_json::to_value(BenchReport::new(&settings, &outcome)).expect("report json");
    assert_eq!(report["candidates"][0]["name"], "broken");
    assert_eq!(report["candidates"][1]["overall_score"], 1.0);
    assert_eq!(report["settings"]["policy"], "strict");
}

#[test]
fn pdfinfo_page_line_is_parsed() {
    let stdout = "Title:          Sample\nPages:          12\nEncrypted:      no\n";
    assert_eq!(parse_pdfinfo_pages(stdout), Some(12));
    assert_eq!(parse_pdfinfo_pages("Title: none\n"), None);
}
