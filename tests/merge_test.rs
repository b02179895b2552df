use std::collections::BTreeMap;
use tempfile::TempDir;
use tex_autograder::infrastructure::ResultsFile;
use tex_autograder::models::TestStatus;
use tex_autograder::services::{MergeOptions, MergedResult, ResultMerger};
use tex_autograder::{App, AutograderPaths, MergeRequest};

fn setup(settings: &str) -> (TempDir, AutograderPaths) {
    let dir = TempDir::new().unwrap();
    let paths = AutograderPaths::under(dir.path());
    std::fs::create_dir_all(&paths.source_dir).unwrap();
    std::fs::create_dir_all(&paths.submission_dir).unwrap();
    std::fs::write(&paths.settings_file, settings).unwrap();
    (dir, paths)
}

#[tokio::test]
async fn test_merge_both_checkers_into_results_file() {
    let (_dir, paths) = setup(
        r#"{"upload_enabled": true, "tex_optional": true, "lean_optional": false,
            "proof_max_scores": {"theorem_a": 4.0}}"#,
    );
    std::fs::write(
        &paths.proof_results,
        r#"{"tests": [{"name": "theorem_a", "output": "ok", "score": 4.0}]}"#,
    )
    .unwrap();
    std::fs::write(
        &paths.tex_results,
        r#"{"tests": [
            {"name": "Formatting", "output": "", "score": 2.0, "max_score": 2.0},
            {"name": "Style", "output": "", "score": 1.0, "max_score": 3.0, "tags": ["style"]}
        ]}"#,
    )
    .unwrap();
    std::fs::write(paths.submission_dir.join("Homework.PDF"), b"%PDF").unwrap();
    std::fs::write(paths.submission_dir.join("submission.pdf"), b"%PDF").unwrap();

    // 开启上传但没有凭据，合并仍然可以运行
    let app = App::initialize_merge(paths.clone()).await.unwrap();
    app.merge(MergeRequest::default()).await.unwrap();

    let results = ResultsFile::new(&paths.results_file).read().await.unwrap();
    assert_eq!(results.tests.len(), 4);
    assert_eq!(results.tests[0].max_score, Some(4.0));
    assert_eq!(results.tests[1].status, Some(TestStatus::Passed));
    assert_eq!(results.tests[1].score, None);
    assert_eq!(results.tests[2].status, Some(TestStatus::Failed));
    assert!(results.tests[2].extra.contains_key("tags"));
    assert_eq!(results.tests[3].name, "Submitted PDF will be ignored");
    assert!(results.tests[3].output.contains("Homework.PDF"));
    assert!(!results.tests[3].output.contains("submission.pdf"));
    assert_eq!(results.score, 4.0);
}

#[tokio::test]
async fn test_tex_only_merge_synthesizes_missing_tex() {
    let (_dir, paths) = setup(r#"{"upload_enabled": false, "tex_optional": false, "lean_optional": false}"#);

    let app = App::initialize_merge(paths.clone()).await.unwrap();
    app.merge(MergeRequest {
        tex_only: true,
        ..MergeRequest::default()
    })
    .await
    .unwrap();

    let results = ResultsFile::new(&paths.results_file).read().await.unwrap();
    assert_eq!(results.tests.len(), 1);
    assert_eq!(results.tests[0].name, "No .tex file found");
    assert_eq!(results.tests[0].max_score, Some(1.0));
    assert_eq!(results.score, 0.0);
}

#[tokio::test]
async fn test_aborted_checker_report_passes_through() {
    let (dir, paths) = setup(r#"{"upload_enabled": false, "tex_optional": false, "lean_optional": false}"#);
    std::fs::write(
        &paths.proof_results,
        r#"{"score": 0, "output": "Lean toolchain crashed"}"#,
    )
    .unwrap();
    std::fs::write(&paths.tex_results, r#"{"tests": []}"#).unwrap();
    let custom_results = dir.path().join("out").join("final.json");

    let app = App::initialize_merge(paths.clone()).await.unwrap();
    app.merge(MergeRequest {
        results_file: Some(custom_results.clone()),
        ..MergeRequest::default()
    })
    .await
    .unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&custom_results).unwrap()).unwrap();
    assert_eq!(written["output"], "Lean toolchain crashed");
    assert!(written.get("tests").is_none());
    assert!(!paths.results_file.exists());
}

#[tokio::test]
async fn test_optional_checkers_may_both_be_absent() {
    let dir = TempDir::new().unwrap();
    let merger = ResultMerger::new(MergeOptions {
        tex_optional: true,
        lean_optional: true,
        proof_max_scores: BTreeMap::new(),
    });

    let merged = merger
        .run(
            Some(&dir.path().join("lean_results.json")),
            &dir.path().join("tex_results.json"),
            &dir.path().join("submission"),
        )
        .await
        .unwrap();

    match merged {
        MergedResult::Results(results) => {
            assert!(results.tests.is_empty());
            assert_eq!(results.score, 0.0);
        }
        MergedResult::Passthrough(report) => panic!("unexpected passthrough: {}", report),
    }
}
