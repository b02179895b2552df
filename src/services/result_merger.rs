//! 结果合并服务 - 业务能力层
//!
//! 把证明检查器和排版检查器各自的输出合并成一份结果集：
//! 缺失补失败测试（可选项则不补）、可选排版测试改为通过/未通过、
//! 多交的 PDF 给出提示，最后汇总分数。

use crate::models::{CheckerOutput, ResultSet, TestResult};
use crate::services::compile_runner::JOB_NAME;
use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

/// 某个检查器的输入状态
#[derive(Debug, Clone, PartialEq)]
pub enum CheckerInput {
    /// 本次合并不看这个检查器
    NotConsulted,
    /// 输出文件不存在
    Missing,
    Present(CheckerOutput),
}

impl CheckerInput {
    /// 读取检查器输出文件
    pub async fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("检查器输出不存在: {}", path.display());
            return Ok(CheckerInput::Missing);
        }
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("无法读取检查器输出: {}", path.display()))?;
        let value: JsonValue = serde_json::from_str(&content)
            .with_context(|| format!("无法解析检查器输出: {}", path.display()))?;
        Ok(CheckerInput::Present(CheckerOutput::from_json(value)?))
    }
}

/// 合并规则开关
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub tex_optional: bool,
    pub lean_optional: bool,
    /// 证明检查器测试名 -> 满分
    pub proof_max_scores: BTreeMap<String, f64>,
}

/// 合并结果
#[derive(Debug, Clone, PartialEq)]
pub enum MergedResult {
    Results(ResultSet),
    /// 某个检查器没能跑完，它的报告原样作为最终结果
    Passthrough(JsonValue),
}

/// 合并两个检查器的输出
///
/// 证明检查器在前，排版检查器在后；`stray_pdfs` 非空时追加一条提示。
pub fn merge(
    proof: CheckerInput,
    tex: CheckerInput,
    stray_pdfs: &[String],
    options: &MergeOptions,
) -> MergedResult {
    let proof_tests = match proof {
        CheckerInput::NotConsulted => Vec::new(),
        CheckerInput::Missing if options.lean_optional => Vec::new(),
        CheckerInput::Missing => vec![TestResult::missing_artifact(
            "No .lean file found",
            "You are expected to upload exactly one .lean file!",
        )],
        CheckerInput::Present(CheckerOutput::Aborted(report)) => {
            return MergedResult::Passthrough(report)
        }
        CheckerInput::Present(CheckerOutput::Completed(tests)) => {
            apply_max_scores(tests, &options.proof_max_scores)
        }
    };

    let tex_tests = match tex {
        CheckerInput::NotConsulted => Vec::new(),
        CheckerInput::Missing if options.tex_optional => Vec::new(),
        CheckerInput::Missing => vec![TestResult::missing_artifact(
            "No .tex file found",
            "You are expected to upload at least one .tex file!",
        )],
        CheckerInput::Present(CheckerOutput::Aborted(report)) => {
            return MergedResult::Passthrough(report)
        }
        CheckerInput::Present(CheckerOutput::Completed(tests)) if options.tex_optional => {
            tests.into_iter().map(TestResult::into_pass_fail).collect()
        }
        CheckerInput::Present(CheckerOutput::Completed(tests)) => tests,
    };

    let mut tests = proof_tests;
    tests.extend(tex_tests);
    if !stray_pdfs.is_empty() {
        tests.push(stray_pdf_warning(stray_pdfs));
    }
    MergedResult::Results(ResultSet::new(tests))
}

fn apply_max_scores(tests: Vec<TestResult>, max_scores: &BTreeMap<String, f64>) -> Vec<TestResult> {
    tests
        .into_iter()
        .map(|mut test| {
            if let Some(&max_score) = max_scores.get(&test.name) {
                test.max_score = Some(max_score);
            }
            test
        })
        .collect()
}

fn stray_pdf_warning(stray_pdfs: &[String]) -> TestResult {
    TestResult::pass_fail(
        "Submitted PDF will be ignored",
        format!(
            "Found {} in your submission. Only the PDF compiled from your .tex source is graded, so uploaded PDF files are ignored.",
            stray_pdfs.join(", ")
        ),
        false,
    )
}

/// 提交目录（不含子目录）中学生自带的 .pdf 文件名，已排序
///
/// 编译作业生成的 PDF 不算在内。
pub async fn find_stray_pdfs(submission_dir: &Path) -> Result<Vec<String>> {
    if !submission_dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries = fs::read_dir(submission_dir)
        .await
        .with_context(|| format!("无法读取提交目录: {}", submission_dir.display()))?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        let is_compiled = path.file_stem().and_then(|s| s.to_str()) == Some(JOB_NAME);
        if is_pdf && !is_compiled && entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// 合并服务：读取两个检查器的输出并合并
pub struct ResultMerger {
    options: MergeOptions,
}

impl ResultMerger {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    /// `proof_path` 为 `None` 时只看排版检查器
    pub async fn run(
        &self,
        proof_path: Option<&Path>,
        tex_path: &Path,
        submission_dir: &Path,
    ) -> Result<MergedResult> {
        let proof = match proof_path {
            Some(path) => CheckerInput::read(path).await?,
            None => CheckerInput::NotConsulted,
        };
        let tex = CheckerInput::read(tex_path).await?;
        let stray_pdfs = find_stray_pdfs(submission_dir).await?;
        if !stray_pdfs.is_empty() {
            warn!("⚠️ 提交中包含 PDF 文件，将被忽略: {:?}", stray_pdfs);
        }

        let merged = merge(proof, tex, &stray_pdfs, &self.options);
        match &merged {
            MergedResult::Results(results) => info!(
                "✓ 合并完成: {} 条测试, 总分 {}",
                results.tests.len(),
                results.score
            ),
            MergedResult::Passthrough(_) => warn!("⚠️ 检查器没有跑完，直接使用其错误报告"),
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestStatus;
    use serde_json::json;

    fn completed(tests: Vec<TestResult>) -> CheckerInput {
        CheckerInput::Present(CheckerOutput::Completed(tests))
    }

    fn results(merged: MergedResult) -> ResultSet {
        match merged {
            MergedResult::Results(results) => results,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scores_are_summed_in_checker_order() {
        let proof = completed(vec![
            TestResult::graded("HW4.problem_1", "", 2.0, 2.0),
            TestResult::graded("HW4.problem_2", "", 1.0, 2.0),
        ]);
        let tex = completed(vec![TestResult::graded("tex", "", 3.0, 4.0)]);

        let merged = results(merge(proof, tex, &[], &MergeOptions::default()));
        let names: Vec<_> = merged.tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["HW4.problem_1", "HW4.problem_2", "tex"]);
        assert_eq!(merged.score, 6.0);
    }

    #[test]
    fn test_missing_required_checkers_are_synthesized() {
        let merged = results(merge(
            CheckerInput::Missing,
            CheckerInput::Missing,
            &[],
            &MergeOptions::default(),
        ));
        assert_eq!(merged.tests.len(), 2);
        assert_eq!(merged.tests[0].name, "No .lean file found");
        assert_eq!(merged.tests[1].name, "No .tex file found");
        for test in &merged.tests {
            assert_eq!(test.score, Some(0.0));
            assert_eq!(test.max_score, Some(1.0));
            assert_eq!(test.status, Some(TestStatus::Failed));
        }
        assert_eq!(merged.score, 0.0);
    }

    #[test]
    fn test_missing_optional_checkers_are_suppressed() {
        let options = MergeOptions {
            tex_optional: true,
            lean_optional: true,
            ..Default::default()
        };
        let merged = results(merge(CheckerInput::Missing, CheckerInput::Missing, &[], &options));
        assert!(merged.tests.is_empty());
        assert_eq!(merged.score, 0.0);
    }

    #[test]
    fn test_optional_tex_becomes_pass_fail() {
        let options = MergeOptions {
            tex_optional: true,
            ..Default::default()
        };
        let tex = completed(vec![
            TestResult::graded("full", "", 1.0, 1.0),
            TestResult::graded("partial", "", 0.5, 1.0),
            TestResult::graded("Warnings", "", 0.0, 0.0),
            TestResult::pass_fail("status only", "", true),
        ]);
        let merged = results(merge(CheckerInput::NotConsulted, tex, &[], &options));

        assert_eq!(merged.tests.len(), 4);
        assert_eq!(merged.tests[0].status, Some(TestStatus::Passed));
        assert_eq!(merged.tests[0].score, None);
        assert_eq!(merged.tests[1].status, Some(TestStatus::Failed));
        assert_eq!(merged.tests[1].max_score, None);
        assert_eq!(merged.tests[2].max_score, Some(0.0));
        assert_eq!(merged.tests[3].name, "status only");
        assert_eq!(merged.score, 0.0);
    }

    #[test]
    fn test_aborted_proof_checker_passes_through() {
        let report = json!({"score": 0, "output": "Lean environment failed to build"});
        let proof = CheckerInput::Present(CheckerOutput::Aborted(report.clone()));
        let tex = completed(vec![TestResult::graded("tex", "", 1.0, 1.0)]);

        assert_eq!(
            merge(proof, tex, &[], &MergeOptions::default()),
            MergedResult::Passthrough(report)
        );
    }

    #[test]
    fn test_proof_max_scores_are_applied() {
        let options = MergeOptions {
            proof_max_scores: [("HW4.problem_4".to_string(), 3.0)].into_iter().collect(),
            ..Default::default()
        };
        let proof = completed(vec![
            TestResult {
                score: Some(3.0),
                ..TestResult::info("HW4.problem_4", "")
            },
            TestResult::graded("other", "", 1.0, 1.0),
        ]);
        let merged = results(merge(proof, CheckerInput::NotConsulted, &[], &options));
        assert_eq!(merged.tests[0].max_score, Some(3.0));
        assert_eq!(merged.tests[1].max_score, Some(1.0));
        assert_eq!(merged.score, 4.0);
    }

    #[test]
    fn test_stray_pdf_warning_is_appended_last() {
        let tex = completed(vec![TestResult::graded("tex", "", 1.0, 1.0)]);
        let merged = results(merge(
            CheckerInput::NotConsulted,
            tex,
            &["hw4.pdf".to_string()],
            &MergeOptions::default(),
        ));
        let last = merged.tests.last().unwrap();
        assert_eq!(last.name, "Submitted PDF will be ignored");
        assert_eq!(last.status, Some(TestStatus::Failed));
        assert!(last.output.contains("hw4.pdf"));
        assert_eq!(merged.score, 1.0);
    }

    #[tokio::test]
    async fn test_find_stray_pdfs_top_level_only() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.PDF"), "").unwrap();
        std::fs::write(dir.path().join("a.pdf"), "").unwrap();
        std::fs::write(dir.path().join("main.tex"), "").unwrap();
        std::fs::write(dir.path().join("submission.pdf"), "").unwrap();
        std::fs::create_dir(dir.path().join("figs")).unwrap();
        std::fs::write(dir.path().join("figs").join("plot.pdf"), "").unwrap();

        let names = find_stray_pdfs(dir.path()).await.unwrap();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);
    }
}
