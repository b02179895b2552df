//! 编译服务 - 业务能力层
//!
//! 负责"选出要编译的文件 → 去掉 draft → 编译 → 判定是否致命错误"，
//! 不关心上传和结果文件的写入顺序。

use crate::infrastructure::Toolchain;
use crate::models::{ResultSet, TestResult, Visibility};
use anyhow::{Context, Result};
use regex::bytes::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// 编译作业名，决定 .log / .pdf 的文件名
pub const JOB_NAME: &str = "submission";
/// 约定的主文件名
pub const MAIN_FILE_NAME: &str = "main.tex";
pub const SOURCE_EXTENSION: &str = "tex";
/// 编译器输出中表示没有生成 PDF 的标记
pub const FATAL_MARKER: &str = "Fatal error occurred, no output PDF file produced!";
/// 编译日志中错误信息的起始标记
const LOG_ERROR_MARKER: &str = "! ";

/// 选源文件的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    /// 存在 main.tex
    Main(PathBuf),
    /// 没有 main.tex，但恰好只有一个 .tex
    Inferred(PathBuf),
    /// 没有或有多个候选
    Ambiguous { candidates: usize },
}

/// 在提交目录（不含子目录）中选出要编译的文件
pub async fn select_source(submission_dir: &Path) -> Result<SourceSelection> {
    let mut entries = fs::read_dir(submission_dir)
        .await
        .with_context(|| format!("无法读取提交目录: {}", submission_dir.display()))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.file_name().and_then(|s| s.to_str()) == Some(MAIN_FILE_NAME) {
            return Ok(SourceSelection::Main(path));
        }
        if path.extension().and_then(|s| s.to_str()) == Some(SOURCE_EXTENSION) {
            candidates.push(path);
        }
    }

    debug!("候选 .tex 文件: {:?}", candidates);
    if candidates.len() == 1 {
        Ok(SourceSelection::Inferred(candidates.remove(0)))
    } else {
        Ok(SourceSelection::Ambiguous {
            candidates: candidates.len(),
        })
    }
}

/// 把 `\usepackage[draft]` 改成 `\usepackage[]`，返回是否有改动
///
/// 按字节替换，非 UTF-8 的源文件也能原样保留其他内容。
pub async fn remove_draft(source: &Path) -> Result<bool> {
    let data = fs::read(source)
        .await
        .with_context(|| format!("无法读取源文件: {}", source.display()))?;

    let draft = Regex::new(r"\\usepackage\[draft\]")?;
    if !draft.is_match(&data) {
        return Ok(false);
    }

    let cleaned = draft.replace_all(&data, &b"\\usepackage[]"[..]);
    fs::write(source, cleaned.into_owned())
        .await
        .with_context(|| format!("无法写回源文件: {}", source.display()))?;
    Ok(true)
}

/// 以 latin-1 解码日志，任何字节都不会失败
pub fn decode_log(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// 日志中第一个错误标记之后的内容，没有标记时返回全文
pub fn log_excerpt(log: &str) -> &str {
    match log.split_once(LOG_ERROR_MARKER) {
        Some((_, rest)) => rest,
        None => log,
    }
}

pub fn is_fatal(compiler_output: &str) -> bool {
    compiler_output.contains(FATAL_MARKER)
}

/// 编译结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// 没有生成 PDF
    Fatal { log_excerpt: String },
    /// 生成了 PDF（可能有警告）
    Compiled { log_excerpt: String },
}

/// 编译服务
pub struct CompileRunner<'a> {
    toolchain: &'a dyn Toolchain,
}

impl<'a> CompileRunner<'a> {
    pub fn new(toolchain: &'a dyn Toolchain) -> Self {
        Self { toolchain }
    }

    /// 编译并根据输出内容判定结果
    ///
    /// 编译器退出码不参与判定。
    pub async fn compile(&self, source: &Path, log_path: &Path) -> Result<CompileOutcome> {
        info!("📄 正在编译: {}", source.display());
        let output = self.toolchain.compile(source).await?;

        let log = match fs::read(log_path).await {
            Ok(bytes) => decode_log(&bytes),
            Err(e) => {
                warn!("⚠️ 无法读取编译日志 {}: {}", log_path.display(), e);
                String::new()
            }
        };
        let log_excerpt = log_excerpt(&log).to_string();

        if is_fatal(&output) {
            warn!("❌ 编译失败，没有生成 PDF");
            Ok(CompileOutcome::Fatal { log_excerpt })
        } else {
            info!("✓ 编译完成");
            Ok(CompileOutcome::Compiled { log_excerpt })
        }
    }
}

/// 编译日志测试
pub fn log_test(excerpt: impl Into<String>) -> TestResult {
    TestResult::info("LaTeX Output Log", excerpt).with_visibility(Visibility::Hidden)
}

/// 无法确定编译哪个文件
pub fn ambiguous_source_results() -> ResultSet {
    ResultSet::new(vec![TestResult::graded(
        "Error compiling",
        "Since there was no main.tex, we tried to infer the .tex file to compile, of which there were none or more than 1. \nThere should be exactly one .tex file in the submission (not within any folders). \nPlease try re-uploading your submission again. ",
        0.0,
        1.0,
    )])
}

/// 编译器没能运行（启动失败或源文件无法读写）
pub fn compiler_unavailable_results() -> ResultSet {
    ResultSet::new(vec![TestResult::graded(
        "Error compiling",
        "The autograder could not run the LaTeX compiler on your submission, so no PDF file was produced. \nPlease try re-uploading your submission or inform the course staff. ",
        0.0,
        1.0,
    )])
}

/// 编译出现致命错误，日志测试改为可见并计 0/1 分
pub fn fatal_results(log_excerpt: &str) -> ResultSet {
    let mut log = log_test(log_excerpt).with_visibility(Visibility::Visible);
    log.score = Some(0.0);
    log.max_score = Some(1.0);

    ResultSet::new(vec![
        TestResult::graded(
            "Error compiling",
            "There was a fatal error while compiling the submission and no PDF file was produced. \nPlease check your .tex file and try again. The log file is shown below. ",
            0.0,
            1.0,
        ),
        log,
    ])
}

/// 编译成功：满分横幅 + 警告报告 + 隐藏的编译日志
pub fn success_results(report_tests: Vec<TestResult>, log_excerpt: &str) -> ResultSet {
    let mut tests = vec![TestResult::graded(
        "Your .tex file compiled successfully!",
        "You'll see any warnings or bad boxes produced below, along with a generated score. \nPlease still verify that your submitted PDF is correct and correctly tagged.",
        1.0,
        1.0,
    )];
    tests.extend(report_tests);
    tests.push(log_test(log_excerpt));
    ResultSet::new(tests)
}
