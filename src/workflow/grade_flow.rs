//! 编译评分流程 - 流程层
//!
//! 流程顺序：
//! 1. 选源文件（失败即终止）
//! 2. 去掉 draft
//! 3. 编译（致命错误即终止）
//! 4. 日志分析，写出结果
//! 5. （可选）上传与自动分页

use crate::config::{AutograderPaths, Config};
use crate::clients::GradingPlatform;
use crate::error::Halted;
use crate::infrastructure::{PdfDocument, ResultsFile, Toolchain};
use crate::models::{SubmissionMetadata, TestResult};
use crate::services::compile_runner::{
    ambiguous_source_results, compiler_unavailable_results, fatal_results, remove_draft,
    select_source, success_results,
};
use crate::services::{CompileOutcome, CompileRunner, LogAnalyzer, SourceSelection};
use crate::workflow::upload_flow::{UploadFlow, UPLOAD_ERROR};
use anyhow::{Context, Result};
use tokio::fs;
use tracing::{error, info, warn};

/// 编译评分流程
///
/// 不持有工具链和平台会话，只编排能力
pub struct GradeFlow<'a> {
    paths: &'a AutograderPaths,
    config: &'a Config,
    toolchain: &'a dyn Toolchain,
    results: ResultsFile,
}

impl<'a> GradeFlow<'a> {
    pub fn new(paths: &'a AutograderPaths, config: &'a Config, toolchain: &'a dyn Toolchain) -> Self {
        Self {
            paths,
            config,
            toolchain,
            results: ResultsFile::new(&paths.results_file),
        }
    }

    pub fn results(&self) -> &ResultsFile {
        &self.results
    }

    /// 编译并写出评分结果
    pub async fn compile_and_grade(&self) -> Result<()> {
        // ========== 选源文件 ==========
        // 提交目录读不到时与找不到 .tex 同样处理
        let selection = select_source(&self.paths.submission_dir)
            .await
            .unwrap_or_else(|e| {
                warn!("⚠️ {:#}", e);
                SourceSelection::Ambiguous { candidates: 0 }
            });
        let source = match &selection {
            SourceSelection::Main(path) | SourceSelection::Inferred(path) => path.clone(),
            SourceSelection::Ambiguous { candidates } => {
                error!("❌ 无法确定要编译的文件: 找到 {} 个 .tex 候选", candidates);
                self.results.write(&ambiguous_source_results()).await?;
                return Err(Halted::at("选择源文件").into());
            }
        };
        info!("✓ 选定源文件: {}", source.display());

        // ========== 去掉 draft ==========
        match remove_draft(&source).await {
            Ok(true) => info!("✂️ 已移除 \\usepackage[draft]"),
            Ok(false) => {}
            Err(e) => return self.compiler_unavailable(&e).await,
        }

        // ========== 编译 ==========
        let log_path = self.paths.compile_log();
        let log_excerpt = match CompileRunner::new(self.toolchain).compile(&source, &log_path).await {
            Ok(CompileOutcome::Fatal { log_excerpt }) => {
                self.results.write(&fatal_results(&log_excerpt)).await?;
                return Err(Halted::at("编译").into());
            }
            Ok(CompileOutcome::Compiled { log_excerpt }) => log_excerpt,
            Err(e) => return self.compiler_unavailable(&e).await,
        };

        // ========== 日志分析 ==========
        let report = LogAnalyzer::new(self.toolchain).analyse(&log_path).await;
        let bonus = if report.is_clean() {
            self.read_bonus().await
        } else {
            None
        };
        let results = success_results(report.into_tests(bonus), &log_excerpt);
        info!("✓ 编译得分: {}", results.score);
        self.results.write(&results).await
    }

    /// 上传编译好的 PDF 并自动分页
    pub async fn upload<P: GradingPlatform>(&self, platform: P) -> Result<()> {
        let secrets = match self.config.secrets() {
            Ok(secrets) => secrets,
            Err(e) => return self.abort_upload(&e).await,
        };

        let owner_id = match self.read_owner_id().await {
            Ok(owner_id) => owner_id,
            Err(e) => {
                error!("❌ 无法读取提交者 ID: {:#}", e);
                self.results
                    .append(TestResult::pass_fail(
                        UPLOAD_ERROR,
                        "We could not determine who made this submission, so the compiled PDF was not uploaded. Please inform the course staff.",
                        false,
                    ))
                    .await?;
                return Err(Halted::at("读取提交元数据").into());
            }
        };

        let pdf = self.paths.rendered_pdf();
        let mut flow = UploadFlow::new(
            platform,
            &self.results,
            secrets.question_ids.clone(),
            self.config.settings.poll_policy(),
        );
        let handle = flow
            .run(&pdf, &owner_id, || PdfDocument::open(&pdf))
            .await?;
        info!("✓ 提交 {} 已上传并完成分页", handle.id());
        Ok(())
    }

    /// 上传前的准备（凭据、平台客户端）失败时记录失败测试并终止
    pub async fn abort_upload(&self, e: &anyhow::Error) -> Result<()> {
        error!("❌ 无法开始上传: {:#}", e);
        self.results
            .append(TestResult::pass_fail(
                UPLOAD_ERROR,
                "There was an error setting up the upload of your compiled PDF to Gradescope. Please inform the course staff.",
                false,
            ))
            .await?;
        Err(Halted::at("准备上传").into())
    }

    async fn compiler_unavailable(&self, e: &anyhow::Error) -> Result<()> {
        error!("❌ 无法运行编译器: {:#}", e);
        self.results.write(&compiler_unavailable_results()).await?;
        Err(Halted::at("编译").into())
    }

    async fn read_owner_id(&self) -> Result<String> {
        let path = &self.paths.submission_metadata;
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("无法读取提交元数据: {}", path.display()))?;
        let metadata: SubmissionMetadata = serde_json::from_str(&content)
            .with_context(|| format!("无法解析提交元数据: {}", path.display()))?;
        metadata
            .owner_id()
            .map(str::to_string)
            .context("提交元数据中没有用户")
    }

    async fn read_bonus(&self) -> Option<String> {
        match fs::read_to_string(&self.paths.bonus_file).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("⚠️ 无法读取彩蛋文件 {}: {}", self.paths.bonus_file.display(), e);
                None
            }
        }
    }
}
