//! 编译工具链 - 基础设施层
//!
//! 调用外部的 latexmk 和 texloganalyser，只负责跑进程、保存输出。
//! 成功与否由调用方根据输出内容判断，这里不看退出码。

use crate::services::compile_runner::JOB_NAME;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

/// 编译与日志分析能力
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// 编译源文件，返回编译器的全部输出
    async fn compile(&self, source: &Path) -> Result<String>;

    /// 分析编译日志，返回分析报告
    async fn analyse_log(&self, log: &Path) -> Result<String>;
}

/// 基于 latexmk 的工具链
pub struct LatexToolchain {
    /// 编译工作目录（作业名决定的 .log / .pdf 落在这里）
    workdir: PathBuf,
    compile_output: PathBuf,
    log_analyser: PathBuf,
    analysis_output: PathBuf,
}

impl LatexToolchain {
    pub fn new(
        workdir: impl Into<PathBuf>,
        compile_output: impl Into<PathBuf>,
        log_analyser: impl Into<PathBuf>,
        analysis_output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            compile_output: compile_output.into(),
            log_analyser: log_analyser.into(),
            analysis_output: analysis_output.into(),
        }
    }

    pub fn from_paths(paths: &crate::config::AutograderPaths) -> Self {
        Self::new(
            &paths.submission_dir,
            &paths.compile_output,
            &paths.log_analyser,
            &paths.log_analysis_output,
        )
    }
}

#[async_trait]
impl Toolchain for LatexToolchain {
    async fn compile(&self, source: &Path) -> Result<String> {
        debug!("latexmk 编译: {}", source.display());

        let output = Command::new("latexmk")
            .arg("-pdf")
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg(format!("-jobname={}", JOB_NAME))
            .arg(source)
            .current_dir(&self.workdir)
            .output()
            .await
            .context("无法启动 latexmk")?;

        debug!("latexmk 退出状态: {}", output.status);
        let text = combined_output(&output);
        save_output(&self.compile_output, &text).await?;
        Ok(text)
    }

    async fn analyse_log(&self, log: &Path) -> Result<String> {
        debug!("texloganalyser 分析: {}", log.display());

        let output = Command::new(&self.log_analyser)
            .arg("--last")
            .arg("-w")
            .arg(log)
            .output()
            .await
            .with_context(|| format!("无法启动日志分析工具: {}", self.log_analyser.display()))?;

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        save_output(&self.analysis_output, &text).await?;
        Ok(text)
    }
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

async fn save_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, text)
        .await
        .with_context(|| format!("无法保存输出: {}", path.display()))
}
