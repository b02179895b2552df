//! 程序配置
//!
//! - `AutograderPaths`：所有固定的文件位置，从一个根目录推导
//! - `Config`：启动时从两份 JSON（上传凭据 + 功能开关）读入的只读配置

use crate::models::{deserialize_id, deserialize_id_list};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// 默认的评分环境根目录
pub const DEFAULT_ROOT: &str = "/autograder";

/// 评分环境中的文件布局
#[derive(Clone, Debug)]
pub struct AutograderPaths {
    pub root: PathBuf,
    /// 学生提交目录
    pub submission_dir: PathBuf,
    /// 评分脚本和模板所在目录
    pub source_dir: PathBuf,
    /// 最终写出的 results.json
    pub results_file: PathBuf,
    /// 编译器标准输出
    pub compile_output: PathBuf,
    /// 日志分析工具的输出
    pub log_analysis_output: PathBuf,
    /// 证明检查器输出
    pub proof_results: PathBuf,
    /// 排版检查器输出
    pub tex_results: PathBuf,
    pub submission_metadata: PathBuf,
    pub secrets_file: PathBuf,
    pub settings_file: PathBuf,
    /// 零警告时附送的彩蛋文本
    pub bonus_file: PathBuf,
    /// 日志分析工具（texloganalyser）
    pub log_analyser: PathBuf,
}

impl AutograderPaths {
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let source_dir = root.join("source");
        let results_dir = root.join("results");
        Self {
            submission_dir: root.join("submission"),
            results_file: results_dir.join("results.json"),
            compile_output: results_dir.join("output.txt"),
            log_analysis_output: results_dir.join("log_analysis_output.txt"),
            proof_results: root.join("lean_results.json"),
            tex_results: root.join("tex_results.json"),
            submission_metadata: root.join("submission_metadata.json"),
            secrets_file: source_dir.join("upload_secrets.json"),
            settings_file: source_dir.join("config.json"),
            bonus_file: source_dir.join("templates").join("fun").join("frog.txt"),
            log_analyser: source_dir.join("scripts").join("texloganalyser"),
            source_dir,
            root,
        }
    }

    pub fn from_env() -> Self {
        Self::under(std::env::var("AUTOGRADER_ROOT").unwrap_or_else(|_| DEFAULT_ROOT.to_string()))
    }

    /// 编译作业名决定的日志文件
    pub fn compile_log(&self) -> PathBuf {
        self.submission_dir.join(format!("{}.log", crate::services::compile_runner::JOB_NAME))
    }

    /// 编译作业名决定的 PDF 文件
    pub fn rendered_pdf(&self) -> PathBuf {
        self.submission_dir.join(format!("{}.pdf", crate::services::compile_runner::JOB_NAME))
    }
}

impl Default for AutograderPaths {
    fn default() -> Self {
        Self::under(DEFAULT_ROOT)
    }
}

/// 上传凭据（upload_secrets.json）
#[derive(Clone, Deserialize)]
pub struct Secrets {
    #[serde(deserialize_with = "deserialize_id")]
    pub course_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub assignment_id: String,
    pub username: String,
    pub password: String,
    /// 每道题在平台上的 ID，"-1" 表示该题没有对应的 PDF 页
    #[serde(deserialize_with = "deserialize_id_list")]
    pub question_ids: Vec<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("course_id", &self.course_id)
            .field("assignment_id", &self.assignment_id)
            .field("username", &self.username)
            .field("password", &"***")
            .field("question_ids", &self.question_ids)
            .finish()
    }
}

/// 功能开关（config.json）
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub upload_enabled: bool,
    pub tex_optional: bool,
    pub lean_optional: bool,
    /// 评分平台地址
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// 证明检查器测试名 -> 满分
    #[serde(default)]
    pub proof_max_scores: BTreeMap<String, f64>,
}

fn default_base_url() -> String {
    "https://www.gradescope.com".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_poll_timeout_secs() -> u64 {
    600
}

/// 轮询 PDF 处理状态的节奏
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` 表示一直等下去
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(default_poll_interval_secs()),
            timeout: Some(Duration::from_secs(default_poll_timeout_secs())),
        }
    }
}

impl Settings {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: (self.poll_timeout_secs > 0).then(|| Duration::from_secs(self.poll_timeout_secs)),
        }
    }
}

/// 一次运行的全部配置
#[derive(Clone, Debug)]
pub struct Config {
    pub settings: Settings,
    /// 未开启上传且凭据文件不存在时为 `None`
    pub secrets: Option<Secrets>,
}

impl Config {
    /// 读取两份配置文件
    ///
    /// 开启上传时凭据文件必须存在；否则有就读，没有就跳过。
    pub async fn load(paths: &AutograderPaths) -> Result<Self> {
        let settings: Settings = read_json(&paths.settings_file).await?;

        let secrets = if settings.upload_enabled || paths.secrets_file.exists() {
            Some(read_json(&paths.secrets_file).await?)
        } else {
            None
        };

        Ok(Self { settings, secrets })
    }

    /// 只读取功能开关（合并结果时不需要凭据）
    pub async fn load_settings_only(paths: &AutograderPaths) -> Result<Self> {
        let settings: Settings = read_json(&paths.settings_file).await?;
        Ok(Self {
            settings,
            secrets: None,
        })
    }

    /// 上传阶段需要的凭据
    pub fn secrets(&self) -> Result<&Secrets> {
        self.secrets
            .as_ref()
            .context("上传已开启但没有读取到上传凭据")
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("无法解析配置文件: {}", path.display()))
}
