//! 结果文件 - 基础设施层
//!
//! results.json 是与评分平台唯一的约定，写入时先写临时文件再改名，
//! 中途崩溃不会留下半个文件。

use crate::models::{ResultSet, TestResult};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub struct ResultsFile {
    path: PathBuf,
}

impl ResultsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 覆盖写入整个结果集
    pub async fn write(&self, results: &ResultSet) -> Result<()> {
        let body = serde_json::to_string(results)?;
        self.write_raw(&body).await
    }

    /// 原样写入一份 JSON 文档（检查器的失败报告直接透传时使用）
    pub async fn write_value(&self, value: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_string(value)?;
        self.write_raw(&body).await
    }

    /// 读取已有结果，不存在时返回空结果集
    pub async fn read(&self) -> Result<ResultSet> {
        if !self.path.exists() {
            return Ok(ResultSet::default());
        }
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("无法读取结果文件: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("无法解析结果文件: {}", self.path.display()))
    }

    /// 在已有结果后追加一条测试
    pub async fn append(&self, test: TestResult) -> Result<()> {
        let mut results = self.read().await?;
        debug!("追加测试: {}", test.name);
        results.push(test);
        self.write(&results).await
    }

    async fn write_raw(&self, body: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("无法创建目录: {}", parent.display()))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, body)
            .await
            .with_context(|| format!("无法写入临时文件: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("无法写入结果文件: {}", self.path.display()))?;
        Ok(())
    }
}
