//! 评分平台能力接口
//!
//! 上层只依赖 {登录, 上传, 查询处理状态, 获取页列表, 提交分页} 这组能力，
//! 抓取 HTML、跟踪跳转这些细节留在具体实现里。

use crate::error::PlatformResult;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

/// 平台上新建的提交
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle {
    /// 提交资源的地址，后续接口都挂在它下面
    pub url: String,
}

impl SubmissionHandle {
    /// 由上传后最终停留的地址得到提交地址（去掉最后一段路径）
    pub fn from_response_url(url: &str) -> Self {
        let url = match url.rfind('/') {
            Some(idx) => &url[..idx],
            None => url,
        };
        Self {
            url: url.to_string(),
        }
    }

    /// 提交 ID（地址最后一段）
    pub fn id(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }

    pub fn endpoint(&self, suffix: &str) -> String {
        format!("{}/{}", self.url, suffix)
    }
}

/// PDF 处理状态
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingStatus {
    /// 状态码 1
    Processing,
    /// 状态码 2
    Done,
    /// 其他值，原样保留
    Unknown(JsonValue),
}

impl From<JsonValue> for ProcessingStatus {
    fn from(value: JsonValue) -> Self {
        match value.as_i64() {
            Some(1) => ProcessingStatus::Processing,
            Some(2) => ProcessingStatus::Done,
            _ => ProcessingStatus::Unknown(value),
        }
    }
}

/// 提交给平台的分页结果
#[derive(Debug, Clone, PartialEq)]
pub struct PageAssignment {
    /// 题目 ID -> 平台页 ID 列表
    pub pages_for_question: BTreeMap<String, Vec<JsonValue>>,
    /// 平台返回的完整页列表，原样回传
    pub pages: Vec<JsonValue>,
}

/// 评分平台
#[async_trait]
pub trait GradingPlatform: Send {
    async fn login(&mut self) -> PlatformResult<()>;

    /// 上传渲染好的 PDF，`owner_id` 是提交者在平台上的 ID
    async fn upload(&mut self, pdf: &Path, owner_id: &str) -> PlatformResult<SubmissionHandle>;

    async fn poll_status(&mut self, submission: &SubmissionHandle)
        -> PlatformResult<ProcessingStatus>;

    /// 平台处理完 PDF 后的页列表
    async fn fetch_pages(&mut self, submission: &SubmissionHandle)
        -> PlatformResult<Vec<JsonValue>>;

    async fn assign_pages(
        &mut self,
        submission: &SubmissionHandle,
        assignment: &PageAssignment,
    ) -> PlatformResult<()>;
}
