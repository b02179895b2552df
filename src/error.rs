use thiserror::Error;

/// 评分平台交互错误
#[derive(Debug, Error)]
pub enum PlatformError {
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 登录没有触发跳转
    #[error("登录失败 (状态码 {status})")]
    LoginRejected { status: u16, body: String },
    /// 页面中找不到防伪 token
    #[error("页面中找不到 {what}")]
    TokenNotFound { what: &'static str },
    /// 上传后跳回了课程页或提交列表页
    #[error("上传被拒绝 (状态码 {status}, 跳转到 {url})")]
    UploadRejected { status: u16, url: String, body: String },
    /// 接口返回非成功状态码或内容不符合约定
    #[error("{endpoint} 返回错误响应 (状态码 {status})")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// 跳转次数过多
    #[error("跳转次数过多: {url}")]
    TooManyRedirects { url: String },
    /// 读取待上传文件失败
    #[error("读取文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 解析失败
    #[error("JSON解析失败: {0}")]
    JsonParseFailed(#[from] serde_json::Error),
}

impl PlatformError {
    pub fn request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        PlatformError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// 平台返回的原始响应体（用于诊断输出）
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            PlatformError::LoginRejected { body, .. }
            | PlatformError::UploadRejected { body, .. }
            | PlatformError::BadResponse { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }
}

/// 平台交互结果类型
pub type PlatformResult<T> = Result<T, PlatformError>;

/// 自动分页失败
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageAssignError {
    #[error("PDF 只有 {pages} 页，少于 {expected} 道题")]
    TooFewPages { pages: usize, expected: usize },
    #[error("第一页开头没有找到 Problem 1")]
    FirstProblemMissing,
    #[error("只找到 {found} 道题，应有 {expected} 道")]
    TooFewGroups { found: usize, expected: usize },
    #[error("无法读取 PDF: {0}")]
    Unreadable(String),
    #[error("平台页列表中没有第 {page} 页")]
    PageIdMissing { page: usize },
}

impl PageAssignError {
    /// 展示给学生的说明
    pub fn student_message(&self) -> String {
        match self {
            PageAssignError::TooFewPages { .. } => "We could not automatically assign pages to your uploaded PDF as there were less pages than assigned questions. Please make sure you're using the assigned template.".to_string(),
            PageAssignError::FirstProblemMissing => "We could not automatically assign pages to your uploaded PDF as Problem 1 was not found on the first page. Please make sure you're using the assigned template or contact the course staff.".to_string(),
            PageAssignError::TooFewGroups { found, .. } => format!("We could not automatically assign pages to your uploaded PDF as we only found {} problems in it. Please make sure you're using the assigned template or contact the course staff.", found),
            PageAssignError::Unreadable(_) => "We could not read the compiled PDF to assign pages automatically. Please assign pages manually or contact the course staff.".to_string(),
            PageAssignError::PageIdMissing { .. } => "Failed to get pages in JSON format from Gradescope. Please try again or contact the course staff.".to_string(),
        }
    }
}

/// 评分已终止
///
/// 返回这个错误之前，失败原因已经以可见测试写进了 results.json，
/// 调用方只需要以非零状态退出。
#[derive(Debug, Error)]
#[error("评分在「{stage}」阶段终止")]
pub struct Halted {
    pub stage: &'static str,
}

impl Halted {
    pub fn at(stage: &'static str) -> Self {
        Self { stage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_response_only_for_http_failures() {
        let err = PlatformError::BadResponse {
            endpoint: "/x".into(),
            status: 500,
            body: "{\"error\":1}".into(),
        };
        assert_eq!(err.raw_response(), Some("{\"error\":1}"));
        assert_eq!(
            PlatformError::TokenNotFound { what: "csrf-token" }.raw_response(),
            None
        );
    }

    #[test]
    fn test_too_few_groups_message_mentions_count() {
        let err = PageAssignError::TooFewGroups {
            found: 2,
            expected: 4,
        };
        assert!(err.student_message().contains("only found 2 problems"));
    }
}
