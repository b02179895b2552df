//! Gradescope 客户端
//!
//! 封装与 Gradescope 网页接口相关的全部细节：
//! - 防伪 token 从 HTML 中抓取（登录表单字段 / 页面 meta）
//! - 自动跳转关闭，手动跟踪跳转链，用跳转判断登录和上传是否成功
//! - 会话（cookie + 当前 token）只属于这个客户端实例
use crate::clients::platform::{GradingPlatform, PageAssignment, ProcessingStatus, SubmissionHandle};
use crate::config::Secrets;
use crate::error::{PlatformError, PlatformResult};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::multipart::{Form, Part};
use reqwest::{redirect, Client, RequestBuilder, Response, StatusCode, Url};
use scraper::{Html, Selector};
use serde_json::Value as JsonValue;
use std::path::Path;
use tracing::{debug, info};

const CSRF_HEADER: &str = "X-CSRF-Token";
const LOGIN_TOKEN_SELECTOR: &str = r#"form[action="/login"] input[name="authenticity_token"]"#;
const CSRF_META_SELECTOR: &str = r#"meta[name="csrf-token"]"#;
const MAX_REDIRECTS: usize = 10;
const UPLOAD_FILE_NAME: &str = "submission.pdf";

/// 跟踪完跳转后的响应
struct Followed {
    /// 途经的跳转状态码，按顺序
    hops: Vec<StatusCode>,
    url: Url,
    status: StatusCode,
    body: String,
}

/// Gradescope 客户端
pub struct GradescopeClient {
    http: Client,
    base_url: String,
    course_id: String,
    assignment_id: String,
    username: String,
    password: String,
    csrf_token: Option<String>,
    /// 已经为哪个提交刷新过 token
    token_refreshed_for: Option<String>,
}

impl GradescopeClient {
    /// 创建新的客户端
    pub fn new(base_url: impl Into<String>, secrets: &Secrets) -> PlatformResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .user_agent(concat!("tex-autograder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::request_failed(&base_url, e))?;

        Ok(Self {
            http,
            base_url,
            course_id: secrets.course_id.clone(),
            assignment_id: secrets.assignment_id.clone(),
            username: secrets.username.clone(),
            password: secrets.password.clone(),
            csrf_token: None,
            token_refreshed_for: None,
        })
    }

    fn login_url(&self) -> String {
        format!("{}/login", self.base_url)
    }

    fn course_url(&self) -> String {
        format!("{}/courses/{}", self.base_url, self.course_id)
    }

    fn submissions_url(&self) -> String {
        format!(
            "{}/courses/{}/assignments/{}/submissions",
            self.base_url, self.course_id, self.assignment_id
        )
    }

    /// 附带当前 token 的请求
    fn with_token(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.csrf_token {
            Some(token) => request.header(CSRF_HEADER, token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> PlatformResult<Response> {
        self.with_token(request)
            .send()
            .await
            .map_err(|e| PlatformError::request_failed(endpoint, e))
    }

    /// 发送请求并手动跟踪跳转
    async fn send_following(&self, request: RequestBuilder, endpoint: &str) -> PlatformResult<Followed> {
        let mut response = self.send(request, endpoint).await?;
        let mut hops = Vec::new();

        for _ in 0..MAX_REDIRECTS {
            let next = if response.status().is_redirection() {
                response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|location| response.url().join(location).ok())
            } else {
                None
            };

            let Some(next) = next else {
                return finish(response, hops, endpoint).await;
            };

            debug!("跳转 {} -> {}", response.status(), next);
            hops.push(response.status());
            response = self.send(self.http.get(next.clone()), next.as_str()).await?;
        }

        Err(PlatformError::TooManyRedirects {
            url: response.url().to_string(),
        })
    }

    async fn get_text(&self, url: &str) -> PlatformResult<String> {
        let response = self.send(self.http.get(url), url).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::request_failed(url, e))?;
        if !status.is_success() {
            return Err(PlatformError::BadResponse {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// 读取 JSON 响应，非成功状态码视为错误
    async fn read_json(response: Response, endpoint: &str) -> PlatformResult<JsonValue> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::request_failed(endpoint, e))?;
        if !status.is_success() {
            return Err(PlatformError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|_| PlatformError::BadResponse {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    /// 从提交的分页页面刷新 token
    async fn refresh_token_for(&mut self, submission: &SubmissionHandle) -> PlatformResult<()> {
        if self.token_refreshed_for.as_deref() == Some(submission.url.as_str()) {
            return Ok(());
        }
        let html = self.get_text(&submission.endpoint("select_pages")).await?;
        self.csrf_token = Some(extract_csrf_meta(&html).ok_or(PlatformError::TokenNotFound {
            what: "csrf-token",
        })?);
        self.token_refreshed_for = Some(submission.url.clone());
        Ok(())
    }
}

async fn finish(response: Response, hops: Vec<StatusCode>, endpoint: &str) -> PlatformResult<Followed> {
    let url = response.url().clone();
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PlatformError::request_failed(endpoint, e))?;
    Ok(Followed {
        hops,
        url,
        status,
        body,
    })
}

#[async_trait]
impl GradingPlatform for GradescopeClient {
    async fn login(&mut self) -> PlatformResult<()> {
        let login_url = self.login_url();
        let login_page = self.get_text(&login_url).await?;
        let auth_token = extract_login_token(&login_page).ok_or(PlatformError::TokenNotFound {
            what: "authenticity_token",
        })?;

        let form = [
            ("utf8", "✓"),
            ("authenticity_token", auth_token.as_str()),
            ("session[email]", self.username.as_str()),
            ("session[password]", self.password.as_str()),
            ("session[remember_me]", "0"),
            ("commit", "Log In"),
            ("session[remember_me_sso]", "0"),
        ];
        let followed = self
            .send_following(self.http.post(&login_url).form(&form), &login_url)
            .await?;

        if !login_succeeded(&followed.hops) {
            return Err(PlatformError::LoginRejected {
                status: followed.status.as_u16(),
                body: followed.body,
            });
        }

        let token = extract_csrf_meta(&followed.body).ok_or(PlatformError::TokenNotFound {
            what: "csrf-token",
        })?;
        self.csrf_token = Some(token);
        info!("✓ 登录成功");
        Ok(())
    }

    async fn upload(&mut self, pdf: &Path, owner_id: &str) -> PlatformResult<SubmissionHandle> {
        let bytes = tokio::fs::read(pdf)
            .await
            .map_err(|source| PlatformError::FileReadFailed {
                path: pdf.display().to_string(),
                source,
            })?;

        let submissions_url = self.submissions_url();
        let attachment = Part::bytes(bytes)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("application/pdf")
            .map_err(|e| PlatformError::request_failed(&submissions_url, e))?;
        let form = Form::new()
            .text("utf8", "✓")
            .text("authenticity_token", self.csrf_token.clone().unwrap_or_default())
            .text("owner_id", owner_id.to_string())
            .part("pdf_attachment", attachment);

        let followed = self
            .send_following(self.http.post(&submissions_url).multipart(form), &submissions_url)
            .await?;

        if is_rejected_upload_url(followed.url.as_str(), &self.course_url()) {
            return Err(PlatformError::UploadRejected {
                status: followed.status.as_u16(),
                url: followed.url.to_string(),
                body: followed.body,
            });
        }

        let handle = SubmissionHandle::from_response_url(followed.url.as_str());
        info!("✓ 上传成功，提交 ID: {}", handle.id());
        Ok(handle)
    }

    async fn poll_status(&mut self, submission: &SubmissionHandle) -> PlatformResult<ProcessingStatus> {
        self.refresh_token_for(submission).await?;

        let endpoint = submission.endpoint("pdf_attachment_status.json");
        let response = self.send(self.http.get(&endpoint), &endpoint).await?;
        let json = Self::read_json(response, &endpoint).await?;
        let status = json.get("status").cloned().unwrap_or(JsonValue::Null);
        debug!("PDF 处理状态: {}", status);
        Ok(ProcessingStatus::from(status))
    }

    async fn fetch_pages(&mut self, submission: &SubmissionHandle) -> PlatformResult<Vec<JsonValue>> {
        self.refresh_token_for(submission).await?;

        let endpoint = submission.endpoint("select_pages");
        let request = self.http.get(&endpoint).header(ACCEPT, "application/json");
        let response = self.send(request, &endpoint).await?;
        let json = Self::read_json(response, &endpoint).await?;

        match json.pointer("/pdf_attachment/pages").and_then(JsonValue::as_array) {
            Some(pages) => Ok(pages.clone()),
            None => Err(PlatformError::BadResponse {
                endpoint,
                status: StatusCode::OK.as_u16(),
                body: json.to_string(),
            }),
        }
    }

    async fn assign_pages(
        &mut self,
        submission: &SubmissionHandle,
        assignment: &PageAssignment,
    ) -> PlatformResult<()> {
        let endpoint = submission.endpoint("update_pages");
        let form = [
            (
                "pages_for_question",
                serde_json::to_string(&assignment.pages_for_question)?,
            ),
            ("pages", serde_json::to_string(&assignment.pages)?),
        ];
        let response = self
            .send(self.http.post(&endpoint).form(&form), &endpoint)
            .await?;
        let json = Self::read_json(response, &endpoint).await?;

        if has_resource_path(&json) {
            Ok(())
        } else {
            Err(PlatformError::BadResponse {
                endpoint,
                status: StatusCode::OK.as_u16(),
                body: json.to_string(),
            })
        }
    }
}

// ========== HTML / 响应判定 ==========

fn select_attr(html: &str, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let document = Html::parse_document(html);
    let value = document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(str::to_string);
    value
}

/// 登录表单中的 authenticity_token
pub fn extract_login_token(html: &str) -> Option<String> {
    select_attr(html, LOGIN_TOKEN_SELECTOR, "value")
}

/// 页面头部 meta 中的 csrf-token
pub fn extract_csrf_meta(html: &str) -> Option<String> {
    select_attr(html, CSRF_META_SELECTOR, "content")
}

/// 登录成功时第一跳是 302；失败的登录也可能直接返回 200
pub fn login_succeeded(hops: &[StatusCode]) -> bool {
    hops.first() == Some(&StatusCode::FOUND)
}

/// 上传失败时平台会跳回课程页或提交列表页
pub fn is_rejected_upload_url(url: &str, course_url: &str) -> bool {
    let url = url.trim_end_matches('/');
    url == course_url.trim_end_matches('/') || url.ends_with("submissions")
}

/// 分页更新成功时响应里带非空的 `path`
fn has_resource_path(json: &JsonValue) -> bool {
    match json.get("path") {
        Some(JsonValue::String(path)) => !path.is_empty(),
        Some(JsonValue::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LOGIN_PAGE: &str = r#"
        <html><head><meta name="csrf-token" content="page-token"></head>
        <body>
          <form action="/search"><input name="authenticity_token" value="wrong"></form>
          <form action="/login" method="post">
            <input type="hidden" name="authenticity_token" value="login-token-123">
            <input name="session[email]">
          </form>
        </body></html>"#;

    #[test]
    fn test_extract_login_token_from_login_form() {
        assert_eq!(extract_login_token(LOGIN_PAGE).as_deref(), Some("login-token-123"));
        assert_eq!(extract_login_token("<html></html>"), None);
    }

    #[test]
    fn test_extract_csrf_meta() {
        assert_eq!(extract_csrf_meta(LOGIN_PAGE).as_deref(), Some("page-token"));
        assert_eq!(extract_csrf_meta("<meta name=\"viewport\" content=\"x\">"), None);
    }

    #[test]
    fn test_login_success_requires_found_redirect() {
        assert!(login_succeeded(&[StatusCode::FOUND, StatusCode::MOVED_PERMANENTLY]));
        assert!(!login_succeeded(&[]));
        assert!(!login_succeeded(&[StatusCode::SEE_OTHER]));
    }

    #[test]
    fn test_rejected_upload_urls() {
        let course = "https://www.gradescope.com/courses/1";
        assert!(is_rejected_upload_url("https://www.gradescope.com/courses/1", course));
        assert!(is_rejected_upload_url(
            "https://www.gradescope.com/courses/1/assignments/2/submissions",
            course
        ));
        assert!(!is_rejected_upload_url(
            "https://www.gradescope.com/courses/1/assignments/2/submissions/77/select_pages",
            course
        ));
    }

    #[test]
    fn test_resource_path_detection() {
        assert!(has_resource_path(&json!({"path": "/courses/1/assignments/2/submissions/3"})));
        assert!(!has_resource_path(&json!({"path": ""})));
        assert!(!has_resource_path(&json!({"path": null})));
        assert!(!has_resource_path(&json!({})));
    }

    #[test]
    fn test_falsy_resource_path_is_rejected() {
        assert!(!has_resource_path(&json!({"path": false})));
        assert!(!has_resource_path(&json!({"path": 0})));
        assert!(!has_resource_path(&json!({"path": []})));
        assert!(has_resource_path(&json!({"path": 12})));
    }

    #[test]
    fn test_endpoints_from_secrets() {
        let secrets: Secrets = serde_json::from_value(json!({
            "course_id": 1, "assignment_id": 2, "username": "u", "password": "p",
            "question_ids": []
        }))
        .unwrap();
        let client = GradescopeClient::new("https://gs.example/", &secrets).unwrap();
        assert_eq!(client.login_url(), "https://gs.example/login");
        assert_eq!(client.course_url(), "https://gs.example/courses/1");
        assert_eq!(
            client.submissions_url(),
            "https://gs.example/courses/1/assignments/2/submissions"
        );
    }
}
