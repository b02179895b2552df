//! 上传流程 - 流程层
//!
//! 状态顺序：登录 → 已认证 → 上传 → 等待处理（轮询） → 已分页。
//! 任一状态失败都先追加一条可见的失败测试，再以 `Halted` 结束，不重试。

use crate::clients::{GradingPlatform, PageAssignment, ProcessingStatus, SubmissionHandle};
use crate::config::PollPolicy;
use crate::error::{Halted, PageAssignError, PlatformError};
use crate::infrastructure::ResultsFile;
use crate::models::TestResult;
use crate::services::page_assigner::{pages_for_questions, partition_pages, PageTextSource};
use crate::utils::logging::truncate_text;
use anyhow::Result;
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

pub const UPLOAD_ERROR: &str = "PDF Assignment Upload Error";
pub const UPLOAD_SUCCESS: &str = "PDF Upload Successful";
pub const PAGE_FAILURE: &str = "Page Assignment Failure";
pub const PAGE_SUCCESS: &str = "Page Assignment Successful";

/// 上传状态机的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Login,
    Authenticated,
    Uploading,
    Processing,
    PagesAssigned,
}

impl UploadState {
    fn label(self) -> &'static str {
        match self {
            UploadState::Login => "登录",
            UploadState::Authenticated => "已认证",
            UploadState::Uploading => "上传",
            UploadState::Processing => "等待处理",
            UploadState::PagesAssigned => "已分页",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 轮询失败的原因
#[derive(Debug)]
enum PollFailure {
    Platform(PlatformError),
    UnknownStatus(JsonValue),
    TimedOut(Duration),
}

/// 上传流程
///
/// - 持有平台会话（登录后的 cookie 和 token 都在里面）
/// - 决定何时登录、上传、分页，以及失败时写什么测试
pub struct UploadFlow<'a, P: GradingPlatform> {
    platform: P,
    results: &'a ResultsFile,
    question_ids: Vec<String>,
    poll: PollPolicy,
    state: UploadState,
}

impl<'a, P: GradingPlatform> UploadFlow<'a, P> {
    pub fn new(
        platform: P,
        results: &'a ResultsFile,
        question_ids: Vec<String>,
        poll: PollPolicy,
    ) -> Self {
        Self {
            platform,
            results,
            question_ids,
            poll,
            state: UploadState::Login,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    fn advance(&mut self, next: UploadState) {
        info!("[上传] {} → {}", self.state, next);
        self.state = next;
    }

    /// 上传 PDF 并自动分页
    ///
    /// `open_document` 在上传成功之后才调用，用于读取本地 PDF 的逐页文本。
    pub async fn run<S, F>(
        &mut self,
        pdf: &Path,
        owner_id: &str,
        open_document: F,
    ) -> Result<SubmissionHandle>
    where
        S: PageTextSource,
        F: FnOnce() -> Result<S, PageAssignError>,
    {
        // ========== 登录 ==========
        if let Err(e) = self.platform.login().await {
            return self
                .fail_platform(
                    UPLOAD_ERROR,
                    "There was an error logging into Gradescope. Please try again or inform the course staff.",
                    &e,
                )
                .await;
        }
        self.advance(UploadState::Authenticated);

        // ========== 上传 ==========
        self.advance(UploadState::Uploading);
        let handle = match self.platform.upload(pdf, owner_id).await {
            Ok(handle) => handle,
            Err(e) => {
                return self
                    .fail_platform(
                        UPLOAD_ERROR,
                        "There was an error uploading your compiled PDF file to Gradescope. Please try again or inform the course staff.",
                        &e,
                    )
                    .await;
            }
        };
        self.results
            .append(TestResult::pass_fail(
                UPLOAD_SUCCESS,
                "Your compiled PDF has successfully been uploaded to Gradescope. Please go into the PDF assignment and make sure it looks correct. NOTE: The assignment will show up as if it was submitted late, regardless if you submitted on time. Don't worry.",
                true,
            ))
            .await?;

        // ========== 本地分页 ==========
        let groups = match open_document()
            .and_then(|document| partition_pages(&document, self.question_ids.len()))
        {
            Ok(groups) => groups,
            Err(e) => return self.fail_pages(&e).await,
        };
        info!("📑 找到 {} 组题目页", groups.len());

        // ========== 等待平台处理 ==========
        self.advance(UploadState::Processing);
        if let Err(failure) = self.wait_until_processed(&handle).await {
            return match failure {
                PollFailure::Platform(e) => {
                    self.fail_platform(
                        PAGE_FAILURE,
                        "Failed to check PDF attachment status on Gradescope. Please try again or contact the course staff.",
                        &e,
                    )
                    .await
                }
                PollFailure::UnknownStatus(status) => {
                    error!("未知的 PDF 处理状态: {}", status);
                    self.fail(
                        PAGE_FAILURE,
                        "Unknown PDF processing status encountered. Please try again or contact the course staff.",
                    )
                    .await
                }
                PollFailure::TimedOut(waited) => {
                    error!("等待 PDF 处理超时: {:?}", waited);
                    self.fail(
                        PAGE_FAILURE,
                        "Gradescope took too long to process the uploaded PDF. Please assign pages manually or contact the course staff.",
                    )
                    .await
                }
            };
        }

        // ========== 提交分页 ==========
        let pages = match self.platform.fetch_pages(&handle).await {
            Ok(pages) => pages,
            Err(e) => {
                return self
                    .fail_platform(
                        PAGE_FAILURE,
                        "Failed to get pages in JSON format from Gradescope. Please try again or contact the course staff.",
                        &e,
                    )
                    .await;
            }
        };
        let pages_for_question = match pages_for_questions(&groups, &self.question_ids, &pages) {
            Ok(mapping) => mapping,
            Err(e) => return self.fail_pages(&e).await,
        };
        let assignment = PageAssignment {
            pages_for_question,
            pages,
        };
        if let Err(e) = self.platform.assign_pages(&handle, &assignment).await {
            return self
                .fail_platform(
                    PAGE_FAILURE,
                    "Invalid response received while trying to update page selection on Gradescope. Please try again or contact the course staff.",
                    &e,
                )
                .await;
        }

        self.advance(UploadState::PagesAssigned);
        self.results
            .append(TestResult::pass_fail(
                PAGE_SUCCESS,
                "Auto-assignment of PDF pages successful. Please go into the PDF assignment, check and re-assign pages if it has been done incorrectly.",
                true,
            ))
            .await?;

        Ok(handle)
    }

    /// 每隔 `interval` 查询一次，直到处理完成、出现未知状态或超时
    async fn wait_until_processed(&mut self, handle: &SubmissionHandle) -> Result<(), PollFailure> {
        let started = Instant::now();
        loop {
            match self
                .platform
                .poll_status(handle)
                .await
                .map_err(PollFailure::Platform)?
            {
                ProcessingStatus::Done => return Ok(()),
                ProcessingStatus::Processing => {}
                ProcessingStatus::Unknown(status) => return Err(PollFailure::UnknownStatus(status)),
            }

            if let Some(timeout) = self.poll.timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(PollFailure::TimedOut(waited));
                }
            }
            info!("⏳ PDF 仍在处理中，{:?} 后再次查询", self.poll.interval);
            sleep(self.poll.interval).await;
        }
    }

    async fn fail_pages<T>(&self, e: &PageAssignError) -> Result<T> {
        warn!("⚠️ 自动分页失败: {}", e);
        self.fail(PAGE_FAILURE, &e.student_message()).await
    }

    async fn fail_platform<T>(&self, name: &str, message: &str, e: &PlatformError) -> Result<T> {
        error!("[上传] {} 阶段失败: {}", self.state, e);
        if let Some(body) = e.raw_response() {
            error!("平台响应详情: {}", truncate_text(body, 2000));
        }
        self.fail(name, message).await
    }

    async fn fail<T>(&self, name: &str, message: &str) -> Result<T> {
        self.results
            .append(TestResult::pass_fail(name, message, false))
            .await?;
        Err(Halted::at(self.state.label()).into())
    }
}
