//! # TeX Autograder
//!
//! 在评分容器里编译学生提交的 LaTeX 作业、分析编译日志、
//! 把 PDF 上传到 Gradescope 并自动分页，最后合并各检查器的测试结果。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `ResultsFile` - results.json 的读写（原子替换）
//! - `LatexToolchain` - latexmk / 日志分析工具
//! - `PdfDocument` - 逐页读取 PDF 文本
//!
//! ### ② 平台客户端（Clients）
//! - `GradingPlatform` - 评分平台能力：登录、上传、轮询、取页、分页
//! - `GradescopeClient` - 基于网页表单和 cookie 会话的实现
//!
//! ### ③ 业务能力层（Services）
//! - `CompileRunner` - 选源文件、去掉 draft、编译并判断致命错误
//! - `LogAnalyzer` - 警告统计与对应测试
//! - `page_assigner` - 按 "Problem N" 划分页
//! - `ResultMerger` - 合并证明检查器和排版检查器的输出
//!
//! ### ④ 流程层（Workflow）
//! - `GradeFlow` - 编译评分，再按配置上传
//! - `UploadFlow` - 上传状态机（登录 → 上传 → 轮询 → 分页）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `App` - 持有配置，分派 grade / merge 子命令

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{AutograderPaths, Config, PollPolicy, Secrets, Settings};
pub use error::{Halted, PageAssignError, PlatformError, PlatformResult};
pub use models::{CheckerOutput, ResultSet, TestResult, TestStatus, Visibility};
pub use orchestrator::{App, MergeRequest};
pub use workflow::{GradeFlow, UploadFlow, UploadState};
