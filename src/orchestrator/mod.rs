//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 持有配置和文件布局，把命令行子命令分派到对应流程。
//!
//! ```text
//! app (grade / merge)
//!     ↓
//! workflow::GradeFlow / UploadFlow      services::ResultMerger
//!     ↓
//! services (能力层：compile / log / pages)
//!     ↓
//! infrastructure / clients (工具链、结果文件、PDF、评分平台)
//! ```

pub mod app;

pub use app::{App, MergeRequest};
