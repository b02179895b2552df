pub mod grade_flow;
pub mod upload_flow;

pub use grade_flow::GradeFlow;
pub use upload_flow::{UploadFlow, UploadState};
