pub mod gradescope_client;
pub mod platform;

pub use gradescope_client::GradescopeClient;
pub use platform::{GradingPlatform, PageAssignment, ProcessingStatus, SubmissionHandle};
