pub mod ids;
pub mod metadata;
pub mod test_result;

pub use ids::{deserialize_id, deserialize_id_list};
pub use metadata::SubmissionMetadata;
pub use test_result::{total_score, CheckerOutput, ResultSet, TestResult, TestStatus, Visibility};
