pub mod compile_runner;
pub mod log_analyzer;
pub mod page_assigner;
pub mod result_merger;

pub use compile_runner::{CompileOutcome, CompileRunner, SourceSelection};
pub use log_analyzer::{LogAnalyzer, LogReport};
pub use page_assigner::{pages_for_questions, partition_pages, PageGroup, PageTextSource};
pub use result_merger::{CheckerInput, MergeOptions, MergedResult, ResultMerger};
