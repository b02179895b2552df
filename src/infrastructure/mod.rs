//! 基础设施层
//!
//! 持有外部资源（结果文件、编译工具链、PDF 文档），只暴露能力，不认识评分流程。

pub mod pdf_reader;
pub mod results_file;
pub mod toolchain;

pub use pdf_reader::PdfDocument;
pub use results_file::ResultsFile;
pub use toolchain::{LatexToolchain, Toolchain};
