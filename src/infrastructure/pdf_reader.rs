//! PDF 文本提取 - 基础设施层

use crate::error::PageAssignError;
use crate::services::page_assigner::PageTextSource;
use lopdf::Document;
use std::path::Path;
use tracing::debug;

/// 已载入内存的 PDF
pub struct PdfDocument {
    document: Document,
    /// 按顺序排列的页码（lopdf 页码从 1 开始）
    page_numbers: Vec<u32>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, PageAssignError> {
        let document =
            Document::load(path).map_err(|e| PageAssignError::Unreadable(e.to_string()))?;
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        debug!("载入 PDF {}: 共 {} 页", path.display(), page_numbers.len());
        Ok(Self {
            document,
            page_numbers,
        })
    }
}

impl PageTextSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Result<String, PageAssignError> {
        let page_number = *self
            .page_numbers
            .get(index)
            .ok_or_else(|| PageAssignError::Unreadable(format!("page {} out of range", index)))?;
        self.document
            .extract_text(&[page_number])
            .map_err(|e| PageAssignError::Unreadable(e.to_string()))
    }
}
