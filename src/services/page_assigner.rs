//! 自动分页服务 - 业务能力层
//!
//! 按每题首页顶部打印的 "Problem N" 把 PDF 页划分成每题一组。
//! 单遍贪心，不回溯：某题标记没识别出来时，它的页会并进上一题，
//! 只有总组数不足时才会报错。

use crate::error::PageAssignError;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::debug;

/// 第一题标记必须出现在第一页开头的这么多个字符内
pub const HEADER_WINDOW: usize = 100;
/// 题号为此值的题目没有对应的 PDF 页
pub const SKIPPED_QUESTION_ID: &str = "-1";

/// 一道题的页（从 0 开始的页序号）
pub type PageGroup = Vec<usize>;

/// 能按页提供文本的文档
pub trait PageTextSource {
    fn page_count(&self) -> usize;
    fn page_text(&self, index: usize) -> Result<String, PageAssignError>;
}

impl PageTextSource for [String] {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn page_text(&self, index: usize) -> Result<String, PageAssignError> {
        self.get(index)
            .cloned()
            .ok_or_else(|| PageAssignError::Unreadable(format!("page {} out of range", index)))
    }
}

impl PageTextSource for Vec<String> {
    fn page_count(&self) -> usize {
        self.as_slice().page_count()
    }

    fn page_text(&self, index: usize) -> Result<String, PageAssignError> {
        self.as_slice().page_text(index)
    }
}

pub fn problem_marker(number: usize) -> String {
    format!("Problem {}", number)
}

/// 把页划分成题目组
///
/// 前置条件：页数不少于题数，第一页开头含 "Problem 1"。
/// 后置条件：组数不少于题数。
pub fn partition_pages<S>(source: &S, expected: usize) -> Result<Vec<PageGroup>, PageAssignError>
where
    S: PageTextSource + ?Sized,
{
    let pages = source.page_count();
    if pages < expected {
        return Err(PageAssignError::TooFewPages { pages, expected });
    }
    if pages == 0 {
        return Err(PageAssignError::FirstProblemMissing);
    }

    let header: String = source.page_text(0)?.chars().take(HEADER_WINDOW).collect();
    if !header.contains(&problem_marker(1)) {
        return Err(PageAssignError::FirstProblemMissing);
    }

    let mut next_problem = 2;
    let mut groups = Vec::new();
    let mut current = vec![0];
    for index in 1..pages {
        if source.page_text(index)?.contains(&problem_marker(next_problem)) {
            debug!("第 {} 页开始 Problem {}", index + 1, next_problem);
            groups.push(std::mem::replace(&mut current, vec![index]));
            next_problem += 1;
        } else {
            current.push(index);
        }
    }
    groups.push(current);

    if groups.len() < expected {
        return Err(PageAssignError::TooFewGroups {
            found: groups.len(),
            expected,
        });
    }
    Ok(groups)
}

/// 题目 ID -> 平台页 ID 列表
///
/// `platform_pages` 是平台处理完 PDF 后返回的页列表（每项带 `id`）。
/// 题号为 "-1" 的题跳过；组数多于题数时多出的组忽略。
pub fn pages_for_questions(
    groups: &[PageGroup],
    question_ids: &[String],
    platform_pages: &[JsonValue],
) -> Result<BTreeMap<String, Vec<JsonValue>>, PageAssignError> {
    let mut mapping = BTreeMap::new();
    for (group, question_id) in groups.iter().zip(question_ids) {
        if question_id == SKIPPED_QUESTION_ID {
            continue;
        }
        let page_ids = group
            .iter()
            .map(|&page| {
                platform_pages
                    .get(page)
                    .and_then(|p| p.get("id"))
                    .cloned()
                    .ok_or(PageAssignError::PageIdMissing { page })
            })
            .collect::<Result<Vec<_>, _>>()?;
        mapping.insert(question_id.clone(), page_ids);
    }
    Ok(mapping)
}
