//! 评分结果数据模型
//!
//! `TestResult` / `ResultSet` 对应评分平台读取的 results.json 结构，
//! `CheckerOutput` 对应外部检查器写出的原始 JSON。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// 通过 / 未通过
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl TestStatus {
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        }
    }
}

/// 学生可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    AfterDueDate,
    AfterPublished,
}

/// 单条测试结果
///
/// 有 `score` 表示计分测试，没有则由 `status` 表示通过与否。
/// 检查器附带的其他字段放在 `extra` 里原样写回。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl TestResult {
    /// 只有名字和输出的可见测试，不计分也没有状态
    pub fn info(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            status: None,
            score: None,
            max_score: None,
            visibility: Some(Visibility::Visible),
            extra: Map::new(),
        }
    }

    /// 计分测试
    pub fn graded(
        name: impl Into<String>,
        output: impl Into<String>,
        score: f64,
        max_score: f64,
    ) -> Self {
        Self {
            score: Some(score),
            max_score: Some(max_score),
            ..Self::info(name, output)
        }
    }

    /// 通过 / 未通过测试
    pub fn pass_fail(name: impl Into<String>, output: impl Into<String>, passed: bool) -> Self {
        Self {
            status: Some(TestStatus::from_passed(passed)),
            ..Self::info(name, output)
        }
    }

    /// 缺少某类提交物时生成的失败测试（0/1 分）
    pub fn missing_artifact(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            status: Some(TestStatus::Failed),
            ..Self::graded(name, output, 0.0, 1.0)
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn is_graded(&self) -> bool {
        self.score.is_some()
    }

    /// 把计分测试折算成通过 / 未通过
    ///
    /// 只处理 `max_score > 0` 的测试：`score >= max_score` 视为通过，
    /// 然后去掉 `score` 和 `max_score`。其他测试原样返回。
    pub fn into_pass_fail(self) -> Self {
        match (self.score, self.max_score) {
            (Some(score), Some(max_score)) if max_score > 0.0 => Self {
                status: Some(TestStatus::from_passed(score >= max_score)),
                score: None,
                max_score: None,
                ..self
            },
            _ => self,
        }
    }
}

/// 所有出现的 `score` 之和
pub fn total_score(tests: &[TestResult]) -> f64 {
    tests.iter().filter_map(|test| test.score).sum()
}

/// 最终写给评分平台的结果集
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub tests: Vec<TestResult>,
    #[serde(default)]
    pub score: f64,
}

impl ResultSet {
    pub fn new(tests: Vec<TestResult>) -> Self {
        let score = total_score(&tests);
        Self { tests, score }
    }

    /// 追加一条测试并重新计算总分
    pub fn push(&mut self, test: TestResult) {
        self.tests.push(test);
        self.score = total_score(&self.tests);
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// 外部检查器的原始输出
#[derive(Debug, Clone, PartialEq)]
pub enum CheckerOutput {
    /// 检查器跑完，给出了 `tests`
    Completed(Vec<TestResult>),
    /// 检查器环境出错，没有 `tests`，整份文档本身就是失败报告
    Aborted(JsonValue),
}

impl CheckerOutput {
    pub fn from_json(mut value: JsonValue) -> Result<Self, serde_json::Error> {
        match value.get_mut("tests").map(JsonValue::take) {
            Some(tests) => Ok(CheckerOutput::Completed(serde_json::from_value(tests)?)),
            None => Ok(CheckerOutput::Aborted(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_pass_fail_full_marks() {
        let test = TestResult::graded("HW4.problem_1", "ok", 2.0, 2.0).into_pass_fail();
        assert_eq!(test.status, Some(TestStatus::Passed));
        assert_eq!(test.score, None);
        assert_eq!(test.max_score, None);
    }

    #[test]
    fn test_into_pass_fail_partial_marks() {
        let test = TestResult::graded("HW4.problem_2", "", 1.5, 2.0).into_pass_fail();
        assert_eq!(test.status, Some(TestStatus::Failed));
        assert!(!test.is_graded());
    }

    #[test]
    fn test_into_pass_fail_leaves_zero_max_alone() {
        let original = TestResult::graded("Warnings", "3 warnings", 0.0, 0.0);
        assert_eq!(original.clone().into_pass_fail(), original);
    }

    #[test]
    fn test_extra_fields_survive_round_trip() {
        let value = json!({
            "name": "t",
            "output": "o",
            "score": 1,
            "tags": ["lean"],
            "output_format": "md"
        });
        let test: TestResult = serde_json::from_value(value).unwrap();
        assert_eq!(test.score, Some(1.0));
        assert_eq!(test.visibility, None);
        let back = serde_json::to_value(&test).unwrap();
        assert_eq!(back["tags"], json!(["lean"]));
        assert_eq!(back["output_format"], "md");
        assert!(back.get("status").is_none());
    }

    #[test]
    fn test_result_set_score_is_sum_of_present_scores() {
        let mut set = ResultSet::new(vec![
            TestResult::graded("a", "", 2.0, 2.0),
            TestResult::pass_fail("b", "", true),
            TestResult::graded("c", "", 0.5, 3.0),
        ]);
        assert_eq!(set.score, 2.5);
        set.push(TestResult::graded("d", "", 1.0, 1.0));
        assert_eq!(set.score, 3.5);
    }

    #[test]
    fn test_checker_output_without_tests_is_aborted() {
        let value = json!({"score": 0, "output": "lake build failed"});
        match CheckerOutput::from_json(value.clone()).unwrap() {
            CheckerOutput::Aborted(doc) => assert_eq!(doc, value),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_checker_output_with_tests_is_completed() {
        let value = json!({"tests": [{"name": "x", "output": "", "score": 1, "max_score": 1}]});
        match CheckerOutput::from_json(value).unwrap() {
            CheckerOutput::Completed(tests) => {
                assert_eq!(tests.len(), 1);
                assert_eq!(tests[0].name, "x");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
