use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::variable::VarMap;

/// 单个 `test(...)` 或断言的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pass,
    Fail,
    Skip,
}

/// 脚本中 `test(...)` 记录的一条结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub status: ResultStatus,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 带有 pass/fail/skip 状态的结果
pub trait HasStatus {
    fn status(&self) -> ResultStatus;
}

impl HasStatus for TestResult {
    fn status(&self) -> ResultStatus {
        self.status
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ResultsSummary {
    pub fn of<T: HasStatus>(results: &[T]) -> Self {
        let count = |status| results.iter().filter(|r| r.status() == status).count();
        Self {
            total: results.len(),
            passed: count(ResultStatus::Pass),
            failed: count(ResultStatus::Fail),
            skipped: count(ResultStatus::Skip),
        }
    }
}

/// `bru.getTestResults()` 等返回的 `{summary, results}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsResponse<T> {
    pub summary: ResultsSummary,
    pub results: Vec<T>,
}

impl<T: HasStatus> ResultsResponse<T> {
    pub fn new(results: Vec<T>) -> Self {
        Self {
            summary: ResultsSummary::of(&results),
            results,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}

impl<T> Default for ResultsResponse<T> {
    fn default() -> Self {
        Self {
            summary: ResultsSummary::default(),
            results: Vec::new(),
        }
    }
}

/// 通过沙箱 `console` 输出的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub level: String,
    pub message: String,
}

/// 从脚本中抛出的错误（JS 视角）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrownError {
    pub name: String,
    pub message: String,
}

/// 运行脚本前交给沙箱的状态
///
/// `scope` 只在表达式求值时使用：其中的键会和 `bru`、`req`、`res`
/// 一起成为全局变量。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxInput {
    pub env: VarMap,
    pub runtime: VarMap,
    pub globals: VarMap,
    pub process_env: VarMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    pub assertion_results: Vec<Value>,
    pub scope: VarMap,
}

/// 脚本运行后沙箱返回的内容
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxOutput {
    #[serde(default)]
    pub env: VarMap,
    #[serde(default)]
    pub runtime: VarMap,
    #[serde(default)]
    pub globals: VarMap,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
    #[serde(default)]
    pub logs: Vec<ConsoleEntry>,
    #[serde(default)]
    pub settled: bool,
    #[serde(default)]
    pub error: Option<ThrownError>,
}

/// 表达式字符串的解释方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// 普通 JS 表达式，如 `res.status`
    Expression,
    /// 模板字面量内容，如 `Bearer ${token}`
    Template,
}

/// 表达式求值结果。JS 的 `undefined` 没有 JSON 表示，
/// 所以与 `null` 分开保存。
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Undefined,
    Value(Value),
}

impl ExprValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, ExprValue::Undefined)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ExprValue::Undefined => None,
            ExprValue::Value(value) => Some(value),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            ExprValue::Undefined => Value::Null,
            ExprValue::Value(value) => value,
        }
    }
}

impl From<Value> for ExprValue {
    fn from(value: Value) -> Self {
        ExprValue::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(status: ResultStatus) -> TestResult {
        TestResult {
            status,
            description: "t".to_string(),
            expected: None,
            actual: None,
            error: None,
        }
    }

    #[test]
    fn test_summary_counts_each_status() {
        let response = ResultsResponse::new(vec![
            result(ResultStatus::Pass),
            result(ResultStatus::Fail),
            result(ResultStatus::Skip),
            result(ResultStatus::Pass),
        ]);
        assert_eq!(
            response.summary,
            ResultsSummary {
                total: 4,
                passed: 2,
                failed: 1,
                skipped: 1
            }
        );
        assert!(response.has_failures());
    }

    #[test]
    fn test_test_result_omits_absent_fields() {
        let value = serde_json::to_value(result(ResultStatus::Pass)).unwrap();
        assert_eq!(value, json!({"status": "pass", "description": "t"}));
    }

    #[test]
    fn test_sandbox_output_defaults_missing_fields() {
        let output: SandboxOutput = serde_json::from_str(r#"{"settled": true}"#).unwrap();
        assert!(output.settled);
        assert!(output.env.is_empty());
        assert!(output.error.is_none());
    }
}
