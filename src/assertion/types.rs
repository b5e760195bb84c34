use std::fmt;

use serde::{Deserialize, Serialize};

use crate::script::{HasStatus, ResultStatus};

/// 断言错误类型，只在断言运行时内部流转，最终写入结果的 `error` 字段
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssertError {
    #[error("{message}")]
    Failed { message: String },

    #[error("{0}")]
    Evaluation(String),

    #[error("Invalid regular expression: {0}")]
    InvalidPattern(String),

    #[error("{0}")]
    TypeMismatch(String),
}

impl AssertError {
    pub fn failed(message: impl Into<String>) -> Self {
        AssertError::Failed {
            message: message.into(),
        }
    }
}

impl From<crate::script::ScriptError> for AssertError {
    fn from(err: crate::script::ScriptError) -> Self {
        AssertError::Evaluation(err.to_string())
    }
}

/// 断言运算符
///
/// 线上格式固定为 28 个名称；`equals` 等别名在解析时映射到规范名称，
/// 无法识别的名称按相等比较处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    NotContains,
    Length,
    Matches,
    NotMatches,
    StartsWith,
    EndsWith,
    Between,
    IsEmpty,
    IsNotEmpty,
    IsNull,
    IsUndefined,
    IsDefined,
    IsTruthy,
    IsFalsy,
    IsJson,
    IsNumber,
    IsString,
    IsBoolean,
    IsArray,
}

impl Operator {
    pub const ALL: [Operator; 28] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
        Operator::NotIn,
        Operator::Contains,
        Operator::NotContains,
        Operator::Length,
        Operator::Matches,
        Operator::NotMatches,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Between,
        Operator::IsEmpty,
        Operator::IsNotEmpty,
        Operator::IsNull,
        Operator::IsUndefined,
        Operator::IsDefined,
        Operator::IsTruthy,
        Operator::IsFalsy,
        Operator::IsJson,
        Operator::IsNumber,
        Operator::IsString,
        Operator::IsBoolean,
        Operator::IsArray,
    ];

    /// 从字符串解析运算符
    pub fn parse(s: &str) -> Self {
        match s {
            "equals" => return Operator::Eq,
            "notEquals" => return Operator::Neq,
            "greaterThan" => return Operator::Gt,
            "greaterThanOrEqual" => return Operator::Gte,
            "lessThan" => return Operator::Lt,
            "lessThanOrEqual" => return Operator::Lte,
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .unwrap_or(Operator::Eq)
    }

    /// 转换为字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::Contains => "contains",
            Operator::NotContains => "notContains",
            Operator::Length => "length",
            Operator::Matches => "matches",
            Operator::NotMatches => "notMatches",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Between => "between",
            Operator::IsEmpty => "isEmpty",
            Operator::IsNotEmpty => "isNotEmpty",
            Operator::IsNull => "isNull",
            Operator::IsUndefined => "isUndefined",
            Operator::IsDefined => "isDefined",
            Operator::IsTruthy => "isTruthy",
            Operator::IsFalsy => "isFalsy",
            Operator::IsJson => "isJson",
            Operator::IsNumber => "isNumber",
            Operator::IsString => "isString",
            Operator::IsBoolean => "isBoolean",
            Operator::IsArray => "isArray",
        }
    }

    /// 一元运算符不读取右操作数
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            Operator::IsEmpty
                | Operator::IsNotEmpty
                | Operator::IsNull
                | Operator::IsUndefined
                | Operator::IsDefined
                | Operator::IsTruthy
                | Operator::IsFalsy
                | Operator::IsJson
                | Operator::IsNumber
                | Operator::IsString
                | Operator::IsBoolean
                | Operator::IsArray
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 断言结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub uid: String,
    pub expression: String,
    /// 保留原始写法（包括别名）
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssertionResult {
    /// 创建成功的断言结果
    pub fn pass(uid: String, expression: &str, operator: &str, value: Option<&str>) -> Self {
        Self {
            uid,
            expression: expression.to_string(),
            operator: operator.to_string(),
            value: value.map(str::to_string),
            status: ResultStatus::Pass,
            error: None,
        }
    }

    /// 创建失败的断言结果
    pub fn fail(
        uid: String,
        expression: &str,
        operator: &str,
        value: Option<&str>,
        error: AssertError,
    ) -> Self {
        Self {
            status: ResultStatus::Fail,
            error: Some(error.to_string()),
            ..Self::pass(uid, expression, operator, value)
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ResultStatus::Pass
    }
}

impl HasStatus for AssertionResult {
    fn status(&self) -> ResultStatus {
        self.status
    }
}
