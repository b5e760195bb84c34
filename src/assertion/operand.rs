use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Number, Value};

use crate::assertion::types::{AssertError, Operator};
use crate::script::{ExprValue, ScriptError};
use crate::variable::VariableResolver;

fn number_regex() -> &'static Regex {
    static NUMBER_REGEX: OnceLock<Regex> = OnceLock::new();
    NUMBER_REGEX.get_or_init(|| Regex::new(r"^-?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap())
}

/// 求值后的右操作数
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// 一元运算符或没有写右值
    Absent,
    Single(ExprValue),
    /// `in` / `notIn` 的候选列表
    List(Vec<ExprValue>),
    /// `between` 的上下界
    Range(ExprValue, ExprValue),
    /// `matches` / `notMatches` 的正则源码
    Pattern(String),
}

impl Operand {
    /// 单值视图：缺省视为 undefined
    pub fn single(&self) -> ExprValue {
        match self {
            Operand::Single(value) => value.clone(),
            Operand::Pattern(pattern) => ExprValue::Value(Value::String(pattern.clone())),
            Operand::List(items) => ExprValue::Value(Value::Array(
                items.iter().cloned().map(ExprValue::into_value).collect(),
            )),
            Operand::Range(low, high) => ExprValue::Value(Value::Array(vec![
                low.clone().into_value(),
                high.clone().into_value(),
            ])),
            Operand::Absent => ExprValue::Undefined,
        }
    }
}

/// 按运算符规则求值右操作数
///
/// 每个片段先做 `{{var}}` 替换，再作为模板字面量求值；字面量走快速路径，
/// 只有包含 `${...}` 的模板才交给脚本引擎。
pub fn evaluate_operand<F>(
    operator: Operator,
    raw: Option<&str>,
    vars: &Value,
    mut template: F,
) -> Result<Operand, AssertError>
where
    F: FnMut(&str) -> Result<ExprValue, ScriptError>,
{
    let raw = match raw {
        Some(raw) if !operator.is_unary() && !raw.is_empty() => raw,
        _ => return Ok(Operand::Absent),
    };

    let mut eval = |token: &str| evaluate_template(token, vars, &mut template);

    match operator {
        Operator::In | Operator::NotIn => {
            let values = strip_wrapping(raw, '[', ']');
            let items = values
                .split(',')
                .map(|token| eval(token.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Operand::List(items))
        }
        Operator::Between => {
            let mut bounds = raw.split(',');
            let low = eval(bounds.next().unwrap_or_default().trim())?;
            let high = match bounds.next() {
                Some(token) => eval(token.trim())?,
                None => ExprValue::Undefined,
            };
            Ok(Operand::Range(low, high))
        }
        Operator::Matches | Operator::NotMatches => {
            Ok(Operand::Pattern(strip_wrapping(raw, '/', '/').to_string()))
        }
        _ => eval(raw).map(Operand::Single),
    }
}

fn evaluate_template<F>(text: &str, vars: &Value, template: &mut F) -> Result<ExprValue, AssertError>
where
    F: FnMut(&str) -> Result<ExprValue, ScriptError>,
{
    let text = VariableResolver::substitute(text, vars);
    if let Some(value) = literal(&text) {
        return Ok(value);
    }
    if !text.contains("${") && !text.contains('\\') {
        return Ok(ExprValue::Value(Value::String(text)));
    }
    Ok(template(&text)?)
}

/// 字面量快速路径：数字、布尔、null、undefined、引号字符串
fn literal(text: &str) -> Option<ExprValue> {
    let value = match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        "undefined" => return Some(ExprValue::Undefined),
        _ if is_quoted(text) => Value::String(text[1..text.len() - 1].to_string()),
        _ if number_regex().is_match(text) => parse_number(text)?,
        _ => return None,
    };
    Some(ExprValue::Value(value))
}

fn is_quoted(text: &str) -> bool {
    text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')))
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    let float = text.parse::<f64>().ok()?;
    Number::from_f64(float).map(Value::Number)
}

fn strip_wrapping(text: &str, open: char, close: char) -> &str {
    if text.len() >= 2 && text.starts_with(open) && text.ends_with(close) {
        &text[1..text.len() - 1]
    } else {
        text
    }
}
