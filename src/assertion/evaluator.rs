use regex::Regex;
use serde_json::Value;

use crate::assertion::operand::Operand;
use crate::assertion::types::{AssertError, Operator};
use crate::script::ExprValue;

/// 执行断言运算：通过返回 `Ok(())`，否则返回带消息的错误
pub fn apply_operator(operator: Operator, lhs: &ExprValue, rhs: &Operand) -> Result<(), AssertError> {
    match operator {
        Operator::Eq => {
            let expected = rhs.single();
            ensure(strict_equal(lhs, &expected), || {
                format!("expected {} to equal {}", show(lhs), show(&expected))
            })
        }
        Operator::Neq => {
            let expected = rhs.single();
            ensure(!strict_equal(lhs, &expected), || {
                format!("expected {} to not equal {}", show(lhs), show(&expected))
            })
        }
        Operator::Gt => compare(lhs, &rhs.single(), "above", |a, b| a > b),
        Operator::Gte => compare(lhs, &rhs.single(), "at least", |a, b| a >= b),
        Operator::Lt => compare(lhs, &rhs.single(), "below", |a, b| a < b),
        Operator::Lte => compare(lhs, &rhs.single(), "at most", |a, b| a <= b),
        Operator::In => {
            let list = candidates(rhs);
            ensure(list.iter().any(|item| strict_equal(lhs, item)), || {
                format!("expected {} to be one of {}", show(lhs), show_list(&list))
            })
        }
        Operator::NotIn => {
            let list = candidates(rhs);
            ensure(!list.iter().any(|item| strict_equal(lhs, item)), || {
                format!("expected {} to not be one of {}", show(lhs), show_list(&list))
            })
        }
        Operator::Contains => {
            let needle = rhs.single();
            ensure(includes(lhs, &needle)?, || {
                format!("expected {} to include {}", show(lhs), show(&needle))
            })
        }
        Operator::NotContains => {
            let needle = rhs.single();
            ensure(!includes(lhs, &needle)?, || {
                format!("expected {} to not include {}", show(lhs), show(&needle))
            })
        }
        Operator::Length => {
            let expected = rhs.single();
            let actual = length_of(lhs)?;
            let wanted = as_number(&expected);
            ensure(wanted == Some(actual as f64), || {
                format!(
                    "expected {} to have a length of {} but got {}",
                    show(lhs),
                    show(&expected),
                    actual
                )
            })
        }
        Operator::Matches | Operator::NotMatches => {
            let pattern = match rhs {
                Operand::Pattern(pattern) => pattern.clone(),
                other => js_string(&other.single()),
            };
            let re = Regex::new(&pattern).map_err(|e| AssertError::InvalidPattern(e.to_string()))?;
            let matched = re.is_match(&js_string(lhs));
            if operator == Operator::Matches {
                ensure(matched, || format!("expected {} to match /{}/", show(lhs), pattern))
            } else {
                ensure(!matched, || format!("expected {} not to match /{}/", show(lhs), pattern))
            }
        }
        Operator::StartsWith => {
            let text = expect_string(lhs, "startsWith")?;
            ensure(text.starts_with(&js_string(&rhs.single())), || {
                "expected false to be true".to_string()
            })
        }
        Operator::EndsWith => {
            let text = expect_string(lhs, "endsWith")?;
            ensure(text.ends_with(&js_string(&rhs.single())), || {
                "expected false to be true".to_string()
            })
        }
        Operator::Between => {
            let (low, high) = match rhs {
                Operand::Range(low, high) => (low.clone(), high.clone()),
                other => (other.single(), ExprValue::Undefined),
            };
            let value = as_number(lhs).ok_or_else(|| not_a_number(lhs))?;
            let (min, max) = match (as_number(&low), as_number(&high)) {
                (Some(min), Some(max)) => (min, max),
                _ => {
                    return Err(AssertError::TypeMismatch(format!(
                        "the arguments to within must be numbers, got {} and {}",
                        show(&low),
                        show(&high)
                    )));
                }
            };
            ensure(value >= min && value <= max, || {
                format!(
                    "expected {} to be within {}..{}",
                    show(lhs),
                    show(&low),
                    show(&high)
                )
            })
        }
        Operator::IsEmpty => ensure(is_empty(lhs)?, || format!("expected {} to be empty", show(lhs))),
        Operator::IsNotEmpty => {
            ensure(!is_empty(lhs)?, || format!("expected {} not to be empty", show(lhs)))
        }
        Operator::IsNull => ensure(matches!(lhs, ExprValue::Value(Value::Null)), || {
            format!("expected {} to be null", show(lhs))
        }),
        Operator::IsUndefined => ensure(lhs.is_undefined(), || {
            format!("expected {} to be undefined", show(lhs))
        }),
        Operator::IsDefined => ensure(!lhs.is_undefined(), || {
            format!("expected {} to not be undefined", show(lhs))
        }),
        Operator::IsTruthy => ensure(is_bool(lhs, true), || format!("expected {} to be true", show(lhs))),
        Operator::IsFalsy => ensure(is_bool(lhs, false), || format!("expected {} to be false", show(lhs))),
        Operator::IsJson => {
            let valid = match lhs {
                ExprValue::Undefined => false,
                ExprValue::Value(Value::String(text)) => serde_json::from_str::<Value>(text).is_ok(),
                ExprValue::Value(_) => true,
            };
            ensure(valid, || "Expected value to be valid JSON".to_string())
        }
        Operator::IsNumber => type_check(lhs, "number"),
        Operator::IsString => type_check(lhs, "string"),
        Operator::IsBoolean => type_check(lhs, "boolean"),
        Operator::IsArray => type_check(lhs, "array"),
    }
}

fn ensure(ok: bool, message: impl FnOnce() -> String) -> Result<(), AssertError> {
    if ok {
        Ok(())
    } else {
        Err(AssertError::failed(message()))
    }
}

/// 严格相等：类型不同即不等；数字按数值比较，对象和数组按结构比较
fn strict_equal(a: &ExprValue, b: &ExprValue) -> bool {
    match (a, b) {
        (ExprValue::Undefined, ExprValue::Undefined) => true,
        (ExprValue::Value(a), ExprValue::Value(b)) => values_equal(a, b),
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(
    lhs: &ExprValue,
    rhs: &ExprValue,
    verb: &str,
    predicate: fn(f64, f64) -> bool,
) -> Result<(), AssertError> {
    let actual = as_number(lhs).ok_or_else(|| not_a_number(lhs))?;
    let expected = as_number(rhs).ok_or_else(|| {
        AssertError::TypeMismatch(format!(
            "the argument to {verb} must be a number, got {}",
            show(rhs)
        ))
    })?;
    ensure(predicate(actual, expected), || {
        format!("expected {} to be {verb} {}", show(lhs), show(rhs))
    })
}

fn not_a_number(value: &ExprValue) -> AssertError {
    AssertError::TypeMismatch(format!("expected {} to be a number or a date", show(value)))
}

fn as_number(value: &ExprValue) -> Option<f64> {
    value.as_value().and_then(Value::as_f64)
}

fn candidates(rhs: &Operand) -> Vec<ExprValue> {
    match rhs {
        Operand::List(items) => items.clone(),
        Operand::Absent => Vec::new(),
        other => vec![other.single()],
    }
}

fn includes(haystack: &ExprValue, needle: &ExprValue) -> Result<bool, AssertError> {
    match haystack {
        ExprValue::Value(Value::String(text)) => Ok(text.contains(&js_string(needle))),
        ExprValue::Value(Value::Array(items)) => Ok(match needle {
            ExprValue::Value(needle) => items.iter().any(|item| values_equal(item, needle)),
            ExprValue::Undefined => false,
        }),
        ExprValue::Value(Value::Object(map)) => match needle {
            ExprValue::Value(Value::Object(subset)) => Ok(subset
                .iter()
                .all(|(key, value)| map.get(key).is_some_and(|v| values_equal(v, value)))),
            other => Err(AssertError::TypeMismatch(format!(
                "the given combination of arguments (object and {}) is invalid for this assertion",
                type_name(other)
            ))),
        },
        other => Err(AssertError::TypeMismatch(format!(
            "object tested must be an array, an object, or a string, but {} given",
            type_name(other)
        ))),
    }
}

/// JS 的 `length`：字符串按 UTF-16 单元计数
fn length_of(value: &ExprValue) -> Result<usize, AssertError> {
    match value {
        ExprValue::Value(Value::String(text)) => Ok(text.encode_utf16().count()),
        ExprValue::Value(Value::Array(items)) => Ok(items.len()),
        other => Err(AssertError::TypeMismatch(format!(
            "expected {} to have property 'length'",
            show(other)
        ))),
    }
}

fn is_empty(value: &ExprValue) -> Result<bool, AssertError> {
    match value {
        ExprValue::Value(Value::String(text)) => Ok(text.is_empty()),
        ExprValue::Value(Value::Array(items)) => Ok(items.is_empty()),
        ExprValue::Value(Value::Object(map)) => Ok(map.is_empty()),
        other => Err(AssertError::TypeMismatch(format!(
            ".empty was passed non-string primitive {}",
            show(other)
        ))),
    }
}

fn expect_string<'a>(value: &'a ExprValue, operator: &str) -> Result<&'a str, AssertError> {
    match value {
        ExprValue::Value(Value::String(text)) => Ok(text),
        _ => Err(AssertError::failed(format!("{operator} expects a string"))),
    }
}

/// 只接受布尔字面量，"abc" 或 1 都不算 true
fn is_bool(value: &ExprValue, expected: bool) -> bool {
    matches!(value, ExprValue::Value(Value::Bool(b)) if *b == expected)
}

fn type_check(value: &ExprValue, expected: &str) -> Result<(), AssertError> {
    ensure(type_name(value) == expected, || {
        let article = if expected == "array" { "an" } else { "a" };
        format!("expected {} to be {article} {expected}", show(value))
    })
}

fn type_name(value: &ExprValue) -> &'static str {
    match value {
        ExprValue::Undefined => "undefined",
        ExprValue::Value(Value::Null) => "null",
        ExprValue::Value(Value::Bool(_)) => "boolean",
        ExprValue::Value(Value::Number(_)) => "number",
        ExprValue::Value(Value::String(_)) => "string",
        ExprValue::Value(Value::Array(_)) => "array",
        ExprValue::Value(Value::Object(_)) => "object",
    }
}

/// 错误消息里的值写法：字符串加单引号，其余用 JSON
fn show(value: &ExprValue) -> String {
    match value {
        ExprValue::Undefined => "undefined".to_string(),
        ExprValue::Value(Value::String(s)) => format!("'{s}'"),
        ExprValue::Value(other) => other.to_string(),
    }
}

fn show_list(items: &[ExprValue]) -> String {
    let parts: Vec<String> = items.iter().map(show).collect();
    format!("[ {} ]", parts.join(", "))
}

/// JS 的 `String(value)`
fn js_string(value: &ExprValue) -> String {
    match value {
        ExprValue::Undefined => "undefined".to_string(),
        ExprValue::Value(value) => js_string_of(value),
    }
}

fn js_string_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string_of(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_string(),
    }
}
