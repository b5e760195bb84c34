use crate::variable::types::{lookup, stringify};
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
    VAR_REGEX.get_or_init(|| Regex::new(r"\{\{([^}]+)\}\}").unwrap())
}

/// 变量替换器
pub struct VariableResolver;

impl VariableResolver {
    /// 替换文本中的所有 {{variable}} 占位符，未定义的占位符保持原样
    pub fn substitute(text: &str, vars: &Value) -> String {
        Self::replace(text, vars, false)
    }

    /// 用于 JSON 请求体：字符串值中的反斜杠和双引号会被转义
    pub fn substitute_json(text: &str, vars: &Value) -> String {
        Self::replace(text, vars, true)
    }

    fn replace(text: &str, vars: &Value, escape_json: bool) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }

        placeholder_regex()
            .replace_all(text, |caps: &Captures| {
                let name = caps[1].trim();
                match lookup(vars, name) {
                    Some(Value::String(s)) if escape_json => {
                        s.replace('\\', "\\\\").replace('"', "\\\"")
                    }
                    Some(value) => stringify(value),
                    None => caps[0].to_string(),
                }
            })
            .to_string()
    }

    /// 解析并替换系统环境变量 ${VAR}
    pub fn resolve_env_vars(text: &str) -> String {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

        re.replace_all(text, |caps: &Captures| {
            let env_name = &caps[1];
            std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
    }
}
