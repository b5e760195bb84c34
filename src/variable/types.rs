use serde_json::{Map, Value};

/// 变量表：名称 → JSON 值（脚本可以写入非字符串值）
pub type VarMap = Map<String, Value>;

/// 插值时可见的全部变量作用域
///
/// 合并优先级从低到高：global < collection < environment < folder < request
/// < oauth2 < runtime < prompt，进程环境变量挂在 `process.env.*` 下。
#[derive(Debug, Clone, Default)]
pub struct VariableSources {
    pub global: VarMap,
    pub collection: VarMap,
    pub environment: VarMap,
    pub folder: VarMap,
    pub request: VarMap,
    pub oauth2: VarMap,
    pub runtime: VarMap,
    pub prompt: VarMap,
    pub process_env: VarMap,
}

impl VariableSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按优先级合并为一个查找对象
    pub fn combined(&self) -> Value {
        let mut merged = VarMap::new();
        for scope in [
            &self.global,
            &self.collection,
            &self.environment,
            &self.folder,
            &self.request,
            &self.oauth2,
            &self.runtime,
            &self.prompt,
        ] {
            merged.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut process = VarMap::new();
        process.insert("env".to_string(), Value::Object(self.process_env.clone()));
        merged.insert("process".to_string(), Value::Object(process));
        Value::Object(merged)
    }
}

/// 查找变量：先按完整名称匹配，再按 `a.b.c` 逐级深入
///
/// `null` 视为未定义。
pub fn lookup<'a>(root: &'a Value, name: &str) -> Option<&'a Value> {
    if let Some(value) = root.get(name) {
        return (!value.is_null()).then_some(value);
    }

    let mut current = root;
    for segment in name.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

/// 转换为替换文本：字符串原样输出，其他值输出 JSON 文本
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 从进程环境读取全部变量
pub fn process_env() -> VarMap {
    std::env::vars()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> VarMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn test_combined_precedence() {
        let sources = VariableSources {
            global: vars(&[("x", "global"), ("g", "only-global")]),
            collection: vars(&[("x", "collection")]),
            environment: vars(&[("x", "environment")]),
            folder: vars(&[("x", "folder")]),
            request: vars(&[("x", "request")]),
            runtime: vars(&[("y", "runtime")]),
            prompt: vars(&[("y", "prompt")]),
            process_env: vars(&[("HOME", "/root")]),
            ..Default::default()
        };

        let combined = sources.combined();
        assert_eq!(combined["x"], json!("request"));
        assert_eq!(combined["y"], json!("prompt"));
        assert_eq!(combined["g"], json!("only-global"));
        assert_eq!(combined["process"]["env"]["HOME"], json!("/root"));
    }

    #[test]
    fn test_environment_overrides_collection() {
        let sources = VariableSources {
            collection: vars(&[("host", "declared")]),
            environment: vars(&[("host", "env")]),
            ..Default::default()
        };
        assert_eq!(sources.combined()["host"], json!("env"));
    }

    #[test]
    fn test_lookup_exact_then_nested() {
        let root = json!({
            "api.host": "flat",
            "user": {"name": "ada", "tags": ["a", "b"]},
            "empty": null
        });

        assert_eq!(lookup(&root, "api.host"), Some(&json!("flat")));
        assert_eq!(lookup(&root, "user.name"), Some(&json!("ada")));
        assert_eq!(lookup(&root, "user.tags.1"), Some(&json!("b")));
        assert_eq!(lookup(&root, "user.missing"), None);
        assert_eq!(lookup(&root, "empty"), None);
    }

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&json!("text")), "text");
        assert_eq!(stringify(&json!(42)), "42");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
