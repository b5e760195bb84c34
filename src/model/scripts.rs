use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    #[serde(rename = "before-request")]
    BeforeRequest,
    #[serde(rename = "after-response")]
    AfterResponse,
    #[serde(rename = "tests")]
    Tests,
    #[serde(rename = "hooks")]
    Hooks,
    #[serde(other)]
    Unknown,
}

/// 数组形式 `scripts` 字段中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(rename = "type")]
    pub kind: ScriptType,
    #[serde(default)]
    pub code: String,
}

impl Script {
    pub fn new(kind: ScriptType, code: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
        }
    }
}

/// 脚本块的具名字段形式，合并逻辑基于这种形式
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptsObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<String>,
}

impl ScriptsObject {
    pub fn is_empty(&self) -> bool {
        self == &ScriptsObject::default()
    }

    pub fn with_pre_request(mut self, code: impl Into<String>) -> Self {
        self.pre_request = Some(code.into());
        self
    }

    pub fn with_post_response(mut self, code: impl Into<String>) -> Self {
        self.post_response = Some(code.into());
        self
    }

    pub fn with_tests(mut self, code: impl Into<String>) -> Self {
        self.tests = Some(code.into());
        self
    }
}

/// 脚本块可接受的两种结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scripts {
    List(Vec<Script>),
    Object(ScriptsObject),
}

impl Scripts {
    pub fn into_object(self) -> ScriptsObject {
        match self {
            Scripts::List(list) => scripts_array_to_object(&list),
            Scripts::Object(object) => object,
        }
    }
}

fn non_empty(code: &str) -> Option<String> {
    (!code.is_empty()).then(|| code.to_string())
}

/// 把数组形式折叠成具名字段。未知类型被丢弃，
/// 同一阶段出现多次时以最后一项为准。
pub fn scripts_array_to_object(scripts: &[Script]) -> ScriptsObject {
    let mut object = ScriptsObject::default();
    for script in scripts {
        let slot = match script.kind {
            ScriptType::BeforeRequest => &mut object.pre_request,
            ScriptType::AfterResponse => &mut object.post_response,
            ScriptType::Tests => &mut object.tests,
            ScriptType::Hooks => &mut object.hooks,
            ScriptType::Unknown => continue,
        };
        if let Some(code) = non_empty(&script.code) {
            *slot = Some(code);
        }
    }
    object
}

/// 把具名字段展开为数组形式，跳过空阶段
pub fn scripts_object_to_array(object: &ScriptsObject) -> Vec<Script> {
    [
        (ScriptType::BeforeRequest, &object.pre_request),
        (ScriptType::AfterResponse, &object.post_response),
        (ScriptType::Tests, &object.tests),
        (ScriptType::Hooks, &object.hooks),
    ]
    .into_iter()
    .filter_map(|(kind, code)| {
        code.as_deref()
            .and_then(non_empty)
            .map(|code| Script::new(kind, code))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_to_object() {
        let scripts = vec![
            Script::new(ScriptType::BeforeRequest, "pre()"),
            Script::new(ScriptType::Tests, "check()"),
            Script::new(ScriptType::AfterResponse, ""),
        ];

        let object = scripts_array_to_object(&scripts);
        assert_eq!(object.pre_request.as_deref(), Some("pre()"));
        assert_eq!(object.tests.as_deref(), Some("check()"));
        assert_eq!(object.post_response, None);
        assert_eq!(object.hooks, None);
    }

    #[test]
    fn test_conversion_is_lossless_for_known_phases() {
        let object = ScriptsObject {
            pre_request: Some("a".into()),
            post_response: Some("b".into()),
            tests: Some("c".into()),
            hooks: Some("d".into()),
        };

        let array = scripts_object_to_array(&object);
        assert_eq!(array.len(), 4);
        assert_eq!(scripts_array_to_object(&array), object);
    }

    #[test]
    fn test_untagged_shapes_deserialize() {
        let list: Scripts = serde_json::from_value(json!([
            {"type": "before-request", "code": "x"},
            {"type": "something-else", "code": "ignored"}
        ]))
        .unwrap();
        assert_eq!(list.into_object().pre_request.as_deref(), Some("x"));

        let object: Scripts =
            serde_json::from_value(json!({"preRequest": "y", "tests": "z"})).unwrap();
        let object = object.into_object();
        assert_eq!(object.pre_request.as_deref(), Some("y"));
        assert_eq!(object.tests.as_deref(), Some("z"));
    }
}
