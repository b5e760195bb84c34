use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::model::scripts::ScriptsObject;
use crate::variable::VarMap;

fn is_false(value: &bool) -> bool {
    !*value
}

/// 请求头。名称保留原始大小写，查找时不区分大小写
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            disabled: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    Query,
    Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
}

impl Param {
    pub fn query(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: ParamType::Query,
            disabled: false,
        }
    }

    pub fn path(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: ParamType::Path,
            ..Self::query(name, value)
        }
    }
}

/// 附在变量上的 `{type, data}` 内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: String,
}

/// 多值变量的一个候选值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableAlternative {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
    pub value: VariableValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Text(String),
    Typed(TypedValue),
    Alternatives(Vec<VariableAlternative>),
    Other(Value),
}

impl Default for VariableValue {
    fn default() -> Self {
        VariableValue::Text(String::new())
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::Text(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        VariableValue::Text(value)
    }
}

impl VariableValue {
    /// 归约为运行器使用的字符串
    ///
    /// 多候选值取 selected 的那个，没有则取第一个。
    pub fn resolve(&self) -> String {
        match self {
            VariableValue::Text(text) => text.clone(),
            VariableValue::Typed(typed) => typed.data.clone(),
            VariableValue::Alternatives(alternatives) => alternatives
                .iter()
                .find(|alt| alt.selected)
                .or_else(|| alternatives.first())
                .map(|alt| alt.value.resolve())
                .unwrap_or_default(),
            VariableValue::Other(Value::Null) => String::new(),
            VariableValue::Other(Value::String(text)) => text.clone(),
            VariableValue::Other(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: VariableValue,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            disabled: false,
            uid: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// 声明式的 `expression operator value` 检查
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Assertion {
    pub expression: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
}

impl Assertion {
    pub fn new(expression: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            operator: operator.into(),
            value: None,
            disabled: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawBodyKind {
    Json,
    Text,
    Xml,
    Sparql,
}

impl RawBodyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawBodyKind::Json => "json",
            RawBodyKind::Text => "text",
            RawBodyKind::Xml => "xml",
            RawBodyKind::Sparql => "sparql",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormEntry {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultipartKind {
    #[default]
    Text,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultipartValue {
    One(String),
    Many(Vec<String>),
}

impl Default for MultipartValue {
    fn default() -> Self {
        MultipartValue::One(String::new())
    }
}

impl MultipartValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            MultipartValue::One(value) => vec![value.as_str()],
            MultipartValue::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartEntry {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: MultipartKind,
    #[serde(default)]
    pub value: MultipartValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVariant {
    pub file_path: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub selected: bool,
}

/// 请求体，每个请求只有一种模式生效
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Raw { kind: RawBodyKind, data: String },
    FormUrlEncoded(Vec<FormEntry>),
    Multipart(Vec<MultipartEntry>),
    File(Vec<FileVariant>),
    /// 旧式数组请求体，按请求的 content type 以 urlencoded 或 multipart 发送
    Entries(Vec<MultipartEntry>),
}

impl Body {
    pub fn json(data: impl Into<String>) -> Self {
        Body::Raw {
            kind: RawBodyKind::Json,
            data: data.into(),
        }
    }

    pub fn text(data: impl Into<String>) -> Self {
        Body::Raw {
            kind: RawBodyKind::Text,
            data: data.into(),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(
            self,
            Body::Raw {
                kind: RawBodyKind::Json,
                ..
            }
        )
    }

    /// 扁平文档结构中的表示
    pub fn to_value(&self) -> Value {
        match self {
            Body::Raw { kind, data } => json!({ "type": kind.as_str(), "data": data }),
            Body::FormUrlEncoded(entries) => json!({ "type": "form-urlencoded", "data": entries }),
            Body::Multipart(entries) => json!({ "type": "multipart-form", "data": entries }),
            Body::File(variants) => json!({ "type": "file", "data": variants }),
            Body::Entries(entries) => json!(entries),
        }
    }

    /// 脚本中 `req.body` / `req.getBody()` 看到的值
    pub fn script_view(&self) -> Value {
        match self {
            Body::Raw {
                kind: RawBodyKind::Json,
                data,
            } => serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.clone())),
            Body::Raw { data, .. } => Value::String(data.clone()),
            Body::FormUrlEncoded(entries) => Value::Object(
                entries
                    .iter()
                    .filter(|entry| !entry.disabled)
                    .map(|entry| (entry.name.clone(), Value::String(entry.value.clone())))
                    .collect(),
            ),
            Body::Multipart(entries) | Body::Entries(entries) => Value::Object(
                entries
                    .iter()
                    .filter(|entry| !entry.disabled)
                    .map(|entry| (entry.name.clone(), json!(entry.value)))
                    .collect(),
            ),
            Body::File(variants) => variants
                .iter()
                .find(|variant| variant.selected)
                .or_else(|| variants.first())
                .map(|variant| Value::String(variant.file_path.clone()))
                .unwrap_or(Value::Null),
        }
    }
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BearerAuth {
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyPlacement {
    #[default]
    Header,
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeyAuth {
    pub key: String,
    pub value: String,
    pub placement: ApiKeyPlacement,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AwsV4Auth {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub service: String,
    pub region: String,
    pub profile_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NtlmAuth {
    pub username: String,
    pub password: String,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Auth {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "basic")]
    Basic(BasicAuth),
    #[serde(rename = "bearer")]
    Bearer(BearerAuth),
    #[serde(rename = "apikey")]
    ApiKey(ApiKeyAuth),
    #[serde(rename = "awsv4")]
    AwsV4(AwsV4Auth),
    #[serde(rename = "digest")]
    Digest(BasicAuth),
    #[serde(rename = "ntlm")]
    Ntlm(NtlmAuth),
    #[serde(rename = "wsse")]
    Wsse(BasicAuth),
}

impl Auth {
    pub fn mode(&self) -> &'static str {
        match self {
            Auth::None => "none",
            Auth::Basic(_) => "basic",
            Auth::Bearer(_) => "bearer",
            Auth::ApiKey(_) => "apikey",
            Auth::AwsV4(_) => "awsv4",
            Auth::Digest(_) => "digest",
            Auth::Ntlm(_) => "ntlm",
            Auth::Wsse(_) => "wsse",
        }
    }
}

/// 请求、文件夹或集合上保存的认证：`"inherit"` 关键字或具体配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSetting {
    Inherit,
    Configured(Auth),
}

impl AuthSetting {
    pub fn is_inherit(&self) -> bool {
        matches!(self, AuthSetting::Inherit)
    }

    pub fn configured(&self) -> Option<&Auth> {
        match self {
            AuthSetting::Inherit => None,
            AuthSetting::Configured(auth) => Some(auth),
        }
    }
}

impl Serialize for AuthSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AuthSetting::Inherit => serializer.serialize_str("inherit"),
            AuthSetting::Configured(auth) => auth.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSettings {
    #[serde(rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// HTTP 请求条目
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HttpRequest {
    /// 加载时分配，不写回文档
    #[serde(skip)]
    pub id: Option<Uuid>,
    pub name: String,
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSetting>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
    #[serde(skip_serializing_if = "ScriptsObject::is_empty")]
    pub scripts: ScriptsObject,
    #[serde(skip_serializing_if = "RequestSettings::is_default")]
    pub settings: RequestSettings,
}

impl RequestSettings {
    fn is_default(&self) -> bool {
        self == &RequestSettings::default()
    }
}

impl HttpRequest {
    pub fn new(name: impl Into<String>, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_auth(mut self, auth: AuthSetting) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.variables.push(Variable::new(name, value));
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_scripts(mut self, scripts: ScriptsObject) -> Self {
        self.scripts = scripts;
        self
    }

    /// 第一个同名且启用的请求头，不区分大小写
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers
            .iter()
            .find(|header| !header.disabled && header.is_named(name))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type").map(|header| header.value.as_str())
    }

    /// 没有稳定 ID 时使用的结构标识
    pub fn same_request(&self, other: &HttpRequest) -> bool {
        self.name == other.name && self.method == other.method && self.url == other.url
    }
}

/// 集合或文件夹下发给其下请求的默认配置
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RequestDefaults {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSetting>,
    #[serde(skip_serializing_if = "ScriptsObject::is_empty")]
    pub scripts: ScriptsObject,
}

impl RequestDefaults {
    pub fn is_empty(&self) -> bool {
        self == &RequestDefaults::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub name: String,
    #[serde(skip_serializing_if = "RequestDefaults::is_empty")]
    pub request: RequestDefaults,
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_collapsed: bool,
}

impl Folder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_defaults(mut self, request: RequestDefaults) -> Self {
        self.request = request;
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }
}

/// 树中的独立脚本文件，运行器不执行
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ScriptFile {
    pub name: String,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Item {
    #[serde(rename = "folder")]
    Folder(Folder),
    #[serde(rename = "http")]
    Http(HttpRequest),
    #[serde(rename = "script")]
    Script(ScriptFile),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.variables.push(Variable::new(name, value));
        self
    }

    /// 启用且有名称的变量，值归约为字符串
    pub fn variable_map(&self) -> VarMap {
        self.variables
            .iter()
            .filter(|variable| !variable.disabled && !variable.name.is_empty())
            .map(|variable| (variable.name.clone(), Value::String(variable.value.resolve())))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CollectionConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<Environment>,
}

/// 根文档：信息、集合级默认配置、环境和条目树
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Collection {
    pub info: CollectionInfo,
    #[serde(skip_serializing_if = "RequestDefaults::is_empty")]
    pub request: RequestDefaults,
    pub config: CollectionConfig,
    pub items: Vec<Item>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: CollectionInfo {
                name: name.into(),
                version: None,
            },
            ..Default::default()
        }
    }

    pub fn with_defaults(mut self, request: RequestDefaults) -> Self {
        self.request = request;
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.config.environments.iter().find(|env| env.name == name)
    }

    /// 按深度优先树顺序列出所有 HTTP 请求
    pub fn requests(&self) -> Vec<&HttpRequest> {
        fn walk<'a>(items: &'a [Item], out: &mut Vec<&'a HttpRequest>) {
            for item in items {
                match item {
                    Item::Http(request) => out.push(request),
                    Item::Folder(folder) => walk(&folder.items, out),
                    Item::Script(_) => {}
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.items, &mut out);
        out
    }

    pub fn find_request(&self, name: &str) -> Option<&HttpRequest> {
        self.requests().into_iter().find(|request| request.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_value_resolve_variants() {
        let text: VariableValue = serde_json::from_value(json!("plain")).unwrap();
        assert_eq!(text.resolve(), "plain");

        let typed: VariableValue =
            serde_json::from_value(json!({"type": "text", "data": "typed"})).unwrap();
        assert_eq!(typed.resolve(), "typed");

        let alternatives: VariableValue = serde_json::from_value(json!([
            {"title": "dev", "value": "one"},
            {"title": "prod", "value": {"type": "text", "data": "two"}, "selected": true}
        ]))
        .unwrap();
        assert_eq!(alternatives.resolve(), "two");

        let number: VariableValue = serde_json::from_value(json!(5)).unwrap();
        assert_eq!(number.resolve(), "5");
    }

    #[test]
    fn test_alternatives_fall_back_to_first() {
        let value: VariableValue =
            serde_json::from_value(json!([{"value": "first"}, {"value": "second"}])).unwrap();
        assert_eq!(value.resolve(), "first");
    }

    #[test]
    fn test_environment_variable_map_skips_disabled() {
        let mut env = Environment::new("dev").with_variable("host", "localhost");
        env.variables.push(Variable::new("token", "secret").disabled());

        let map = env.variable_map();
        assert_eq!(map.get("host"), Some(&json!("localhost")));
        assert!(map.get("token").is_none());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = HttpRequest::new("r", "GET", "http://x").with_header("Content-Type", "a/b");
        assert_eq!(request.content_type(), Some("a/b"));
        assert!(request.header("CONTENT-TYPE").is_some());
    }

    #[test]
    fn test_auth_setting_serialization() {
        assert_eq!(serde_json::to_value(AuthSetting::Inherit).unwrap(), json!("inherit"));
        let bearer = AuthSetting::Configured(Auth::Bearer(BearerAuth {
            token: "t".to_string(),
        }));
        assert_eq!(
            serde_json::to_value(bearer).unwrap(),
            json!({"type": "bearer", "token": "t"})
        );
    }

    #[test]
    fn test_json_body_script_view_parses_data() {
        let body = Body::json(r#"{"a": 1}"#);
        assert_eq!(body.script_view(), json!({"a": 1}));
        assert_eq!(Body::json("not json").script_view(), json!("not json"));
    }

    #[test]
    fn test_requests_in_tree_order() {
        let collection = Collection::new("c")
            .with_item(Item::Http(HttpRequest::new("a", "GET", "/a")))
            .with_item(Item::Folder(
                Folder::new("f").with_item(Item::Http(HttpRequest::new("b", "GET", "/b"))),
            ))
            .with_item(Item::Http(HttpRequest::new("c", "GET", "/c")));

        let names: Vec<_> = collection.requests().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
