//! 对原始集合文档的结构无关读取
//!
//! 请求有两种结构：分组结构（`info` / `http` / `runtime` / `settings`）
//! 和所有字段都在条目上的旧扁平结构。每个读取函数先查分组位置，再回退到扁平位置。
//! [`Collection::from_value`] 在加载时统一调用它们，模型层之外不再接触原始 JSON。

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{OcrunError, Result};
use crate::model::hydrate;
use crate::model::scripts::{Script, Scripts, scripts_array_to_object, scripts_object_to_array};
use crate::model::types::{
    Assertion, Auth, AuthSetting, Body, Collection, CollectionConfig, CollectionInfo, Environment,
    FileVariant, Folder, FormEntry, Header, HttpRequest, Item, MultipartEntry, Param, RawBodyKind,
    RequestDefaults, RequestSettings, ScriptFile, Variable,
};

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// 先查分组位置，再查扁平位置
fn lookup<'a>(item: &'a Value, group: &str, field: &str) -> Option<&'a Value> {
    present(item.get(group).and_then(|g| g.get(field))).or_else(|| present(item.get(field)))
}

fn parse<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| OcrunError::Collection(format!("{what}: {e}")))
}

fn parse_list<T: DeserializeOwned>(value: Option<&Value>, what: &str) -> Result<Vec<T>> {
    match value {
        None => Ok(Vec::new()),
        Some(list @ Value::Array(_)) => parse(list, what),
        Some(other) => Err(OcrunError::Collection(format!(
            "{what}: expected an array, found {other}"
        ))),
    }
}

pub fn item_type(item: &Value) -> Option<&str> {
    present(item.get("info").and_then(|info| info.get("type")))
        .or_else(|| present(item.get("type")))
        .and_then(Value::as_str)
}

pub fn item_name(item: &Value) -> Option<&str> {
    present(item.get("info").and_then(|info| info.get("name")))
        .or_else(|| present(item.get("name")))
        .and_then(Value::as_str)
}

pub fn http_method(item: &Value) -> String {
    lookup(item, "http", "method")
        .and_then(Value::as_str)
        .filter(|method| !method.is_empty())
        .unwrap_or("GET")
        .to_string()
}

pub fn request_url(item: &Value) -> String {
    ["http", "graphql", "grpc", "websocket"]
        .iter()
        .find_map(|group| {
            present(item.get(*group).and_then(|g| g.get("url")))
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
        })
        .or_else(|| item.get("url").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

pub fn http_headers(item: &Value) -> Result<Vec<Header>> {
    parse_list(lookup(item, "http", "headers"), "headers")
}

pub fn http_params(item: &Value) -> Result<Vec<Param>> {
    parse_list(lookup(item, "http", "params"), "params")
}

/// 把请求体读成唯一的一种 [`Body`]
///
/// 接受带标签的 `{type, data}` 对象、请求体变体数组
/// （`{title, selected, body}`，取 selected 的那个），或旧式的条目数组。
pub fn http_body(item: &Value) -> Result<Option<Body>> {
    match lookup(item, "http", "body") {
        None => Ok(None),
        Some(body) => parse_body(body),
    }
}

fn parse_body(body: &Value) -> Result<Option<Body>> {
    match body {
        Value::Array(entries) if entries.iter().any(|e| e.get("body").is_some()) => {
            let variant = entries
                .iter()
                .find(|e| e.get("selected").and_then(Value::as_bool) == Some(true))
                .or_else(|| entries.first());
            match variant.and_then(|v| present(v.get("body"))) {
                Some(inner) => parse_body(inner),
                None => Ok(None),
            }
        }
        Value::Array(_) => Ok(Some(Body::Entries(parse(body, "body")?))),
        Value::Object(object) => {
            let kind = object.get("type").and_then(Value::as_str).unwrap_or("none");
            let data = object.get("data");
            let text = || {
                data.map(|d| match d {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default()
            };
            let raw = |kind: RawBodyKind| -> Result<Option<Body>> {
                Ok(Some(Body::Raw { kind, data: text() }))
            };
            match kind {
                "json" => raw(RawBodyKind::Json),
                "text" => raw(RawBodyKind::Text),
                "xml" => raw(RawBodyKind::Xml),
                "sparql" => raw(RawBodyKind::Sparql),
                "form-urlencoded" => Ok(Some(Body::FormUrlEncoded(parse_list::<FormEntry>(
                    data,
                    "form-urlencoded body",
                )?))),
                "multipart-form" => Ok(Some(Body::Multipart(parse_list::<MultipartEntry>(
                    data,
                    "multipart body",
                )?))),
                "file" => Ok(Some(Body::File(parse_list::<FileVariant>(
                    data,
                    "file body",
                )?))),
                "none" => Ok(None),
                other => {
                    warn!(body_type = other, "Ignoring body of unsupported type");
                    Ok(None)
                }
            }
        }
        Value::String(text) if !text.is_empty() => Ok(Some(Body::text(text.clone()))),
        _ => Ok(None),
    }
}

/// `"inherit"` 映射为 [`AuthSetting::Inherit`]；无法识别的认证类型视为未设置。
pub fn request_auth(item: &Value) -> Option<AuthSetting> {
    let auth = present(item.get("runtime").and_then(|r| r.get("auth")))
        .or_else(|| present(item.get("http").and_then(|h| h.get("auth"))))
        .or_else(|| present(item.get("auth")))?;
    parse_auth(auth)
}

fn parse_auth(auth: &Value) -> Option<AuthSetting> {
    match auth {
        Value::String(mode) if mode == "inherit" => Some(AuthSetting::Inherit),
        Value::String(mode) if mode == "none" => Some(AuthSetting::Configured(Auth::None)),
        Value::Object(_) => match serde_json::from_value::<Auth>(auth.clone()) {
            Ok(auth) => Some(AuthSetting::Configured(auth)),
            Err(e) => {
                warn!(error = %e, "Ignoring unrecognised auth configuration");
                None
            }
        },
        _ => None,
    }
}

pub fn request_variables(item: &Value) -> Result<Vec<Variable>> {
    parse_list(lookup(item, "runtime", "variables"), "variables")
}

pub fn request_assertions(item: &Value) -> Result<Vec<Assertion>> {
    parse_list(lookup(item, "runtime", "assertions"), "assertions")
}

/// 以数组形式返回脚本，无论文档用哪种结构存储
pub fn request_scripts(item: &Value) -> Result<Vec<Script>> {
    match lookup(item, "runtime", "scripts") {
        None => Ok(Vec::new()),
        Some(value) => match parse::<Scripts>(value, "scripts")? {
            Scripts::List(list) => Ok(list),
            Scripts::Object(object) => Ok(scripts_object_to_array(&object)),
        },
    }
}

pub fn request_settings(item: &Value) -> RequestSettings {
    let timeout_ms = present(item.get("settings").and_then(|s| s.get("timeout")))
        .and_then(Value::as_u64)
        .filter(|ms| *ms > 0);
    RequestSettings { timeout_ms }
}

fn request_id(item: &Value) -> Option<Uuid> {
    ["id", "uid"]
        .iter()
        .filter_map(|key| item.get(*key).and_then(Value::as_str))
        .find_map(|raw| Uuid::parse_str(raw).ok())
}

fn request_defaults(block: Option<&Value>) -> Result<RequestDefaults> {
    let Some(block) = present(block) else {
        return Ok(RequestDefaults::default());
    };
    Ok(RequestDefaults {
        headers: http_headers(block)?,
        variables: request_variables(block)?,
        auth: request_auth(block),
        scripts: scripts_array_to_object(&request_scripts(block)?),
    })
}

fn http_request(item: &Value) -> Result<HttpRequest> {
    let name = item_name(item).unwrap_or_default().to_string();
    let wrap = |e: OcrunError| match e {
        OcrunError::Collection(msg) => OcrunError::Collection(format!("request '{name}': {msg}")),
        other => other,
    };
    Ok(HttpRequest {
        id: request_id(item),
        name: name.clone(),
        method: http_method(item),
        url: request_url(item),
        headers: http_headers(item).map_err(wrap)?,
        params: http_params(item).map_err(wrap)?,
        body: http_body(item).map_err(wrap)?,
        auth: request_auth(item),
        variables: request_variables(item).map_err(wrap)?,
        assertions: request_assertions(item).map_err(wrap)?,
        scripts: scripts_array_to_object(&request_scripts(item).map_err(wrap)?),
        settings: request_settings(item),
    })
}

fn parse_items(items: Option<&Value>) -> Result<Vec<Item>> {
    let Some(items) = present(items) else {
        return Ok(Vec::new());
    };
    let Some(items) = items.as_array() else {
        return Err(OcrunError::Collection("items: expected an array".to_string()));
    };

    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        match item_type(item) {
            Some("folder") => parsed.push(Item::Folder(Folder {
                name: item_name(item).unwrap_or_default().to_string(),
                request: request_defaults(item.get("request"))?,
                items: parse_items(item.get("items"))?,
                is_collapsed: item
                    .get("isCollapsed")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })),
            Some("http") => parsed.push(Item::Http(http_request(item)?)),
            Some("script") => parsed.push(Item::Script(ScriptFile {
                name: item_name(item).unwrap_or_default().to_string(),
                script: ["script", "code"]
                    .iter()
                    .find_map(|key| item.get(*key).and_then(Value::as_str))
                    .unwrap_or_default()
                    .to_string(),
            })),
            other => debug!(item_type = ?other, "Skipping unsupported item"),
        }
    }
    Ok(parsed)
}

impl Collection {
    /// 从原始文档构建规范模型并分配请求 ID
    pub fn from_value(doc: &Value) -> Result<Self> {
        if !doc.is_object() {
            return Err(OcrunError::Collection(
                "document root must be an object".to_string(),
            ));
        }

        let info = doc.get("info");
        let environments = present(doc.get("config").and_then(|c| c.get("environments")))
            .or_else(|| present(doc.get("environments")));

        let mut collection = Collection {
            info: CollectionInfo {
                name: info
                    .and_then(|i| i.get("name"))
                    .or_else(|| doc.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                version: info
                    .and_then(|i| i.get("version"))
                    .or_else(|| doc.get("version"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            request: request_defaults(doc.get("request"))?,
            config: CollectionConfig {
                environments: parse_list::<Environment>(environments, "environments")?,
            },
            items: parse_items(doc.get("items"))?,
        };
        hydrate::assign_ids(&mut collection);
        Ok(collection)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(text)?;
        Self::from_value(&doc)
    }

    /// 本集合的扁平结构文档
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
