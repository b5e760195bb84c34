use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::Url;
use url::form_urlencoded;

use crate::error::{OcrunError, Result};
use crate::http::types::method_sends_body;
use crate::model::{
    ApiKeyPlacement, Auth, AuthSetting, Body, FileVariant, HttpRequest, MultipartEntry,
    MultipartKind, Param, ParamType,
};

const CONTENT_TYPE: &str = "Content-Type";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// multipart 请求体的一个部分，文件内容在发送时才读取
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedPart {
    Text { name: String, value: String },
    File {
        name: String,
        path: String,
        content_type: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedBody {
    Text(String),
    Multipart(Vec<PreparedPart>),
    File {
        path: String,
        content_type: Option<String>,
    },
}

/// 插值后请求的线路层视图
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<PreparedBody>,
}

impl PreparedRequest {
    pub fn from_request(request: &HttpRequest) -> Result<Self> {
        let method = request.method.to_ascii_uppercase();
        let mut headers = build_headers(request);
        let mut url = build_url(request)?;

        if let Some(AuthSetting::Configured(auth)) = &request.auth {
            apply_auth(auth, &mut headers, &mut url);
        }

        let body = match &request.body {
            Some(body) if method_sends_body(&method) => build_body(body, &mut headers),
            _ => None,
        };

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// 设置请求头，替换同名的已有请求头
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value));
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
}

fn build_headers(request: &HttpRequest) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .filter(|h| !h.disabled && !h.name.trim().is_empty() && !h.value.is_empty())
        .map(|h| (h.name.clone(), h.value.clone()))
        .collect();

    if request.body.as_ref().is_some_and(Body::is_json) && !has_header(&headers, CONTENT_TYPE) {
        headers.push((CONTENT_TYPE.to_string(), "application/json".to_string()));
    }
    headers
}

fn normalize_url(raw: &str) -> String {
    let input = raw.trim();
    if input.contains("://") {
        input.to_string()
    } else if input.starts_with(':') {
        format!("http://localhost{input}")
    } else {
        format!("http://{input}")
    }
}

/// 用同名的 path 参数替换 `:name` 路径段
fn substitute_path_params(raw: &str, params: &[&Param]) -> String {
    let split = raw.find(['?', '#']).unwrap_or(raw.len());
    let (path, rest) = raw.split_at(split);
    let path = path
        .split('/')
        .map(|segment| {
            segment
                .strip_prefix(':')
                .and_then(|name| params.iter().find(|p| p.name == name))
                .map_or(segment, |p| p.value.as_str())
        })
        .collect::<Vec<_>>()
        .join("/");
    format!("{path}{rest}")
}

fn build_url(request: &HttpRequest) -> Result<Url> {
    let enabled = || request.params.iter().filter(|p| !p.disabled && !p.name.is_empty());

    let path_params: Vec<&Param> = enabled().filter(|p| p.kind == ParamType::Path).collect();
    let raw = if path_params.is_empty() {
        request.url.clone()
    } else {
        substitute_path_params(&request.url, &path_params)
    };

    let mut url = Url::parse(&normalize_url(&raw))
        .map_err(|e| OcrunError::InvalidUrl(format!("{}: {}", request.url, e)))?;

    let existing: Vec<String> = url.query_pairs().map(|(name, _)| name.into_owned()).collect();
    let missing: Vec<_> = enabled()
        .filter(|p| p.kind == ParamType::Query && !existing.contains(&p.name))
        .collect();
    if !missing.is_empty() {
        let mut query = url.query_pairs_mut();
        for param in missing {
            query.append_pair(&param.name, &param.value);
        }
    }

    Ok(url)
}

/// Digest、NTLM、WSSE 和 AWS 凭据不会签名到请求上。
fn apply_auth(auth: &Auth, headers: &mut Vec<(String, String)>, url: &mut Url) {
    match auth {
        Auth::Basic(basic) if !basic.username.is_empty() && !basic.password.is_empty() => {
            let credentials = STANDARD.encode(format!("{}:{}", basic.username, basic.password));
            set_header(headers, "Authorization", format!("Basic {credentials}"));
        }
        Auth::Bearer(bearer) if !bearer.token.is_empty() => {
            set_header(headers, "Authorization", format!("Bearer {}", bearer.token));
        }
        Auth::ApiKey(key) if !key.key.is_empty() && !key.value.is_empty() => match key.placement {
            ApiKeyPlacement::Header => set_header(headers, &key.key, key.value.clone()),
            ApiKeyPlacement::Query => {
                url.query_pairs_mut().append_pair(&key.key, &key.value);
            }
        },
        _ => {}
    }
}

fn urlencode<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in pairs {
        serializer.append_pair(name, value);
    }
    serializer.finish()
}

fn multipart_parts(entries: &[MultipartEntry]) -> Vec<PreparedPart> {
    entries
        .iter()
        .filter(|e| !e.disabled && !e.name.is_empty())
        .flat_map(|entry| {
            entry.value.values().into_iter().map(move |value| match entry.kind {
                MultipartKind::Text => PreparedPart::Text {
                    name: entry.name.clone(),
                    value: value.to_string(),
                },
                MultipartKind::File => PreparedPart::File {
                    name: entry.name.clone(),
                    path: value.to_string(),
                    content_type: entry.content_type.clone(),
                },
            })
        })
        .collect()
}

fn selected_file(variants: &[FileVariant]) -> Option<&FileVariant> {
    variants
        .iter()
        .find(|v| v.selected)
        .or_else(|| variants.first())
        .filter(|v| !v.file_path.is_empty())
}

fn build_body(body: &Body, headers: &mut Vec<(String, String)>) -> Option<PreparedBody> {
    match body {
        Body::Raw { data, .. } => Some(PreparedBody::Text(data.clone())),
        Body::FormUrlEncoded(entries) => {
            if !has_header(headers, CONTENT_TYPE) {
                headers.push((CONTENT_TYPE.to_string(), FORM_URLENCODED.to_string()));
            }
            Some(PreparedBody::Text(urlencode(
                entries
                    .iter()
                    .filter(|e| !e.disabled && !e.name.is_empty())
                    .map(|e| (e.name.as_str(), e.value.as_str())),
            )))
        }
        Body::Entries(entries)
            if headers.iter().any(|(key, value)| {
                key.eq_ignore_ascii_case(CONTENT_TYPE) && value.contains(FORM_URLENCODED)
            }) =>
        {
            Some(PreparedBody::Text(urlencode(
                entries
                    .iter()
                    .filter(|e| !e.disabled && !e.name.is_empty())
                    .flat_map(|e| e.value.values().into_iter().map(|v| (e.name.as_str(), v))),
            )))
        }
        Body::Multipart(entries) | Body::Entries(entries) => {
            // multipart boundary 由编码器生成
            headers.retain(|(key, _)| !key.eq_ignore_ascii_case(CONTENT_TYPE));
            Some(PreparedBody::Multipart(multipart_parts(entries)))
        }
        Body::File(variants) => selected_file(variants).map(|file| {
            if !file.content_type.is_empty() && !has_header(headers, CONTENT_TYPE) {
                headers.push((CONTENT_TYPE.to_string(), file.content_type.clone()));
            }
            PreparedBody::File {
                path: file.file_path.clone(),
                content_type: (!file.content_type.is_empty()).then(|| file.content_type.clone()),
            }
        }),
    }
}
