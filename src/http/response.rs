use std::collections::BTreeMap;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::http::types::ErrorType;

/// 规范化后的 HTTP 响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// 小写的头名称；重复的头以 ", " 拼接
    pub headers: BTreeMap<String, String>,
    /// JSON 响应解析为值，其余为文本
    pub data: Value,
    /// 响应体字节数
    pub size: usize,
    /// 耗时（毫秒）
    pub duration: u64,
    pub url: String,
}

impl HttpResponse {
    pub fn new(status: u16, data: Value) -> Self {
        Self {
            status,
            status_text: reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            headers: BTreeMap::new(),
            data,
            size: 0,
            duration: 0,
            url: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..=499).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..=599).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 把 reqwest 的头转换为小写名称的映射
    pub fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
        let mut map: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            map.entry(name.as_str().to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        map
    }

    /// 按 content-type 解析响应体
    pub fn parse_data(content_type: &str, text: &str) -> Value {
        if content_type.contains("application/json") {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        } else {
            Value::String(text.to_string())
        }
    }

    /// 脚本和断言中 `res` 看到的结构
    pub fn script_view(&self) -> Value {
        json!({
            "status": self.status,
            "statusText": self.status_text,
            "headers": self.headers,
            "body": self.data,
            "responseTime": self.duration,
            "size": self.size,
            "url": self.url,
        })
    }
}

/// 请求没有拿到响应时的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailure {
    pub error: String,
    pub error_type: ErrorType,
    pub duration: u64,
}

impl ExecutionFailure {
    pub fn new(error: impl Into<String>, error_type: ErrorType, duration: u64) -> Self {
        Self {
            error: error.into(),
            error_type,
            duration,
        }
    }

    /// 失败时 `res` 看到的结构：没有状态码，只有错误信息
    pub fn script_view(&self) -> Value {
        json!({
            "status": null,
            "statusText": null,
            "headers": {},
            "body": null,
            "responseTime": self.duration,
            "size": 0,
            "url": null,
            "error": self.error,
            "errorType": self.error_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, SET_COOKIE};

    #[test]
    fn test_parse_data_by_content_type() {
        assert_eq!(
            HttpResponse::parse_data("application/json; charset=utf-8", r#"{"ok":true}"#),
            json!({"ok": true})
        );
        assert_eq!(
            HttpResponse::parse_data("application/json", "not json"),
            json!("not json")
        );
        assert_eq!(
            HttpResponse::parse_data("text/plain", r#"{"ok":true}"#),
            json!(r#"{"ok":true}"#)
        );
    }

    #[test]
    fn test_collect_headers_joins_duplicates() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        headers.insert("x-trace", HeaderValue::from_static("abc"));

        let map = HttpResponse::collect_headers(&headers);
        assert_eq!(map.get("set-cookie").map(String::as_str), Some("a=1, b=2"));
        assert_eq!(map.get("x-trace").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_status_helpers() {
        let ok = HttpResponse::new(200, Value::Null);
        assert!(ok.is_success());
        assert_eq!(ok.status_text, "OK");

        let missing = HttpResponse::new(404, Value::Null);
        assert!(missing.is_client_error());
        assert_eq!(missing.status_text, "Not Found");
        assert!(HttpResponse::new(503, Value::Null).is_server_error());
    }

    #[test]
    fn test_failure_serializes_camel_case() {
        let failure = ExecutionFailure::new("boom", ErrorType::Network, 12);
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({"error": "boom", "errorType": "network", "duration": 12})
        );
    }
}
