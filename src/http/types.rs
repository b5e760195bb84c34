use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 请求失败的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// 超时，请求被中止
    Timeout,
    /// 跨域拦截。仅为兼容结果格式而保留，本地执行不会产生
    Cors,
    /// 连接失败、DNS 解析失败等
    Network,
    /// TLS 握手或证书校验失败
    Ssl,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Timeout => "timeout",
            ErrorType::Cors => "cors",
            ErrorType::Network => "network",
            ErrorType::Ssl => "ssl",
            ErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次执行的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub timeout: Duration,
    pub validate_ssl: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(crate::variable::DEFAULT_TIMEOUT_MS),
            validate_ssl: true,
        }
    }
}

/// 只有这些方法会发送请求体
pub fn method_sends_body(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "POST" | "PUT" | "PATCH"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ErrorType::Timeout).unwrap(),
            "\"timeout\""
        );
        assert_eq!(ErrorType::Ssl.to_string(), "ssl");
    }

    #[test]
    fn test_method_sends_body() {
        assert!(method_sends_body("post"));
        assert!(method_sends_body("PATCH"));
        assert!(!method_sends_body("GET"));
        assert!(!method_sends_body("DELETE"));
    }
}
