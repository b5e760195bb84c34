use std::error::Error as StdError;
use std::time::Instant;

use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::Result;
use crate::http::request::{PreparedBody, PreparedPart, PreparedRequest};
use crate::http::response::{ExecutionFailure, HttpResponse};
use crate::http::types::{ErrorType, ExecuteOptions};
use crate::model::HttpRequest;

/// 发送插值后的请求
///
/// 持有一个校验证书和一个不校验证书的客户端，
/// 这样 `validate_ssl` 可以按请求选择。
#[derive(Clone)]
pub struct HttpExecutor {
    secure: reqwest::Client,
    insecure: reqwest::Client,
}

impl HttpExecutor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            secure: reqwest::Client::builder().build()?,
            insecure: reqwest::Client::builder()
                .danger_accept_invalid_certs(true)
                .build()?,
        })
    }

    /// 执行请求。失败会被分类后返回，不会作为错误抛出
    pub async fn execute(
        &self,
        request: &HttpRequest,
        options: ExecuteOptions,
    ) -> std::result::Result<HttpResponse, ExecutionFailure> {
        let start = Instant::now();
        let elapsed = || start.elapsed().as_millis() as u64;

        let prepared = PreparedRequest::from_request(request)
            .map_err(|e| ExecutionFailure::new(e.to_string(), ErrorType::Unknown, elapsed()))?;
        debug!(method = %prepared.method, url = %prepared.url, "Sending request");

        let builder = self
            .build(prepared, options)
            .await
            .map_err(|e| ExecutionFailure::new(e, ErrorType::Unknown, elapsed()))?;

        let response = builder
            .send()
            .await
            .map_err(|e| classify(&e, elapsed()))?;

        let status = response.status();
        let headers = HttpResponse::collect_headers(response.headers());
        let url = response.url().to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(&e, elapsed()))?;
        let duration = elapsed();

        let text = String::from_utf8_lossy(&bytes);
        let content_type = headers.get("content-type").map(String::as_str).unwrap_or("");

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            data: HttpResponse::parse_data(content_type, &text),
            size: bytes.len(),
            duration,
            url,
            headers,
        })
    }

    async fn build(
        &self,
        prepared: PreparedRequest,
        options: ExecuteOptions,
    ) -> std::result::Result<reqwest::RequestBuilder, String> {
        let client = if options.validate_ssl {
            &self.secure
        } else {
            &self.insecure
        };
        let method = reqwest::Method::from_bytes(prepared.method.as_bytes())
            .map_err(|_| format!("Invalid HTTP method: {}", prepared.method))?;

        let mut builder = client
            .request(method, prepared.url)
            .timeout(options.timeout);
        for (name, value) in &prepared.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match prepared.body {
            None => builder,
            Some(PreparedBody::Text(text)) => builder.body(text),
            Some(PreparedBody::File { path, content_type }) => {
                let bytes = read_file(&path).await?;
                let builder = builder.body(bytes);
                match content_type {
                    Some(_) => builder,
                    None => builder.header("Content-Type", "application/octet-stream"),
                }
            }
            Some(PreparedBody::Multipart(parts)) => builder.multipart(build_form(parts).await?),
        };
        Ok(builder)
    }
}

async fn read_file(path: &str) -> std::result::Result<Vec<u8>, String> {
    tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read file {path}: {e}"))
}

async fn build_form(parts: Vec<PreparedPart>) -> std::result::Result<Form, String> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            PreparedPart::Text { name, value } => form.text(name, value),
            PreparedPart::File {
                name,
                path,
                content_type,
            } => {
                let bytes = read_file(&path).await?;
                let file_name = std::path::Path::new(&path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.clone());
                let mut file_part = Part::bytes(bytes).file_name(file_name);
                if let Some(content_type) = content_type {
                    file_part = file_part
                        .mime_str(&content_type)
                        .map_err(|e| format!("Invalid content type {content_type}: {e}"))?;
                }
                form.part(name, file_part)
            }
        };
    }
    Ok(form)
}

/// 错误及其全部 source 的完整信息
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

fn looks_like_tls(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["certificate", "ssl", "tls", "handshake"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// 超时信息报告实际耗时，而不是配置的超时时间
fn timed_out(duration: u64) -> ExecutionFailure {
    ExecutionFailure::new(
        format!("Request timed out after {duration}ms"),
        ErrorType::Timeout,
        duration,
    )
}

/// 把传输错误映射到 [`ErrorType`]
///
/// reqwest 把 TLS 失败报告为连接错误，所以要先于一般网络错误判断。
fn classify(err: &reqwest::Error, duration: u64) -> ExecutionFailure {
    let message = error_chain(err);

    if err.is_timeout() {
        return timed_out(duration);
    }

    let error_type = if looks_like_tls(&message) {
        ErrorType::Ssl
    } else if err.is_connect() || err.is_request() {
        ErrorType::Network
    } else {
        ErrorType::Unknown
    };
    ExecutionFailure::new(message, error_type, duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_reports_elapsed_time() {
        let failure = timed_out(213);
        assert_eq!(failure.error, "Request timed out after 213ms");
        assert_eq!(failure.error_type, ErrorType::Timeout);
        assert_eq!(failure.duration, 213);
    }

    #[test]
    fn test_looks_like_tls() {
        assert!(looks_like_tls("invalid peer certificate: UnknownIssuer"));
        assert!(looks_like_tls("received fatal alert: HandshakeFailure"));
        assert!(!looks_like_tls("connection refused"));
    }

    #[test]
    fn test_error_chain_skips_repeated_causes() {
        #[derive(Debug)]
        struct Inner;
        impl std::fmt::Display for Inner {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "connection refused")
            }
        }
        impl StdError for Inner {}

        #[derive(Debug)]
        struct Outer(Inner);
        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "error sending request")
            }
        }
        impl StdError for Outer {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        assert_eq!(
            error_chain(&Outer(Inner)),
            "error sending request: connection refused"
        );
    }
}
