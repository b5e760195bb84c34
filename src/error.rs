use thiserror::Error;

use crate::script::ScriptError;

#[derive(Error, Debug)]
pub enum OcrunError {
    #[error("invalid collection document: {0}")]
    Collection(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for OcrunError {
    fn from(err: anyhow::Error) -> Self {
        OcrunError::Other(err.to_string())
    }
}

impl From<toml::de::Error> for OcrunError {
    fn from(err: toml::de::Error) -> Self {
        OcrunError::Config(err.to_string())
    }
}

/// ocrun 的 Result 类型
pub type Result<T> = std::result::Result<T, OcrunError>;
