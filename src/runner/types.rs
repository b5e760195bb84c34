use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assertion::AssertionResult;
use crate::collection::ScriptFlow;
use crate::http::{ExecutionFailure, HttpResponse};
use crate::model::{Collection, Environment, HttpRequest};
use crate::script::{ResultsResponse, TestResult};
use crate::variable::VarMap;

/// 单次运行的阶段，严格按顺序推进
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    ConfigMerge,
    VariableMerge,
    PreScript,
    Interpolate,
    Execute,
    PostScript,
    Assert,
    TestsScript,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Init => "init",
            RunPhase::ConfigMerge => "config-merge",
            RunPhase::VariableMerge => "variable-merge",
            RunPhase::PreScript => "pre-script",
            RunPhase::Interpolate => "interpolate",
            RunPhase::Execute => "execute",
            RunPhase::PostScript => "post-script",
            RunPhase::Assert => "assert",
            RunPhase::TestsScript => "tests-script",
            RunPhase::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// `run_request` 的输入
///
/// 变量存储以 `&mut` 传入时会被脚本原地修改，调用方可以借此在多次运行之间
/// 共享变量；不传则每次运行使用新的存储。
pub struct RunRequestOptions<'a> {
    pub item: &'a HttpRequest,
    pub collection: &'a Collection,
    pub environment: Option<&'a Environment>,
    /// 环境变量存储；缺省时由 `environment` 生成
    pub environment_variables: Option<&'a mut VarMap>,
    pub runtime_variables: Option<&'a mut VarMap>,
    /// 全局变量存储；缺省时取配置文件中的 `[globals]`
    pub global_variables: Option<&'a mut VarMap>,
    pub prompt_variables: VarMap,
    /// 缺省时读取当前进程的环境变量
    pub process_env: Option<VarMap>,
    /// 超时（毫秒），优先于请求自身的 `settings.timeout` 和配置默认值
    pub timeout_ms: Option<u64>,
    pub validate_ssl: Option<bool>,
    pub collection_path: Option<&'a str>,
    pub script_flow: Option<ScriptFlow>,
}

impl<'a> RunRequestOptions<'a> {
    pub fn new(item: &'a HttpRequest, collection: &'a Collection) -> Self {
        Self {
            item,
            collection,
            environment: None,
            environment_variables: None,
            runtime_variables: None,
            global_variables: None,
            prompt_variables: VarMap::new(),
            process_env: None,
            timeout_ms: None,
            validate_ssl: None,
            collection_path: None,
            script_flow: None,
        }
    }

    pub fn with_environment(mut self, environment: &'a Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_environment_variables(mut self, store: &'a mut VarMap) -> Self {
        self.environment_variables = Some(store);
        self
    }

    pub fn with_runtime_variables(mut self, store: &'a mut VarMap) -> Self {
        self.runtime_variables = Some(store);
        self
    }

    pub fn with_global_variables(mut self, store: &'a mut VarMap) -> Self {
        self.global_variables = Some(store);
        self
    }

    pub fn with_prompt_variables(mut self, vars: VarMap) -> Self {
        self.prompt_variables = vars;
        self
    }

    pub fn with_process_env(mut self, env: VarMap) -> Self {
        self.process_env = Some(env);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_validate_ssl(mut self, validate: bool) -> Self {
        self.validate_ssl = Some(validate);
        self
    }

    pub fn with_collection_path(mut self, path: &'a str) -> Self {
        self.collection_path = Some(path);
        self
    }

    pub fn with_script_flow(mut self, flow: ScriptFlow) -> Self {
        self.script_flow = Some(flow);
        self
    }
}

/// 请求的结局：拿到响应、执行失败，或在发出请求前被中止
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Response(HttpResponse),
    Failed(ExecutionFailure),
    Aborted { error: String },
}

/// 单次运行的完整结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequestResponse {
    pub request_id: String,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion_results: Option<ResultsResponse<AssertionResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<ResultsResponse<TestResult>>,
}

impl RunRequestResponse {
    pub fn aborted(request_id: String, error: impl Into<String>) -> Self {
        Self {
            request_id,
            outcome: RunOutcome::Aborted {
                error: error.into(),
            },
            assertion_results: None,
            test_results: None,
        }
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        match &self.outcome {
            RunOutcome::Response(response) => Some(response),
            _ => None,
        }
    }

    /// 状态码；请求没有完成时为 `None`
    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }

    /// 执行失败或中止时的错误信息
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Response(_) => None,
            RunOutcome::Failed(failure) => Some(&failure.error),
            RunOutcome::Aborted { error } => Some(error),
        }
    }

    pub fn duration(&self) -> u64 {
        match &self.outcome {
            RunOutcome::Response(response) => response.duration,
            RunOutcome::Failed(failure) => failure.duration,
            RunOutcome::Aborted { .. } => 0,
        }
    }

    /// 是否有失败的断言或测试
    pub fn has_failures(&self) -> bool {
        self.assertion_results
            .as_ref()
            .is_some_and(ResultsResponse::has_failures)
            || self
                .test_results
                .as_ref()
                .is_some_and(ResultsResponse::has_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ErrorType;
    use serde_json::json;

    #[test]
    fn test_response_shape_is_flattened() {
        let mut response = HttpResponse::new(200, json!({"ok": true}));
        response.duration = 7;
        let result = RunRequestResponse {
            request_id: "req_1_abc".to_string(),
            outcome: RunOutcome::Response(response),
            assertion_results: None,
            test_results: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["requestId"], json!("req_1_abc"));
        assert_eq!(value["status"], json!(200));
        assert_eq!(value["data"], json!({"ok": true}));
        assert!(value.get("error").is_none());
        assert!(value.get("assertionResults").is_none());
    }

    #[test]
    fn test_failure_shape_has_no_status() {
        let result = RunRequestResponse {
            request_id: "req_1_abc".to_string(),
            outcome: RunOutcome::Failed(ExecutionFailure::new("refused", ErrorType::Network, 3)),
            assertion_results: None,
            test_results: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["errorType"], json!("network"));
        assert!(value.get("status").is_none());
        assert_eq!(result.error(), Some("refused"));
        assert_eq!(result.status(), None);
    }

    #[test]
    fn test_aborted_shape() {
        let result = RunRequestResponse::aborted("req_2_x".to_string(), "Pre-request script error: boom");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"requestId": "req_2_x", "error": "Pre-request script error: boom"})
        );
        assert_eq!(result.duration(), 0);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::PreScript.to_string(), "pre-script");
        assert_eq!(RunPhase::TestsScript.to_string(), "tests-script");
    }
}
