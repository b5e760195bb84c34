use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use crate::assertion::AssertionResult;
use crate::model::HttpRequest;
use crate::script::engine::{BoaEngine, ScriptEngine};
use crate::script::types::{ConsoleEntry, ResultsResponse, SandboxInput, TestResult};
use crate::script::ScriptError;
use crate::variable::VarMap;

/// 脚本可以修改的变量桶
///
/// 即使脚本随后抛错，已写入的值也会保留，与脚本看到的原地修改一致。
pub struct VariableStores<'a> {
    pub environment: &'a mut VarMap,
    pub runtime: &'a mut VarMap,
    pub global: &'a mut VarMap,
}

/// 一次脚本运行的输入
#[derive(Clone, Copy)]
pub struct RunScriptOptions<'a> {
    pub script: &'a str,
    pub request: Option<&'a HttpRequest>,
    pub timeout_ms: u64,
    pub response: Option<&'a Value>,
    pub assertion_results: &'a [AssertionResult],
    pub env_name: Option<&'a str>,
    pub collection_name: Option<&'a str>,
    pub collection_path: Option<&'a str>,
    pub process_env: Option<&'a VarMap>,
}

impl<'a> RunScriptOptions<'a> {
    pub fn new(script: &'a str) -> Self {
        Self {
            script,
            request: None,
            timeout_ms: 0,
            response: None,
            assertion_results: &[],
            env_name: None,
            collection_name: None,
            collection_path: None,
            process_env: None,
        }
    }

    pub fn with_request(mut self, request: &'a HttpRequest, timeout_ms: u64) -> Self {
        self.request = Some(request);
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_response(mut self, response: &'a Value) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_assertion_results(mut self, results: &'a [AssertionResult]) -> Self {
        self.assertion_results = results;
        self
    }

    pub fn with_env_name(mut self, name: Option<&'a str>) -> Self {
        self.env_name = name;
        self
    }

    pub fn with_collection(mut self, name: &'a str, path: Option<&'a str>) -> Self {
        self.collection_name = Some(name);
        self.collection_path = path;
        self
    }

    pub fn with_process_env(mut self, env: &'a VarMap) -> Self {
        self.process_env = Some(env);
        self
    }
}

/// 脚本结束后留下的结果
#[derive(Debug, Clone, Default)]
pub struct BruHandle {
    pub tests: Vec<TestResult>,
    pub assertions: Vec<AssertionResult>,
    pub logs: Vec<ConsoleEntry>,
}

impl BruHandle {
    pub fn test_results(&self) -> ResultsResponse<TestResult> {
        ResultsResponse::new(self.tests.clone())
    }

    pub fn assertion_results(&self) -> ResultsResponse<AssertionResult> {
        ResultsResponse::new(self.assertions.clone())
    }
}

/// 脚本中 `req` 暴露的内容
pub fn request_view(request: &HttpRequest, timeout_ms: u64) -> Value {
    let headers: Map<String, Value> = request
        .headers
        .iter()
        .filter(|header| !header.disabled && !header.name.is_empty())
        .map(|header| (header.name.clone(), Value::String(header.value.clone())))
        .collect();

    json!({
        "name": request.name,
        "url": request.url,
        "method": request.method.to_uppercase(),
        "headers": headers,
        "body": request.body.as_ref().map(|body| body.script_view()),
        "timeout": timeout_ms,
    })
}

/// 在阻塞线程上运行脚本，并把变量修改写回调用方的存储
#[derive(Clone)]
pub struct ScriptRuntime {
    engine: Arc<dyn ScriptEngine>,
}

impl Default for ScriptRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRuntime {
    pub fn new() -> Self {
        Self::with_engine(Arc::new(BoaEngine::new()))
    }

    pub fn with_engine(engine: Arc<dyn ScriptEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> Arc<dyn ScriptEngine> {
        Arc::clone(&self.engine)
    }

    pub async fn run_script(
        &self,
        options: RunScriptOptions<'_>,
        stores: VariableStores<'_>,
    ) -> Result<BruHandle, ScriptError> {
        if options.script.trim().is_empty() {
            return Ok(BruHandle::default());
        }

        let input = SandboxInput {
            env: stores.environment.clone(),
            runtime: stores.runtime.clone(),
            globals: stores.global.clone(),
            process_env: options.process_env.cloned().unwrap_or_default(),
            env_name: options.env_name.map(str::to_string),
            collection_name: options.collection_name.map(str::to_string),
            collection_path: options.collection_path.map(str::to_string),
            request: options
                .request
                .map(|request| request_view(request, options.timeout_ms)),
            response: options.response.cloned(),
            assertion_results: options
                .assertion_results
                .iter()
                .filter_map(|result| serde_json::to_value(result).ok())
                .collect(),
            scope: VarMap::new(),
        };

        let engine = self.engine();
        let script = options.script.to_string();
        let output = tokio::task::spawn_blocking(move || engine.execute(&script, &input))
            .await
            .map_err(|e| ScriptError::Engine(e.to_string()))??;

        for entry in &output.logs {
            emit_console(entry);
        }

        *stores.environment = output.env;
        *stores.runtime = output.runtime;
        *stores.global = output.globals;

        if let Some(thrown) = output.error {
            return Err(ScriptError::from_thrown(thrown));
        }
        if !output.settled {
            return Err(ScriptError::Unsettled);
        }

        debug!(tests = output.test_results.len(), "Script finished");
        Ok(BruHandle {
            tests: output.test_results,
            assertions: options.assertion_results.to_vec(),
            logs: output.logs,
        })
    }
}

fn emit_console(entry: &ConsoleEntry) {
    match entry.level.as_str() {
        "error" => error!(target: "ocrun::script", "{}", entry.message),
        "warn" => warn!(target: "ocrun::script", "{}", entry.message),
        "debug" => debug!(target: "ocrun::script", "{}", entry.message),
        _ => info!(target: "ocrun::script", "{}", entry.message),
    }
}
