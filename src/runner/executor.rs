use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::assertion::{AssertRuntime, AssertionContext, AssertionResult};
use crate::collection::{MergedVariables, merge_variables, preprocess_request, resolve_path_to_item};
use crate::http::{ExecuteOptions, HttpExecutor};
use crate::model::{Environment, HttpRequest, generate_id};
use crate::runner::types::{RunOutcome, RunPhase, RunRequestOptions, RunRequestResponse};
use crate::script::{
    BoaEngine, ResultsResponse, RunScriptOptions, ScriptEngine, ScriptRuntime, VariableStores,
    request_view,
};
use crate::variable::{RunnerConfig, VarMap, VariableSources, interpolate_request, process_env};

/// 一次运行中各作用域的变量
struct Scopes<'s> {
    global: &'s mut VarMap,
    environment: &'s mut VarMap,
    runtime: &'s mut VarMap,
    merged: MergedVariables,
    prompt: VarMap,
}

impl Scopes<'_> {
    /// 当前时刻的变量快照（脚本修改之后再取会看到新值）
    fn sources(&self, process_env: &VarMap) -> VariableSources {
        VariableSources {
            global: self.global.clone(),
            collection: self.merged.collection.clone(),
            environment: self.environment.clone(),
            folder: self.merged.folder.clone(),
            request: self.merged.request.clone(),
            oauth2: VarMap::new(),
            runtime: self.runtime.clone(),
            prompt: self.prompt.clone(),
            process_env: process_env.clone(),
        }
    }

    fn stores(&mut self) -> VariableStores<'_> {
        VariableStores {
            environment: &mut *self.environment,
            runtime: &mut *self.runtime,
            global: &mut *self.global,
        }
    }
}

/// 请求运行器：按固定阶段完成一次请求的全部生命周期
///
/// 运行之间不保留状态，可以同时执行多个 `run_request`。
#[derive(Clone)]
pub struct RequestRunner {
    executor: HttpExecutor,
    scripts: ScriptRuntime,
    assertions: AssertRuntime,
    config: RunnerConfig,
}

impl RequestRunner {
    pub fn new() -> Result<Self> {
        Self::with_config(RunnerConfig::default())
    }

    pub fn with_config(config: RunnerConfig) -> Result<Self> {
        Self::with_engine(config, Arc::new(BoaEngine::new()))
    }

    /// 使用指定的脚本引擎
    pub fn with_engine(config: RunnerConfig, engine: Arc<dyn ScriptEngine>) -> Result<Self> {
        Ok(Self {
            executor: HttpExecutor::new()?,
            scripts: ScriptRuntime::with_engine(Arc::clone(&engine)),
            assertions: AssertRuntime::new(engine),
            config,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// 执行单个请求
    ///
    /// 只有前置脚本失败会中止运行；其余阶段的错误都记录在返回结果中。
    pub async fn run_request(&self, options: RunRequestOptions<'_>) -> RunRequestResponse {
        let request_id = generate_id("req");
        let RunRequestOptions {
            item,
            collection,
            environment,
            environment_variables,
            runtime_variables,
            global_variables,
            prompt_variables,
            process_env: process_vars,
            timeout_ms,
            validate_ssl,
            collection_path,
            script_flow,
        } = options;
        enter(&request_id, RunPhase::Init);

        let mut own_environment;
        let environment_store = match environment_variables {
            Some(store) => store,
            None => {
                own_environment = environment.map(Environment::variable_map).unwrap_or_default();
                &mut own_environment
            }
        };
        let mut own_runtime;
        let runtime_store = match runtime_variables {
            Some(store) => store,
            None => {
                own_runtime = VarMap::new();
                &mut own_runtime
            }
        };
        let mut own_global;
        let global_store = match global_variables {
            Some(store) => store,
            None => {
                own_global = self.config.global_variables();
                &mut own_global
            }
        };
        let process_vars = process_vars.unwrap_or_else(process_env);

        enter(&request_id, RunPhase::ConfigMerge);
        let flow = script_flow.unwrap_or(self.config.runner.script_flow);
        let mut processed = preprocess_request(collection, item, flow);

        enter(&request_id, RunPhase::VariableMerge);
        let path = resolve_path_to_item(collection, item);
        let merged = merge_variables(collection, &processed, &path);
        processed.variables = merged.variables.clone();

        let mut scopes = Scopes {
            global: global_store,
            environment: environment_store,
            runtime: runtime_store,
            merged,
            prompt: prompt_variables,
        };

        let timeout_ms = timeout_ms
            .or(processed.settings.timeout_ms)
            .unwrap_or(self.config.runner.timeout_ms);
        let env_name = environment.map(|env| env.name.as_str());
        let script_base = |script| {
            RunScriptOptions::new(script)
                .with_collection(&collection.info.name, collection_path)
                .with_env_name(env_name)
                .with_process_env(&process_vars)
        };

        if let Some(script) = non_empty(&processed.scripts.pre_request) {
            enter(&request_id, RunPhase::PreScript);
            let options = script_base(script).with_request(&processed, timeout_ms);
            if let Err(err) = self.scripts.run_script(options, scopes.stores()).await {
                error!(request_id = %request_id, error = %err, "Pre-request script failed");
                return RunRequestResponse::aborted(
                    request_id,
                    format!("Pre-request script error: {err}"),
                );
            }
        }

        enter(&request_id, RunPhase::Interpolate);
        let interpolated = interpolate_request(&processed, &scopes.sources(&process_vars));

        enter(&request_id, RunPhase::Execute);
        let execute_options = ExecuteOptions {
            timeout: Duration::from_millis(timeout_ms),
            validate_ssl: validate_ssl.unwrap_or(self.config.runner.validate_ssl),
        };
        let outcome = match self.executor.execute(&interpolated, execute_options).await {
            Ok(response) => RunOutcome::Response(response),
            Err(failure) => {
                debug!(
                    request_id = %request_id,
                    error_type = %failure.error_type,
                    error = %failure.error,
                    "Request did not complete"
                );
                RunOutcome::Failed(failure)
            }
        };
        let response_view = match &outcome {
            RunOutcome::Response(response) => response.script_view(),
            RunOutcome::Failed(failure) => failure.script_view(),
            RunOutcome::Aborted { .. } => Value::Null,
        };

        if let Some(script) = non_empty(&processed.scripts.post_response) {
            enter(&request_id, RunPhase::PostScript);
            let options = script_base(script)
                .with_request(&interpolated, timeout_ms)
                .with_response(&response_view);
            if let Err(err) = self.scripts.run_script(options, scopes.stores()).await {
                warn!(request_id = %request_id, error = %err, "Post-response script error");
            }
        }

        let mut standalone: Option<Vec<AssertionResult>> = None;
        if !processed.assertions.is_empty() {
            enter(&request_id, RunPhase::Assert);
            let context = AssertionContext::new(scopes.sources(&process_vars))
                .with_request(request_view(&interpolated, timeout_ms))
                .with_response(response_view.clone());
            match self.run_assertions(&processed, context).await {
                Ok(results) => standalone = Some(results),
                Err(err) => warn!(request_id = %request_id, error = %err, "Assertion error"),
            }
        }

        let mut assertion_results = None;
        let mut test_results = None;
        if let Some(script) = non_empty(&processed.scripts.tests) {
            enter(&request_id, RunPhase::TestsScript);
            let options = script_base(script)
                .with_request(&interpolated, timeout_ms)
                .with_response(&response_view)
                .with_assertion_results(standalone.as_deref().unwrap_or_default());
            match self.scripts.run_script(options, scopes.stores()).await {
                Ok(handle) => {
                    test_results = Some(handle.test_results());
                    assertion_results = Some(handle.assertion_results());
                }
                Err(err) => warn!(request_id = %request_id, error = %err, "Tests script error"),
            }
        }
        if assertion_results.is_none() {
            assertion_results = standalone.map(ResultsResponse::new);
        }

        enter(&request_id, RunPhase::Done);
        let result = RunRequestResponse {
            request_id,
            outcome,
            assertion_results,
            test_results,
        };
        info!(
            request_id = %result.request_id,
            request = %item.name,
            status = ?result.status(),
            duration_ms = result.duration(),
            "Request finished"
        );
        result
    }

    /// 断言会多次调用脚本引擎，放到阻塞线程池执行
    async fn run_assertions(
        &self,
        request: &HttpRequest,
        context: AssertionContext,
    ) -> std::result::Result<Vec<AssertionResult>, tokio::task::JoinError> {
        let runtime = self.assertions.clone();
        let assertions = request.assertions.clone();
        tokio::task::spawn_blocking(move || runtime.run_assertions(&assertions, &context)).await
    }
}

fn enter(request_id: &str, phase: RunPhase) {
    debug!(request_id = %request_id, phase = %phase, "Entering phase");
}

fn non_empty(script: &Option<String>) -> Option<&str> {
    script
        .as_deref()
        .filter(|code| !code.trim().is_empty())
}
