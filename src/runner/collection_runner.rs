use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::model::{Collection, Environment};
use crate::runner::executor::RequestRunner;
use crate::runner::types::{RunOutcome, RunRequestOptions, RunRequestResponse};
use crate::variable::VarMap;

/// 运行整个集合（或其中一个请求）时的选项
#[derive(Default)]
pub struct CollectionRunOptions<'a> {
    pub environment: Option<&'a Environment>,
    /// 只运行同名请求
    pub request_name: Option<&'a str>,
    pub prompt_variables: VarMap,
    pub process_env: Option<VarMap>,
    pub timeout_ms: Option<u64>,
    pub validate_ssl: Option<bool>,
    pub collection_path: Option<&'a str>,
}

/// 单个请求在集合运行中的记录
#[derive(Debug, Clone)]
pub struct RequestRun {
    pub name: String,
    pub method: String,
    pub url: String,
    pub result: RunRequestResponse,
}

impl RequestRun {
    /// 请求完成且断言、测试全部通过
    pub fn passed(&self) -> bool {
        self.result.error().is_none() && !self.result.has_failures()
    }
}

/// 集合运行摘要
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub requests: usize,
    /// 拿到了 HTTP 响应的请求数
    pub completed: usize,
    /// 执行失败或被前置脚本中止的请求数
    pub errored: usize,
    pub assertions_passed: usize,
    pub assertions_failed: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub tests_skipped: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn from_runs(runs: &[RequestRun], duration: Duration) -> Self {
        let mut summary = RunSummary {
            requests: runs.len(),
            duration,
            ..Default::default()
        };

        for run in runs {
            match run.result.outcome {
                RunOutcome::Response(_) => summary.completed += 1,
                _ => summary.errored += 1,
            }
            if let Some(assertions) = &run.result.assertion_results {
                summary.assertions_passed += assertions.summary.passed;
                summary.assertions_failed += assertions.summary.failed;
            }
            if let Some(tests) = &run.result.test_results {
                summary.tests_passed += tests.summary.passed;
                summary.tests_failed += tests.summary.failed;
                summary.tests_skipped += tests.summary.skipped;
            }
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.errored == 0 && self.assertions_failed == 0 && self.tests_failed == 0
    }
}

/// 集合运行的完整结果
#[derive(Debug, Clone)]
pub struct CollectionRunResult {
    pub runs: Vec<RequestRun>,
    pub summary: RunSummary,
    /// 运行结束时的运行时变量
    pub runtime_variables: VarMap,
    pub environment_variables: VarMap,
}

/// 按树顺序（深度优先）依次运行集合中的请求
///
/// 运行时变量、环境变量和全局变量在请求之间共享，前一个请求脚本写入的值对后续请求可见。
pub struct CollectionRunner {
    runner: RequestRunner,
}

impl CollectionRunner {
    pub fn new(runner: RequestRunner) -> Self {
        Self { runner }
    }

    pub async fn run(
        &self,
        collection: &Collection,
        options: CollectionRunOptions<'_>,
    ) -> CollectionRunResult {
        let start = Instant::now();
        let requests: Vec<_> = collection
            .requests()
            .into_iter()
            .filter(|request| {
                options
                    .request_name
                    .is_none_or(|name| request.name == name)
            })
            .collect();

        if requests.is_empty() {
            warn!(collection = %collection.info.name, "No requests to run");
        }
        info!(
            collection = %collection.info.name,
            requests = requests.len(),
            "Running collection"
        );

        let mut environment_variables = options
            .environment
            .map(Environment::variable_map)
            .unwrap_or_default();
        let mut runtime_variables = VarMap::new();
        let mut global_variables = self.runner.config().global_variables();

        let mut runs = Vec::with_capacity(requests.len());
        for request in requests {
            let mut run_options = RunRequestOptions::new(request, collection)
                .with_environment_variables(&mut environment_variables)
                .with_runtime_variables(&mut runtime_variables)
                .with_global_variables(&mut global_variables)
                .with_prompt_variables(options.prompt_variables.clone());
            run_options.environment = options.environment;
            run_options.process_env = options.process_env.clone();
            run_options.timeout_ms = options.timeout_ms;
            run_options.validate_ssl = options.validate_ssl;
            run_options.collection_path = options.collection_path;

            let result = self.runner.run_request(run_options).await;
            runs.push(RequestRun {
                name: request.name.clone(),
                method: request.method.to_uppercase(),
                url: request.url.clone(),
                result,
            });
        }

        let summary = RunSummary::from_runs(&runs, start.elapsed());
        CollectionRunResult {
            runs,
            summary,
            runtime_variables,
            environment_variables,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::AssertionResult;
    use crate::http::{ErrorType, ExecutionFailure, HttpResponse};
    use crate::script::{ResultStatus, ResultsResponse, TestResult};
    use serde_json::Value;

    fn run(outcome: RunOutcome) -> RequestRun {
        RequestRun {
            name: "r".to_string(),
            method: "GET".to_string(),
            url: "/".to_string(),
            result: RunRequestResponse {
                request_id: "req_1_x".to_string(),
                outcome,
                assertion_results: None,
                test_results: None,
            },
        }
    }

    fn test_result(status: ResultStatus) -> TestResult {
        TestResult {
            status,
            description: "t".to_string(),
            expected: None,
            actual: None,
            error: None,
        }
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let mut ok = run(RunOutcome::Response(HttpResponse::new(200, Value::Null)));
        ok.result.assertion_results = Some(ResultsResponse::new(vec![
            AssertionResult::pass("a".into(), "res.status", "eq", Some("200")),
        ]));
        ok.result.test_results = Some(ResultsResponse::new(vec![
            test_result(ResultStatus::Pass),
            test_result(ResultStatus::Skip),
        ]));

        let mut failing = run(RunOutcome::Response(HttpResponse::new(500, Value::Null)));
        failing.result.test_results =
            Some(ResultsResponse::new(vec![test_result(ResultStatus::Fail)]));

        let errored = run(RunOutcome::Failed(ExecutionFailure::new(
            "refused",
            ErrorType::Network,
            1,
        )));

        let runs = vec![ok, failing, errored];
        let summary = RunSummary::from_runs(&runs, Duration::from_millis(5));
        assert_eq!(summary.requests, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.assertions_passed, 1);
        assert_eq!(summary.tests_passed, 1);
        assert_eq!(summary.tests_failed, 1);
        assert_eq!(summary.tests_skipped, 1);
        assert!(!summary.is_success());

        assert!(runs[0].passed());
        assert!(!runs[1].passed());
        assert!(!runs[2].passed());
    }

    #[test]
    fn test_empty_summary_is_success() {
        assert!(RunSummary::from_runs(&[], Duration::ZERO).is_success());
    }
}
