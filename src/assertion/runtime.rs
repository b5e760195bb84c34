use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::assertion::evaluator::apply_operator;
use crate::assertion::operand::evaluate_operand;
use crate::assertion::types::{AssertError, AssertionResult, Operator};
use crate::model::{Assertion, generate_id};
use crate::script::{BoaEngine, EvalMode, SandboxInput, ScriptEngine};
use crate::variable::{VarMap, VariableSources};

/// 断言求值上下文
///
/// 表达式可见的名称优先级从低到高：global < collection < environment < folder
/// < request < runtime < 进程环境变量 < `bru` / `req` / `res`。
#[derive(Debug, Clone, Default)]
pub struct AssertionContext {
    pub variables: VariableSources,
    /// `req` 的视图
    pub request: Option<Value>,
    /// `res` 的视图
    pub response: Option<Value>,
}

impl AssertionContext {
    pub fn new(variables: VariableSources) -> Self {
        Self {
            variables,
            ..Default::default()
        }
    }

    pub fn with_request(mut self, request: Value) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    /// 表达式中可以直接引用的变量（进程环境变量平铺在最上层）
    fn scope(&self) -> VarMap {
        let vars = &self.variables;
        let mut merged = VarMap::new();
        for layer in [
            &vars.global,
            &vars.collection,
            &vars.environment,
            &vars.folder,
            &vars.request,
            &vars.runtime,
            &vars.process_env,
        ] {
            merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    fn sandbox_input(&self) -> SandboxInput {
        SandboxInput {
            env: self.variables.environment.clone(),
            runtime: self.variables.runtime.clone(),
            globals: self.variables.global.clone(),
            process_env: self.variables.process_env.clone(),
            request: self.request.clone(),
            response: self.response.clone(),
            scope: self.scope(),
            ..Default::default()
        }
    }
}

/// 声明式断言运行时
#[derive(Clone)]
pub struct AssertRuntime {
    engine: Arc<dyn ScriptEngine>,
}

impl Default for AssertRuntime {
    fn default() -> Self {
        Self::new(Arc::new(BoaEngine::new()))
    }
}

impl AssertRuntime {
    pub fn new(engine: Arc<dyn ScriptEngine>) -> Self {
        Self { engine }
    }

    /// 依次执行所有启用的断言；单条失败不会影响其他断言
    pub fn run_assertions(
        &self,
        assertions: &[Assertion],
        context: &AssertionContext,
    ) -> Vec<AssertionResult> {
        let enabled: Vec<&Assertion> = assertions.iter().filter(|a| !a.disabled).collect();
        if enabled.is_empty() {
            return Vec::new();
        }

        let input = context.sandbox_input();
        let vars = context.variables.combined();

        enabled
            .into_iter()
            .map(|assertion| {
                let uid = generate_id("assert");
                let value = assertion.value.as_deref();
                match self.check(assertion, &input, &vars) {
                    Ok(()) => AssertionResult::pass(
                        uid,
                        &assertion.expression,
                        &assertion.operator,
                        value,
                    ),
                    Err(err) => {
                        debug!(
                            expression = %assertion.expression,
                            operator = %assertion.operator,
                            error = %err,
                            "Assertion failed"
                        );
                        AssertionResult::fail(
                            uid,
                            &assertion.expression,
                            &assertion.operator,
                            value,
                            err,
                        )
                    }
                }
            })
            .collect()
    }

    fn check(
        &self,
        assertion: &Assertion,
        input: &SandboxInput,
        vars: &Value,
    ) -> Result<(), AssertError> {
        let operator = Operator::parse(&assertion.operator);
        let lhs = self
            .engine
            .evaluate(&assertion.expression, EvalMode::Expression, input)?;
        let rhs = evaluate_operand(operator, assertion.value.as_deref(), vars, |text| {
            self.engine.evaluate(text, EvalMode::Template, input)
        })?;
        apply_operator(operator, &lhs, &rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::script::ResultStatus;
    use serde_json::json;

    fn context_for(status: u16, body: Value) -> AssertionContext {
        let mut response = HttpResponse::new(status, body);
        response.headers.insert("content-type".into(), "application/json".into());
        AssertionContext::new(VariableSources::new()).with_response(response.script_view())
    }

    #[test]
    fn test_status_eq_pass_and_fail() {
        let runtime = AssertRuntime::default();
        let assertions = [Assertion::new("res.status", "eq").with_value("200")];

        let ok = runtime.run_assertions(&assertions, &context_for(200, json!({})));
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].status, ResultStatus::Pass);
        assert!(ok[0].uid.starts_with("assert_"));

        let missing = runtime.run_assertions(&assertions, &context_for(404, json!({})));
        assert_eq!(missing[0].status, ResultStatus::Fail);
        assert!(!missing[0].error.as_deref().unwrap_or_default().is_empty());
    }

    #[test]
    fn test_unary_operator_with_stray_value() {
        let runtime = AssertRuntime::default();
        let assertions = [Assertion::new("res.body.items", "isArray").with_value("nonsense")];
        let results = runtime.run_assertions(&assertions, &context_for(200, json!({"items": [1]})));
        assert_eq!(results[0].status, ResultStatus::Pass);
        assert_eq!(results[0].value.as_deref(), Some("nonsense"));
    }

    #[test]
    fn test_disabled_assertions_are_skipped() {
        let runtime = AssertRuntime::default();
        let assertions = [
            Assertion::new("res.status", "eq").with_value("500").disabled(),
            Assertion::new("res.status", "lt").with_value("300"),
        ];
        let results = runtime.run_assertions(&assertions, &context_for(204, Value::Null));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].operator, "lt");
        assert!(results[0].passed());
    }

    #[test]
    fn test_variables_visible_in_expression_and_rhs() {
        let runtime = AssertRuntime::default();
        let mut vars = VariableSources::new();
        vars.environment.insert("expectedId".into(), json!("42"));
        vars.runtime.insert("limit".into(), json!(10));
        let context = AssertionContext::new(vars).with_response(
            HttpResponse::new(200, json!({"id": 42, "count": 3, "name": "user-10"})).script_view(),
        );

        let assertions = [
            Assertion::new("res.body.id", "eq").with_value("{{expectedId}}"),
            Assertion::new("res.body.count", "lt").with_value("{{limit}}"),
            Assertion::new("res.body.name", "eq").with_value("user-${limit}"),
            Assertion::new("limit", "equals").with_value("10"),
        ];
        let results = runtime.run_assertions(&assertions, &context);
        assert!(results.iter().all(AssertionResult::passed), "{results:?}");
    }

    #[test]
    fn test_truthy_operators_only_accept_booleans() {
        let runtime = AssertRuntime::default();
        let context = context_for(200, json!({"name": "abc", "n": 0, "ok": true}));
        let assertions = [
            Assertion::new("res.body.name", "isTruthy"),
            Assertion::new("res.body.n", "isFalsy"),
            Assertion::new("res.body.ok", "isTruthy"),
        ];
        let results = runtime.run_assertions(&assertions, &context);
        assert_eq!(results[0].status, ResultStatus::Fail);
        assert_eq!(results[0].error.as_deref(), Some("expected 'abc' to be true"));
        assert_eq!(results[1].status, ResultStatus::Fail);
        assert_eq!(results[1].error.as_deref(), Some("expected 0 to be false"));
        assert_eq!(results[2].status, ResultStatus::Pass);
    }

    #[test]
    fn test_expression_error_becomes_failure() {
        let runtime = AssertRuntime::default();
        let assertions = [Assertion::new("res.body.a.b.c", "isDefined")];
        let results = runtime.run_assertions(&assertions, &context_for(200, json!({})));
        assert_eq!(results[0].status, ResultStatus::Fail);
        assert!(results[0].error.is_some());
    }

    #[test]
    fn test_in_and_between() {
        let runtime = AssertRuntime::default();
        let assertions = [
            Assertion::new("res.status", "in").with_value("[200, 201]"),
            Assertion::new("res.status", "between").with_value("200, 299"),
            Assertion::new("res.status", "notIn").with_value("404,500"),
        ];
        let results = runtime.run_assertions(&assertions, &context_for(201, Value::Null));
        assert!(results.iter().all(AssertionResult::passed), "{results:?}");
    }
}
