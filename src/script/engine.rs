use boa_engine::{Context, JsError, Source};
use serde::Deserialize;
use serde_json::Value;

use crate::script::ScriptError;
use crate::script::types::{EvalMode, ExprValue, SandboxInput, SandboxOutput, ThrownError};

const PRELUDE: &str = include_str!("prelude.js");

/// 可承载集合脚本的 JavaScript 引擎
///
/// 实现是同步的，异步运行时上的调用方需要把工作移到阻塞线程。
pub trait ScriptEngine: Send + Sync {
    /// 运行脚本直到结束，并清空所有待处理的 promise
    ///
    /// 脚本自身抛出的错误放在 [`SandboxOutput::error`] 中返回；
    /// `Err` 只用于无法编译的代码或无法驱动的引擎。
    fn execute(&self, script: &str, input: &SandboxInput) -> Result<SandboxOutput, ScriptError>;

    /// 对 `input` 求值单个表达式或模板字面量
    fn evaluate(
        &self,
        expression: &str,
        mode: EvalMode,
        input: &SandboxInput,
    ) -> Result<ExprValue, ScriptError>;
}

/// 基于 Boa 的 [`ScriptEngine`]。每次调用使用新的上下文，
/// 脚本之间不会共享状态。
#[derive(Debug, Clone, Copy, Default)]
pub struct BoaEngine;

impl BoaEngine {
    pub fn new() -> Self {
        Self
    }

    fn context(input: &SandboxInput) -> Result<Context, ScriptError> {
        let mut context = Context::default();
        let input_json =
            serde_json::to_string(input).map_err(|e| ScriptError::Engine(e.to_string()))?;
        let bootstrap = format!("globalThis.__ocrunInput = {input_json};");
        context
            .eval(Source::from_bytes(bootstrap.as_bytes()))
            .map_err(|e| ScriptError::Engine(e.to_string()))?;
        context
            .eval(Source::from_bytes(PRELUDE.as_bytes()))
            .map_err(|e| ScriptError::Engine(e.to_string()))?;
        Ok(context)
    }

    fn eval_string(context: &mut Context, code: &str) -> Result<String, ScriptError> {
        let value = context
            .eval(Source::from_bytes(code.as_bytes()))
            .map_err(compile_error)?;
        value
            .as_string()
            .map(|s| s.to_std_string_escaped())
            .ok_or_else(|| ScriptError::Engine("sandbox returned a non-string value".to_string()))
    }
}

impl ScriptEngine for BoaEngine {
    fn execute(&self, script: &str, input: &SandboxInput) -> Result<SandboxOutput, ScriptError> {
        let mut context = Self::context(input)?;

        let wrapped = format!("__ocrun.run(async () => {{\n{script}\n}});");
        context
            .eval(Source::from_bytes(wrapped.as_bytes()))
            .map_err(compile_error)?;
        let _ = context.run_jobs();

        let raw = Self::eval_string(&mut context, "__ocrun.finish()")?;
        serde_json::from_str(&raw).map_err(|e| ScriptError::Engine(e.to_string()))
    }

    fn evaluate(
        &self,
        expression: &str,
        mode: EvalMode,
        input: &SandboxInput,
    ) -> Result<ExprValue, ScriptError> {
        let mut context = Self::context(input)?;

        let code = match mode {
            EvalMode::Expression => format!("__ocrun.capture(() => ({expression}\n))"),
            EvalMode::Template => {
                let body = expression.replace('`', "\\`");
                format!("__ocrun.capture(() => `{body}`)")
            }
        };
        let raw = Self::eval_string(&mut context, &code)?;
        let captured: Captured =
            serde_json::from_str(&raw).map_err(|e| ScriptError::Engine(e.to_string()))?;

        if let Some(error) = captured.error {
            return Err(ScriptError::from_thrown(error));
        }
        Ok(if captured.defined {
            ExprValue::Value(captured.value.unwrap_or(Value::Null))
        } else {
            ExprValue::Undefined
        })
    }
}

#[derive(Deserialize)]
struct Captured {
    #[serde(default)]
    defined: bool,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    error: Option<ThrownError>,
}

fn compile_error(err: JsError) -> ScriptError {
    let message = err.to_string();
    if message.contains("SyntaxError") {
        ScriptError::Syntax(message)
    } else {
        ScriptError::Runtime(message)
    }
}
