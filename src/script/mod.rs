//! 前置、后置和 tests 脚本的 JavaScript 沙箱

pub mod engine;
pub mod runtime;
pub mod types;

use thiserror::Error;

pub use engine::{BoaEngine, ScriptEngine};
pub use runtime::{BruHandle, RunScriptOptions, ScriptRuntime, VariableStores, request_view};
pub use types::{
    ConsoleEntry, EvalMode, ExprValue, HasStatus, ResultStatus, ResultsResponse, ResultsSummary,
    SandboxInput, SandboxOutput, TestResult, ThrownError,
};

/// 变量名校验失败时沙箱抛出的错误名称
const VARIABLE_NAME_ERROR: &str = "VariableNameError";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("{0}")]
    Syntax(String),

    #[error("{0}")]
    Runtime(String),

    #[error("{0}")]
    InvalidVariableName(String),

    #[error("Script did not settle: a promise was left pending")]
    Unsettled,

    #[error("Script engine error: {0}")]
    Engine(String),
}

impl ScriptError {
    pub fn from_thrown(thrown: ThrownError) -> Self {
        if thrown.name == VARIABLE_NAME_ERROR {
            ScriptError::InvalidVariableName(thrown.message)
        } else {
            ScriptError::Runtime(thrown.message)
        }
    }
}
