/// 断言模块 - 对请求/响应上下文执行声明式断言
mod evaluator;
mod operand;
mod runtime;
mod types;

pub use evaluator::apply_operator;
pub use operand::{Operand, evaluate_operand};
pub use runtime::{AssertRuntime, AssertionContext};
pub use types::{AssertError, AssertionResult, Operator};
