pub mod client;
pub mod request;
pub mod response;
pub mod types;

// 重新导出常用类型
pub use client::HttpExecutor;
pub use request::{PreparedBody, PreparedPart, PreparedRequest};
pub use response::{ExecutionFailure, HttpResponse};
pub use types::{ErrorType, ExecuteOptions, method_sends_body};
