pub mod assertion;
pub mod collection;
pub mod error;
pub mod http;
pub mod logger;
pub mod model;
pub mod runner;
pub mod script;
pub mod variable;

// 重新导出常用类型
pub use error::{OcrunError, Result};
pub use model::{Collection, HttpRequest};
pub use runner::{RequestRunner, RunRequestOptions, RunRequestResponse};
