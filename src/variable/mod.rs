pub mod config;
pub mod interpolator;
pub mod resolver;
pub mod types;

pub use config::{ConfigLoader, DEFAULT_TIMEOUT_MS, RunnerConfig, RunnerSection};
pub use interpolator::{interpolate_request, interpolate_with};
pub use resolver::VariableResolver;
pub use types::{VarMap, VariableSources, lookup, process_env, stringify};
