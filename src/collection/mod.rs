pub mod merge;
pub mod tree;
pub mod variables;

pub use merge::{ScriptFlow, merge_auth, merge_headers, merge_scripts, preprocess_request};
pub use tree::resolve_path_to_item;
pub use variables::{MergedVariables, merge_variables};
