pub mod accessor;
mod hydrate;
pub mod scripts;
pub mod types;

pub use hydrate::generate_id;
pub use scripts::{Script, ScriptType, Scripts, ScriptsObject};
pub use types::{
    ApiKeyAuth, ApiKeyPlacement, Assertion, Auth, AuthSetting, AwsV4Auth, BasicAuth, BearerAuth,
    Body, Collection, CollectionConfig, CollectionInfo, Environment, FileVariant, Folder,
    FormEntry, Header, HttpRequest, Item, MultipartEntry, MultipartKind, MultipartValue, NtlmAuth,
    Param, ParamType, RawBodyKind, RequestDefaults, RequestSettings, ScriptFile, Variable,
    VariableValue,
};
