use serde::{Deserialize, Serialize};

use crate::collection::tree::resolve_path_to_item;
use crate::model::{AuthSetting, Collection, Folder, Header, HttpRequest, ScriptsObject};

/// 脚本合并策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFlow {
    /// 前置脚本由外到内，后置脚本由内到外
    #[default]
    Sandwich,
    /// 每一层的非空脚本覆盖上一层
    Sequential,
}

impl std::str::FromStr for ScriptFlow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandwich" => Ok(ScriptFlow::Sandwich),
            "sequential" => Ok(ScriptFlow::Sequential),
            other => Err(format!("unknown script flow '{other}'")),
        }
    }
}

const SCRIPT_SEPARATOR: &str = "\n\n";

/// 合并请求头：collection → 各级 folder（由外到内），同名（忽略大小写）后者覆盖前者
///
/// 请求自身的请求头保持原样在前；继承来的请求头只在请求中不存在同名项时追加。
pub fn merge_headers(collection: &Collection, request: &HttpRequest, path: &[&Folder]) -> Vec<Header> {
    // 保留首次出现的位置，值被后来者覆盖
    let mut inherited: Vec<(String, &Header)> = Vec::new();
    let levels = std::iter::once(&collection.request.headers)
        .chain(path.iter().map(|folder| &folder.request.headers));
    for headers in levels {
        for header in headers.iter().filter(|h| !h.disabled) {
            let key = header.name.to_lowercase();
            match inherited.iter_mut().find(|(name, _)| *name == key) {
                Some(slot) => slot.1 = header,
                None => inherited.push((key, header)),
            }
        }
    }

    let mut merged = request.headers.clone();
    for (key, header) in inherited {
        if !request.headers.iter().any(|h| h.name.to_lowercase() == key) {
            merged.push(header.clone());
        }
    }
    merged
}

/// 合并认证：请求已有非 inherit 的认证时不变；否则取最近的 folder，最后回退到 collection
pub fn merge_auth(collection: &Collection, request: &HttpRequest, path: &[&Folder]) -> Option<AuthSetting> {
    if let Some(auth) = &request.auth {
        if !auth.is_inherit() {
            return Some(auth.clone());
        }
    }

    let configured = |auth: &Option<AuthSetting>| auth.as_ref().filter(|a| !a.is_inherit()).cloned();

    path.iter()
        .rev()
        .find_map(|folder| configured(&folder.request.auth))
        .or_else(|| configured(&collection.request.auth))
        .or_else(|| request.auth.clone())
}

fn non_empty(code: &Option<String>) -> Option<&str> {
    code.as_deref().filter(|c| !c.trim().is_empty())
}

fn join(parts: Vec<&str>) -> Option<String> {
    (!parts.is_empty()).then(|| parts.join(SCRIPT_SEPARATOR))
}

/// 合并 preRequest / postResponse / tests 三个阶段的脚本
pub fn merge_scripts(
    collection: &Collection,
    request: &HttpRequest,
    path: &[&Folder],
    flow: ScriptFlow,
) -> ScriptsObject {
    let outer: Vec<&ScriptsObject> = std::iter::once(&collection.request.scripts)
        .chain(path.iter().map(|folder| &folder.request.scripts))
        .collect();
    let own = &request.scripts;

    match flow {
        ScriptFlow::Sandwich => {
            let pre = outer
                .iter()
                .chain(std::iter::once(&own))
                .filter_map(|s| non_empty(&s.pre_request))
                .collect();
            let post = std::iter::once(&own)
                .chain(outer.iter().rev())
                .filter_map(|s| non_empty(&s.post_response))
                .collect();
            let tests = outer
                .iter()
                .chain(std::iter::once(&own))
                .filter_map(|s| non_empty(&s.tests))
                .collect();

            ScriptsObject {
                pre_request: join(pre),
                post_response: join(post),
                tests: join(tests),
                hooks: own.hooks.clone(),
            }
        }
        ScriptFlow::Sequential => {
            let mut merged = ScriptsObject::default();
            for scripts in outer.iter().chain(std::iter::once(&own)) {
                if let Some(code) = non_empty(&scripts.pre_request) {
                    merged.pre_request = Some(code.to_string());
                }
                if let Some(code) = non_empty(&scripts.post_response) {
                    merged.post_response = Some(code.to_string());
                }
                if let Some(code) = non_empty(&scripts.tests) {
                    merged.tests = Some(code.to_string());
                }
            }
            merged.hooks = own.hooks.clone();
            merged
        }
    }
}

/// 返回合并了继承配置（请求头、认证、脚本）的请求副本
pub fn preprocess_request(collection: &Collection, request: &HttpRequest, flow: ScriptFlow) -> HttpRequest {
    let path = resolve_path_to_item(collection, request);
    let mut merged = request.clone();
    merged.headers = merge_headers(collection, request, &path);
    merged.auth = merge_auth(collection, request, &path);
    merged.scripts = merge_scripts(collection, request, &path, flow);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Auth, BearerAuth, Item, RequestDefaults};

    fn bearer(token: &str) -> AuthSetting {
        AuthSetting::Configured(Auth::Bearer(BearerAuth {
            token: token.to_string(),
        }))
    }

    fn defaults_with_header(name: &str, value: &str) -> RequestDefaults {
        RequestDefaults {
            headers: vec![Header::new(name, value)],
            ..Default::default()
        }
    }

    fn scripts(pre: &str, post: &str, tests: &str) -> RequestDefaults {
        RequestDefaults {
            scripts: ScriptsObject::default()
                .with_pre_request(pre)
                .with_post_response(post)
                .with_tests(tests),
            ..Default::default()
        }
    }

    #[test]
    fn test_folder_header_overrides_collection() {
        let collection = Collection::new("c").with_defaults(defaults_with_header("X", "1"));
        let folder = Folder::new("f").with_defaults(defaults_with_header("x", "2"));
        let request = HttpRequest::new("r", "GET", "/");

        let merged = merge_headers(&collection, &request, &[&folder]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, "2");
    }

    #[test]
    fn test_request_header_always_wins() {
        let collection = Collection::new("c").with_defaults(defaults_with_header("X", "1"));
        let folder = Folder::new("f").with_defaults(defaults_with_header("X", "2"));
        let request = HttpRequest::new("r", "GET", "/")
            .with_header("Accept", "*/*")
            .with_header("X", "3");

        let merged = merge_headers(&collection, &request, &[&folder]);
        let values: Vec<_> = merged.iter().map(|h| (h.name.as_str(), h.value.as_str())).collect();
        assert_eq!(values, vec![("Accept", "*/*"), ("X", "3")]);
    }

    #[test]
    fn test_disabled_inherited_headers_are_skipped() {
        let mut defaults = defaults_with_header("X-Off", "1");
        defaults.headers[0].disabled = true;
        let collection = Collection::new("c").with_defaults(defaults);

        let merged = merge_headers(&collection, &HttpRequest::new("r", "GET", "/"), &[]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_auth_nearest_folder_wins() {
        let collection = Collection::new("c").with_defaults(RequestDefaults {
            auth: Some(bearer("collection")),
            ..Default::default()
        });
        let outer = Folder::new("outer").with_defaults(RequestDefaults {
            auth: Some(bearer("outer")),
            ..Default::default()
        });
        let inner = Folder::new("inner").with_defaults(RequestDefaults {
            auth: Some(AuthSetting::Inherit),
            ..Default::default()
        });
        let request = HttpRequest::new("r", "GET", "/").with_auth(AuthSetting::Inherit);

        assert_eq!(
            merge_auth(&collection, &request, &[&outer, &inner]),
            Some(bearer("outer"))
        );
        assert_eq!(merge_auth(&collection, &request, &[]), Some(bearer("collection")));
    }

    #[test]
    fn test_request_auth_is_kept() {
        let collection = Collection::new("c").with_defaults(RequestDefaults {
            auth: Some(bearer("collection")),
            ..Default::default()
        });
        let request = HttpRequest::new("r", "GET", "/").with_auth(bearer("own"));
        assert_eq!(merge_auth(&collection, &request, &[]), Some(bearer("own")));
    }

    #[test]
    fn test_auth_stays_unset_without_source() {
        let collection = Collection::new("c");
        let request = HttpRequest::new("r", "GET", "/");
        assert_eq!(merge_auth(&collection, &request, &[]), None);
    }

    #[test]
    fn test_sandwich_ordering() {
        let collection = Collection::new("c").with_defaults(scripts("A", "A", "tA"));
        let folder = Folder::new("f").with_defaults(scripts("B", "B", "tB"));
        let request = HttpRequest::new("r", "GET", "/").with_scripts(
            ScriptsObject::default()
                .with_pre_request("C")
                .with_post_response("C")
                .with_tests("tC"),
        );

        let merged = merge_scripts(&collection, &request, &[&folder], ScriptFlow::Sandwich);
        assert_eq!(merged.pre_request.as_deref(), Some("A\n\nB\n\nC"));
        assert_eq!(merged.post_response.as_deref(), Some("C\n\nB\n\nA"));
        assert_eq!(merged.tests.as_deref(), Some("tA\n\ntB\n\ntC"));
    }

    #[test]
    fn test_sandwich_skips_empty_levels() {
        let collection = Collection::new("c").with_defaults(scripts("A", "", ""));
        let request = HttpRequest::new("r", "GET", "/");

        let merged = merge_scripts(&collection, &request, &[], ScriptFlow::Sandwich);
        assert_eq!(merged.pre_request.as_deref(), Some("A"));
        assert_eq!(merged.post_response, None);
        assert_eq!(merged.tests, None);
    }

    #[test]
    fn test_sequential_overrides() {
        let collection = Collection::new("c").with_defaults(scripts("A", "A", "tA"));
        let folder = Folder::new("f").with_defaults(scripts("B", "", "tB"));
        let request =
            HttpRequest::new("r", "GET", "/").with_scripts(ScriptsObject::default().with_pre_request("C"));

        let merged = merge_scripts(&collection, &request, &[&folder], ScriptFlow::Sequential);
        assert_eq!(merged.pre_request.as_deref(), Some("C"));
        assert_eq!(merged.post_response.as_deref(), Some("A"));
        assert_eq!(merged.tests.as_deref(), Some("tB"));
    }

    #[test]
    fn test_preprocess_request_uses_tree_path() {
        let request = HttpRequest::new("r", "GET", "/");
        let collection = Collection::new("c")
            .with_defaults(defaults_with_header("X-Col", "c"))
            .with_item(Item::Folder(
                Folder::new("f")
                    .with_defaults(defaults_with_header("X-Folder", "f"))
                    .with_item(Item::Http(request.clone())),
            ));

        let merged = preprocess_request(&collection, &request, ScriptFlow::Sandwich);
        let names: Vec<_> = merged.headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["X-Col", "X-Folder"]);
        // 输入请求不被修改
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_script_flow_from_str() {
        assert_eq!("Sequential".parse::<ScriptFlow>(), Ok(ScriptFlow::Sequential));
        assert!("zigzag".parse::<ScriptFlow>().is_err());
    }
}
