use serde_json::Value;

use crate::model::{Collection, Folder, HttpRequest, Variable};
use crate::variable::VarMap;

/// 请求可见的变量，按声明位置分开
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedVariables {
    pub collection: VarMap,
    pub folder: VarMap,
    pub request: VarMap,
    /// 请求自身的变量，后面追加它尚未声明的继承变量
    pub variables: Vec<Variable>,
}

fn enabled(variables: &[Variable]) -> impl Iterator<Item = &Variable> {
    variables.iter().filter(|v| !v.disabled && !v.name.is_empty())
}

fn insert(map: &mut VarMap, variable: &Variable) {
    map.insert(variable.name.clone(), Value::String(variable.value.resolve()));
}

/// 同名条目原地替换，保留首次出现的位置
fn upsert<'a>(list: &mut Vec<&'a Variable>, variable: &'a Variable) {
    match list.iter_mut().find(|v| v.name == variable.name) {
        Some(slot) => *slot = variable,
        None => list.push(variable),
    }
}

/// 沿 `path` 收集集合、文件夹和请求三级变量
///
/// 禁用的变量被丢弃。文件夹从根向下应用，同名时离请求最近的文件夹生效。
pub fn merge_variables(collection: &Collection, request: &HttpRequest, path: &[&Folder]) -> MergedVariables {
    let mut merged = MergedVariables::default();
    let mut inherited: Vec<&Variable> = Vec::new();

    for variable in enabled(&collection.request.variables) {
        insert(&mut merged.collection, variable);
        upsert(&mut inherited, variable);
    }

    for folder in path {
        for variable in enabled(&folder.request.variables) {
            insert(&mut merged.folder, variable);
            upsert(&mut inherited, variable);
        }
    }

    for variable in enabled(&request.variables) {
        insert(&mut merged.request, variable);
    }

    merged.variables = request.variables.clone();
    for variable in inherited {
        if !request.variables.iter().any(|own| own.name == variable.name) {
            merged.variables.push(variable.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RequestDefaults;
    use serde_json::json;

    fn defaults(vars: &[(&str, &str)]) -> RequestDefaults {
        RequestDefaults {
            variables: vars.iter().map(|(k, v)| Variable::new(*k, *v)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_scopes_are_kept_apart() {
        let collection = Collection::new("c").with_defaults(defaults(&[("x", "c"), ("base", "b")]));
        let outer = Folder::new("outer").with_defaults(defaults(&[("x", "outer"), ("f", "1")]));
        let inner = Folder::new("inner").with_defaults(defaults(&[("f", "2")]));
        let request = HttpRequest::new("r", "GET", "/").with_variable("x", "r");

        let merged = merge_variables(&collection, &request, &[&outer, &inner]);
        assert_eq!(merged.collection.get("x"), Some(&json!("c")));
        assert_eq!(merged.folder.get("x"), Some(&json!("outer")));
        assert_eq!(merged.folder.get("f"), Some(&json!("2")));
        assert_eq!(merged.request.get("x"), Some(&json!("r")));
    }

    #[test]
    fn test_unified_list_appends_missing_inherited() {
        let collection = Collection::new("c").with_defaults(defaults(&[("x", "c"), ("base", "b")]));
        let folder = Folder::new("f").with_defaults(defaults(&[("base", "folder")]));
        let request = HttpRequest::new("r", "GET", "/").with_variable("x", "r");

        let merged = merge_variables(&collection, &request, &[&folder]);
        let list: Vec<_> = merged
            .variables
            .iter()
            .map(|v| (v.name.as_str(), v.value.resolve()))
            .collect();
        assert_eq!(list, vec![("x", "r".to_string()), ("base", "folder".to_string())]);
    }

    #[test]
    fn test_disabled_variables_are_filtered() {
        let mut request_defaults = defaults(&[("secret", "s")]);
        request_defaults.variables[0].disabled = true;
        let collection = Collection::new("c").with_defaults(request_defaults);
        let mut request = HttpRequest::new("r", "GET", "/");
        request.variables.push(Variable::new("off", "1").disabled());

        let merged = merge_variables(&collection, &request, &[]);
        assert!(merged.collection.is_empty());
        assert!(merged.request.is_empty());
        // 禁用项仍然保留在请求的变量列表中
        assert_eq!(merged.variables.len(), 1);
    }
}
