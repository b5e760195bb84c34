use crate::model::{Collection, Folder, HttpRequest, Item};

/// `target` 的祖先文件夹，根在前，不含请求本身
///
/// 双方都有 ID 时按 ID 匹配，否则按 name、method、url 匹配。
/// 找不到的请求或位于集合根部的请求返回空路径。
pub fn resolve_path_to_item<'a>(collection: &'a Collection, target: &HttpRequest) -> Vec<&'a Folder> {
    let mut path = Vec::new();
    if find(&collection.items, target, &mut path) {
        path
    } else {
        Vec::new()
    }
}

fn find<'a>(items: &'a [Item], target: &HttpRequest, path: &mut Vec<&'a Folder>) -> bool {
    for item in items {
        match item {
            Item::Http(request) if is_same_request(request, target) => return true,
            Item::Folder(folder) => {
                path.push(folder);
                if find(&folder.items, target, path) {
                    return true;
                }
                path.pop();
            }
            _ => {}
        }
    }
    false
}

fn is_same_request(candidate: &HttpRequest, target: &HttpRequest) -> bool {
    match (candidate.id, target.id) {
        (Some(a), Some(b)) => a == b,
        _ => candidate.same_request(target),
    }
}
