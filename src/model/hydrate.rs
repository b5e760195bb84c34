use rand::Rng;
use uuid::Uuid;

use crate::model::types::{Collection, HttpRequest, Item};

/// 为没有 ID 的请求生成确定性 ID
///
/// ID 是基于请求在树中的位置以及 name、method、url 的 v5 UUID，
/// 同一文档加载两次得到相同的 ID。
pub(crate) fn assign_ids(collection: &mut Collection) {
    fn walk(items: &mut [Item], path: &str) {
        for (index, item) in items.iter_mut().enumerate() {
            let position = format!("{path}/{index}");
            match item {
                Item::Http(request) if request.id.is_none() => {
                    request.id = Some(derive_id(&position, request));
                }
                Item::Folder(folder) => walk(&mut folder.items, &position),
                _ => {}
            }
        }
    }

    walk(&mut collection.items, "");
}

fn derive_id(position: &str, request: &HttpRequest) -> Uuid {
    let key = format!(
        "ocrun:{position}:{}:{}:{}",
        request.name, request.method, request.url
    );
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 运行期短标识：`{prefix}_{millis}_{9 位 base36}`
pub fn generate_id(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!(
        "{prefix}_{}_{suffix}",
        chrono::Utc::now().timestamp_millis()
    )
}

impl Collection {
    /// 从先前加载的同一集合中沿用请求 ID
    ///
    /// 按 name、method、url 匹配，旧 ID 只会被使用一次；三者相同的多个请求按树顺序一一对应。
    /// 没有匹配到的请求保留原有 ID，仍然没有 ID 的按位置生成。
    pub fn hydrate_ids(&mut self, previous: &Collection) {
        let mut known: Vec<&HttpRequest> = previous
            .requests()
            .into_iter()
            .filter(|request| request.id.is_some())
            .collect();

        fn walk(items: &mut [Item], known: &mut Vec<&HttpRequest>) {
            for item in items {
                match item {
                    Item::Http(request) => {
                        if let Some(index) = known.iter().position(|old| old.same_request(request)) {
                            request.id = known.remove(index).id;
                        }
                    }
                    Item::Folder(folder) => walk(&mut folder.items, known),
                    Item::Script(_) => {}
                }
            }
        }

        walk(&mut self.items, &mut known);
        assign_ids(self);
    }
}
