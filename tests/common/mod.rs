//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use wiremock::matchers::path_regex;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use magnify::{HydrationError, RecordHydrator, SearchKey, Searchable};

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub price: f64,
}

impl Product {
    pub fn new(id: i64, name: &str, color: &str, price: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            color: color.to_string(),
            price,
        }
    }
}

impl Searchable for Product {
    fn search_index() -> &'static str {
        "products"
    }

    fn search_key_value(&self) -> SearchKey {
        self.id.into()
    }

    fn to_searchable_object(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("name".into(), json!(self.name));
        fields.insert("color".into(), json!(self.color));
        fields.insert("price".into(), json!(self.price));
        fields.insert("createdAt".into(), json!(1_700_000_000 + self.id));
        fields
    }
}

pub fn catalogue(count: i64) -> Vec<Product> {
    (1..=count)
        .map(|id| {
            let color = if id % 2 == 0 { "red" } else { "blue" };
            Product::new(id, &format!("Shoe {}", id), color, 10.0 * id as f64)
        })
        .collect()
}

/// Record store that answers in primary-key order, whatever order the keys
/// were requested in.
pub struct ProductStore {
    products: BTreeMap<i64, Product>,
}

impl ProductStore {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
        }
    }
}

#[async_trait]
impl RecordHydrator<Product> for ProductStore {
    async fn hydrate_by_ids(&self, ids: &[SearchKey]) -> Result<Vec<Product>, HydrationError> {
        let mut wanted: Vec<i64> = ids.iter().filter_map(SearchKey::as_i64).collect();
        wanted.sort_unstable();
        Ok(wanted
            .into_iter()
            .filter_map(|id| self.products.get(&id).cloned())
            .collect())
    }
}

/// Write waiting to be applied by the fake's task queue.
enum PendingWrite {
    Upsert(Vec<Value>),
    Delete(Vec<i64>),
    Clear,
}

struct FakeTask {
    write: Option<PendingWrite>,
    polls: usize,
}

#[derive(Default)]
struct FakeState {
    documents: BTreeMap<i64, Value>,
    tasks: BTreeMap<u64, FakeTask>,
    next_uid: u64,
    polls: usize,
}

/// In-memory stand-in for one Meilisearch index.
///
/// Supports document upserts, delete-batch, flush and search with either
/// `limit` or `page`/`hitsPerPage`. Hits are returned in ascending key order.
///
/// Writes only enqueue a task. A task reports `processing` on its first
/// `GET /tasks/{uid}` and is applied and `succeeded` on the next one, so the
/// documents change only once the engine has waited for them.
#[derive(Clone, Default)]
pub struct FakeMeilisearch {
    state: Arc<Mutex<FakeState>>,
}

impl FakeMeilisearch {
    pub async fn mount(&self, server: &MockServer, index: &str) {
        Mock::given(path_regex(format!("^/indexes/{}/", index)))
            .respond_with(self.clone())
            .mount(server)
            .await;
        Mock::given(path_regex("^/tasks/[0-9]+$"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().documents.len()
    }

    /// Number of task status requests served so far.
    pub fn task_polls(&self) -> usize {
        self.state.lock().unwrap().polls
    }

    fn enqueue(&self, write: PendingWrite) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        state.next_uid += 1;
        let uid = state.next_uid;
        state.tasks.insert(uid, FakeTask { write: Some(write), polls: 0 });
        ResponseTemplate::new(202).set_body_json(json!({ "taskUid": uid, "status": "enqueued" }))
    }

    fn task(&self, uid: u64) -> ResponseTemplate {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.polls += 1;

        let Some(task) = state.tasks.get_mut(&uid) else {
            return ResponseTemplate::new(404).set_body_json(json!({
                "message": format!("Task `{}` not found.", uid),
                "code": "task_not_found",
            }));
        };
        task.polls += 1;
        if task.polls == 1 {
            return ResponseTemplate::new(200).set_body_json(json!({ "uid": uid, "status": "processing" }));
        }

        match task.write.take() {
            Some(PendingWrite::Upsert(docs)) => {
                for doc in docs {
                    if let Some(id) = doc.get("id").and_then(Value::as_i64) {
                        state.documents.insert(id, doc);
                    }
                }
            }
            Some(PendingWrite::Delete(ids)) => {
                for id in ids {
                    state.documents.remove(&id);
                }
            }
            Some(PendingWrite::Clear) => state.documents.clear(),
            None => {}
        }
        ResponseTemplate::new(200).set_body_json(json!({ "uid": uid, "status": "succeeded" }))
    }

    fn search(&self, params: &Value) -> Value {
        let state = self.state.lock().unwrap();
        let all: Vec<Value> = state.documents.values().cloned().collect();
        let total = all.len();

        match params.get("hitsPerPage").and_then(Value::as_u64) {
            Some(per_page) => {
                let page = params.get("page").and_then(Value::as_u64).unwrap_or(1);
                let hits: Vec<Value> = all
                    .into_iter()
                    .skip(((page - 1) * per_page) as usize)
                    .take(per_page as usize)
                    .collect();
                json!({ "hits": hits, "totalHits": total, "page": page, "hitsPerPage": per_page })
            }
            None => {
                let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(20);
                let hits: Vec<Value> = all.into_iter().take(limit as usize).collect();
                json!({ "hits": hits, "estimatedTotalHits": total })
            }
        }
    }
}

impl Respond for FakeMeilisearch {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path();
        let method = request.method.as_str();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

        if let Some(uid) = path.strip_prefix("/tasks/").and_then(|uid| uid.parse().ok()) {
            return self.task(uid);
        }
        if path.ends_with("/search") && method == "POST" {
            return ResponseTemplate::new(200).set_body_json(self.search(&body));
        }
        if path.ends_with("/documents") && method == "POST" {
            return self.enqueue(PendingWrite::Upsert(body.as_array().cloned().unwrap_or_default()));
        }
        if path.ends_with("/documents/delete-batch") && method == "POST" {
            let ids = body
                .as_array()
                .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default();
            return self.enqueue(PendingWrite::Delete(ids));
        }
        if path.ends_with("/documents") && method == "DELETE" {
            return self.enqueue(PendingWrite::Clear);
        }
        ResponseTemplate::new(404).set_body_json(json!({ "message": "not found" }))
    }
}
