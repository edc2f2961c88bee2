//! In-process backend used by the client tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::config::Environment;
use crate::http::{ApiClient, RequestPolicy};
use crate::navigation::History;
use crate::storage::MemoryStorage;

/// Bind `router` on an ephemeral port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn policy() -> RequestPolicy {
    RequestPolicy {
        timeout: Duration::from_secs(2),
        retries: 1,
        retry_delay: Duration::from_millis(10),
        retry_non_idempotent: false,
    }
}

pub fn client(url: &str) -> (ApiClient, Arc<MemoryStorage>, Arc<History>) {
    let environment = Environment {
        api_url: url.to_string(),
        ..Environment::default()
    };
    let storage = Arc::new(MemoryStorage::new());
    let history = Arc::new(History::default());
    let client = ApiClient::new(&environment, storage.clone(), history.clone()).with_policy(policy());
    (client, storage, history)
}

/// A generic JSON collection served with the usual REST verbs.
#[derive(Clone, Default)]
pub struct Backend {
    records: Arc<Mutex<Vec<Value>>>,
    next_id: Arc<AtomicI64>,
    failing: Arc<AtomicBool>,
    delays: Arc<Mutex<HashMap<i64, Duration>>>,
}

impl Backend {
    pub fn with_records(records: Vec<Value>) -> Self {
        let next_id = records
            .iter()
            .filter_map(|r| r["id"].as_i64())
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            records: Arc::new(Mutex::new(records)),
            next_id: Arc::new(AtomicI64::new(next_id)),
            failing: Arc::new(AtomicBool::new(false)),
            delays: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn records(&self) -> Vec<Value> {
        self.records.lock().unwrap().clone()
    }

    /// Make every endpoint answer 500 until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold every single-record request for `id` for `delay` before answering.
    pub fn set_delay(&self, id: i64, delay: Duration) {
        self.delays.lock().unwrap().insert(id, delay);
    }

    async fn wait_for(&self, id: i64) {
        let delay = self.delays.lock().unwrap().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn router(&self, path: &str) -> Router {
        Router::new()
            .route(path, get(list).post(create))
            .route(&format!("{}/:id", path), get(fetch).put(update).delete(remove))
            .with_state(self.clone())
    }

    fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }
}

type Reply = (StatusCode, Json<Value>);

fn server_error() -> Reply {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": "backend unavailable" })),
    )
}

fn not_found() -> Reply {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "not found" })),
    )
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

async fn list(State(backend): State<Backend>, Query(query): Query<HashMap<String, String>>) -> Reply {
    if backend.is_failing() {
        return server_error();
    }
    let records = backend.records();
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let limit: usize = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(20).max(1);
    let total = records.len();
    let data: Vec<Value> = records.into_iter().skip((page - 1) * limit).take(limit).collect();
    let pages = (total + limit - 1) / limit;

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": data,
            "meta": { "total": total, "page": page, "limit": limit, "pages": pages }
        })),
    )
}

async fn create(State(backend): State<Backend>, Json(mut body): Json<Value>) -> Reply {
    if backend.is_failing() {
        return server_error();
    }
    let id = backend.next_id.fetch_add(1, Ordering::SeqCst);
    body["id"] = json!(id);
    body["created_at"] = json!(now());
    body["updated_at"] = json!(now());
    backend.records.lock().unwrap().push(body.clone());
    (StatusCode::CREATED, Json(json!({ "success": true, "data": body })))
}

async fn fetch(State(backend): State<Backend>, Path(id): Path<i64>) -> Reply {
    backend.wait_for(id).await;
    if backend.is_failing() {
        return server_error();
    }
    match backend.records().into_iter().find(|r| r["id"] == json!(id)) {
        Some(record) => (StatusCode::OK, Json(json!({ "success": true, "data": record }))),
        None => not_found(),
    }
}

async fn update(
    State(backend): State<Backend>,
    Path(id): Path<i64>,
    Json(patch): Json<Value>,
) -> Reply {
    if backend.is_failing() {
        return server_error();
    }
    let mut records = backend.records.lock().unwrap();
    let record = match records.iter_mut().find(|r| r["id"] == json!(id)) {
        Some(record) => record,
        None => return not_found(),
    };
    if let (Some(target), Some(fields)) = (record.as_object_mut(), patch.as_object()) {
        for (key, value) in fields {
            if key != "id" {
                target.insert(key.clone(), value.clone());
            }
        }
    }
    record["updated_at"] = json!(now());
    (StatusCode::OK, Json(json!({ "success": true, "data": record.clone() })))
}

async fn remove(State(backend): State<Backend>, Path(id): Path<i64>) -> Reply {
    if backend.is_failing() {
        return server_error();
    }
    let mut records = backend.records.lock().unwrap();
    let before = records.len();
    records.retain(|r| r["id"] != json!(id));
    if records.len() == before {
        return not_found();
    }
    (StatusCode::OK, Json(json!({ "success": true })))
}
