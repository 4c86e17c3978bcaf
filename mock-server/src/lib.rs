use std::{collections::BTreeMap, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub name: String,
    pub version: u32,
}

/// What `/echo` saw of the incoming request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub content_type: Option<String>,
    /// Lower-cased header names. Repeated headers are joined with `, `.
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON, the raw text if it was not JSON, or `None` when empty.
    pub body: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: Uuid,
    pub bytes: usize,
}

pub type Db = Arc<RwLock<Vec<Upload>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Vec::new()));
    Router::new()
        .route("/info", get(info))
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/delay/{ms}", get(delay))
        .route("/text", get(text))
        .route("/big/{bytes}", get(big))
        .route("/uploads", get(list_uploads).post(store_upload).put(store_upload))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn info() -> Json<Info> {
    Json(Info {
        name: "mock-server".to_string(),
        version: 1,
    })
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let headers = headers
        .keys()
        .map(|k| {
            let values: Vec<&str> = headers.get_all(k).iter().filter_map(|v| v.to_str().ok()).collect();
            (k.as_str().to_string(), values.join(", "))
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        content_type,
        headers,
        body: parse_body(&body),
    })
}

fn parse_body(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned())),
    )
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn delay(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "delayed_ms": ms }))
}

async fn text() -> &'static str {
    "plain text, not json"
}

/// A JSON string holding `bytes` characters.
async fn big(Path(bytes): Path<usize>) -> Json<String> {
    Json("x".repeat(bytes))
}

async fn list_uploads(State(db): State<Db>) -> Json<Vec<Upload>> {
    Json(db.read().await.clone())
}

async fn store_upload(State(db): State<Db>, body: Bytes) -> (StatusCode, Json<Upload>) {
    let upload = Upload {
        id: Uuid::new_v4(),
        bytes: body.len(),
    };
    db.write().await.push(upload.clone());
    (StatusCode::CREATED, Json(upload))
}
