#![allow(dead_code)] // each test binary uses its own slice of this module

//! In-process stub of the chain and relay HTTP APIs.
//!
//! One axum server plays both roles; the relay's `/info` points back at the
//! same address. Pushed transactions are decoded with the crate's own wire
//! layout and applied to an in-memory row store so tests can observe
//! contract-level effects.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use put_client::codec::{self, Action, Authorization, TransactionHeader};

pub const CHAIN_ID: &str = "cf057bbfb72640471fd910bcb67639c22df9f92470936cddc1ade0e2f2e7dc4f";
pub const RELAY_SIG: &str = "SIG_K1_StubRelaySignature111111111111111111111111111111111111111111";

#[derive(Debug, Clone)]
pub struct StoredRow {
    pub tag_id: u64,
    pub key: String,
    pub value: String,
}

pub struct StubState {
    pub rows: Mutex<Vec<StoredRow>>,
    /// Rows returned per pagination request, regardless of the asked limit.
    pub page_size: usize,
    /// Public keys reported on the account's `active` permission.
    pub account_keys: Mutex<Vec<String>>,
    pub login_count: AtomicUsize,
    pub chain_requests: AtomicUsize,
    pub info_requests: AtomicUsize,
    pub valid_tokens: Mutex<HashSet<String>>,
    /// Treat the first issued token as already expired.
    pub invalidate_first_token: bool,
    /// Fail authenticated relay writes with this status.
    pub fail_writes: Option<u16>,
    pub relay_calls: Mutex<Vec<String>>,
    pub pushes: Mutex<Vec<Value>>,
    pub owner: Mutex<String>,
    pub base_url: Mutex<String>,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            page_size: 100,
            account_keys: Mutex::new(Vec::new()),
            login_count: AtomicUsize::new(0),
            chain_requests: AtomicUsize::new(0),
            info_requests: AtomicUsize::new(0),
            valid_tokens: Mutex::new(HashSet::new()),
            invalidate_first_token: false,
            fail_writes: None,
            relay_calls: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
            owner: Mutex::new(String::new()),
            base_url: Mutex::new(String::new()),
        }
    }
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn seed(state: &StubState, rows: &[(&str, &str)]) {
    let mut stored = state.rows.lock().unwrap();
    for (key, value) in rows {
        stored.push(StoredRow {
            tag_id: 0,
            key: key.to_string(),
            value: value.to_string(),
        });
    }
}

pub async fn spawn(state: Arc<StubState>) -> String {
    let app = Router::new()
        .route("/v1/chain/get_info", post(get_info))
        .route("/v1/chain/get_block", post(get_block))
        .route("/v1/chain/get_account", post(get_account))
        .route("/v1/chain/get_table_rows", post(get_table_rows))
        .route("/v1/chain/push_transaction", post(push_transaction))
        .route("/login", post(login))
        .route("/info", get(relay_info))
        .route("/getcreditcount", get(credit_count))
        .route("/insertKey", post(insert_key))
        .route("/updateKey", post(update_key))
        .route("/reKey", post(re_key))
        .route("/deleteKey", post(delete_key))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    // the relay's /info reports its own address as the chain endpoint
    *state.base_url.lock().unwrap() = base.clone();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

fn locator_hex(tag_id: u64, key: &str) -> String {
    hex::encode(Sha256::digest(format!("{tag_id}-{key}")))
}

fn row_json(row: &StoredRow) -> Value {
    json!({
        "tag_id": row.tag_id,
        "key": row.key,
        "value": row.value,
    })
}

async fn get_info(State(state): State<Arc<StubState>>) -> Json<Value> {
    state.chain_requests.fetch_add(1, Ordering::SeqCst);
    state.info_requests.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "chain_id": CHAIN_ID,
        "head_block_num": 1000,
        "head_block_time": "2026-08-06T10:00:00.000",
    }))
}

async fn get_block(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Json<Value> {
    state.chain_requests.fetch_add(1, Ordering::SeqCst);
    let block_num = body["block_num_or_id"].as_u64().unwrap_or(0);
    Json(json!({
        "block_num": block_num,
        "ref_block_prefix": 311_141_717u32,
        "timestamp": "2026-08-06T10:00:00.000",
    }))
}

async fn get_account(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Json<Value> {
    state.chain_requests.fetch_add(1, Ordering::SeqCst);
    let keys: Vec<Value> = state
        .account_keys
        .lock()
        .unwrap()
        .iter()
        .map(|key| json!({ "key": key, "weight": 1 }))
        .collect();
    Json(json!({
        "account_name": body["account_name"],
        "ram_quota": 10_000,
        "ram_usage": 4_000,
        "permissions": [
            { "perm_name": "active", "required_auth": { "keys": keys } },
            { "perm_name": "owner", "required_auth": { "keys": [] } },
        ],
    }))
}

async fn get_table_rows(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.chain_requests.fetch_add(1, Ordering::SeqCst);
    let rows = state.rows.lock().unwrap();

    if body.get("key_type").and_then(Value::as_str) == Some("sha256") {
        let bound = body["lower_bound"].as_str().unwrap_or_default();
        let found: Vec<Value> = rows
            .iter()
            .filter(|row| locator_hex(row.tag_id, &row.key) == bound)
            .take(1)
            .map(row_json)
            .collect();
        return Json(json!({ "rows": found, "more": false }));
    }

    let start = body
        .get("lower_bound")
        .and_then(Value::as_str)
        .and_then(|cursor| cursor.parse::<usize>().ok())
        .unwrap_or(0);
    let limit = body["limit"].as_u64().unwrap_or(100) as usize;
    let end = (start + state.page_size.min(limit)).min(rows.len());
    let page: Vec<Value> = rows[start..end].iter().map(row_json).collect();
    let more = end < rows.len();
    Json(json!({
        "rows": page,
        "more": more,
        "next_key": if more { Value::String(end.to_string()) } else { Value::Null },
    }))
}

async fn push_transaction(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> Response {
    state.chain_requests.fetch_add(1, Ordering::SeqCst);
    state.pushes.lock().unwrap().push(body.clone());
    let packed = body["packed_trx"].as_str().unwrap_or_default();
    match apply_packed(&state, packed) {
        Ok(()) => Json(json!({ "transaction_id": "a".repeat(64) })).into_response(),
        Err(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": {
                    "what": "assertion failure",
                    "details": [{ "message": message }],
                }
            })),
        )
            .into_response(),
    }
}

async fn login(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    let account = body["accountName"].as_str().unwrap_or_default();
    let signature = body["signature"].as_str().unwrap_or_default();
    let nonce = body["nounce"].as_str().unwrap_or_default();
    if account.is_empty() || nonce.is_empty() || !signature.starts_with("SIG_K1_") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    *state.owner.lock().unwrap() = account.to_string();

    let n = state.login_count.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("token-{n}");
    if !(state.invalidate_first_token && n == 1) {
        state.valid_tokens.lock().unwrap().insert(token.clone());
    }
    Json(json!({ "token": token })).into_response()
}

async fn relay_info(State(state): State<Arc<StubState>>) -> Json<Value> {
    Json(json!({ "eos_endpoint": *state.base_url.lock().unwrap() }))
}

async fn credit_count(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    if let Err(status) = authorize(&state, &headers) {
        return status.into_response();
    }
    Json(json!({ "credits": 42 })).into_response()
}

async fn insert_key(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    relay_write(&state, &headers, &body, "insertKey", "insertkey")
}

async fn update_key(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    relay_write(&state, &headers, &body, "updateKey", "updatekey")
}

async fn re_key(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    relay_write(&state, &headers, &body, "reKey", "rekey")
}

async fn delete_key(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    relay_write(&state, &headers, &body, "deleteKey", "deletekey")
}

fn authorize(state: &StubState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or_default();
    if state.valid_tokens.lock().unwrap().contains(token) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// Build the relay's answer to a write request: the matching action packed
/// into a transaction carrying only the relay's signature.
fn relay_write(
    state: &StubState,
    headers: &HeaderMap,
    body: &Value,
    endpoint: &str,
    action_name: &str,
) -> Response {
    if let Err(status) = authorize(state, headers) {
        return status.into_response();
    }
    if let Some(status) = state.fail_writes {
        return StatusCode::from_u16(status).unwrap().into_response();
    }
    state.relay_calls.lock().unwrap().push(endpoint.to_string());

    let owner = state.owner.lock().unwrap().clone();
    let tag_id = body["tagId"].as_u64().unwrap_or(0);
    let key = body["key"].as_str().unwrap_or_default();
    let data = match action_name {
        "insertkey" | "updatekey" => codec::pack_insertkey(
            &owner,
            tag_id,
            key,
            body["value"].as_str().unwrap_or_default(),
        ),
        "rekey" => codec::pack_rekey(
            &owner,
            tag_id,
            key,
            body["newKey"].as_str().unwrap_or_default(),
        ),
        _ => codec::pack_deletekey(&owner, tag_id, key),
    }
    .unwrap();

    let action = Action {
        account: "putinventory".to_string(),
        name: action_name.to_string(),
        authorization: vec![Authorization {
            actor: owner,
            permission: "active".to_string(),
        }],
        data,
    };
    let header = TransactionHeader {
        expiration: 1_800_000_000,
        ref_block_num: 0,
        ref_block_prefix: 0,
    };
    let packed = codec::pack_transaction(&header, &[action]).unwrap();
    Json(json!({
        "packed_trx": {
            "serializedTransaction": hex::encode(packed),
            "signatures": [RELAY_SIG],
        }
    }))
    .into_response()
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[*pos..*pos + 8]);
    *pos += 8;
    u64::from_le_bytes(buf)
}

fn read_varuint(bytes: &[u8], pos: &mut usize) -> u64 {
    let mut value: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = bytes[*pos];
        *pos += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    value
}

fn read_string(bytes: &[u8], pos: &mut usize) -> String {
    let len = read_varuint(bytes, pos) as usize;
    let value = String::from_utf8(bytes[*pos..*pos + len].to_vec()).unwrap();
    *pos += len;
    value
}

fn decode_actions(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut pos = 10; // expiration + ref_block_num + ref_block_prefix
    read_varuint(bytes, &mut pos); // max_net_usage_words
    pos += 1; // max_cpu_usage_ms
    read_varuint(bytes, &mut pos); // delay_sec
    assert_eq!(read_varuint(bytes, &mut pos), 0, "context-free actions");
    let count = read_varuint(bytes, &mut pos);

    let mut actions = Vec::new();
    for _ in 0..count {
        read_u64(bytes, &mut pos); // contract account
        let name = codec::name_from_u64(read_u64(bytes, &mut pos));
        let auth_count = read_varuint(bytes, &mut pos) as usize;
        pos += auth_count * 16;
        let len = read_varuint(bytes, &mut pos) as usize;
        actions.push((name, bytes[pos..pos + len].to_vec()));
        pos += len;
    }
    actions
}

fn apply_packed(state: &StubState, packed_hex: &str) -> Result<(), String> {
    let bytes = hex::decode(packed_hex).map_err(|e| e.to_string())?;
    for (name, data) in decode_actions(&bytes) {
        let mut pos = 0;
        read_u64(&data, &mut pos); // owner
        let tag_id = read_u64(&data, &mut pos);
        let key = read_string(&data, &mut pos);

        let mut rows = state.rows.lock().unwrap();
        match name.as_str() {
            "insertkey" => {
                if rows.iter().any(|r| r.tag_id == tag_id && r.key == key) {
                    return Err(format!("assertion failure with message: key {key} exists"));
                }
                let value = read_string(&data, &mut pos);
                rows.push(StoredRow { tag_id, key, value });
            }
            "updatekey" => {
                let value = read_string(&data, &mut pos);
                let row = rows
                    .iter_mut()
                    .find(|r| r.tag_id == tag_id && r.key == key)
                    .ok_or(format!("assertion failure with message: key {key} not found"))?;
                row.value = value;
            }
            "rekey" => {
                let new_key = read_string(&data, &mut pos);
                let row = rows
                    .iter_mut()
                    .find(|r| r.tag_id == tag_id && r.key == key)
                    .ok_or(format!("assertion failure with message: key {key} not found"))?;
                row.key = new_key;
            }
            "deletekey" => {
                let before = rows.len();
                rows.retain(|r| !(r.tag_id == tag_id && r.key == key));
                if rows.len() == before {
                    return Err(format!("assertion failure with message: key {key} not found"));
                }
            }
            other => return Err(format!("unknown action {other}")),
        }
    }
    Ok(())
}
