//! In-process mock of the node RPC surface. Scenario state lives behind a
//! mutex so tests can rewrite the head or script failures between ticks;
//! every POST the agent makes is recorded for assertions.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use kiln_baker::config::{BakerCfg, NetworkPreset, MAINNET};
use kiln_baker::controller::Controller;
use kiln_crypto::{base58, KeyProvider, SoftKey};
use kiln_rpc::NodeClient;

pub struct MockState {
    pub head: Value,
    pub endorsing_rights: Value,
    pub baking_rights: Value,
    pub mempool: Value,
    /// Applied to rights responses; the response body is captured before
    /// the delay so a mid-flight state rewrite doesn't alter it.
    pub rights_delay_ms: u64,
    pub forged_op_hex: String,
    pub forged_header_hex: String,
    pub preapply_block_errors: VecDeque<(u16, Value)>,
    pub inject_block_error: Option<(u16, Value)>,

    pub endorsing_requests: usize,
    pub injected_operations: Vec<Value>,
    pub injected_blocks: Vec<Value>,
    pub preapplied_operations: Vec<Value>,
    pub preapply_block_calls: Vec<Value>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            head: json!(null),
            endorsing_rights: json!([]),
            baking_rights: json!([]),
            mempool: json!({ "applied": [] }),
            rights_delay_ms: 0,
            forged_op_hex: "deadbeef".repeat(8),
            // last 22 hex chars are the placeholder tail the baker strips
            forged_header_hex: format!("{}{}", "ab".repeat(30), "0".repeat(22)),
            preapply_block_errors: VecDeque::new(),
            inject_block_error: None,
            endorsing_requests: 0,
            injected_operations: Vec::new(),
            injected_blocks: Vec::new(),
            preapplied_operations: Vec::new(),
            preapply_block_calls: Vec::new(),
        }
    }
}

pub struct MockNode {
    pub url: String,
    pub state: Arc<Mutex<MockState>>,
}

type Shared = Arc<Mutex<MockState>>;

async fn head_handler(State(st): State<Shared>) -> Json<Value> {
    Json(st.lock().head.clone())
}

async fn endorsing_handler(State(st): State<Shared>) -> Json<Value> {
    let (delay, body) = {
        let mut guard = st.lock();
        guard.endorsing_requests += 1;
        (guard.rights_delay_ms, guard.endorsing_rights.clone())
    };
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    Json(body)
}

async fn baking_handler(State(st): State<Shared>) -> Json<Value> {
    let (delay, body) = {
        let guard = st.lock();
        (guard.rights_delay_ms, guard.baking_rights.clone())
    };
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    Json(body)
}

async fn mempool_handler(State(st): State<Shared>) -> Json<Value> {
    Json(st.lock().mempool.clone())
}

async fn forge_ops_handler(State(st): State<Shared>, Json(_op): Json<Value>) -> Json<Value> {
    Json(json!(st.lock().forged_op_hex))
}

async fn preapply_ops_handler(State(st): State<Shared>, Json(ops): Json<Value>) -> Json<Value> {
    st.lock().preapplied_operations.push(ops.clone());
    Json(ops)
}

async fn preapply_block_handler(
    State(st): State<Shared>,
    Json(header): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut guard = st.lock();
    guard.preapply_block_calls.push(header);
    if let Some((status, body)) = guard.preapply_block_errors.pop_front() {
        return (StatusCode::from_u16(status).unwrap(), Json(body));
    }
    (
        StatusCode::OK,
        Json(json!({
            "shell_header": { "level": 0 },
            "operations": [
                { "applied": [] }, { "applied": [] }, { "applied": [] }, { "applied": [] }
            ]
        })),
    )
}

async fn forge_header_handler(State(st): State<Shared>, Json(_shell): Json<Value>) -> Json<Value> {
    Json(json!({ "block": st.lock().forged_header_hex }))
}

async fn inject_op_handler(State(st): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    st.lock().injected_operations.push(body);
    Json(json!("onMockOperationHash"))
}

async fn inject_block_handler(
    State(st): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut guard = st.lock();
    if let Some((status, err)) = guard.inject_block_error.clone() {
        return (StatusCode::from_u16(status).unwrap(), Json(err));
    }
    guard.injected_blocks.push(body);
    (StatusCode::OK, Json(json!("BMockInjectedBlock")))
}

pub async fn spawn_node() -> MockNode {
    let state: Shared = Arc::new(Mutex::new(MockState::default()));
    let app = Router::new()
        .route("/chains/:chain/blocks/head", get(head_handler))
        .route(
            "/chains/:chain/blocks/:block/helpers/endorsing_rights",
            get(endorsing_handler),
        )
        .route(
            "/chains/:chain/blocks/:block/helpers/baking_rights",
            get(baking_handler),
        )
        .route(
            "/chains/:chain/blocks/:block/helpers/forge/operations",
            post(forge_ops_handler),
        )
        .route(
            "/chains/:chain/blocks/:block/helpers/preapply/operations",
            post(preapply_ops_handler),
        )
        .route(
            "/chains/:chain/blocks/:block/helpers/preapply/block",
            post(preapply_block_handler),
        )
        .route(
            "/chains/:chain/blocks/:block/helpers/forge_block_header",
            post(forge_header_handler),
        )
        .route("/chains/:chain/mempool/pending_operations", get(mempool_handler))
        .route("/injection/operation", post(inject_op_handler))
        .route("/injection/block", post(inject_block_handler))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockNode { url: format!("http://{}", addr), state }
}

pub fn chain_id() -> String {
    base58::encode(&base58::CHAIN_ID, &[0, 0, 0, 1])
}

pub fn head_json(hash: &str, level: i64) -> Value {
    json!({
        "protocol": "PsMockProtocol",
        "chain_id": chain_id(),
        "hash": hash,
        "header": { "level": level, "timestamp": "2026-08-02T00:00:00Z" }
    })
}

pub fn endorsing_rights_json(level: i64) -> Value {
    json!([{ "level": level, "delegate": "tz1mock", "slots": [3, 7] }])
}

/// A right whose estimated time is long past, so the bake is due.
pub fn baking_rights_json(level: i64, priority: u16) -> Value {
    json!([{
        "level": level,
        "delegate": "tz1mock",
        "priority": priority,
        "estimated_time": "2020-01-01T00:00:00Z"
    }])
}

pub fn mempool_op(hash: &str, branch: &str, kind: &str) -> Value {
    json!({ "hash": hash, "branch": branch, "contents": [{ "kind": kind }] })
}

pub fn test_cfg(url: &str, nonce_file: std::path::PathBuf, network: NetworkPreset) -> BakerCfg {
    BakerCfg {
        node_url: url.to_string(),
        chain: "main".to_string(),
        network,
        nonce_file,
        tick_ms: 1000,
        gate_retry_ms: 10,
        gate_max_rejections: 10,
        // instant stamp so scenarios are about orchestration, not hashing
        stamp_threshold: u64::MAX,
    }
}

pub fn controller(url: &str, nonce_file: std::path::PathBuf) -> Arc<Controller> {
    controller_on(url, nonce_file, MAINNET)
}

pub fn controller_on(
    url: &str,
    nonce_file: std::path::PathBuf,
    network: NetworkPreset,
) -> Arc<Controller> {
    let cfg = test_cfg(url, nonce_file, network);
    let client = Arc::new(NodeClient::new(url, "main").unwrap());
    let key: Arc<dyn KeyProvider> = Arc::new(SoftKey::from_seed([7u8; 32]));
    Controller::new(cfg, client, key)
}

/// Polls until the condition holds or the timeout passes.
pub async fn wait_until<F: Fn() -> bool>(timeout_ms: u64, cond: F) -> bool {
    let start = Instant::now();
    loop {
        if cond() {
            return true;
        }
        if start.elapsed().as_millis() as u64 > timeout_ms {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Gives dispatched tasks a moment, then confirms the condition never
/// became true.
pub async fn settled<F: Fn() -> bool>(ms: u64, cond: F) -> bool {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    !cond()
}
