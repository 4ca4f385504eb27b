//! Candidate block assembly: mempool to signed bytes.
//!
//! The product is a [`PendingCandidate`] parked on the injector queue until
//! its scheduled timestamp. Everything here is per-level and non-idempotent;
//! the controller's marker sets make sure it runs at most once per level.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::{json, Value};

use kiln_crypto::{base58, blake2b_256, KeyProvider, Watermark};
use kiln_rpc::{Head, NodeClient};

use crate::clock;
use crate::config::BakerCfg;
use crate::classifier::{self, PASS_COUNT};
use crate::error::{BakerError, Result};
use crate::gate::MempoolGate;
use crate::nonces;
use crate::pow::{protocol_data_hex, StampSearch};

/// A signed candidate waiting for its slot. The signed bytes are final; the
/// injector submits them verbatim or not at all.
#[derive(Debug, Clone)]
pub struct PendingCandidate {
    pub target_level: i64,
    pub target_timestamp: i64,
    pub chain_id: String,
    pub signed_block: String,
    /// One `{branch, data}` list per validation pass.
    pub operations: Vec<Vec<Value>>,
    /// Present when the level carried a commitment.
    pub seed: Option<String>,
    pub seed_nonce_hash: Option<String>,
}

/// Syntactically valid all-zero signature for preapply templates; the node
/// decodes it and throws it away.
static PLACEHOLDER_SIG: Lazy<String> =
    Lazy::new(|| base58::encode(&base58::ED25519_SIGNATURE, &[0u8; 64]));

/// Filters and buckets the pool's applied operations for the candidate:
/// current-branch only, blacklist and duplicates removed, pool order kept
/// within each pass.
pub fn select_operations(
    applied: &[Value],
    head_hash: &str,
    bad_ops: &HashSet<String>,
) -> Vec<Vec<Value>> {
    let mut matrix: Vec<Vec<Value>> = vec![Vec::new(); PASS_COUNT];
    let mut seen: HashSet<String> = HashSet::new();
    for op in applied {
        if op.get("branch").and_then(Value::as_str) != Some(head_hash) {
            continue;
        }
        let hash = match op.get("hash").and_then(Value::as_str) {
            Some(h) => h.to_string(),
            None => continue,
        };
        if bad_ops.contains(&hash) || !seen.insert(hash) {
            continue;
        }
        matrix[classifier::validation_pass(op)].push(op.clone());
    }
    matrix
}

fn template_header(
    head: &Head,
    priority: u16,
    seed_nonce_hash: Option<&str>,
    operations: &[Vec<Value>],
) -> Value {
    let mut protocol_data = json!({
        "protocol": head.protocol,
        "priority": priority,
        "proof_of_work_nonce": "0000000000000000",
        "signature": PLACEHOLDER_SIG.as_str(),
    });
    if let Some(snh) = seed_nonce_hash {
        protocol_data["seed_nonce_hash"] = json!(snh);
    }
    json!({ "protocol_data": protocol_data, "operations": operations })
}

/// `{branch, data}` pairs from the preapply response, pass by pass and in
/// the node's order. This strips whatever the node would reject again at
/// injection.
fn normalize_operations(preapplied: &Value) -> Vec<Vec<Value>> {
    let mut out: Vec<Vec<Value>> = vec![Vec::new(); PASS_COUNT];
    let passes = match preapplied.get("operations").and_then(Value::as_array) {
        Some(p) => p,
        None => return out,
    };
    for (i, pass) in passes.iter().take(PASS_COUNT).enumerate() {
        if let Some(applied) = pass.get("applied").and_then(Value::as_array) {
            for op in applied {
                out[i].push(json!({
                    "branch": op.get("branch").cloned().unwrap_or(Value::Null),
                    "data": op.get("data").cloned().unwrap_or(Value::Null),
                }));
            }
        }
    }
    out
}

async fn fetch_applied(client: &NodeClient) -> Result<Vec<Value>> {
    let pool = client.pending_operations().await?;
    Ok(pool
        .get("applied")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

/// Assembles, stamps and signs a candidate for `head.level + 1`.
pub async fn bake_candidate(
    client: &NodeClient,
    key: &dyn KeyProvider,
    cfg: &BakerCfg,
    head: &Head,
    priority: u16,
    scheduled: i64,
    bad_ops: &HashSet<String>,
) -> Result<PendingCandidate> {
    let target = head.level + 1;

    // fresh seed when the target is a commitment level
    let mut seed_hex = String::new();
    let mut seed_nonce_hash: Option<String> = None;
    if nonces::is_commitment_level(&cfg.network, target) {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        seed_hex = hex::encode(seed);
        let snh = base58::encode(&base58::NONCE_HASH, &blake2b_256(&seed));
        log::info!("baker: committing to seed nonce {} at level {}", snh, target);
        seed_nonce_hash = Some(snh);
    }

    let mut gate = MempoolGate::new(cfg.gate_max_rejections);
    let mut restarts = 0u32;
    let preapplied = loop {
        // wait until the pool carries what the protocol asked for
        let applied = loop {
            let applied = fetch_applied(client).await?;
            if gate.admit(&applied) {
                break applied;
            }
            clock::sleep_ms(cfg.gate_retry_ms).await;
        };

        let selected = select_operations(&applied, &head.hash, bad_ops);
        let header = template_header(head, priority, seed_nonce_hash.as_deref(), &selected);
        let timestamp = scheduled.max(clock::now_unix());

        match client.preapply_block(&head.hash, &header, timestamp).await {
            Ok(v) => break v,
            Err(e) => {
                if restarts < cfg.gate_max_rejections {
                    if let Some(required) = e.required_endorsements() {
                        restarts += 1;
                        log::info!(
                            "baker: preapply wants {} endorsements for priority {}, waiting",
                            required,
                            priority
                        );
                        gate.require(required);
                        clock::sleep_ms(cfg.gate_retry_ms).await;
                        continue;
                    }
                }
                // one more try with nothing in the block
                log::warn!("baker: preapply failed ({}), retrying with empty operations", e);
                let empty: Vec<Vec<Value>> = vec![Vec::new(); PASS_COUNT];
                let header = template_header(head, priority, seed_nonce_hash.as_deref(), &empty);
                match client.preapply_block(&head.hash, &header, timestamp).await {
                    Ok(v) => break v,
                    Err(e2) => {
                        return Err(BakerError::Fatal(format!(
                            "preapply rejected even an empty candidate: {}",
                            e2
                        )))
                    }
                }
            }
        }
    };

    let operations = normalize_operations(&preapplied);

    // forge the shell with placeholder protocol data, then cut the
    // placeholder tail off: priority, pow nonce and the commitment flag get
    // rewritten by the stamp search
    let mut shell = preapplied
        .get("shell_header")
        .cloned()
        .ok_or_else(|| BakerError::Fatal("preapply response without shell_header".into()))?;
    shell["protocol_data"] = json!(protocol_data_hex(priority, "", "", ""));
    let forged = client.forge_block_header(&head.hash, &shell).await?;
    if forged.len() < 22 {
        return Err(BakerError::Fatal("forged header shorter than protocol data".into()));
    }
    let forged_prefix = &forged[..forged.len() - 22];

    let stamped = StampSearch::new(cfg.stamp_threshold)
        .run(forged_prefix, priority, &seed_hex)
        .await?;

    let chain_id_raw = base58::decode(&base58::CHAIN_ID, &head.chain_id)?;
    let mut chain_id = [0u8; 4];
    chain_id.copy_from_slice(&chain_id_raw);
    let signed = key.sign(&hex::decode(&stamped)?, &Watermark::Block { chain_id })?;

    Ok(PendingCandidate {
        target_level: target,
        target_timestamp: scheduled,
        chain_id: head.chain_id.clone(),
        signed_block: signed.sbytes,
        operations,
        seed: if seed_hex.is_empty() { None } else { Some(seed_hex) },
        seed_nonce_hash,
    })
}
