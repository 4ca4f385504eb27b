//! The shared forge → sign → preapply → inject pipeline for the two
//! single-content operations the agent originates: endorsements for the
//! current head and seed-nonce revelations.

use serde_json::{json, Value};

use kiln_crypto::{base58, KeyProvider, Watermark};
use kiln_rpc::{Head, NodeClient};

use crate::error::Result;
use crate::ops;

#[derive(Debug, Clone)]
pub enum SingleOp {
    Endorsement { level: i64 },
    SeedNonceRevelation { level: i64, nonce_hex: String },
}

impl SingleOp {
    fn to_json(&self, branch: &str) -> Value {
        match self {
            SingleOp::Endorsement { level } => ops::endorsement(branch, *level),
            SingleOp::SeedNonceRevelation { level, nonce_hex } => {
                ops::seed_nonce_revelation(branch, *level, nonce_hex)
            }
        }
    }
}

fn chain_id_bytes(head: &Head) -> Result<[u8; 4]> {
    let raw = base58::decode(&base58::CHAIN_ID, &head.chain_id)?;
    let mut out = [0u8; 4];
    out.copy_from_slice(&raw);
    Ok(out)
}

/// Runs the whole pipeline; returns the injected operation hash.
pub async fn inject_single_op(
    client: &NodeClient,
    key: &dyn KeyProvider,
    head: &Head,
    op: SingleOp,
) -> Result<String> {
    let mut op_json = op.to_json(&head.hash);

    let forged = client.forge_operations(&head.hash, &op_json).await?;
    let bytes = hex::decode(&forged)?;

    let watermark = Watermark::Endorsement { chain_id: chain_id_bytes(head)? };
    let signed = key.sign(&bytes, &watermark)?;

    op_json["protocol"] = json!(head.protocol);
    op_json["signature"] = json!(signed.prefix_sig);
    client
        .preapply_operations(&head.hash, &json!([op_json]))
        .await?;

    Ok(client.inject_operation(&signed.sbytes).await?)
}

/// Convenience wrapper that logs instead of propagating; pipeline failures
/// are per-level events, not process errors.
pub async fn try_inject(
    client: &NodeClient,
    key: &dyn KeyProvider,
    head: &Head,
    op: SingleOp,
) -> Option<String> {
    let what = match &op {
        SingleOp::Endorsement { level } => format!("endorsement for level {}", level),
        SingleOp::SeedNonceRevelation { level, .. } => format!("nonce reveal for level {}", level),
    };
    match inject_single_op(client, key, head, op).await {
        Ok(hash) => {
            log::info!("endorser: +Injected {} as {}", what, hash);
            Some(hash)
        }
        Err(e) => {
            log::warn!("endorser: !Couldn't inject {}: {}", what, e);
            None
        }
    }
}
