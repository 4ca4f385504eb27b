//! Deferred injection of signed candidates.
//!
//! Candidates wait on the queue until their scheduled timestamp. A drain
//! never submits a candidate at or below the observed head, and a level is
//! marked injected before its RPC goes out, so a slow node can't provoke a
//! second submission.

use std::collections::HashSet;

use serde_json::json;

use kiln_rpc::NodeClient;

use crate::assembly::PendingCandidate;
use crate::metrics;
use crate::nonce_store::Nonce;

/// Splits the queue: candidates due now come back (their levels marked),
/// stale candidates are dropped, future ones stay queued.
pub fn take_due(
    pending: &mut Vec<PendingCandidate>,
    head_level: i64,
    now: i64,
    injected_levels: &mut HashSet<i64>,
) -> Vec<PendingCandidate> {
    let mut due = Vec::new();
    pending.retain(|c| {
        if c.target_level <= head_level {
            log::info!(
                "injector: dropping stale candidate for level {} (head is {})",
                c.target_level,
                head_level
            );
            return false;
        }
        if c.target_timestamp > now {
            return true;
        }
        if injected_levels.contains(&c.target_level) {
            return false;
        }
        injected_levels.insert(c.target_level);
        due.push(c.clone());
        false
    });
    due
}

/// Outcome of submitting one candidate.
pub enum Injected {
    /// Block accepted; carries the nonce record to persist when the level
    /// was a commitment level.
    Accepted { block_hash: String, nonce: Option<Nonce> },
    /// Node refused; carries any operation hashes it blamed.
    Refused { bad_ops: Vec<String> },
}

pub async fn submit(client: &NodeClient, candidate: &PendingCandidate) -> Injected {
    let payload = json!({
        "data": candidate.signed_block,
        "operations": candidate.operations,
    });
    match client.inject_block(&candidate.chain_id, &payload).await {
        Ok(block_hash) => {
            log::info!(
                "injector: +Injected block {} at level {}",
                block_hash,
                candidate.target_level
            );
            metrics::block_injected_inc();
            let nonce = match (&candidate.seed, &candidate.seed_nonce_hash) {
                (Some(seed), Some(snh)) => Some(Nonce {
                    level: candidate.target_level,
                    seed: seed.clone(),
                    seed_nonce_hash: snh.clone(),
                    injected_block_hash: block_hash.clone(),
                    revealed: false,
                }),
                _ => None,
            };
            Injected::Accepted { block_hash, nonce }
        }
        Err(e) => {
            let bad_ops = e.offending_operations();
            if bad_ops.is_empty() {
                log::warn!(
                    "injector: !Couldn't inject level {}: {}",
                    candidate.target_level,
                    e
                );
            } else {
                log::warn!(
                    "injector: !Couldn't inject level {}: blacklisting {:?}",
                    candidate.target_level,
                    bad_ops
                );
            }
            metrics::rpc_failure_inc();
            Injected::Refused { bad_ops }
        }
    }
}
