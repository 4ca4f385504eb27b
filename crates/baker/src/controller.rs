//! The periodic tick that coordinates injection, head tracking, nonce
//! reveals, endorsing and baking.
//!
//! All control-loop state lives in one [`EngineState`] behind a mutex; the
//! tick takes the lock only for short synchronous windows, and dispatched
//! per-level work re-checks the head before acting. Marker sets record a
//! level *before* its RPC goes out, which is what makes repeated ticks
//! harmless.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{interval, Duration};

use kiln_crypto::KeyProvider;
use kiln_rpc::{Head, NodeClient};

use crate::assembly::{self, PendingCandidate};
use crate::clock;
use crate::config::BakerCfg;
use crate::endorser::{self, SingleOp};
use crate::injector::{self, Injected};
use crate::metrics;
use crate::nonce_store::{Nonce, NonceStore};
use crate::nonces::{self, NonceAction};

#[derive(Default)]
pub struct EngineState {
    pub head: Option<Head>,
    /// First level the agent may act on; set from the first observed head.
    pub start_level: Option<i64>,
    pub endorsed_levels: HashSet<i64>,
    pub baked_levels: HashSet<i64>,
    pub injected_levels: HashSet<i64>,
    pub pending: Vec<PendingCandidate>,
    /// Operation hashes the node blamed during an injection; excluded from
    /// candidates for the rest of the process lifetime.
    pub bad_ops: HashSet<String>,
    pub nonces: Vec<Nonce>,
}

pub struct Controller {
    cfg: BakerCfg,
    client: Arc<NodeClient>,
    key: Arc<dyn KeyProvider>,
    store: Arc<NonceStore>,
    state: Arc<Mutex<EngineState>>,
    /// Guards the head fetch: at most one tick advances the head at a time.
    lock_baker: AtomicBool,
}

impl Controller {
    pub fn new(cfg: BakerCfg, client: Arc<NodeClient>, key: Arc<dyn KeyProvider>) -> Arc<Self> {
        let store = Arc::new(NonceStore::new(&cfg.nonce_file));
        let state = EngineState { nonces: store.load(), ..Default::default() };
        if !state.nonces.is_empty() {
            log::info!("controller: loaded {} outstanding nonce(s)", state.nonces.len());
        }
        Arc::new(Self {
            cfg,
            client,
            key,
            store,
            state: Arc::new(Mutex::new(state)),
            lock_baker: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> Arc<Mutex<EngineState>> {
        Arc::clone(&self.state)
    }

    /// One tick of the control loop. Safe to call at any cadence; all
    /// per-level actions are idempotent through the marker sets.
    pub async fn tick(self: &Arc<Self>) {
        let now = clock::now_unix();
        self.drain_injector(now).await;

        if self.lock_baker.swap(true, Ordering::SeqCst) {
            // previous head fetch still in flight
            return;
        }
        let head = match self.client.head().await {
            Ok(h) => h,
            Err(e) => {
                log::warn!("controller: head fetch failed: {}", e);
                metrics::rpc_failure_inc();
                self.lock_baker.store(false, Ordering::SeqCst);
                return;
            }
        };

        let (stand_down, to_reveal) = self.absorb_head(&head).await;
        self.lock_baker.store(false, Ordering::SeqCst);

        for nonce in to_reveal {
            metrics::nonce_reveal_inc();
            let this = Arc::clone(self);
            let head = head.clone();
            tokio::spawn(async move {
                endorser::try_inject(
                    &this.client,
                    this.key.as_ref(),
                    &head,
                    SingleOp::SeedNonceRevelation { level: nonce.level, nonce_hex: nonce.seed },
                )
                .await;
            });
        }

        if stand_down {
            log::debug!("controller: standing down at head level {}", head.level);
            return;
        }

        let (endorse_needed, bake_needed) = {
            let st = self.state.lock().await;
            (
                !st.endorsed_levels.contains(&head.level),
                !st.baked_levels.contains(&(head.level + 1)),
            )
        };
        if endorse_needed {
            let this = Arc::clone(self);
            let head = head.clone();
            tokio::spawn(async move { this.endorse_task(head).await });
        }
        if bake_needed {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.bake_task(head).await });
        }
    }

    /// Step 1: submit every due candidate against the current head.
    async fn drain_injector(self: &Arc<Self>, now: i64) {
        let due = {
            let mut guard = self.state.lock().await;
            let head_level = match &guard.head {
                Some(h) => h.level,
                None => return,
            };
            let st = &mut *guard;
            injector::take_due(&mut st.pending, head_level, now, &mut st.injected_levels)
        };
        for candidate in due {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                match injector::submit(&this.client, &candidate).await {
                    Injected::Accepted { nonce, .. } => {
                        if let Some(n) = nonce {
                            let mut st = this.state.lock().await;
                            log::info!(
                                "nonces: tracking commitment at level {} until revealed",
                                n.level
                            );
                            st.nonces.push(n);
                            this.store.save(&st.nonces);
                        }
                    }
                    Injected::Refused { bad_ops } => {
                        if !bad_ops.is_empty() {
                            let mut st = this.state.lock().await;
                            st.bad_ops.extend(bad_ops);
                        }
                    }
                }
            });
        }
    }

    /// Steps 2–4: replace the head snapshot, prune markers, classify
    /// nonces, arm the stand-down guard. Returns whether to stand down and
    /// the nonces due for revelation.
    async fn absorb_head(&self, head: &Head) -> (bool, Vec<Nonce>) {
        let mut st = self.state.lock().await;
        if st.head.is_none() {
            st.start_level = Some(head.level + 1);
            log::info!(
                "controller: first head at level {}, standing down until level {}",
                head.level,
                head.level + 1
            );
        }
        st.head = Some(head.clone());
        metrics::head_level_set(head.level);

        // below-head markers can never be acted on again
        let min = head.level;
        st.endorsed_levels.retain(|l| *l >= min);
        st.baked_levels.retain(|l| *l > min);
        st.injected_levels.retain(|l| *l > min);

        let mut to_reveal = Vec::new();
        let mut dropped = false;
        let cycle_length = self.cfg.network.cycle_length;
        st.nonces.retain(|n| match nonces::classify(n.level, head.level, cycle_length) {
            NonceAction::Abandon => {
                log::warn!(
                    "nonces: !Abandon nonce for level {} (window closed at head {})",
                    n.level,
                    head.level
                );
                metrics::nonce_abandoned_inc();
                dropped = true;
                false
            }
            NonceAction::Reveal if !n.revealed => {
                to_reveal.push(n.clone());
                dropped = true;
                false
            }
            _ => true,
        });
        if dropped {
            self.store.save(&st.nonces);
        }

        let stand_down = head.level < st.start_level.unwrap_or(i64::MAX);
        (stand_down, to_reveal)
    }

    /// Step 5: endorse the head level when the key holds a slot there.
    async fn endorse_task(self: Arc<Self>, head: Head) {
        let delegate = self.key.public_key_hash();
        let rights = match self
            .client
            .endorsing_rights(&head.hash, head.level, &delegate)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                log::warn!("endorser: rights query failed: {}", e);
                metrics::rpc_failure_inc();
                return;
            }
        };
        if !rights.iter().any(|r| r.level == head.level && !r.slots.is_empty()) {
            return;
        }

        {
            let mut st = self.state.lock().await;
            match &st.head {
                Some(h) if h.hash == head.hash => {}
                _ => {
                    log::warn!("endorser: !Head changed, dropping endorsement for level {}", head.level);
                    return;
                }
            }
            if !st.endorsed_levels.insert(head.level) {
                return;
            }
        }

        log::info!("endorser: -Endorsing level {}", head.level);
        if endorser::try_inject(
            &self.client,
            self.key.as_ref(),
            &head,
            SingleOp::Endorsement { level: head.level },
        )
        .await
        .is_some()
        {
            metrics::endorsement_inc();
        }
    }

    /// Step 6: bake the next level when the key holds a due right there.
    async fn bake_task(self: Arc<Self>, head: Head) {
        let target = head.level + 1;
        let delegate = self.key.public_key_hash();
        let rights = match self.client.baking_rights(&head.hash, target, &delegate).await {
            Ok(r) => r,
            Err(e) => {
                log::warn!("baker: rights query failed: {}", e);
                metrics::rpc_failure_inc();
                return;
            }
        };
        let right = match rights
            .iter()
            .filter(|r| r.level == target)
            .min_by_key(|r| r.priority)
        {
            Some(r) => r.clone(),
            None => return,
        };

        let now = clock::now_unix();
        let scheduled = right
            .estimated_time
            .as_deref()
            .and_then(clock::parse_rfc3339)
            .unwrap_or(now);
        if scheduled > now {
            log::debug!(
                "baker: right for level {} (priority {}) not due for {}s",
                target,
                right.priority,
                scheduled - now
            );
            return;
        }

        let bad_ops = {
            let mut st = self.state.lock().await;
            match &st.head {
                Some(h) if h.hash == head.hash => {}
                _ => {
                    log::warn!("baker: !Head changed, dropping bake for level {}", target);
                    return;
                }
            }
            if !st.baked_levels.insert(target) {
                return;
            }
            st.bad_ops.clone()
        };

        log::info!("baker: -Trying to bake level {} (priority {})", target, right.priority);
        metrics::bake_attempt_inc();
        match assembly::bake_candidate(
            &self.client,
            self.key.as_ref(),
            &self.cfg,
            &head,
            right.priority,
            scheduled,
            &bad_ops,
        )
        .await
        {
            Ok(candidate) => {
                log::info!(
                    "baker: candidate for level {} signed, due at {}",
                    target,
                    candidate.target_timestamp
                );
                let mut st = self.state.lock().await;
                st.pending.push(candidate);
            }
            Err(e) => {
                log::warn!("baker: !Couldn't bake level {}: {}", target, e);
                metrics::bake_failure_inc();
            }
        }
    }

    /// Runs ticks on a fixed cadence until the handle is stopped.
    pub fn spawn(self: &Arc<Self>) -> ControllerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_c = Arc::clone(&stop);
        let this = Arc::clone(self);
        let join = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(this.cfg.tick_ms.max(1)));
            loop {
                if stop_c.load(Ordering::Relaxed) {
                    break;
                }
                ticker.tick().await;
                this.tick().await;
            }
        });
        ControllerHandle { stop, join }
    }
}

pub struct ControllerHandle {
    stop: Arc<AtomicBool>,
    join: tokio::task::JoinHandle<()>,
}

impl ControllerHandle {
    /// Clears the tick timer; in-flight dispatched work completes on its
    /// own.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub async fn join(self) {
        let _ = self.join.await;
    }
}
