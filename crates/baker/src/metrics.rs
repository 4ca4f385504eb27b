//! Prometheus metrics, compiled in behind the `metrics` feature. The
//! helpers below are no-ops otherwise so call sites stay unconditional.

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_gauge, IntCounter, IntGauge,
};

#[cfg(feature = "metrics")]
pub static HEAD_LEVEL: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("kiln_head_level", "Level of the last observed chain head")
        .expect("metric registered")
});

#[cfg(feature = "metrics")]
pub static ENDORSEMENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kiln_endorsements_total", "Endorsements injected")
        .expect("metric registered")
});

#[cfg(feature = "metrics")]
pub static BLOCKS_INJECTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kiln_blocks_injected_total", "Blocks injected")
        .expect("metric registered")
});

#[cfg(feature = "metrics")]
pub static BAKES_ATTEMPTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kiln_bakes_attempted_total", "Block assemblies started")
        .expect("metric registered")
});

#[cfg(feature = "metrics")]
pub static BAKE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kiln_bake_failures_total", "Block assemblies that failed")
        .expect("metric registered")
});

#[cfg(feature = "metrics")]
pub static NONCE_REVEALS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kiln_nonce_reveals_total", "Seed nonce revelations attempted")
        .expect("metric registered")
});

#[cfg(feature = "metrics")]
pub static NONCES_ABANDONED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kiln_nonces_abandoned_total", "Nonces dropped after their reveal window closed")
        .expect("metric registered")
});

#[cfg(feature = "metrics")]
pub static RPC_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kiln_rpc_failures_total", "Node RPC calls that failed")
        .expect("metric registered")
});

#[cfg(feature = "metrics")]
pub static POW_ATTEMPTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kiln_pow_attempts_total", "Stamp search attempts")
        .expect("metric registered")
});

#[inline]
pub fn head_level_set(level: i64) {
    #[cfg(feature = "metrics")]
    HEAD_LEVEL.set(level);
    #[cfg(not(feature = "metrics"))]
    let _ = level;
}

#[inline]
pub fn endorsement_inc() {
    #[cfg(feature = "metrics")]
    ENDORSEMENTS_TOTAL.inc();
}

#[inline]
pub fn block_injected_inc() {
    #[cfg(feature = "metrics")]
    BLOCKS_INJECTED_TOTAL.inc();
}

#[inline]
pub fn bake_attempt_inc() {
    #[cfg(feature = "metrics")]
    BAKES_ATTEMPTED_TOTAL.inc();
}

#[inline]
pub fn bake_failure_inc() {
    #[cfg(feature = "metrics")]
    BAKE_FAILURES_TOTAL.inc();
}

#[inline]
pub fn nonce_reveal_inc() {
    #[cfg(feature = "metrics")]
    NONCE_REVEALS_TOTAL.inc();
}

#[inline]
pub fn nonce_abandoned_inc() {
    #[cfg(feature = "metrics")]
    NONCES_ABANDONED_TOTAL.inc();
}

#[inline]
pub fn rpc_failure_inc() {
    #[cfg(feature = "metrics")]
    RPC_FAILURES_TOTAL.inc();
}

#[inline]
pub fn pow_attempts_add(n: u64) {
    #[cfg(feature = "metrics")]
    POW_ATTEMPTS_TOTAL.inc_by(n);
    #[cfg(not(feature = "metrics"))]
    let _ = n;
}

/// Text exposition for the `/metrics` route.
#[cfg(feature = "metrics")]
pub fn render() -> String {
    use prometheus::{Encoder, TextEncoder};
    let mut buf = Vec::new();
    let _ = TextEncoder::new().encode(&prometheus::gather(), &mut buf);
    String::from_utf8(buf).unwrap_or_default()
}
