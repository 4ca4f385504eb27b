//! Network presets and runtime configuration.

use std::path::PathBuf;

/// Proof-of-work stamp threshold: first 8 digest bytes, big-endian, must be
/// at or below this. `2^46 - 1` on the networks in scope.
pub const STAMP_THRESHOLD: u64 = 70_368_744_177_663;

/// Constant prefix of the 8-byte proof-of-work nonce.
pub const POW_HEADER: &str = "00000003";

/// Cycle and commitment geometry of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkPreset {
    pub name: &'static str,
    pub cycle_length: i64,
    pub commitment_interval: i64,
    pub commitment_offset: i64,
}

pub const MAINNET: NetworkPreset = NetworkPreset {
    name: "mainnet",
    cycle_length: 4096,
    commitment_interval: 32,
    commitment_offset: 0,
};

pub const TESTNET: NetworkPreset = NetworkPreset {
    name: "testnet",
    cycle_length: 2048,
    commitment_interval: 32,
    commitment_offset: 0,
};

pub const ZERONET: NetworkPreset = NetworkPreset {
    name: "zeronet",
    cycle_length: 128,
    commitment_interval: 32,
    commitment_offset: 1,
};

pub fn preset_by_name(name: &str) -> Option<NetworkPreset> {
    match name {
        "mainnet" => Some(MAINNET),
        "testnet" => Some(TESTNET),
        "zeronet" => Some(ZERONET),
        _ => None,
    }
}

/// Resolved runtime configuration for the engine.
#[derive(Debug, Clone)]
pub struct BakerCfg {
    pub node_url: String,
    pub chain: String,
    pub network: NetworkPreset,
    pub nonce_file: PathBuf,
    pub tick_ms: u64,
    /// Delay between mempool-gate retries during assembly.
    pub gate_retry_ms: u64,
    /// Gate rejections tolerated before assembly proceeds regardless.
    pub gate_max_rejections: u32,
    /// Stamp threshold; the protocol constant unless a test widens it.
    pub stamp_threshold: u64,
}

impl Default for BakerCfg {
    fn default() -> Self {
        Self {
            node_url: "http://127.0.0.1:8732".to_string(),
            chain: "main".to_string(),
            network: MAINNET,
            nonce_file: PathBuf::from("data/nonces.json"),
            tick_ms: 1000,
            gate_retry_ms: 500,
            gate_max_rejections: 10,
            stamp_threshold: STAMP_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_lookup() {
        assert_eq!(preset_by_name("mainnet"), Some(MAINNET));
        assert_eq!(preset_by_name("zeronet").unwrap().commitment_offset, 1);
        assert!(preset_by_name("nope").is_none());
    }

    #[test]
    fn threshold_is_2_pow_46_minus_1() {
        assert_eq!(STAMP_THRESHOLD, (1u64 << 46) - 1);
    }
}
