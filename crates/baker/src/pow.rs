//! Proof-of-work stamp over a candidate block header.
//!
//! The protocol accepts a header when the first 8 bytes of
//! blake2b-256(header bytes plus a 64-byte zero signature placeholder),
//! read big-endian, are at or below the stamp threshold. The 4-byte counter
//! inside the protocol data is the only thing that varies between attempts.

use kiln_crypto::blake2b_256;

use crate::config::POW_HEADER;
use crate::error::Result;
use crate::metrics;

/// Hex encoding of block protocol data: 16-bit priority, the constant
/// proof-of-work prefix, the search counter, then either `ff` plus the
/// padded seed commitment or `00`.
pub fn protocol_data_hex(priority: u16, pow_header: &str, pow: &str, seed_hex: &str) -> String {
    let mut s = format!("{:04x}", priority);
    s.push_str(&pad_hex(pow_header, 8));
    s.push_str(&pad_hex(pow, 8));
    if seed_hex.is_empty() {
        s.push_str("00");
    } else {
        s.push_str("ff");
        s.push_str(&pad_hex(seed_hex, 64));
    }
    s
}

fn pad_hex(s: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    out.push_str(s);
    while out.len() < width {
        out.push('0');
    }
    out
}

/// Stamp predicate over the full hashing buffer (header plus the 64 zero
/// bytes standing in for the signature).
pub fn stamp_ok(buffer: &[u8], threshold: u64) -> bool {
    let digest = blake2b_256(buffer);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) <= threshold
}

/// Counter search for a passing stamp.
pub struct StampSearch {
    threshold: u64,
    /// Attempts between cooperative yields.
    batch: u64,
}

impl StampSearch {
    pub fn new(threshold: u64) -> Self {
        Self { threshold, batch: 2000 }
    }

    /// Searches from the forged header prefix. Returns the full candidate
    /// header as hex, without the signature placeholder.
    pub async fn run(&self, forged_prefix_hex: &str, priority: u16, seed_hex: &str) -> Result<String> {
        let prefix = hex::decode(forged_prefix_hex)?;
        let proto = hex::decode(protocol_data_hex(priority, POW_HEADER, "00000000", seed_hex))?;

        let mut buf = Vec::with_capacity(prefix.len() + proto.len() + 64);
        buf.extend_from_slice(&prefix);
        buf.extend_from_slice(&proto);
        buf.extend_from_slice(&[0u8; 64]);

        // counter bytes: past the priority and the constant pow prefix
        let pow_off = prefix.len() + 2 + 4;
        let mut attempts: u64 = 0;
        loop {
            // big-endian increment, carrying from the low byte
            for i in (0..4).rev() {
                let b = &mut buf[pow_off + i];
                if *b == 255 {
                    *b = 0;
                } else {
                    *b += 1;
                    break;
                }
            }
            attempts += 1;
            if stamp_ok(&buf, self.threshold) {
                metrics::pow_attempts_add(attempts);
                log::debug!("pow: stamp found after {} attempts", attempts);
                buf.truncate(buf.len() - 64);
                return Ok(hex::encode(buf));
            }
            if attempts % self.batch == 0 {
                tokio::task::yield_now().await;
            }
        }
    }
}
