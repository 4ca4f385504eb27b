//! Tezos-style base58check.
//!
//! Every on-chain identifier is a multi-byte prefix, a fixed-length payload
//! and a 4-byte double-sha256 checksum, rendered in base58. `bs58`'s check
//! mode supplies the checksum; the prefix is prepended to the payload here
//! because the network prefixes are longer than one version byte.

use crate::error::{CryptoError, Result};

/// A network identifier prefix: the raw bytes prepended before check-encoding
/// and the exact payload length the identifier carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    pub name: &'static str,
    pub bytes: &'static [u8],
    pub payload_len: usize,
}

pub const BLOCK_HASH: Prefix = Prefix { name: "B", bytes: &[1, 52], payload_len: 32 };
pub const OPERATION_HASH: Prefix = Prefix { name: "o", bytes: &[5, 116], payload_len: 32 };
pub const CHAIN_ID: Prefix = Prefix { name: "Net", bytes: &[87, 82, 0], payload_len: 4 };
pub const NONCE_HASH: Prefix = Prefix { name: "nce", bytes: &[69, 220, 169], payload_len: 32 };
pub const ED25519_PUBLIC_KEY_HASH: Prefix =
    Prefix { name: "tz1", bytes: &[6, 161, 159], payload_len: 20 };
pub const ED25519_PUBLIC_KEY: Prefix =
    Prefix { name: "edpk", bytes: &[13, 15, 37, 217], payload_len: 32 };
pub const ED25519_SEED: Prefix = Prefix { name: "edsk", bytes: &[13, 15, 58, 7], payload_len: 32 };
pub const ED25519_SECRET_KEY: Prefix =
    Prefix { name: "edsk64", bytes: &[43, 246, 78, 7], payload_len: 64 };
pub const ED25519_SIGNATURE: Prefix =
    Prefix { name: "edsig", bytes: &[9, 245, 205, 134, 18], payload_len: 64 };

pub fn encode(prefix: &Prefix, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(prefix.bytes.len() + payload.len());
    data.extend_from_slice(prefix.bytes);
    data.extend_from_slice(payload);
    bs58::encode(data).with_check().into_string()
}

pub fn decode(prefix: &Prefix, s: &str) -> Result<Vec<u8>> {
    let raw = bs58::decode(s)
        .with_check(None)
        .into_vec()
        .map_err(|_| CryptoError::Base58)?;
    if !raw.starts_with(prefix.bytes) {
        return Err(CryptoError::BadPrefix(prefix.name));
    }
    let payload = &raw[prefix.bytes.len()..];
    if payload.len() != prefix.payload_len {
        return Err(CryptoError::BadLength { got: payload.len(), want: prefix.payload_len });
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_prefixes() {
        let cases: &[(&Prefix, usize, &str)] = &[
            (&BLOCK_HASH, 32, "B"),
            (&OPERATION_HASH, 32, "o"),
            (&CHAIN_ID, 4, "Net"),
            (&NONCE_HASH, 32, "nce"),
            (&ED25519_PUBLIC_KEY_HASH, 20, "tz1"),
            (&ED25519_SIGNATURE, 64, "edsig"),
        ];
        for (prefix, len, text) in cases {
            let payload: Vec<u8> = (0..*len as u8).collect();
            let s = encode(prefix, &payload);
            assert!(s.starts_with(text), "{} should start with {}", s, text);
            assert_eq!(decode(prefix, &s).unwrap(), payload);
        }
    }

    #[test]
    fn rejects_wrong_prefix() {
        let s = encode(&BLOCK_HASH, &[0u8; 32]);
        assert_eq!(decode(&OPERATION_HASH, &s), Err(CryptoError::BadPrefix("o")));
    }

    #[test]
    fn rejects_mangled_checksum() {
        let mut s = encode(&CHAIN_ID, &[1, 2, 3, 4]);
        // flip the final character
        let last = s.pop().unwrap();
        s.push(if last == '1' { '2' } else { '1' });
        assert_eq!(decode(&CHAIN_ID, &s), Err(CryptoError::Base58));
    }

    #[test]
    fn mainnet_chain_id_decodes() {
        let bytes = decode(&CHAIN_ID, "NetXdQprcVkpaWU").unwrap();
        assert_eq!(bytes.len(), 4);
    }
}
