//! Watermarked signing behind a narrow provider trait.
//!
//! The engine never learns what kind of key it holds: everything it needs is
//! `public_key_hash()` and `sign(bytes, watermark)`. The software key below
//! is one provider; a hardware signer would be another.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

use crate::base58;
use crate::error::{CryptoError, Result};
use crate::hash::{blake2b_160, blake2b_256};

/// Domain-separation tag prefixed (with the chain id) to bytes before
/// signing, so a block signature can never double as an endorsement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Watermark {
    Block { chain_id: [u8; 4] },
    Endorsement { chain_id: [u8; 4] },
}

impl Watermark {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Watermark::Block { chain_id } => {
                let mut v = vec![0x01];
                v.extend_from_slice(chain_id);
                v
            }
            Watermark::Endorsement { chain_id } => {
                let mut v = vec![0x02];
                v.extend_from_slice(chain_id);
                v
            }
        }
    }
}

/// A signature in both forms the node consumes: the raw signed bytes for
/// injection and the base58 `edsig` for operation objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signed {
    /// Hex of `message || raw signature`, ready for the injection endpoints.
    pub sbytes: String,
    /// Base58check `edsig...` form, attached to preapplied operations.
    pub prefix_sig: String,
}

pub trait KeyProvider: Send + Sync {
    /// `tz1...` address of the delegate.
    fn public_key_hash(&self) -> String;
    /// `edpk...` form of the public key.
    fn public_key(&self) -> String;
    fn sign(&self, bytes: &[u8], watermark: &Watermark) -> Result<Signed>;
}

/// In-process Ed25519 key. Signs blake2b-256 of the watermarked payload.
pub struct SoftKey {
    signing: SigningKey,
}

impl SoftKey {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { signing: SigningKey::from_bytes(&seed) }
    }

    /// Accepts either the 32-byte seed form (`edsk`, 54 chars) or the
    /// 64-byte expanded form.
    pub fn from_secret(secret: &str) -> Result<Self> {
        if let Ok(seed) = base58::decode(&base58::ED25519_SEED, secret) {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&seed);
            return Ok(Self::from_seed(arr));
        }
        let full = base58::decode(&base58::ED25519_SECRET_KEY, secret)?;
        let mut pair = [0u8; 64];
        pair.copy_from_slice(&full);
        let signing =
            SigningKey::from_keypair_bytes(&pair).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { signing })
    }

    /// Loads from a key file: either a bare `edsk...` line or a JSON object
    /// with a `secret_key` field.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CryptoError::KeyFile(format!("{}: {}", path.display(), e)))?;
        let trimmed = text.trim();
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Some(sk) = v.get("secret_key").and_then(|s| s.as_str()) {
                return Self::from_secret(sk);
            }
        }
        Self::from_secret(trimmed)
    }

    fn verifying(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }
}

impl KeyProvider for SoftKey {
    fn public_key_hash(&self) -> String {
        let pk = self.verifying().to_bytes();
        base58::encode(&base58::ED25519_PUBLIC_KEY_HASH, &blake2b_160(&pk))
    }

    fn public_key(&self) -> String {
        base58::encode(&base58::ED25519_PUBLIC_KEY, &self.verifying().to_bytes())
    }

    fn sign(&self, bytes: &[u8], watermark: &Watermark) -> Result<Signed> {
        let mut payload = watermark.to_bytes();
        payload.extend_from_slice(bytes);
        let digest = blake2b_256(&payload);
        let sig = self.signing.sign(&digest).to_bytes();
        Ok(Signed {
            sbytes: format!("{}{}", hex::encode(bytes), hex::encode(sig)),
            prefix_sig: base58::encode(&base58::ED25519_SIGNATURE, &sig),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    fn key() -> SoftKey {
        SoftKey::from_seed([7u8; 32])
    }

    #[test]
    fn address_forms() {
        let k = key();
        assert!(k.public_key_hash().starts_with("tz1"));
        assert!(k.public_key().starts_with("edpk"));
    }

    #[test]
    fn sign_verifies_over_watermarked_digest() {
        let k = key();
        let chain_id = [0xa1, 0xb2, 0xc3, 0xd4];
        let msg = b"candidate header bytes";
        let signed = k.sign(msg, &Watermark::Block { chain_id }).unwrap();

        let raw = base58::decode(&base58::ED25519_SIGNATURE, &signed.prefix_sig).unwrap();
        let sig = Signature::from_bytes(&raw.try_into().unwrap());
        let mut payload = vec![0x01, 0xa1, 0xb2, 0xc3, 0xd4];
        payload.extend_from_slice(msg);
        k.verifying().verify(&blake2b_256(&payload), &sig).unwrap();

        // sbytes is message || signature
        assert_eq!(signed.sbytes.len(), msg.len() * 2 + 128);
        assert!(signed.sbytes.starts_with(&hex::encode(msg)));
    }

    #[test]
    fn watermarks_are_disjoint() {
        let k = key();
        let chain_id = [0u8; 4];
        let a = k.sign(b"x", &Watermark::Block { chain_id }).unwrap();
        let b = k.sign(b"x", &Watermark::Endorsement { chain_id }).unwrap();
        assert_ne!(a.prefix_sig, b.prefix_sig);
    }

    #[test]
    fn secret_round_trip() {
        let k = key();
        let encoded = base58::encode(&base58::ED25519_SEED, &[7u8; 32]);
        let restored = SoftKey::from_secret(&encoded).unwrap();
        assert_eq!(k.public_key_hash(), restored.public_key_hash());
    }
}
