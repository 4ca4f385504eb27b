//! Crypto seam for the kiln baking agent.
//!
//! Narrow by intent: blake2b digests, Tezos base58check identifiers, and
//! watermarked Ed25519 signing behind the [`KeyProvider`] trait. Nothing in
//! here knows about blocks, ticks or the node.

pub mod base58;
pub mod error;
pub mod hash;
pub mod keys;

pub use error::{CryptoError, Result};
pub use hash::{blake2b_160, blake2b_256};
pub use keys::{KeyProvider, Signed, SoftKey, Watermark};
