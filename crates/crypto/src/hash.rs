use blake2::digest::consts::{U20, U32};
use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<U32>;
type Blake2b160 = Blake2b<U20>;

/// 32-byte blake2b digest. Block headers, operation payloads and commitment
/// seeds all hash through here.
#[inline]
pub fn blake2b_256(msg: &[u8]) -> [u8; 32] {
    let mut h = Blake2b256::new();
    h.update(msg);
    let out = h.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// 20-byte blake2b digest, used for public key hashes.
#[inline]
pub fn blake2b_160(msg: &[u8]) -> [u8; 20] {
    let mut h = Blake2b160::new();
    h.update(msg);
    let out = h.finalize();
    let mut arr = [0u8; 20];
    arr.copy_from_slice(&out);
    arr
}
