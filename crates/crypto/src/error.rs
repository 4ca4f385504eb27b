// crates/crypto/src/error.rs

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key material")]
    InvalidKey,
    #[error("base58check decode failed")]
    Base58,
    #[error("wrong base58 prefix (expected {0})")]
    BadPrefix(&'static str),
    #[error("bad payload length: got {got}, want {want}")]
    BadLength { got: usize, want: usize },
    #[error("invalid hex")]
    Hex,
    #[error("key file unreadable: {0}")]
    KeyFile(String),
}

pub type Result<T> = core::result::Result<T, CryptoError>;
