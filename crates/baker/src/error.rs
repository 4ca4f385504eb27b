use kiln_crypto::CryptoError;
use kiln_rpc::RpcError;

#[derive(thiserror::Error, Debug)]
pub enum BakerError {
    #[error("rpc: {0}")]
    Rpc(#[from] RpcError),
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),
    #[error("bad hex from node: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("assembly failed for this level: {0}")]
    Fatal(String),
}

pub type Result<T> = core::result::Result<T, BakerError>;
