//! HTTP transport to the trusted chain node.

pub mod client;
pub mod error;

pub use client::{BakingRight, EndorsingRight, Head, NodeClient};
pub use error::{Result, RpcError};
