//! Async client for the node RPC surface the baker consumes.
//!
//! Bodies stay `serde_json::Value` wherever they round-trip back into the
//! node (forge, preapply); only the handful of fields the engine reads get
//! typed structs, with unknown fields left alone.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, RpcError};

/// Snapshot of the chain head, immutable within one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub chain_id: String,
    pub protocol: String,
    pub hash: String,
    pub level: i64,
    pub timestamp: String,
}

#[derive(Deserialize)]
struct BlockResp {
    protocol: String,
    chain_id: String,
    hash: String,
    header: HeaderResp,
}

#[derive(Deserialize)]
struct HeaderResp {
    level: i64,
    timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndorsingRight {
    pub level: i64,
    #[serde(default)]
    pub slots: Vec<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BakingRight {
    pub level: i64,
    pub priority: u16,
    #[serde(default)]
    pub estimated_time: Option<String>,
}

pub struct NodeClient {
    base: String,
    chain: String,
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(base: &str, chain: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            chain: chain.to_string(),
            http,
        })
    }

    fn block_url(&self, block: &str, tail: &str) -> String {
        format!("{}/chains/{}/blocks/{}{}", self.base, self.chain, block, tail)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RpcError::Status { status: status.as_u16(), body })
    }

    async fn get_json(&self, url: String) -> Result<Value> {
        log::debug!("rpc: GET {}", url);
        let resp = self.http.get(&url).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn post_json(&self, url: String, body: &Value) -> Result<Value> {
        log::debug!("rpc: POST {}", url);
        let resp = self.http.post(&url).json(body).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn head(&self) -> Result<Head> {
        let v = self.get_json(self.block_url("head", "")).await?;
        let b: BlockResp = serde_json::from_value(v)?;
        Ok(Head {
            chain_id: b.chain_id,
            protocol: b.protocol,
            hash: b.hash,
            level: b.header.level,
            timestamp: b.header.timestamp,
        })
    }

    pub async fn endorsing_rights(
        &self,
        block: &str,
        level: i64,
        delegate: &str,
    ) -> Result<Vec<EndorsingRight>> {
        let url = format!(
            "{}?level={}&delegate={}",
            self.block_url(block, "/helpers/endorsing_rights"),
            level,
            delegate
        );
        let v = self.get_json(url).await?;
        Ok(serde_json::from_value(v)?)
    }

    pub async fn baking_rights(
        &self,
        block: &str,
        level: i64,
        delegate: &str,
    ) -> Result<Vec<BakingRight>> {
        let url = format!(
            "{}?level={}&delegate={}",
            self.block_url(block, "/helpers/baking_rights"),
            level,
            delegate
        );
        let v = self.get_json(url).await?;
        Ok(serde_json::from_value(v)?)
    }

    pub async fn pending_operations(&self) -> Result<Value> {
        let url = format!("{}/chains/{}/mempool/pending_operations", self.base, self.chain);
        self.get_json(url).await
    }

    /// Returns the forged operation bytes as hex.
    pub async fn forge_operations(&self, block: &str, operation: &Value) -> Result<String> {
        let v = self
            .post_json(self.block_url(block, "/helpers/forge/operations"), operation)
            .await?;
        v.as_str()
            .map(str::to_string)
            .ok_or(RpcError::Shape("forge/operations: expected hex string"))
    }

    /// Preapplies an array of signed operation objects.
    pub async fn preapply_operations(&self, block: &str, operations: &Value) -> Result<Value> {
        self.post_json(self.block_url(block, "/helpers/preapply/operations"), operations)
            .await
    }

    /// Preapplies a candidate block; `timestamp` is unix seconds.
    pub async fn preapply_block(
        &self,
        block: &str,
        header: &Value,
        timestamp: i64,
    ) -> Result<Value> {
        let url = format!(
            "{}?sort=true&timestamp={}",
            self.block_url(block, "/helpers/preapply/block"),
            timestamp
        );
        self.post_json(url, header).await
    }

    /// Forges a shell header; returns the header bytes as hex.
    pub async fn forge_block_header(&self, block: &str, shell: &Value) -> Result<String> {
        let v = self
            .post_json(self.block_url(block, "/helpers/forge_block_header"), shell)
            .await?;
        v.get("block")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(RpcError::Shape("forge_block_header: missing block field"))
    }

    /// Injects raw signed operation bytes; returns the operation hash.
    pub async fn inject_operation(&self, signed_hex: &str) -> Result<String> {
        let url = format!("{}/injection/operation", self.base);
        let v = self.post_json(url, &json!(signed_hex)).await?;
        v.as_str()
            .map(str::to_string)
            .ok_or(RpcError::Shape("injection/operation: expected hash string"))
    }

    /// Injects a signed block; returns the block hash.
    pub async fn inject_block(&self, chain_id: &str, payload: &Value) -> Result<String> {
        let url = format!("{}/injection/block?chain={}", self.base, chain_id);
        let v = self.post_json(url, payload).await?;
        v.as_str()
            .map(str::to_string)
            .ok_or(RpcError::Shape("injection/block: expected hash string"))
    }
}
