//! Narrow wrapper over the chain's HTTP API. Only the five requests this
//! client issues are covered; everything else the chain offers is out of
//! scope.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    pub head_block_num: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockRef {
    pub block_num: u32,
    pub ref_block_prefix: u32,
    /// Block production time, ISO-8601 without zone suffix.
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyWeight {
    pub key: String,
    pub weight: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequiredAuth {
    #[serde(default)]
    pub keys: Vec<KeyWeight>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Permission {
    pub perm_name: String,
    #[serde(default)]
    pub required_auth: RequiredAuth,
}

/// Account metadata. Quota/usage are signed because the chain reports `-1`
/// for unlimited quotas.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub account_name: String,
    pub ram_quota: i64,
    pub ram_usage: i64,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableRowsQuery {
    pub json: bool,
    pub code: String,
    pub scope: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<String>,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_position: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableRows {
    pub rows: Vec<serde_json::Value>,
    #[serde(default)]
    pub more: bool,
    #[serde(default)]
    pub next_key: Option<String>,
}

/// Handle-owned chain API client.
#[derive(Debug, Clone)]
pub struct ChainRpc {
    client: reqwest::Client,
    endpoint: String,
}

impl ChainRpc {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.endpoint, path);
        debug!(%url, "chain request");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn get_info(&self) -> Result<ChainInfo> {
        self.post("/v1/chain/get_info", &json!({})).await
    }

    pub async fn get_block(&self, block_num: u32) -> Result<BlockRef> {
        self.post(
            "/v1/chain/get_block",
            &json!({ "block_num_or_id": block_num }),
        )
        .await
    }

    pub async fn get_account(&self, account: &str) -> Result<Account> {
        self.post("/v1/chain/get_account", &json!({ "account_name": account }))
            .await
    }

    pub async fn get_table_rows(&self, query: &TableRowsQuery) -> Result<TableRows> {
        self.post("/v1/chain/get_table_rows", &serde_json::to_value(query)?)
            .await
    }

    /// Submit a fully signed transaction. A chain rejection surfaces as
    /// `Error::Broadcast` carrying the chain's own diagnostic detail.
    pub async fn push_transaction(
        &self,
        signatures: &[String],
        packed_trx: &str,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/v1/chain/push_transaction", self.endpoint);
        let body = json!({
            "signatures": signatures,
            "compression": 0,
            "packed_context_free_data": "",
            "packed_trx": packed_trx,
        });
        debug!(%url, signatures = signatures.len(), "pushing transaction");
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let text = response.text().await?;
        Err(Error::Broadcast {
            detail: broadcast_detail(&text),
        })
    }
}

/// Pull the human-readable rejection detail out of a chain error body,
/// falling back to the raw body when the shape is unexpected.
fn broadcast_detail(body: &str) -> String {
    let parsed: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return body.trim().to_string(),
    };
    if let Some(details) = parsed.pointer("/error/details").and_then(|d| d.as_array()) {
        let messages: Vec<&str> = details
            .iter()
            .filter_map(|d| d.get("message").and_then(|m| m.as_str()))
            .collect();
        if !messages.is_empty() {
            return messages.join("; ");
        }
    }
    if let Some(what) = parsed.pointer("/error/what").and_then(|w| w.as_str()) {
        return what.to_string();
    }
    body.trim().to_string()
}
