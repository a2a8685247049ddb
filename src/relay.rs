//! Relay ("co-payment") HTTP client: challenge/response login, the
//! handle-owned bearer session, and the co-signed write endpoints.

use rand::Rng;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cosign::PreparedTransaction;
use crate::error::{Error, Result};
use crate::keys::PrivateKey;

#[derive(Debug, Clone, Deserialize)]
pub struct RelayInfo {
    #[serde(default)]
    pub eos_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Client for one relay endpoint. The session credential lives here, scoped
/// to the owning handle, so differently configured handles in one process
/// cannot clobber each other's sessions.
#[derive(Debug)]
pub struct RelayClient {
    client: reqwest::Client,
    endpoint: String,
    account: String,
    session: RwLock<Option<String>>,
}

impl RelayClient {
    pub fn new(client: reqwest::Client, endpoint: &str, account: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            account: account.to_string(),
            session: RwLock::new(None),
        }
    }

    /// Unauthenticated service metadata, including the chain endpoint the
    /// relay fronts.
    pub async fn info(&self) -> Result<RelayInfo> {
        let url = format!("{}/info", self.endpoint);
        debug!(%url, "relay info");
        Ok(self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    /// Challenge/response login: sign a fresh random nonce with the account
    /// key and trade it for a bearer credential.
    async fn login(&self, signer: &PrivateKey) -> Result<String> {
        let mut nonce_bytes = [0u8; 32];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = hex::encode(nonce_bytes);
        let digest: [u8; 32] = Sha256::digest(nonce.as_bytes()).into();
        let signature = signer.sign_digest(&digest);

        info!(account = %self.account, "logging in to relay");
        let url = format!("{}/login", self.endpoint);
        // the relay API's historical field spelling is "nounce"
        let body = json!({
            "accountName": self.account,
            "signature": signature,
            "nounce": nonce,
        });
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if is_auth_failure(status) {
            return Err(Error::Unauthorized {
                status: status.as_u16(),
            });
        }
        let login: LoginResponse = response.error_for_status()?.json().await?;
        *self.session.write().await = Some(login.token.clone());
        Ok(login.token)
    }

    /// Issue an authenticated request, logging in first when no session is
    /// held. A 401/403 response invalidates the session and the request is
    /// retried exactly once after a re-login; every other failure
    /// propagates untouched.
    async fn send_authed<F>(&self, signer: &PrivateKey, build: F) -> Result<serde_json::Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        // clone out of the guard before a possible login takes the write lock
        let held = self.session.read().await.clone();
        let token = match held {
            Some(token) => token,
            None => self.login(signer).await?,
        };
        let response = build().bearer_auth(&token).send().await?;
        if !is_auth_failure(response.status()) {
            return Ok(response.error_for_status()?.json().await?);
        }

        warn!(status = %response.status(), "relay session rejected, logging in again");
        let token = self.login(signer).await?;
        let response = build().bearer_auth(&token).send().await?;
        let status = response.status();
        if is_auth_failure(status) {
            return Err(Error::Unauthorized {
                status: status.as_u16(),
            });
        }
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn insert_key(
        &self,
        signer: &PrivateKey,
        tag_id: u64,
        key: &str,
        value: &str,
    ) -> Result<PreparedTransaction> {
        let url = format!("{}/insertKey", self.endpoint);
        let body = json!({ "tagId": tag_id, "key": key, "value": value });
        let response = self.send_authed(signer, || self.client.post(&url).json(&body)).await?;
        Ok(serde_json::from_value(response)?)
    }

    pub async fn update_key(
        &self,
        signer: &PrivateKey,
        tag_id: u64,
        key: &str,
        value: &str,
    ) -> Result<PreparedTransaction> {
        let url = format!("{}/updateKey", self.endpoint);
        let body = json!({ "tagId": tag_id, "key": key, "value": value });
        let response = self.send_authed(signer, || self.client.post(&url).json(&body)).await?;
        Ok(serde_json::from_value(response)?)
    }

    pub async fn rekey(
        &self,
        signer: &PrivateKey,
        tag_id: u64,
        key: &str,
        new_key: &str,
    ) -> Result<PreparedTransaction> {
        let url = format!("{}/reKey", self.endpoint);
        let body = json!({ "tagId": tag_id, "key": key, "newKey": new_key });
        let response = self.send_authed(signer, || self.client.post(&url).json(&body)).await?;
        Ok(serde_json::from_value(response)?)
    }

    pub async fn delete_key(
        &self,
        signer: &PrivateKey,
        tag_id: u64,
        key: &str,
    ) -> Result<PreparedTransaction> {
        let url = format!("{}/deleteKey", self.endpoint);
        let body = json!({ "tagId": tag_id, "key": key });
        let response = self.send_authed(signer, || self.client.post(&url).json(&body)).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Remaining prepaid transaction credits for the account.
    pub async fn credit_count(&self, signer: &PrivateKey) -> Result<u64> {
        let url = format!("{}/getcreditcount", self.endpoint);
        let response = self.send_authed(signer, || self.client.get(&url)).await?;
        response
            .get("credits")
            .and_then(|c| c.as_u64())
            .ok_or_else(|| Error::Protocol("relay returned no credit count".into()))
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}
