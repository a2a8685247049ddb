//! The public handle: CRUD dispatch, reads and account utilities.

use futures_util::stream::Stream;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::chain::{Account, ChainRpc};
use crate::codec::{self, Action, Authorization};
use crate::config::{Config, DEFAULT_CONTRACT, DEFAULT_PERMISSION};
use crate::cosign::{self, PreparedTransaction};
use crate::error::{ensure, Error, Result};
use crate::estimate;
use crate::keys::{KeypairSet, PrivateKey};
use crate::locator::{self, Record};
use crate::relay::RelayClient;
use crate::transact::{self, Submission, TransactOptions};

/// RAM accounting snapshot for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RamUsage {
    pub used: i64,
    pub free: i64,
    pub total: i64,
}

/// Handle to one account's keys under one contract.
///
/// Writes are routed at construction time: with `copayment` enabled they go
/// through the relay's co-signing flow, otherwise they are signed locally
/// and pushed directly. Reads always hit the chain. All remote state is
/// re-fetched per call; nothing is cached except the chain id and the relay
/// session credential.
pub struct PutClient {
    account: String,
    contract: String,
    permission: String,
    copayment: bool,
    key: Option<PrivateKey>,
    rpc: ChainRpc,
    relay: Option<RelayClient>,
    chain_id: OnceCell<String>,
}

impl PutClient {
    /// Validate the configuration, resolve the chain endpoint (through the
    /// relay's `/info` when only a relay is configured) and return a ready
    /// handle. No readiness is deferred to later calls.
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let key = config
            .private_key
            .as_deref()
            .filter(|wif| !wif.is_empty())
            .map(PrivateKey::from_wif)
            .transpose()?;

        let http = reqwest::Client::new();
        let relay = config
            .put_endpoint
            .as_deref()
            .map(|endpoint| RelayClient::new(http.clone(), endpoint, &config.account));

        let chain_endpoint = match config.chain_endpoint {
            Some(url) => url,
            None => {
                // validate() guarantees the relay exists on this path
                let relay = relay.as_ref().ok_or_else(|| {
                    Error::Validation("at least put_endpoint or chain_endpoint is required.".into())
                })?;
                relay
                    .info()
                    .await?
                    .eos_endpoint
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| {
                        Error::Protocol("relay /info returned no chain endpoint".into())
                    })?
            }
        };

        let rpc = ChainRpc::new(http, &chain_endpoint);
        info!(
            account = %config.account,
            chain = %rpc.endpoint(),
            copayment = config.copayment,
            "client ready"
        );

        Ok(Self {
            account: config.account,
            contract: config.contract.unwrap_or_else(|| DEFAULT_CONTRACT.into()),
            permission: config.permission.unwrap_or_else(|| DEFAULT_PERMISSION.into()),
            copayment: config.copayment,
            key,
            rpc,
            relay,
            chain_id: OnceCell::new(),
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account
    }

    /// Chain id, fetched at most once per handle.
    async fn chain_id(&self) -> Result<&str> {
        self.chain_id
            .get_or_try_init(|| async { Ok::<_, Error>(self.rpc.get_info().await?.chain_id) })
            .await
            .map(String::as_str)
    }

    fn signing_key(&self) -> Result<&PrivateKey> {
        self.key.as_ref().ok_or(Error::SigningKeyRequired)
    }

    fn relay(&self) -> Result<&RelayClient> {
        self.relay
            .as_ref()
            .ok_or_else(|| Error::Validation("put_endpoint required.".into()))
    }

    /// Fetch the record stored under `key` in the default category.
    pub async fn get(&self, key: &str) -> Result<Record> {
        self.get_tagged(0, key).await
    }

    /// Fetch the record stored under `key` in category `tag_id`.
    pub async fn get_tagged(&self, tag_id: u64, key: &str) -> Result<Record> {
        locator::lookup(&self.rpc, &self.contract, &self.account, tag_id, key).await
    }

    /// Lazily stream every record owned by the account, in the store's
    /// native ascending primary-key order.
    pub fn list_all(&self) -> impl Stream<Item = Result<Record>> + '_ {
        locator::page_stream(&self.rpc, &self.contract, &self.account)
    }

    /// Collect [`list_all`](Self::list_all) into a vector.
    pub async fn all(&self) -> Result<Vec<Record>> {
        locator::fetch_all(&self.rpc, &self.contract, &self.account).await
    }

    /// Metadata of the configured account.
    pub async fn account(&self) -> Result<Account> {
        self.rpc.get_account(&self.account).await
    }

    /// Metadata of an arbitrary account.
    pub async fn account_of(&self, account: &str) -> Result<Account> {
        self.rpc.get_account(account).await
    }

    /// RAM usage of the configured account.
    pub async fn ram(&self) -> Result<RamUsage> {
        let account = self.account().await?;
        Ok(RamUsage {
            used: account.ram_usage,
            free: account.ram_quota - account.ram_usage,
            total: account.ram_quota,
        })
    }

    /// Remaining prepaid relay credits for the account.
    pub async fn credits(&self) -> Result<u64> {
        let relay = self.relay()?;
        relay.credit_count(self.signing_key()?).await
    }

    /// Whether `account` lists a permission keyed by `private_key`'s public
    /// key.
    pub async fn verify(&self, account: &str, private_key: &str) -> Result<bool> {
        let public_key = PrivateKey::from_wif(private_key)?.public_key();
        let account = self.account_of(account).await?;
        Ok(account.permissions.iter().any(|permission| {
            permission
                .required_auth
                .keys
                .iter()
                .any(|k| k.key == public_key)
        }))
    }

    /// Generate fresh random owner and active keypairs.
    pub fn keypair(&self) -> KeypairSet {
        KeypairSet::generate()
    }

    /// Store `value` under a new `key`.
    pub async fn add(&self, key: &str, value: &str) -> Result<Submission> {
        self.add_with(key, value, &TransactOptions::default()).await
    }

    pub async fn add_with(
        &self,
        key: &str,
        value: &str,
        options: &TransactOptions,
    ) -> Result<Submission> {
        ensure(!key.is_empty(), "key required.")?;
        ensure(!value.is_empty(), "value required.")?;
        let signer = self.signing_key()?;
        debug!(key, copayment = self.copayment, "add");
        if self.copayment {
            let prepared = self
                .relay()?
                .insert_key(signer, options.tag_id, key, value)
                .await?;
            self.finish_cosigned(prepared, options).await
        } else {
            let data = codec::pack_insertkey(&self.account, options.tag_id, key, value)?;
            self.submit_direct("insertkey", data, options).await
        }
    }

    /// Replace the value stored under an existing `key`.
    pub async fn set(&self, key: &str, value: &str) -> Result<Submission> {
        self.set_with(key, value, &TransactOptions::default()).await
    }

    pub async fn set_with(
        &self,
        key: &str,
        value: &str,
        options: &TransactOptions,
    ) -> Result<Submission> {
        ensure(!key.is_empty(), "key required.")?;
        ensure(!value.is_empty(), "value required.")?;
        let signer = self.signing_key()?;
        debug!(key, copayment = self.copayment, "set");
        if self.copayment {
            let prepared = self
                .relay()?
                .update_key(signer, options.tag_id, key, value)
                .await?;
            self.finish_cosigned(prepared, options).await
        } else {
            let data = codec::pack_updatekey(&self.account, options.tag_id, key, value)?;
            self.submit_direct("updatekey", data, options).await
        }
    }

    /// Rename an existing `key` to `new_key`, keeping its value.
    pub async fn rekey(&self, key: &str, new_key: &str) -> Result<Submission> {
        self.rekey_with(key, new_key, &TransactOptions::default())
            .await
    }

    pub async fn rekey_with(
        &self,
        key: &str,
        new_key: &str,
        options: &TransactOptions,
    ) -> Result<Submission> {
        ensure(!key.is_empty(), "key required.")?;
        ensure(!new_key.is_empty(), "new_key required.")?;
        let signer = self.signing_key()?;
        debug!(key, new_key, copayment = self.copayment, "rekey");
        if self.copayment {
            let prepared = self
                .relay()?
                .rekey(signer, options.tag_id, key, new_key)
                .await?;
            self.finish_cosigned(prepared, options).await
        } else {
            let data = codec::pack_rekey(&self.account, options.tag_id, key, new_key)?;
            self.submit_direct("rekey", data, options).await
        }
    }

    /// Delete the record stored under `key`.
    pub async fn delete(&self, key: &str) -> Result<Submission> {
        self.delete_with(key, &TransactOptions::default()).await
    }

    pub async fn delete_with(&self, key: &str, options: &TransactOptions) -> Result<Submission> {
        ensure(!key.is_empty(), "key required.")?;
        let signer = self.signing_key()?;
        debug!(key, copayment = self.copayment, "delete");
        if self.copayment {
            let prepared = self
                .relay()?
                .delete_key(signer, options.tag_id, key)
                .await?;
            self.finish_cosigned(prepared, options).await
        } else {
            let data = codec::pack_deletekey(&self.account, options.tag_id, key)?;
            self.submit_direct("deletekey", data, options).await
        }
    }

    /// Bytes a new row for `key`/`value` would consume.
    pub fn estimate_add(&self, key: &str, value: &str) -> i64 {
        estimate::add(key, value)
    }

    /// Byte delta of replacing the stored value of `key` with `new_value`.
    pub async fn estimate_set(&self, key: &str, new_value: &str) -> Result<i64> {
        let current = self.get(key).await?;
        Ok(estimate::set(&current, new_value))
    }

    /// Byte delta of renaming `key` to `new_key`.
    pub async fn estimate_rekey(&self, key: &str, new_key: &str) -> Result<i64> {
        let current = self.get(key).await?;
        Ok(estimate::rekey(&current, new_key))
    }

    /// Bytes released by deleting the row stored under `key`.
    pub async fn estimate_delete(&self, key: &str) -> Result<i64> {
        let current = self.get(key).await?;
        Ok(estimate::delete(&current))
    }

    async fn finish_cosigned(
        &self,
        prepared: PreparedTransaction,
        options: &TransactOptions,
    ) -> Result<Submission> {
        let chain_id = self.chain_id().await?;
        let signed = cosign::complete(&prepared, chain_id, self.signing_key()?)?;
        if options.broadcast {
            let receipt = self
                .rpc
                .push_transaction(&signed.signatures, &signed.serialized_transaction)
                .await?;
            Ok(Submission::Broadcast(receipt))
        } else {
            Ok(Submission::Unbroadcast(signed))
        }
    }

    async fn submit_direct(
        &self,
        action: &str,
        data: Vec<u8>,
        options: &TransactOptions,
    ) -> Result<Submission> {
        let authorization = options.authorization.clone().unwrap_or_else(|| {
            vec![Authorization {
                actor: self.account.clone(),
                permission: self.permission.clone(),
            }]
        });
        let action = Action {
            account: self.contract.clone(),
            name: action.to_string(),
            authorization,
            data,
        };
        let chain_id = self.chain_id().await?;
        transact::submit(&self.rpc, chain_id, self.signing_key()?, vec![action], options).await
    }
}
