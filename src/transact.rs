//! Direct-signing submission path and the per-call transaction options.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::chain::ChainRpc;
use crate::codec::{pack_transaction, Action, Authorization, TransactionHeader};
use crate::cosign::{signing_digest, SignedTransaction};
use crate::error::{Error, Result};
use crate::keys::PrivateKey;

/// Per-call knobs for a write. Defaults match a plain fire-and-forget
/// submission: sign, broadcast, reference the head block, expire in a
/// minute.
#[derive(Debug, Clone)]
pub struct TransactOptions {
    pub tag_id: u64,
    /// Override for the default `[{ actor: account, permission }]`.
    pub authorization: Option<Vec<Authorization>>,
    pub broadcast: bool,
    pub sign: bool,
    pub blocks_behind: u32,
    pub expire_seconds: u32,
}

impl Default for TransactOptions {
    fn default() -> Self {
        Self {
            tag_id: 0,
            authorization: None,
            broadcast: true,
            sign: true,
            blocks_behind: 0,
            expire_seconds: 60,
        }
    }
}

/// Outcome of a write.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Chain acceptance receipt from broadcasting.
    Broadcast(serde_json::Value),
    /// The fully signed transaction, returned un-submitted.
    Unbroadcast(SignedTransaction),
}

impl Submission {
    /// The signed transaction of a non-broadcast write, if that is what
    /// this submission holds.
    pub fn into_unbroadcast(self) -> Option<SignedTransaction> {
        match self {
            Submission::Unbroadcast(signed) => Some(signed),
            Submission::Broadcast(_) => None,
        }
    }
}

/// Build, sign and (optionally) push a transaction carrying `actions`.
///
/// The reference block is `head - blocks_behind` and the expiration is that
/// block's timestamp plus `expire_seconds`, both resolved against the chain
/// at call time. The chain id is the caller's per-handle cached value.
pub async fn submit(
    rpc: &ChainRpc,
    chain_id: &str,
    signer: &PrivateKey,
    actions: Vec<Action>,
    options: &TransactOptions,
) -> Result<Submission> {
    let info = rpc.get_info().await?;
    let ref_block = rpc
        .get_block(info.head_block_num.saturating_sub(options.blocks_behind))
        .await?;
    let block_time = NaiveDateTime::parse_from_str(&ref_block.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| {
            Error::Protocol(format!(
                "unparseable block timestamp {:?}: {e}",
                ref_block.timestamp
            ))
        })?;
    let header = TransactionHeader {
        expiration: (block_time.and_utc().timestamp() + i64::from(options.expire_seconds)) as u32,
        ref_block_num: (ref_block.block_num & 0xffff) as u16,
        ref_block_prefix: ref_block.ref_block_prefix,
    };
    debug!(
        expiration = header.expiration,
        ref_block_num = header.ref_block_num,
        actions = actions.len(),
        "packing transaction"
    );

    let packed = pack_transaction(&header, &actions)?;
    let serialized_transaction = hex::encode(&packed);
    let signatures = if options.sign {
        let digest = signing_digest(chain_id, &packed)?;
        vec![signer.sign_digest(&digest)]
    } else {
        Vec::new()
    };

    if options.broadcast {
        let receipt = rpc
            .push_transaction(&signatures, &serialized_transaction)
            .await?;
        Ok(Submission::Broadcast(receipt))
    } else {
        Ok(Submission::Unbroadcast(SignedTransaction {
            signatures,
            serialized_transaction,
        }))
    }
}
