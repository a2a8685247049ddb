//! Completion of relay-prepared transactions: the client's signature joins
//! the relay's over the same transaction body.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::keys::PrivateKey;

/// Serialized transaction body plus the signatures collected so far. As
/// returned by the relay, `signatures[0]` is the relay's own signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackedTransaction {
    #[serde(rename = "serializedTransaction")]
    pub serialized_transaction: String,
    pub signatures: Vec<String>,
}

/// Relay response for a co-signed write: a transaction the relay built and
/// signed, awaiting the account's own signature. Transient, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedTransaction {
    pub packed_trx: PackedTransaction,
}

/// A fully signed transaction, ready to push or hand off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub signatures: Vec<String>,
    pub serialized_transaction: String,
}

/// Digest the chain expects signatures over: the chain id, the packed
/// transaction body, and the hash slot of the (empty) context-free data.
pub fn signing_digest(chain_id: &str, packed_trx: &[u8]) -> Result<[u8; 32]> {
    let chain_id = hex::decode(chain_id)
        .map_err(|e| Error::Protocol(format!("invalid chain id hex: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&chain_id);
    hasher.update(packed_trx);
    hasher.update([0u8; 32]);
    Ok(hasher.finalize().into())
}

/// Add the account's signature to a relay-prepared transaction.
///
/// The relay's signature stays at index 0, byte for byte; the chain treats
/// any other ordering as an improperly authorized transaction.
pub fn complete(
    prepared: &PreparedTransaction,
    chain_id: &str,
    signer: &PrivateKey,
) -> Result<SignedTransaction> {
    let relay_signature = prepared
        .packed_trx
        .signatures
        .first()
        .cloned()
        .ok_or_else(|| Error::Protocol("relay returned no signature".into()))?;
    let body = hex::decode(&prepared.packed_trx.serialized_transaction)
        .map_err(|e| Error::Protocol(format!("invalid transaction hex: {e}")))?;
    let digest = signing_digest(chain_id, &body)?;
    let client_signature = signer.sign_digest(&digest);
    Ok(SignedTransaction {
        signatures: vec![relay_signature, client_signature],
        serialized_transaction: prepared.packed_trx.serialized_transaction.clone(),
    })
}
