//! Fixed wire codec for the contract's four action payloads and the outer
//! transaction envelope.
//!
//! Only the schemas this client submits are packed here; general
//! ABI-driven serialization stays with the chain tooling.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const NAME_CHARMAP: &[u8] = b".12345abcdefghijklmnopqrstuvwxyz";

/// One permission level authorizing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub actor: String,
    pub permission: String,
}

/// A contract action with its payload already packed.
#[derive(Debug, Clone)]
pub struct Action {
    pub account: String,
    pub name: String,
    pub authorization: Vec<Authorization>,
    pub data: Vec<u8>,
}

/// Fields of the transaction envelope that vary per submission.
#[derive(Debug, Clone, Copy)]
pub struct TransactionHeader {
    /// Expiration as Unix seconds.
    pub expiration: u32,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
}

/// Encode an account name into its base32 u64 form. Up to 12 characters
/// from `.1-5a-z`, plus a restricted 13th.
pub fn name_to_u64(name: &str) -> Result<u64> {
    if name.is_empty() || name.len() > 13 {
        return Err(Error::Validation(format!("invalid name {name:?}")));
    }
    let mut value: u64 = 0;
    for (i, byte) in name.bytes().enumerate() {
        let symbol = NAME_CHARMAP
            .iter()
            .position(|c| *c == byte)
            .ok_or_else(|| Error::Validation(format!("invalid character in name {name:?}")))?
            as u64;
        if i < 12 {
            value |= symbol << (64 - 5 * (i as u64 + 1));
        } else {
            if symbol > 0x0f {
                return Err(Error::Validation(format!(
                    "invalid 13th character in name {name:?}"
                )));
            }
            value |= symbol;
        }
    }
    Ok(value)
}

/// Decode the base32 u64 form back into an account name.
pub fn name_from_u64(value: u64) -> String {
    let mut chars = [b'.'; 13];
    let mut tmp = value;
    for i in 0..13 {
        let mask: u64 = if i == 0 { 0x0f } else { 0x1f };
        chars[12 - i] = NAME_CHARMAP[(tmp & mask) as usize];
        tmp >>= if i == 0 { 4 } else { 5 };
    }
    let name: String = chars.iter().map(|b| *b as char).collect();
    name.trim_end_matches('.').to_string()
}

pub fn push_varuint32(buf: &mut Vec<u8>, mut value: u32) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn push_string(buf: &mut Vec<u8>, value: &str) {
    push_varuint32(buf, value.len() as u32);
    buf.extend_from_slice(value.as_bytes());
}

fn push_name(buf: &mut Vec<u8>, name: &str) -> Result<()> {
    buf.extend_from_slice(&name_to_u64(name)?.to_le_bytes());
    Ok(())
}

/// `insertkey(owner, tag_id, key, value)` payload.
pub fn pack_insertkey(owner: &str, tag_id: u64, key: &str, value: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    push_name(&mut buf, owner)?;
    buf.extend_from_slice(&tag_id.to_le_bytes());
    push_string(&mut buf, key);
    push_string(&mut buf, value);
    Ok(buf)
}

/// `updatekey(owner, tag_id, key, value)` payload. Same layout as insert.
pub fn pack_updatekey(owner: &str, tag_id: u64, key: &str, value: &str) -> Result<Vec<u8>> {
    pack_insertkey(owner, tag_id, key, value)
}

/// `rekey(owner, tag_id, key, new_key)` payload.
pub fn pack_rekey(owner: &str, tag_id: u64, key: &str, new_key: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    push_name(&mut buf, owner)?;
    buf.extend_from_slice(&tag_id.to_le_bytes());
    push_string(&mut buf, key);
    push_string(&mut buf, new_key);
    Ok(buf)
}

/// `deletekey(owner, tag_id, key)` payload.
pub fn pack_deletekey(owner: &str, tag_id: u64, key: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    push_name(&mut buf, owner)?;
    buf.extend_from_slice(&tag_id.to_le_bytes());
    push_string(&mut buf, key);
    Ok(buf)
}

fn pack_action(buf: &mut Vec<u8>, action: &Action) -> Result<()> {
    push_name(buf, &action.account)?;
    push_name(buf, &action.name)?;
    push_varuint32(buf, action.authorization.len() as u32);
    for auth in &action.authorization {
        push_name(buf, &auth.actor)?;
        push_name(buf, &auth.permission)?;
    }
    push_varuint32(buf, action.data.len() as u32);
    buf.extend_from_slice(&action.data);
    Ok(())
}

/// Pack the full transaction envelope. Resource limits, delay and the
/// context-free sections are always zero for this contract's actions.
pub fn pack_transaction(header: &TransactionHeader, actions: &[Action]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&header.expiration.to_le_bytes());
    buf.extend_from_slice(&header.ref_block_num.to_le_bytes());
    buf.extend_from_slice(&header.ref_block_prefix.to_le_bytes());
    push_varuint32(&mut buf, 0); // max_net_usage_words
    buf.push(0); // max_cpu_usage_ms
    push_varuint32(&mut buf, 0); // delay_sec
    push_varuint32(&mut buf, 0); // context_free_actions
    push_varuint32(&mut buf, actions.len() as u32);
    for action in actions {
        pack_action(&mut buf, action)?;
    }
    push_varuint32(&mut buf, 0); // transaction_extensions
    Ok(buf)
}
