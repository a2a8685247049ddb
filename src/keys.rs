//! K1 key material: WIF private keys, legacy public key strings and
//! canonical recoverable signatures over 32-byte digests.

use rand::Rng;
use ripemd::Ripemd160;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Version byte of a legacy WIF private key.
const WIF_VERSION: u8 = 0x80;

/// Account private key. Parsed once at configuration time; signing never
/// leaves this module.
#[derive(Clone)]
pub struct PrivateKey {
    secret: SecretKey,
    secp: Secp256k1<secp256k1::All>,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never log key material
        f.debug_struct("PrivateKey").finish_non_exhaustive()
    }
}

impl PrivateKey {
    /// Parse a legacy WIF string (base58, 0x80 version byte, double-sha256
    /// checksum).
    pub fn from_wif(wif: &str) -> Result<Self> {
        let bytes = bs58::decode(wif)
            .into_vec()
            .map_err(|e| Error::Validation(format!("invalid private key encoding: {e}")))?;
        if bytes.len() != 37 || bytes[0] != WIF_VERSION {
            return Err(Error::Validation("invalid private key format".into()));
        }
        let (payload, checksum) = bytes.split_at(33);
        if sha256d(payload)[..4] != *checksum {
            return Err(Error::Validation("invalid private key checksum".into()));
        }
        let secret = SecretKey::from_slice(&payload[1..])
            .map_err(|e| Error::Validation(format!("invalid private key: {e}")))?;
        Ok(Self {
            secret,
            secp: Secp256k1::new(),
        })
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let mut bytes = [0u8; 32];
            rng.fill(&mut bytes);
            if let Ok(secret) = SecretKey::from_slice(&bytes) {
                return Self {
                    secret,
                    secp: Secp256k1::new(),
                };
            }
        }
    }

    /// Encode back to the legacy WIF form.
    pub fn to_wif(&self) -> String {
        let mut payload = Vec::with_capacity(37);
        payload.push(WIF_VERSION);
        payload.extend_from_slice(&self.secret.secret_bytes());
        let checksum = sha256d(&payload);
        payload.extend_from_slice(&checksum[..4]);
        bs58::encode(payload).into_string()
    }

    /// Legacy public key string (`EOS...`).
    pub fn public_key(&self) -> String {
        let compressed = PublicKey::from_secret_key(&self.secp, &self.secret).serialize();
        let checksum = Ripemd160::digest(compressed);
        let mut payload = compressed.to_vec();
        payload.extend_from_slice(&checksum[..4]);
        format!("EOS{}", bs58::encode(payload).into_string())
    }

    /// Sign a 32-byte digest, producing a canonical `SIG_K1_...` signature.
    ///
    /// Non-canonical signatures are rejected by the chain, so signing retries
    /// with extra RFC-6979 nonce data until the result is canonical.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> String {
        let message = Message::from_digest(*digest);
        let mut nonce: u32 = 0;
        loop {
            let signature = if nonce == 0 {
                self.secp.sign_ecdsa_recoverable(&message, &self.secret)
            } else {
                let mut extra = [0u8; 32];
                extra[..4].copy_from_slice(&nonce.to_le_bytes());
                self.secp
                    .sign_ecdsa_recoverable_with_noncedata(&message, &self.secret, &extra)
            };
            let (recovery_id, compact) = signature.serialize_compact();
            let mut bytes = [0u8; 65];
            bytes[0] = 27 + 4 + i32::from(recovery_id) as u8;
            bytes[1..].copy_from_slice(&compact);
            if is_canonical(&bytes) {
                return encode_signature(&bytes);
            }
            nonce += 1;
        }
    }
}

/// A generated keypair in its string forms.
#[derive(Debug, Clone)]
pub struct Keypair {
    pub private_key: String,
    pub public_key: String,
}

impl Keypair {
    pub fn generate() -> Self {
        let key = PrivateKey::generate();
        Self {
            private_key: key.to_wif(),
            public_key: key.public_key(),
        }
    }
}

/// Fresh random owner and active keypairs for provisioning an account.
#[derive(Debug, Clone)]
pub struct KeypairSet {
    pub owner: Keypair,
    pub active: Keypair,
}

impl KeypairSet {
    pub fn generate() -> Self {
        Self {
            owner: Keypair::generate(),
            active: Keypair::generate(),
        }
    }
}

fn sha256d(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// Canonical form constraint on the 65-byte `[recovery, r, s]` layout: the
/// high bit of neither component may be set, nor reachable by stripping a
/// leading zero byte.
fn is_canonical(signature: &[u8; 65]) -> bool {
    signature[1] & 0x80 == 0
        && !(signature[1] == 0 && signature[2] & 0x80 == 0)
        && signature[33] & 0x80 == 0
        && !(signature[33] == 0 && signature[34] & 0x80 == 0)
}

/// `SIG_K1_` + base58 of the 65 signature bytes and a 4-byte RIPEMD-160
/// checksum over the signature with a `K1` suffix.
fn encode_signature(bytes: &[u8; 65]) -> String {
    let mut hasher = Ripemd160::new();
    hasher.update(bytes);
    hasher.update(b"K1");
    let checksum = hasher.finalize();
    let mut payload = bytes.to_vec();
    payload.extend_from_slice(&checksum[..4]);
    format!("SIG_K1_{}", bs58::encode(payload).into_string())
}
