//! Key derivation and HMAC authentication (RFC 3414).
//!
//! Pass-phrases expand to a 1 MB repetition stream which is hashed into the
//! master key; localization binds the master key to an engine id via
//! `H(Ku || engineID || Ku)`. Message authentication is HMAC-96 computed
//! over the complete serialized message with a zeroed 12-byte placeholder
//! in msgAuthenticationParameters.

use std::collections::HashMap;
use std::sync::Mutex;

use digest::Digest;
use hmac::{Hmac, Mac};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::AuthProtocol;

/// Localized authentication key: derived from a pass-phrase and bound to a
/// specific engine id.
///
/// Key material is zeroed from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Derive a localized key (RFC 3414 Section A.2).
    ///
    /// 1. Expand the pass-phrase to 1 MB by repetition and hash it
    /// 2. Hash `master || engine_id || master`
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        let master = password_to_key(protocol, password);
        let key = localize_key(protocol, &master, engine_id);
        Self { key, protocol }
    }

    /// Wrap an already-localized key.
    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    /// The protocol this key is for.
    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Truncated MAC length for this protocol (12 for HMAC-96).
    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// Compute the truncated HMAC over `data`.
    pub fn compute_hmac(&self, data: &[u8]) -> Vec<u8> {
        match self.protocol {
            AuthProtocol::Md5 => hmac_md5_96(&self.key, data),
            AuthProtocol::Sha1 => hmac_sha1_96(&self.key, data),
        }
    }

    /// Verify a truncated HMAC in constant time.
    pub fn verify_hmac(&self, data: &[u8], expected: &[u8]) -> bool {
        let computed = self.compute_hmac(data);
        if computed.len() != expected.len() {
            return false;
        }
        let mut diff = 0u8;
        for (a, b) in computed.iter().zip(expected.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Pass-phrase to master key (RFC 3414 Section A.2.1).
pub fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => password_to_key_impl::<md5::Md5>(password),
        AuthProtocol::Sha1 => password_to_key_impl::<sha1::Sha1>(password),
    }
}

fn password_to_key_impl<D: Digest>(password: &[u8]) -> Vec<u8> {
    const EXPANSION_SIZE: usize = 1_048_576;

    if password.is_empty() {
        return vec![0u8; <D as Digest>::output_size()];
    }

    let mut hasher = D::new();

    // Hash the 1 MB repetition stream in 64-byte chunks
    let mut buf = [0u8; 64];
    let mut index = 0;
    let mut count = 0;
    while count < EXPANSION_SIZE {
        for byte in &mut buf {
            *byte = password[index];
            index = (index + 1) % password.len();
        }
        hasher.update(buf);
        count += 64;
    }

    hasher.finalize().to_vec()
}

/// Key localization (RFC 3414 Section A.2.2): `H(Ku || engineID || Ku)`.
pub fn localize_key(protocol: AuthProtocol, master_key: &[u8], engine_id: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => localize_key_impl::<md5::Md5>(master_key, engine_id),
        AuthProtocol::Sha1 => localize_key_impl::<sha1::Sha1>(master_key, engine_id),
    }
}

fn localize_key_impl<D: Digest>(master_key: &[u8], engine_id: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(master_key);
    hasher.update(engine_id);
    hasher.update(master_key);
    hasher.finalize().to_vec()
}

/// Extend a localized key to `target_len` bytes by repeat-hashing.
///
/// `Kul' = Kul || H(Kul) || H(Kul || H(Kul)) || ...` - the widely deployed
/// scheme (draft-blumenthal-aes-usm) for AES-192/256 under MD5/SHA-1.
pub fn extend_key(protocol: AuthProtocol, localized: &[u8], target_len: usize) -> Vec<u8> {
    let mut key = localized.to_vec();
    while key.len() < target_len {
        let digest = match protocol {
            AuthProtocol::Md5 => md5::Md5::digest(&key).to_vec(),
            AuthProtocol::Sha1 => sha1::Sha1::digest(&key).to_vec(),
        };
        key.extend_from_slice(&digest);
    }
    key.truncate(target_len);
    key
}

/// HMAC-MD5-96: first 12 bytes of HMAC-MD5.
fn hmac_md5_96(key: &[u8], data: &[u8]) -> Vec<u8> {
    type HmacMd5 = Hmac<md5::Md5>;

    let mut mac = <HmacMd5 as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    let out = mac.finalize().into_bytes();
    out[..12].to_vec()
}

/// HMAC-SHA-96: first 12 bytes of HMAC-SHA-1.
fn hmac_sha1_96(key: &[u8], data: &[u8]) -> Vec<u8> {
    type HmacSha1 = Hmac<sha1::Sha1>;

    let mut mac = <HmacSha1 as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    let out = mac.finalize().into_bytes();
    out[..12].to_vec()
}

/// Sign an outgoing message in place.
///
/// The auth params field at `auth_offset..auth_offset + auth_len` must
/// already hold zeros; the HMAC is computed over the whole message and the
/// zeros are overwritten with the first `auth_len` MAC bytes.
pub fn authenticate_message(
    key: &LocalizedKey,
    message: &mut [u8],
    auth_offset: usize,
    auth_len: usize,
) {
    let mac = key.compute_hmac(message);
    message[auth_offset..auth_offset + auth_len].copy_from_slice(&mac[..auth_len]);
}

/// Verify an incoming message.
///
/// Re-computes the HMAC on a copy with the auth params field zeroed and
/// compares against the received bytes.
pub fn verify_message(
    key: &LocalizedKey,
    message: &[u8],
    auth_offset: usize,
    auth_len: usize,
) -> bool {
    let received_mac = &message[auth_offset..auth_offset + auth_len];

    let mut copy = message.to_vec();
    copy[auth_offset..auth_offset + auth_len].fill(0);

    key.verify_hmac(&copy, received_mac)
}

/// Cache of localized keys per (protocol, pass-phrase, engine id).
///
/// Key derivation hashes a megabyte per call; the trap server shares one
/// cache across entries so each combination is derived once.
#[derive(Default)]
pub struct KeyCache {
    keys: Mutex<HashMap<(AuthProtocol, Vec<u8>, Vec<u8>), LocalizedKey>>,
}

impl KeyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or derive the localized key for (protocol, password, engine id).
    pub fn localized(
        &self,
        protocol: AuthProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> LocalizedKey {
        let mut keys = self.keys.lock().expect("key cache poisoned");
        keys.entry((protocol, password.to_vec(), engine_id.to_vec()))
            .or_insert_with(|| LocalizedKey::from_password(protocol, password, engine_id))
            .clone()
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.keys.lock().map(|k| k.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
