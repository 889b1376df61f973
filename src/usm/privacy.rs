//! Privacy protocols for SNMPv3 (RFC 3414 Section 8, RFC 3826).
//!
//! Salt/IV construction:
//!
//! - DES-CBC: privParameters = engineBoots (4 BE) || counter (4 BE);
//!   IV = pre-IV XOR salt, where pre-IV is the last 8 bytes of the
//!   16-byte localized key. Plaintext zero-padded to the 8-byte block.
//! - AES-CFB: privParameters = 64-bit counter (8 BE);
//!   IV = engineBoots (4 BE) || engineTime (4 BE) || salt (8 BE),
//!   concatenation rather than XOR. Length-preserving, no padding.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AuthProtocol, PrivProtocol, auth::extend_key};
use crate::error::{CryptoErrorKind, Error, Result};

/// Process-wide monotonic salt counter.
///
/// Incremented before every encryption; never reused within the lifetime of
/// a (engine id, localized key) pair. Seeded from OS randomness so
/// concurrent processes sharing a key are unlikely to collide.
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    /// Create a counter seeded from cryptographic randomness.
    pub fn new() -> Self {
        Self(AtomicU64::new(random_nonzero_u64()))
    }

    /// Create a counter with a fixed start value (tests).
    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// The shared process-wide counter.
    pub fn process() -> &'static SaltCounter {
        static PROCESS: OnceLock<SaltCounter> = OnceLock::new();
        PROCESS.get_or_init(SaltCounter::new)
    }

    /// Take the next salt value.
    ///
    /// Never returns zero; zero is skipped on wraparound to avoid a
    /// degenerate IV.
    pub fn next(&self) -> u64 {
        let val = self.0.fetch_add(1, Ordering::SeqCst);
        if val == 0 {
            self.0.fetch_add(1, Ordering::SeqCst)
        } else {
            val
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn random_nonzero_u64() -> u64 {
    let mut buf = [0u8; 8];
    loop {
        getrandom::fill(&mut buf).expect("getrandom failed");
        let val = u64::from_ne_bytes(buf);
        if val != 0 {
            return val;
        }
    }
}

/// Privacy key for encryption/decryption.
///
/// Derived with the same localization as authentication keys; the protocol
/// determines how much of the localized key is used. For AES-192/256 under
/// MD5/SHA-1 the localized key is extended by repeat-hashing (the deployed
/// de-facto scheme); peers using a different extension will fail to
/// decrypt.
///
/// Key material is zeroed from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Derive a privacy key from a pass-phrase and engine id.
    ///
    /// The localization hash is the configured authentication protocol's;
    /// the localized key is extended when the privacy protocol needs more
    /// material than the digest provides.
    pub fn from_password(
        auth_protocol: AuthProtocol,
        priv_protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Self {
        let localized = super::LocalizedKey::from_password(auth_protocol, password, engine_id);
        Self::from_localized(auth_protocol, priv_protocol, localized.as_bytes())
    }

    /// Build from an already-localized key, extending as needed.
    pub fn from_localized(
        auth_protocol: AuthProtocol,
        priv_protocol: PrivProtocol,
        localized: &[u8],
    ) -> Self {
        let needed = priv_protocol.key_len();
        let key = if localized.len() < needed {
            extend_key(auth_protocol, localized, needed)
        } else {
            localized[..needed].to_vec()
        };
        Self {
            key,
            protocol: priv_protocol,
        }
    }

    /// Wrap raw key material of exactly `protocol.key_len()` bytes.
    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    /// The privacy protocol.
    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    /// Encrypt a serialized scoped PDU, returning (ciphertext, privParameters).
    ///
    /// Takes the salt from the process-wide [`SaltCounter`].
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
    ) -> Result<(Bytes, Bytes)> {
        self.encrypt_with_salt(
            plaintext,
            engine_boots,
            engine_time,
            SaltCounter::process().next(),
        )
    }

    /// Encrypt with an explicit salt value (deterministic tests).
    pub fn encrypt_with_salt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
    ) -> Result<(Bytes, Bytes)> {
        match self.protocol {
            PrivProtocol::Des => self.encrypt_des(plaintext, engine_boots, salt),
            PrivProtocol::Aes128 => self.encrypt_aes(plaintext, engine_boots, engine_time, salt, 16),
            PrivProtocol::Aes192 => self.encrypt_aes(plaintext, engine_boots, engine_time, salt, 24),
            PrivProtocol::Aes256 => self.encrypt_aes(plaintext, engine_boots, engine_time, salt, 32),
        }
    }

    /// Decrypt using the privParameters carried in the message.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        if priv_params.len() != 8 {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidPrivParamsLength {
                    expected: 8,
                    actual: priv_params.len(),
                },
            ));
        }

        match self.protocol {
            PrivProtocol::Des => self.decrypt_des(ciphertext, priv_params),
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                self.decrypt_aes(ciphertext, engine_boots, engine_time, priv_params)
            }
        }
    }

    /// DES-CBC encryption (RFC 3414 Section 8.1.1).
    fn encrypt_des(&self, plaintext: &[u8], engine_boots: u32, salt_int: u64) -> Result<(Bytes, Bytes)> {
        use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
        type DesCbc = cbc::Encryptor<des::Des>;

        let key = &self.key[..8];
        let pre_iv = &self.key[8..16];

        let salt = des_salt(engine_boots, salt_int);
        let iv = des_iv(pre_iv, &salt);

        // Zero-pad to the 8-byte block
        let padded_len = plaintext.len().div_ceil(8) * 8;
        let mut buffer = vec![0u8; padded_len.max(8)];
        buffer[..plaintext.len()].copy_from_slice(plaintext);
        let padded_len = buffer.len();

        let cipher = DesCbc::new_from_slices(key, &iv)
            .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
        let ciphertext = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
            .map_err(|_| Error::encrypt(None, CryptoErrorKind::CipherError))?;

        Ok((
            Bytes::copy_from_slice(ciphertext),
            Bytes::copy_from_slice(&salt),
        ))
    }

    /// DES-CBC decryption (RFC 3414 Section 8.1.1).
    fn decrypt_des(&self, ciphertext: &[u8], priv_params: &[u8]) -> Result<Bytes> {
        use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
        type DesCbc = cbc::Decryptor<des::Des>;

        if ciphertext.is_empty() || ciphertext.len() % 8 != 0 {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidCiphertextLength {
                    length: ciphertext.len(),
                    block_size: 8,
                },
            ));
        }

        let key = &self.key[..8];
        let pre_iv = &self.key[8..16];
        let iv = des_iv(pre_iv, priv_params);

        let cipher = DesCbc::new_from_slices(key, &iv)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;

        let mut buffer = ciphertext.to_vec();
        let plaintext = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::CipherError))?;

        Ok(Bytes::copy_from_slice(plaintext))
    }

    /// AES-CFB encryption (RFC 3826 Section 3.1.3).
    fn encrypt_aes(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
        key_len: usize,
    ) -> Result<(Bytes, Bytes)> {
        use aes::{Aes128, Aes192, Aes256};
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        let key = &self.key[..key_len];
        let salt_bytes = salt.to_be_bytes();
        let iv = aes_iv(engine_boots, engine_time, salt);

        let mut buffer = plaintext.to_vec();

        match key_len {
            16 => {
                type Aes128Cfb = cfb_mode::Encryptor<Aes128>;
                let cipher = Aes128Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.encrypt(&mut buffer);
            }
            24 => {
                type Aes192Cfb = cfb_mode::Encryptor<Aes192>;
                let cipher = Aes192Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.encrypt(&mut buffer);
            }
            32 => {
                type Aes256Cfb = cfb_mode::Encryptor<Aes256>;
                let cipher = Aes256Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.encrypt(&mut buffer);
            }
            _ => return Err(Error::encrypt(None, CryptoErrorKind::InvalidKeyLength)),
        }

        Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt_bytes)))
    }

    /// AES-CFB decryption (RFC 3826 Section 3.1.4).
    fn decrypt_aes(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        use aes::{Aes128, Aes192, Aes256};
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        let key_len = self.protocol.key_len();
        let key = &self.key[..key_len];

        let mut iv = [0u8; 16];
        iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
        iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
        iv[8..].copy_from_slice(priv_params);

        let mut buffer = ciphertext.to_vec();

        match key_len {
            16 => {
                type Aes128Cfb = cfb_mode::Decryptor<Aes128>;
                let cipher = Aes128Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.decrypt(&mut buffer);
            }
            24 => {
                type Aes192Cfb = cfb_mode::Decryptor<Aes192>;
                let cipher = Aes192Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.decrypt(&mut buffer);
            }
            32 => {
                type Aes256Cfb = cfb_mode::Decryptor<Aes256>;
                let cipher = Aes256Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.decrypt(&mut buffer);
            }
            _ => return Err(Error::decrypt(None, CryptoErrorKind::InvalidKeyLength)),
        }

        Ok(Bytes::from(buffer))
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// DES salt: engineBoots (4 BE) || counter low 32 bits (4 BE).
fn des_salt(engine_boots: u32, salt_int: u64) -> [u8; 8] {
    let mut salt = [0u8; 8];
    salt[..4].copy_from_slice(&engine_boots.to_be_bytes());
    salt[4..].copy_from_slice(&(salt_int as u32).to_be_bytes());
    salt
}

/// DES IV: pre-IV XOR salt.
fn des_iv(pre_iv: &[u8], salt: &[u8]) -> [u8; 8] {
    let mut iv = [0u8; 8];
    for i in 0..8 {
        iv[i] = pre_iv[i] ^ salt[i];
    }
    iv
}

/// AES IV: engineBoots (4 BE) || engineTime (4 BE) || salt (8 BE).
fn aes_iv(engine_boots: u32, engine_time: u32, salt: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..].copy_from_slice(&salt.to_be_bytes());
    iv
}
