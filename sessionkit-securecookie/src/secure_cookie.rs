//! HMAC-authenticated, optionally AES-GCM encrypted cookie values.

use crate::codec::Codec;
use crate::error::{CookieError, CookieResult};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Default maximum age of an encoded value: 30 days.
pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;

/// Default maximum length of an encoded value in bytes.
pub const DEFAULT_MAX_LENGTH: usize = 4096;

const NONCE_LEN: usize = 12;

enum BlockCipher {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl BlockCipher {
    fn new(key: &[u8]) -> CookieResult<Self> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(|c| Self::Aes128(Box::new(c)))
                .map_err(|_| CookieError::InvalidBlockKey(16)),
            32 => Aes256Gcm::new_from_slice(key)
                .map(|c| Self::Aes256(Box::new(c)))
                .map_err(|_| CookieError::InvalidBlockKey(32)),
            len => Err(CookieError::InvalidBlockKey(len)),
        }
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext`.
    fn encrypt(&self, plaintext: &[u8]) -> CookieResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = match self {
            Self::Aes128(cipher) => cipher.encrypt(&nonce, plaintext),
            Self::Aes256(cipher) => cipher.encrypt(&nonce, plaintext),
        }
        .map_err(|e| CookieError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, data: &[u8]) -> CookieResult<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(CookieError::Decryption);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes128(cipher) => cipher.decrypt(nonce, ciphertext),
            Self::Aes256(cipher) => cipher.decrypt(nonce, ciphertext),
        }
        .map_err(|_| CookieError::Decryption)
    }

    fn bits(&self) -> u16 {
        match self {
            Self::Aes128(_) => 128,
            Self::Aes256(_) => 256,
        }
    }
}

/// A single codec built from one hash key and an optional block key.
///
/// Encoded values have the shape `base64url(timestamp|value|mac)` where
/// `value` is the base64url payload (encrypted first when a block key is set)
/// and `mac` is HMAC-SHA256 over `name|timestamp|value`. A value only decodes
/// under the cookie name it was issued for.
///
/// # Examples
///
/// ```
/// use sessionkit_securecookie::{Codec, SecureCookie};
///
/// let codec = SecureCookie::new(b"very-secret-hash-key", Some(&[7u8; 32][..])).unwrap();
/// let encoded = codec.encode("session", b"payload").unwrap();
/// assert_eq!(codec.decode("session", &encoded).unwrap(), b"payload");
/// assert!(codec.decode("other", &encoded).is_err());
/// ```
pub struct SecureCookie {
    hash_key: Vec<u8>,
    block: Option<BlockCipher>,
    max_age: i64,
    min_age: i64,
    max_length: usize,
}

impl SecureCookie {
    /// Create a codec. The hash key authenticates values; the block key, when
    /// given, must be 16 or 32 bytes and enables encryption.
    pub fn new(hash_key: &[u8], block_key: Option<&[u8]>) -> CookieResult<Self> {
        if hash_key.is_empty() {
            return Err(CookieError::HashKeyNotSet);
        }
        let block = block_key.map(BlockCipher::new).transpose()?;

        Ok(Self {
            hash_key: hash_key.to_vec(),
            block,
            max_age: DEFAULT_MAX_AGE,
            min_age: 0,
            max_length: DEFAULT_MAX_LENGTH,
        })
    }

    /// Set the maximum age in seconds. Zero disables the check.
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    /// Set the minimum age in seconds. Zero disables the check.
    pub fn with_min_age(mut self, seconds: i64) -> Self {
        self.min_age = seconds;
        self
    }

    /// Set the maximum encoded length. Zero disables the check.
    pub fn with_max_length(mut self, length: usize) -> Self {
        self.max_length = length;
        self
    }

    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    pub fn min_age(&self) -> i64 {
        self.min_age
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Whether values are encrypted in addition to being signed.
    pub fn encrypts(&self) -> bool {
        self.block.is_some()
    }

    fn mac(&self) -> HmacSha256 {
        <HmacSha256 as Mac>::new_from_slice(&self.hash_key).expect("HMAC can take key of any size")
    }

    pub(crate) fn encode_at(
        &self,
        name: &str,
        payload: &[u8],
        timestamp: i64,
    ) -> CookieResult<String> {
        let data = match &self.block {
            Some(cipher) => cipher.encrypt(payload)?,
            None => payload.to_vec(),
        };
        let data = URL_SAFE_NO_PAD.encode(data);

        let mut signed = format!("{}|{}|{}", name, timestamp, data).into_bytes();
        let mut mac = self.mac();
        mac.update(&signed);
        let tag = mac.finalize().into_bytes();

        // The name is authenticated but not transmitted.
        let mut out = signed.split_off(name.len() + 1);
        out.push(b'|');
        out.extend_from_slice(&tag);

        let encoded = URL_SAFE_NO_PAD.encode(out);
        if self.max_length != 0 && encoded.len() > self.max_length {
            return Err(CookieError::ValueTooLong {
                length: encoded.len(),
                max: self.max_length,
            });
        }
        Ok(encoded)
    }

    pub(crate) fn decode_at(&self, name: &str, value: &str, now: i64) -> CookieResult<Vec<u8>> {
        if self.max_length != 0 && value.len() > self.max_length {
            return Err(CookieError::ValueTooLong {
                length: value.len(),
                max: self.max_length,
            });
        }

        let decoded = URL_SAFE_NO_PAD.decode(value)?;
        let mut parts = decoded.splitn(3, |b| *b == b'|');
        let (timestamp, data, tag) = match (parts.next(), parts.next(), parts.next()) {
            (Some(t), Some(d), Some(m)) => (t, d, m),
            _ => return Err(CookieError::InvalidFormat),
        };

        let mut mac = self.mac();
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp);
        mac.update(b"|");
        mac.update(data);
        mac.verify_slice(tag).map_err(|_| CookieError::MacInvalid)?;

        let issued: i64 = std::str::from_utf8(timestamp)
            .ok()
            .and_then(|t| t.parse().ok())
            .ok_or(CookieError::InvalidTimestamp)?;
        if self.min_age != 0 && issued > now - self.min_age {
            return Err(CookieError::TooNew);
        }
        if self.max_age != 0 && issued < now - self.max_age {
            return Err(CookieError::Expired);
        }

        let data = URL_SAFE_NO_PAD.decode(data)?;
        match &self.block {
            Some(cipher) => cipher.decrypt(&data),
            None => Ok(data),
        }
    }
}

impl fmt::Debug for SecureCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCookie")
            .field("encryption", &self.block.as_ref().map(BlockCipher::bits))
            .field("max_age", &self.max_age)
            .field("min_age", &self.min_age)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl Codec for SecureCookie {
    fn encode(&self, name: &str, payload: &[u8]) -> CookieResult<String> {
        self.encode_at(name, payload, chrono::Utc::now().timestamp())
    }

    fn decode(&self, name: &str, value: &str) -> CookieResult<Vec<u8>> {
        self.decode_at(name, value, chrono::Utc::now().timestamp())
    }

    fn set_max_age(&mut self, seconds: i64) -> bool {
        self.max_age = seconds;
        true
    }

    fn set_max_length(&mut self, length: usize) -> bool {
        self.max_length = length;
        true
    }
}
