//! Codec trait and rotatable codec sets.

use crate::error::{CookieError, CookieResult};
use crate::secure_cookie::SecureCookie;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Encodes and decodes named values.
///
/// Implementations authenticate the value together with its name, so a value
/// encoded for one name must fail to decode under any other.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Encode raw bytes for the given name.
    fn encode(&self, name: &str, payload: &[u8]) -> CookieResult<String>;

    /// Verify and decode a value previously produced by [`Codec::encode`].
    fn decode(&self, name: &str, value: &str) -> CookieResult<Vec<u8>>;

    /// Change the maximum accepted age. Returns `false` if unsupported.
    fn set_max_age(&mut self, _seconds: i64) -> bool {
        false
    }

    /// Change the maximum encoded length. Returns `false` if unsupported.
    fn set_max_length(&mut self, _length: usize) -> bool {
        false
    }
}

/// One entry of a key rotation list.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Key used to authenticate values with HMAC-SHA256.
    pub hash_key: Vec<u8>,
    /// Optional 16 or 32 byte AES key used to encrypt values.
    pub block_key: Option<Vec<u8>>,
}

impl KeyPair {
    /// Create a signing-only key pair.
    pub fn new(hash_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: None,
        }
    }

    /// Add an encryption key.
    pub fn with_block_key(mut self, block_key: impl Into<Vec<u8>>) -> Self {
        self.block_key = Some(block_key.into());
        self
    }

    /// Group a flat key list into pairs of `(hash, block)`.
    ///
    /// A trailing odd key becomes a hash key without encryption, and empty
    /// block keys are treated as absent.
    pub fn from_flat<K: AsRef<[u8]>>(keys: &[K]) -> Vec<Self> {
        keys.chunks(2)
            .map(|chunk| {
                let hash: &[u8] = chunk[0].as_ref();
                let block: Option<&[u8]> = chunk.get(1).map(|k| k.as_ref());
                let pair = Self::new(hash);
                match block {
                    Some(block) if !block.is_empty() => pair.with_block_key(block),
                    _ => pair,
                }
            })
            .collect()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("hash_key", &format_args!("[{} bytes]", self.hash_key.len()))
            .field(
                "block_key",
                &self.block_key.as_ref().map(|k| format!("[{} bytes]", k.len())),
            )
            .finish()
    }
}

/// An ordered list of codecs.
///
/// New values are always encoded with the first codec that succeeds; decoding
/// tries every codec in order, so older keys can stay at the end of the list
/// while they are being rotated out.
#[derive(Debug, Default)]
pub struct CodecSet {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecSet {
    /// Build a [`SecureCookie`] for every key pair.
    pub fn from_pairs(pairs: &[KeyPair]) -> CookieResult<Self> {
        if pairs.is_empty() {
            return Err(CookieError::NoCodecs);
        }
        let codecs = pairs
            .iter()
            .map(|pair| {
                SecureCookie::new(&pair.hash_key, pair.block_key.as_deref())
                    .map(|c| Box::new(c) as Box<dyn Codec>)
            })
            .collect::<CookieResult<Vec<_>>>()?;
        Ok(Self { codecs })
    }

    /// Wrap already-built codecs.
    pub fn from_codecs(codecs: Vec<Box<dyn Codec>>) -> Self {
        Self { codecs }
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Serialize `value` as JSON and encode it.
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> CookieResult<String> {
        let payload = serde_json::to_vec(value)?;
        self.encode_bytes(name, &payload)
    }

    /// Encode raw bytes with the first codec that accepts them.
    pub fn encode_bytes(&self, name: &str, payload: &[u8]) -> CookieResult<String> {
        let mut errors = Vec::new();
        for codec in &self.codecs {
            match codec.encode(name, payload) {
                Ok(encoded) => return Ok(encoded),
                Err(e) => errors.push(e),
            }
        }
        Err(Self::collapse(errors))
    }

    /// Decode and deserialize a value encoded by [`CodecSet::encode`].
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: &str) -> CookieResult<T> {
        let payload = self.decode_bytes(name, value)?;
        Ok(serde_json::from_slice(&payload)?)
    }

    /// Decode raw bytes with the first codec that accepts the value.
    pub fn decode_bytes(&self, name: &str, value: &str) -> CookieResult<Vec<u8>> {
        let mut errors = Vec::new();
        for codec in &self.codecs {
            match codec.decode(name, value) {
                Ok(payload) => return Ok(payload),
                Err(e) => errors.push(e),
            }
        }
        Err(Self::collapse(errors))
    }

    /// Set the maximum age on every codec.
    pub fn set_max_age(&mut self, seconds: i64) {
        for codec in &mut self.codecs {
            if !codec.set_max_age(seconds) {
                warn!(codec = ?codec, "Codec does not support changing max age");
            }
        }
    }

    /// Set the maximum encoded length on every codec.
    pub fn set_max_length(&mut self, length: usize) {
        for codec in &mut self.codecs {
            if !codec.set_max_length(length) {
                warn!(codec = ?codec, "Codec does not support changing max length");
            }
        }
    }

    fn collapse(mut errors: Vec<CookieError>) -> CookieError {
        match errors.len() {
            0 => CookieError::NoCodecs,
            1 => errors.remove(0),
            _ => CookieError::NoCodecAccepted(errors),
        }
    }
}

/// Generate `len` random bytes from the operating system CSPRNG.
pub fn generate_random_key(len: usize) -> Vec<u8> {
    let mut key = vec![0u8; len];
    rand::fill(key.as_mut_slice());
    key
}
