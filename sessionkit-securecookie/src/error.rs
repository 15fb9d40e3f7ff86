//! Error types for cookie encoding and decoding.

use thiserror::Error;

/// Result type for codec operations.
pub type CookieResult<T> = Result<T, CookieError>;

/// Codec errors.
#[derive(Debug, Error)]
pub enum CookieError {
    /// A codec was built without a hash key.
    #[error("hash key is not set")]
    HashKeyNotSet,

    /// Block keys select AES-128 or AES-256.
    #[error("invalid block key length {0}: expected 16 or 32 bytes")]
    InvalidBlockKey(usize),

    /// A codec set was built from an empty key list.
    #[error("no codecs configured")]
    NoCodecs,

    /// Encoded value exceeds the configured maximum length.
    #[error("the value is too long: {length} bytes (max {max})")]
    ValueTooLong { length: usize, max: usize },

    /// The value is not valid base64.
    #[error("the value is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The value does not have the `timestamp|value|mac` shape.
    #[error("the value is not valid")]
    InvalidFormat,

    /// HMAC verification failed.
    #[error("the value could not be verified using HMAC")]
    MacInvalid,

    /// The embedded timestamp is not a number.
    #[error("invalid timestamp")]
    InvalidTimestamp,

    /// The value was issued too recently.
    #[error("timestamp is too new")]
    TooNew,

    /// The value is older than the codec's max age.
    #[error("expired timestamp")]
    Expired,

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption or authentication of the ciphertext failed.
    #[error("the value could not be decrypted")]
    Decryption,

    /// Serializing or deserializing the payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Every codec in a set rejected the value.
    #[error("no codec accepted the value: {0:?}")]
    NoCodecAccepted(Vec<CookieError>),
}

impl CookieError {
    /// Whether the error comes from a key or codec misconfiguration rather
    /// than from the value being decoded.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::HashKeyNotSet | Self::InvalidBlockKey(_) | Self::NoCodecs
        )
    }

    /// Whether decoding failed because the value was too old.
    pub fn is_expired(&self) -> bool {
        match self {
            Self::Expired => true,
            Self::NoCodecAccepted(errors) => errors.iter().any(CookieError::is_expired),
            _ => false,
        }
    }
}
