//! # Sessionkit Secure Cookie
//!
//! Authenticated, optionally encrypted, timestamped values for cookies.
//!
//! ## Features
//!
//! - **HMAC-SHA256** authentication bound to the cookie name
//! - **AES-GCM** encryption when a 16 or 32 byte block key is supplied
//! - **Max/min age** checks on the embedded issue timestamp
//! - **Key rotation** through ordered [`CodecSet`]s
//!
//! ## Quick Start
//!
//! ```
//! use sessionkit_securecookie::{CodecSet, KeyPair, generate_random_key};
//!
//! let pairs = vec![KeyPair::new(generate_random_key(64)).with_block_key(generate_random_key(32))];
//! let codecs = CodecSet::from_pairs(&pairs).unwrap();
//!
//! let encoded = codecs.encode("session", "opaque-session-id").unwrap();
//! let id: String = codecs.decode("session", &encoded).unwrap();
//! assert_eq!(id, "opaque-session-id");
//! ```

mod codec;
mod error;
mod secure_cookie;

pub use codec::{generate_random_key, Codec, CodecSet, KeyPair};
pub use error::{CookieError, CookieResult};
pub use secure_cookie::{SecureCookie, DEFAULT_MAX_AGE, DEFAULT_MAX_LENGTH};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::codec::{Codec, CodecSet, KeyPair};
    pub use crate::error::{CookieError, CookieResult};
    pub use crate::secure_cookie::SecureCookie;
}
