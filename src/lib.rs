// sessionkit - server-side HTTP sessions for Rust
//
// Session ids travel in signed (optionally encrypted) cookies while session
// values live in Redis or MongoDB.

// Re-export core functionality
pub use sessionkit_core::*;

// Re-export the cookie codec
pub use sessionkit_securecookie as securecookie;
pub use sessionkit_securecookie::{Codec, CodecSet, CookieError, KeyPair, SecureCookie};

pub mod prelude {
    pub use sessionkit_core::prelude::*;
    pub use sessionkit_securecookie::KeyPair;
}
