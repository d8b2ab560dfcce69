//! Client-side encrypted cookie backend for the corral caching contract.
//!
//! Values live in the client's cookie jar instead of server memory. A
//! write encrypts the payload together with its expiration into a token
//! and queues it as a response cookie; a later exchange reads the token
//! back from the inbound request. The backend is therefore two-phase:
//! [`CookieCache`] holds the cipher key and must be [bound] to one
//! request/response exchange, producing a [`BoundCookieCache`] whose
//! lifetime is that exchange only.
//!
//! Because the client is an untrusted tamper vector, every token
//! decoding or decryption failure is reported as an ordinary cache miss
//! rather than a distinct error: no caller can meaningfully react to
//! decrypt-failure detail.
//!
//! [bound]: CookieCache::bind

mod backend;
mod crypto;

pub use backend::{BoundCookieCache, CookieCache};
