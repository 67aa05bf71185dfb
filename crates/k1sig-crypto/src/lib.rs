//! Cryptographic primitives for k1sig.
//!
//! Hashing, the RFC 6979 generator, and secp256k1 arithmetic are all
//! implemented here. Reference crates (sha2, hmac, k256) are dev-dependencies
//! only and exist to cross-check results.

#![forbid(unsafe_code)]

pub mod hmac;
pub mod rfc6979;
pub mod secp256k1;
pub mod sha256;
