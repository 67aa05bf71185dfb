//! ECDSA over secp256k1.
//!
//! Keys hold a shared [`Context`] with the precomputed multiplication tables.
//! Fallible operations come in two forms: `try_*` returning `Option`/`bool`,
//! and a `Result` form that reports a [`k1sig_core::Error`].

#![forbid(unsafe_code)]

pub mod der;
pub mod nonce;
pub mod privkey;
pub mod pubkey;
pub mod recovery;
pub mod signature;

pub use k1sig_crypto::secp256k1::Context;
pub use nonce::{NonceFunction, PrecomputedNonceFunction, Rfc6979NonceFunction};
pub use privkey::ECPrivKey;
pub use pubkey::ECPubKey;
pub use recovery::SecpRecoverableECDSASignature;
pub use signature::SecpECDSASignature;
