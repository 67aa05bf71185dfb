//! Multi-key helpers on top of `k1sig-ecdsa`: random key generation and
//! batch signing/verification spread across CPU cores.

#![forbid(unsafe_code)]

pub mod batch;
pub mod keygen;

pub use batch::{sign_batch, verify_all, verify_batch, SignJob, VerifyJob};
pub use keygen::{generate_keypair, KeyPair};
