//! Parallel batch signing and verification.
//!
//! Every key carries an `Arc` of the same read-only [`k1sig_ecdsa::Context`],
//! so rayon workers share the precomputed tables without locking.

#![forbid(unsafe_code)]

use k1sig_core::Result;
use k1sig_ecdsa::{ECPrivKey, ECPubKey, SecpECDSASignature};
use rayon::prelude::*;
use tracing::debug;

/// One message to sign.
#[derive(Clone, Copy, Debug)]
pub struct SignJob<'a> {
    pub key: &'a ECPrivKey,
    pub msg32: [u8; 32],
}

/// One signature to check.
#[derive(Clone, Copy, Debug)]
pub struct VerifyJob<'a> {
    pub key: &'a ECPubKey,
    pub sig: SecpECDSASignature,
    pub msg32: [u8; 32],
}

/// Sign every job with RFC 6979 nonces. Output order matches input order;
/// the first failure (e.g. a cleared key) fails the whole batch.
pub fn sign_batch(jobs: &[SignJob<'_>]) -> Result<Vec<SecpECDSASignature>> {
    debug!(jobs = jobs.len(), "signing batch");
    jobs.par_iter()
        .map(|job| job.key.sign_ecdsa_rfc6979(&job.msg32))
        .collect()
}

/// Per-job verification results, in input order.
pub fn verify_batch(jobs: &[VerifyJob<'_>]) -> Vec<bool> {
    debug!(jobs = jobs.len(), "verifying batch");
    jobs.par_iter()
        .map(|job| job.key.sig_verify(&job.sig, &job.msg32))
        .collect()
}

/// True when every job verifies. Stops early on the first failure.
pub fn verify_all(jobs: &[VerifyJob<'_>]) -> bool {
    jobs.par_iter()
        .all(|job| job.key.sig_verify(&job.sig, &job.msg32))
}
