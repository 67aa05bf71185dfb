//! Precomputed multiplication tables bundled for the signing layer.

#![forbid(unsafe_code)]

use std::sync::{Arc, OnceLock};

use super::ecmult::EcMultContext;
use super::ecmult_gen::EcMultGenContext;
use super::group::GroupElement;
use super::jacobian::GroupElementJacobian;
use super::scalar::Scalar;

/// Verification tables plus the generator comb. Immutable once built.
#[derive(Debug)]
pub struct Context {
    ecmult: EcMultContext,
    ecmult_gen: EcMultGenContext,
}

impl Context {
    /// Build a fresh context with the default blinding.
    pub fn new() -> Self {
        Self {
            ecmult: EcMultContext::new(),
            ecmult_gen: EcMultGenContext::new(),
        }
    }

    /// Build a context whose generator multiplication is blinded by `seed`.
    pub fn randomized(seed: &[u8; 32]) -> Self {
        let mut ctx = Self::new();
        ctx.ecmult_gen.blind(Some(seed));
        ctx
    }

    /// The process-wide context, built on first use.
    pub fn instance() -> Arc<Context> {
        static INSTANCE: OnceLock<Arc<Context>> = OnceLock::new();
        INSTANCE.get_or_init(|| Arc::new(Context::new())).clone()
    }

    pub fn ecmult_context(&self) -> &EcMultContext {
        &self.ecmult
    }

    pub fn ecmult_gen_context(&self) -> &EcMultGenContext {
        &self.ecmult_gen
    }

    /// na*a + ng*G, variable time.
    pub fn ecmult(
        &self,
        a: &GroupElementJacobian,
        na: &Scalar,
        ng: &Scalar,
    ) -> GroupElementJacobian {
        self.ecmult.ecmult(a, na, ng)
    }

    /// gn*G, constant time.
    pub fn ecmult_gen(&self, gn: &Scalar) -> GroupElementJacobian {
        self.ecmult_gen.ecmult_gen(gn)
    }

    /// q*a, constant time.
    pub fn ecmult_const(&self, a: &GroupElement, q: &Scalar) -> GroupElementJacobian {
        super::ecmult_const::ecmult_const(a, q, 256)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
