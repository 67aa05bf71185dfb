//! secp256k1 arithmetic: GF(p), scalars mod n, points, and scalar multiplication.
//!
//! Everything here is a value type. The only long-lived state is the
//! precomputed tables held by [`context::Context`].

#![forbid(unsafe_code)]

pub mod context;
pub mod ecmult;
pub mod ecmult_const;
pub mod ecmult_gen;
pub mod field;
pub mod group;
pub mod jacobian;
pub mod scalar;
pub mod wnaf;

pub use context::Context;
pub use field::FieldElement;
pub use group::GroupElement;
pub use jacobian::GroupElementJacobian;
pub use scalar::Scalar;
