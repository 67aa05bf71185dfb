use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid length {got}: expected {expected} bytes")]
    InvalidLength { expected: usize, got: usize },

    #[error("scalar out of range")]
    ScalarOutOfRange,

    #[error("field element out of range")]
    FieldOutOfRange,

    #[error("point at infinity")]
    PointAtInfinity,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid DER encoding: {0}")]
    InvalidDer(&'static str),

    #[error("invalid tweak")]
    InvalidTweak,

    #[error("nonce function rejected the signing attempt")]
    NonceRejected,

    #[error("private key has been cleared")]
    KeyCleared,

    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
}
