//! Predictive geometric compression codec.
//!
//! The codec pipeline, leaf-first:
//! - [`constants`]: fixed recurrence and quantization constants
//! - [`recurrence`]: lossless two-channel predictive transform
//! - [`quantizer`]: the only lossy stage, residual → radix-20 tokens
//! - [`engine`]: orchestration over flat arrays and nested JSON trees

pub mod constants;
pub mod engine;
pub mod quantizer;
pub mod recurrence;

use thiserror::Error;

use crate::base20::Base20Error;

/// Codec-level failures. Every variant is a soft failure: the cache store
/// catches these and falls back to uncompressed serialization, it never lets
/// them escape to callers.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("cannot encode an empty sequence: no quantization range exists")]
    EmptySequence,

    #[error("residual stream contains a non-finite component")]
    NonFinite,

    #[error("undecodable residual token {token:?}: {source}")]
    InvalidToken {
        token: String,
        source: Base20Error,
    },

    #[error("combined level {0} is outside the quantization level range")]
    LevelOutOfRange(u64),

    #[error("token count {actual} does not match metadata count {expected}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("malformed compressed block: {0}")]
    MalformedBlock(String),

    #[error("decoded value {0} is not representable as a JSON number")]
    NonRepresentable(f64),
}
