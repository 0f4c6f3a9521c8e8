//! Typed error hierarchy for every public operation.
//!
//! Mirrors the teacher crate's layering: one top-level enum wraps
//! component-local error enums via `#[from]`, so a caller matching on
//! `RabitqError` never needs to know which subsystem raised it while a
//! subsystem author still gets a narrow, local error type to construct.

use thiserror::Error;

/// Errors raised by the RaBitQ quantizer (training, encoding, estimation).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantizerError {
    /// Query or training vector dimension disagrees with the trained `D`.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: u32,
        /// Actual dimensionality supplied.
        actual: u32,
    },

    /// An out-of-range or nonsensical training parameter.
    #[error("invalid quantizer parameter: {0}")]
    InvalidParameter(String),

    /// `train()` was called with zero sampled vectors.
    #[error("cannot train on an empty sample")]
    EmptySample,
}

/// Errors raised by the dump/load byte format.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistError {
    /// Underlying storage backend I/O failure (message-only: `io::Error` is
    /// not `Clone`/`PartialEq`, so it is captured as a rendered string).
    #[error("storage io error: {0}")]
    Io(String),

    /// Segment length prefix claims more bytes than are available.
    #[error("truncated segment {tag}: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Segment tag.
        tag: u32,
        /// Expected payload length.
        expected: u64,
        /// Bytes actually available.
        actual: u64,
    },

    /// Segment CRC32 does not match its payload.
    #[error("checksum mismatch in segment {tag}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Segment tag.
        tag: u32,
        /// Expected CRC32.
        expected: u32,
        /// Computed CRC32.
        actual: u32,
    },

    /// The file's magic number is not `"ZVIX"`.
    #[error("bad magic: expected {expected:?}, got {actual:?}")]
    BadMagic {
        /// Expected magic bytes.
        expected: [u8; 4],
        /// Actual magic bytes read.
        actual: [u8; 4],
    },

    /// A required segment was never written, or is missing on load.
    #[error("missing required segment: {0}")]
    MissingSegment(&'static str),

    /// Dumped meta (dimension, metric, codebook shape) disagrees with the
    /// meta supplied to `open`/`load`.
    #[error("meta mismatch: {0}")]
    MetaMismatch(String),

    /// Serialization failure (postcard).
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// The unified error type returned by every public operation in this crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RabitqError {
    /// Bad parameter, dimension mismatch, out-of-range configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation invoked out of lifecycle order (see `BuilderState` et al).
    #[error("not ready: {0}")]
    NoReady(String),

    /// Unknown name (metric, converter) or missing storage segment.
    #[error("does not exist: {0}")]
    NoExist(String),

    /// Dumped meta disagrees with supplied meta.
    #[error("mismatch: {0}")]
    Mismatch(String),

    /// Attempted to insert a key that is already live.
    #[error("duplicate key: {0}")]
    DuplicateKey(u64),

    /// Looked up a key that does not resolve to a live node.
    #[error("key not found: {0}")]
    KeyNotFound(u64),

    /// `docs_hard_limit` exceeded.
    #[error("index full: {doc_count} >= hard limit {hard_limit}")]
    IndexFull {
        /// Current document count.
        doc_count: u64,
        /// Configured hard limit.
        hard_limit: u64,
    },

    /// `memory_quota` exceeded, or an allocator failure.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// CRC mismatch or truncated segment on load.
    #[error(transparent)]
    Corrupt(#[from] PersistError),

    /// Quantizer-local failure.
    #[error(transparent)]
    Quantizer(#[from] QuantizerError),

    /// All other unexpected failures (internal invariant violations).
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<std::io::Error> for RabitqError {
    fn from(e: std::io::Error) -> Self {
        RabitqError::Corrupt(PersistError::Io(e.to_string()))
    }
}

/// Convenience alias used throughout the crate's public API.
pub type Result<T> = std::result::Result<T, RabitqError>;
