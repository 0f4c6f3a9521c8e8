//! # rabitq-hnsw
//!
//! An approximate nearest-neighbor search core: an HNSW navigable-graph
//! index over vectors quantized with RaBitQ (coarse clustering, a
//! deterministic orthogonal rotation, and a 1-bit sign code plus `k`-bit
//! residual code per coordinate). It is meant to sit as the retrieval
//! layer inside a larger vector database — ingestion, scalar-attribute
//! filtering, and network service plumbing are the embedding
//! application's concern, not this crate's.
//!
//! ## Layout
//!
//! - [`kernel`] — blocked distance primitives (dense + sparse) with
//!   runtime SIMD dispatch.
//! - [`quantizer`] — RaBitQ training, encoding, and query-time estimation.
//! - [`graph`] — the chunked node arena, key↔id map, and entry point.
//! - [`algorithm`] — level assignment, beam search, greedy descent, and
//!   the neighbor-selection heuristic, shared by insertion and query.
//! - [`context`] — per-query, per-thread reusable scratch state.
//! - [`index`] — the three lifecycle roles (`Builder`, `Streamer`,
//!   `Searcher`) that compose the above into the external API.
//! - [`persist`] — the dump/load segment format and storage backends.
//! - [`holder`] — the training/insertion vector-source collaborator.
//!
//! ## Example
//!
//! ```rust
//! use rabitq_hnsw::config::{HnswParams, MetricKind, RabitqParams};
//! use rabitq_hnsw::holder::VecHolder;
//! use rabitq_hnsw::index::Builder;
//!
//! let dim = 4;
//! let vectors: Vec<(u64, Vec<f32>)> = (0..64)
//!     .map(|i| (i as u64, vec![i as f32, 0.0, 0.0, 0.0]))
//!     .collect();
//! let holder = VecHolder::new(dim, vectors);
//!
//! let mut builder = Builder::new();
//! builder
//!     .init(HnswParams::new(dim, MetricKind::L2Squared), RabitqParams::new(), 1 << 16)
//!     .unwrap();
//! builder.train(&holder, 1).unwrap();
//! builder.build(&holder, 2).unwrap();
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithm;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod holder;
pub mod index;
pub mod kernel;
pub mod persist;
pub mod quantizer;

pub use config::{HnswParams, MetricKind, RabitqParams, RotatorKind, ScalarKind, StreamerLimits};
pub use context::Context;
pub use error::{RabitqError, Result};
pub use index::{Builder, BuilderState, Searcher, SearcherState, Streamer, StreamerState};

/// The crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
