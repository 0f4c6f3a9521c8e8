//! K5: the index lifecycle — Builder (batch), Streamer (durable
//! incremental), and Searcher (read-only) roles sharing one underlying
//! entity.

pub mod builder;
pub mod limits;
pub mod searcher;
pub mod streamer;

pub use builder::{Builder, BuilderState};
pub use limits::enforce_doc_limits;
pub use searcher::{SearchPolicy, Searcher, SearcherState};
pub use streamer::{Streamer, StreamerState};

use crate::config::{HnswParams, MetricKind, RabitqParams};
use crate::error::{RabitqError, Result};
use crate::graph::GraphEntity;
use crate::kernel::DistanceTable;
use crate::quantizer::RabitqQuantizer;
use std::sync::atomic::{AtomicU64, Ordering};

/// The shared state every role wraps: the graph, the trained quantizer,
/// the shape parameters, and a bound distance-kernel table. Builder owns
/// one for the duration of `build`; Streamer and Searcher each own one for
/// their process lifetime.
pub struct IndexCore {
    pub graph: GraphEntity,
    pub quantizer: RabitqQuantizer,
    pub hnsw_params: HnswParams,
    pub rabitq_params: RabitqParams,
    pub table: DistanceTable,
    /// Bumped whenever the entity is replaced wholesale (e.g. after
    /// `load`), so pooled `Context`s know to drop cached state bound to a
    /// now-stale generation (§4.6's "magic" token).
    pub magic: AtomicU64,
}

impl IndexCore {
    /// Builds a fresh, empty core around a trained quantizer.
    #[must_use]
    pub fn new(
        quantizer: RabitqQuantizer,
        hnsw_params: HnswParams,
        rabitq_params: RabitqParams,
        chunk_size: usize,
    ) -> Self {
        Self {
            graph: GraphEntity::new(chunk_size),
            quantizer,
            hnsw_params,
            rabitq_params,
            table: DistanceTable::detect(),
            magic: AtomicU64::new(1),
        }
    }

    /// The current generation token.
    #[must_use]
    pub fn magic(&self) -> u64 {
        self.magic.load(Ordering::Acquire)
    }

    /// Validates `q.len()` against the configured dimension, mapping to
    /// `RabitqError::InvalidArgument` (the public-API error type) rather
    /// than the quantizer's own local error.
    pub fn check_dim(&self, q: &[f32]) -> Result<()> {
        if q.len() as u32 != self.hnsw_params.dimensions {
            return Err(RabitqError::InvalidArgument(format!(
                "expected dimension {}, got {}",
                self.hnsw_params.dimensions,
                q.len()
            )));
        }
        Ok(())
    }

    /// The metric this core was configured for.
    #[must_use]
    pub fn metric(&self) -> MetricKind {
        self.hnsw_params.metric
    }
}
