//! Durable incremental ingest: `open` once, then interleave
//! `add`/`add_with_id`/`search`/`flush`/`dump` freely. A reader/writer lock
//! protects the entity against a concurrent dump; individual adds only
//! take a shared lock (they coordinate with each other through the graph
//! entity's own per-(level,node) locks, same as the Builder).

use super::limits::{enforce_doc_limits, enforce_memory_quota};
use super::IndexCore;
use crate::algorithm::search::EstimatorSource;
use crate::algorithm::{insert_node, insert_node_with_id, GraphPairwise};
use crate::config::{HnswParams, RabitqParams, StreamerLimits};
use crate::context::{Context, ScoredNode};
use crate::error::{RabitqError, Result};
use crate::graph::{EncodedNode, Key, NodeId};
use crate::persist::StorageBackend;
use crate::quantizer::RabitqQuantizer;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::Ordering;
use std::sync::RwLock;

/// `Streamer`'s lifecycle gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamerState {
    Init,
    Inited,
    Opened,
}

/// Durable, interleaved-read-write role over one entity.
pub struct Streamer {
    state: StreamerState,
    limits: StreamerLimits,
    insert_seed: u64,
    /// Guards the entity against a concurrent `flush`/`dump`; individual
    /// adds and searches take the shared side, `flush`/`dump` the exclusive
    /// side only long enough to snapshot/serialize.
    core: RwLock<Option<IndexCore>>,
}

impl Streamer {
    /// A streamer in the `Init` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: StreamerState::Init,
            limits: StreamerLimits::new(),
            insert_seed: 0,
            core: RwLock::new(None),
        }
    }

    /// Records resource limits and the insertion-level RNG seed.
    /// `Init` → `Inited`.
    pub fn init(&mut self, limits: StreamerLimits, insert_seed: u64) -> Result<()> {
        if self.state != StreamerState::Init {
            return Err(RabitqError::NoReady("streamer expected state Init".to_string()));
        }
        self.limits = limits;
        self.insert_seed = insert_seed;
        self.state = StreamerState::Inited;
        Ok(())
    }

    /// Opens a fresh core around `quantizer`, or a previously built one.
    /// `Inited` → `Opened`.
    pub fn open(&mut self, core: IndexCore) -> Result<()> {
        if self.state != StreamerState::Inited {
            return Err(RabitqError::NoReady("streamer expected state Inited".to_string()));
        }
        *self.core.write().unwrap() = Some(core);
        self.state = StreamerState::Opened;
        Ok(())
    }

    /// Loads a previously dumped core from `backend` and opens it.
    /// `Inited` → `Opened`.
    pub fn open_from_dump(
        &mut self,
        backend: &dyn StorageBackend,
        name: &str,
        chunk_size: usize,
        expect: Option<(&HnswParams, &RabitqParams)>,
    ) -> Result<()> {
        if self.state != StreamerState::Inited {
            return Err(RabitqError::NoReady("streamer expected state Inited".to_string()));
        }
        let loaded = crate::persist::load(backend, name, chunk_size, self.limits.check_crc_enable, expect)?;
        let core = IndexCore {
            graph: loaded.graph,
            quantizer: loaded.quantizer,
            hnsw_params: loaded.hnsw_params,
            rabitq_params: loaded.rabitq_params,
            table: crate::kernel::DistanceTable::detect(),
            magic: std::sync::atomic::AtomicU64::new(1),
        };
        *self.core.write().unwrap() = Some(core);
        self.state = StreamerState::Opened;
        Ok(())
    }

    fn require_opened(&self) -> Result<()> {
        if self.state != StreamerState::Opened {
            return Err(RabitqError::NoReady("streamer expected state Opened".to_string()));
        }
        Ok(())
    }

    /// Inserts `(key, vector)`, assigning `key` as its caller-visible key.
    pub fn add(&self, key: u64, vector: &[f32]) -> Result<()> {
        self.require_opened()?;
        let guard = self.core.read().unwrap();
        let core = guard.as_ref().expect("Opened implies core is set");
        enforce_doc_limits(core.graph.published_count() as u64 + 1, &self.limits)?;
        self.insert(core, key, vector)
    }

    /// Inserts `vector` at the caller-assigned dense `NodeId` `id`
    /// (spec.md's `Streamer.add_with_id`, spec.md:240). `id` must equal the
    /// graph's current node count — `append_with_id`'s gap check — or this
    /// fails `InvalidArgument` (spec.md:149) before anything is mutated.
    /// `id` doubles as the node's externally visible key, matching the
    /// original's single-parameter `add_with_id_impl(uint32_t id, ...)`.
    pub fn add_with_id(&self, id: u32, vector: &[f32]) -> Result<()> {
        self.require_opened()?;
        let guard = self.core.read().unwrap();
        let core = guard.as_ref().expect("Opened implies core is set");
        enforce_doc_limits(core.graph.published_count() as u64 + 1, &self.limits)?;
        self.insert_with_id(core, id, vector)
    }

    fn insert(&self, core: &IndexCore, key: u64, vector: &[f32]) -> Result<()> {
        core.check_dim(vector)?;
        let code = core.quantizer.encode(vector)?;
        let raw = if core.rabitq_params.keep_raw { Some(vector) } else { None };
        let encoded = EncodedNode::new(&code, raw);
        enforce_memory_quota(core.graph.bytes_used(), encoded.approx_bytes(), &self.limits)?;

        let mut rng = ChaCha8Rng::seed_from_u64(
            self.insert_seed ^ key.wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );
        let level = crate::algorithm::draw_level(&mut rng, core.hnsw_params.level_mult(), core.hnsw_params.l_max);

        let query = core.quantizer.prepare_query(vector)?;
        let pairwise = GraphPairwise {
            graph: &core.graph,
            quantizer: &core.quantizer,
            exact: core.rabitq_params.keep_raw.then_some(&core.table),
            metric: core.hnsw_params.metric,
        };
        let mut ctx = Context::new();
        ctx.begin_query(
            core.graph.published_count(),
            core.hnsw_params.ef_construction as usize,
            core.hnsw_params.ef_construction as usize,
        );

        insert_node(
            &core.graph,
            &core.hnsw_params,
            Key(key),
            level,
            encoded,
            &pairwise,
            || {
                Box::new(EstimatorSource {
                    graph: &core.graph,
                    quantizer: &core.quantizer,
                    query: &query,
                })
            },
            &mut ctx,
        )
        .map(|_| ())
    }

    fn insert_with_id(&self, core: &IndexCore, id: u32, vector: &[f32]) -> Result<()> {
        core.check_dim(vector)?;
        let code = core.quantizer.encode(vector)?;
        let raw = if core.rabitq_params.keep_raw { Some(vector) } else { None };
        let encoded = EncodedNode::new(&code, raw);
        enforce_memory_quota(core.graph.bytes_used(), encoded.approx_bytes(), &self.limits)?;

        let mut rng = ChaCha8Rng::seed_from_u64(
            self.insert_seed ^ u64::from(id).wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );
        let level = crate::algorithm::draw_level(&mut rng, core.hnsw_params.level_mult(), core.hnsw_params.l_max);

        let query = core.quantizer.prepare_query(vector)?;
        let pairwise = GraphPairwise {
            graph: &core.graph,
            quantizer: &core.quantizer,
            exact: core.rabitq_params.keep_raw.then_some(&core.table),
            metric: core.hnsw_params.metric,
        };
        let mut ctx = Context::new();
        ctx.begin_query(
            core.graph.published_count(),
            core.hnsw_params.ef_construction as usize,
            core.hnsw_params.ef_construction as usize,
        );

        insert_node_with_id(
            &core.graph,
            &core.hnsw_params,
            NodeId(id),
            Key(u64::from(id)),
            level,
            encoded,
            &pairwise,
            || {
                Box::new(EstimatorSource {
                    graph: &core.graph,
                    quantizer: &core.quantizer,
                    query: &query,
                })
            },
            &mut ctx,
        )
        .map(|_| ())
    }

    /// Removes `key` from the live set; the node stays for connectivity.
    pub fn delete(&self, key: u64) -> Result<bool> {
        self.require_opened()?;
        let guard = self.core.read().unwrap();
        let core = guard.as_ref().expect("Opened implies core is set");
        Ok(core.graph.tombstone(Key(key)))
    }

    /// Searches the current state for the `k` nearest neighbors of `query`.
    pub fn search(&self, query: &[f32], k: usize, ctx: &mut Context) -> Result<Vec<(u64, f32)>> {
        self.require_opened()?;
        let guard = self.core.read().unwrap();
        let core = guard.as_ref().expect("Opened implies core is set");
        let policy = super::searcher::SearchPolicy::from_streamer_limits(&self.limits);
        super::searcher::run_search(core, query, k, &policy, ctx)
    }

    /// A fresh per-thread [`Context`] matching `bloomfilter_enable`.
    #[must_use]
    pub fn new_context(&self) -> Context {
        if self.limits.bloomfilter_enable {
            Context::with_bloom_filter(self.limits.bloomfilter_negative_prob)
        } else {
            Context::new()
        }
    }

    /// Persists the current state atomically (write-to-temp + rename, via
    /// `backend`) along with an application-supplied `checkpoint` token so
    /// the ingest layer can resume from it.
    pub fn flush(&self, backend: &dyn StorageBackend, name: &str, checkpoint: u64) -> Result<()> {
        self.require_opened()?;
        let guard = self.core.write().unwrap();
        let core = guard.as_ref().expect("Opened implies core is set");
        crate::persist::dump(
            &core.graph,
            &core.quantizer,
            &core.hnsw_params,
            &core.rabitq_params,
            backend,
            name,
        )?;
        backend.write_segment(&format!("{name}.checkpoint"), &checkpoint.to_le_bytes())?;
        backend.commit(&format!("{name}.checkpoint"))?;
        core.magic.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Alias of `flush` with no checkpoint token, for callers that dump
    /// purely for backup purposes.
    pub fn dump(&self, backend: &dyn StorageBackend, name: &str) -> Result<()> {
        self.flush(backend, name, 0)
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamerState {
        self.state
    }
}

impl Default for Streamer {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-ranks `candidates` against the query's retained raw vectors, if any,
/// up to `rerank_size` of them — used by both Streamer and Searcher's
/// query protocol step 3.
pub(crate) fn rerank(
    core: &IndexCore,
    query: &[f32],
    candidates: &mut [ScoredNode],
    rerank_size: usize,
) {
    let limit = rerank_size.min(candidates.len());
    for c in &mut candidates[..limit] {
        if let Some(exact) = core.graph.with_encoded(c.id, |n| n.raw_copy.clone()).flatten() {
            c.dist = match core.metric() {
                crate::config::MetricKind::L2Squared => core.table.l2_squared(&exact, query),
                crate::config::MetricKind::Euclidean => core.table.euclidean(&exact, query),
                crate::config::MetricKind::DotProduct => -core.table.dot(&exact, query),
                crate::config::MetricKind::Cosine => core.table.cosine(&exact, query),
                _ => core.table.l2_squared(&exact, query),
            };
        }
    }
    candidates[..limit].sort();
}
