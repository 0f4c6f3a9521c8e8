//! Read-only search: `open`, `search`, `search_bf`, `search_by_keys`,
//! `reconstruct`. Refuses every write.

use super::IndexCore;
use crate::algorithm::search::{beam_search_layer, greedy_descend, EstimatorSource, ExactSource};
use crate::algorithm::DistanceSource;
use crate::config::{HnswParams, RabitqParams, StreamerLimits};
use crate::context::{Context, ScoredNode};
use crate::error::{RabitqError, Result};
use crate::graph::{Key, NodeId};
use crate::persist::StorageBackend;

/// `Searcher`'s lifecycle gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearcherState {
    Init,
    Inited,
    Opened,
    Closed,
}

/// The subset of `StreamerLimits` that shapes a single query rather than
/// ingest: brute-force fallback threshold, the scan-budget triple
/// (`max_scan_ratio`/`min_scan_limit`/`max_scan_limit`), re-rank size, and
/// the under-size-result padding flag. `Streamer` derives one from its own
/// `StreamerLimits`; `Searcher` carries one directly since it has no other
/// ingest-only limits to track.
#[derive(Clone, Copy, Debug)]
pub struct SearchPolicy {
    /// Doc-count threshold at/under which search falls back to brute force.
    pub bruteforce_threshold: u64,
    /// Fraction of `doc_count` a single beam search may traverse.
    pub max_scan_ratio: f32,
    /// Floor on the traversal budget regardless of `max_scan_ratio`.
    pub min_scan_limit: usize,
    /// Ceiling on the traversal budget regardless of `max_scan_ratio`.
    pub max_scan_limit: usize,
    /// Number of top candidates re-ranked against `raw_copy` before the
    /// final top-k cut; `0` disables the re-rank pass.
    pub rerank_size: usize,
    /// Pad an under-size result list with sentinel entries up to `k`.
    pub force_padding_result_enable: bool,
}

impl SearchPolicy {
    /// Defaults: no brute-force fallback, ratio `1.0` (effectively
    /// unbounded at `doc_count`), no re-rank, no padding.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bruteforce_threshold: 0,
            max_scan_ratio: 1.0,
            min_scan_limit: 0,
            max_scan_limit: usize::MAX,
            rerank_size: 0,
            force_padding_result_enable: false,
        }
    }

    /// Derives the query-shaping subset from a full `StreamerLimits`.
    #[must_use]
    pub fn from_streamer_limits(limits: &StreamerLimits) -> Self {
        Self {
            bruteforce_threshold: limits.bruteforce_threshold,
            max_scan_ratio: limits.max_scan_ratio,
            min_scan_limit: limits.min_scan_limit,
            max_scan_limit: limits.max_scan_limit,
            rerank_size: limits.rerank_size,
            force_padding_result_enable: limits.force_padding_result_enable,
        }
    }

    fn scan_budget(&self, doc_count: usize) -> usize {
        let limits = StreamerLimits {
            max_scan_ratio: self.max_scan_ratio,
            min_scan_limit: self.min_scan_limit,
            max_scan_limit: self.max_scan_limit,
            ..StreamerLimits::new()
        };
        limits.scan_budget(doc_count)
    }
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only role over a dumped (or directly handed-off) entity.
pub struct Searcher {
    state: SearcherState,
    chunk_size: usize,
    check_crc: bool,
    policy: SearchPolicy,
    bloom_fpp: Option<f64>,
    core: Option<IndexCore>,
}

impl Searcher {
    /// A searcher in the `Init` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SearcherState::Init,
            chunk_size: 1 << 16,
            check_crc: false,
            policy: SearchPolicy::new(),
            bloom_fpp: None,
            core: None,
        }
    }

    /// Use a bloom-filter visit set (`bloomfilter_enable`) for contexts
    /// vended by [`Searcher::new_context`], targeting `target_fpp`.
    pub fn set_bloom_filter(&mut self, target_fpp: f64) {
        self.bloom_fpp = Some(target_fpp);
    }

    /// A fresh per-thread [`Context`] matching the configured visit-filter
    /// kind.
    #[must_use]
    pub fn new_context(&self) -> Context {
        match self.bloom_fpp {
            Some(fpp) => Context::with_bloom_filter(fpp),
            None => Context::new(),
        }
    }

    /// Records load-time options. `Init` → `Inited`.
    pub fn init(&mut self, chunk_size: usize, check_crc: bool, bruteforce_threshold: u64) -> Result<()> {
        if self.state != SearcherState::Init {
            return Err(RabitqError::NoReady("searcher expected state Init".to_string()));
        }
        self.chunk_size = chunk_size;
        self.check_crc = check_crc;
        self.policy.bruteforce_threshold = bruteforce_threshold;
        self.state = SearcherState::Inited;
        Ok(())
    }

    /// Sets the number of top candidates re-ranked against `raw_copy`
    /// before the final top-k cut (§4.5's query-protocol step 3); `0`
    /// (the default) leaves results at the RaBitQ estimate. Callable in
    /// any state, including after `open`.
    pub fn set_rerank_size(&mut self, rerank_size: usize) {
        self.policy.rerank_size = rerank_size;
    }

    /// Sets the traversal-budget triple a single beam search may spend:
    /// `ratio` of `doc_count`, clamped to `[min_limit, max_limit]`.
    /// Callable in any state, including after `open`.
    pub fn set_scan_limits(&mut self, ratio: f32, min_limit: usize, max_limit: usize) {
        self.policy.max_scan_ratio = ratio;
        self.policy.min_scan_limit = min_limit;
        self.policy.max_scan_limit = max_limit;
    }

    /// Sets whether an under-size result list is padded with sentinel
    /// `(KEY_INVALID, +inf)` entries up to `k` (`force_padding_result_enable`,
    /// off by default per §9).
    pub fn set_force_padding(&mut self, enabled: bool) {
        self.policy.force_padding_result_enable = enabled;
    }

    /// Opens a dumped entity by `name` from `backend`. `Inited` → `Opened`.
    pub fn open(
        &mut self,
        backend: &dyn StorageBackend,
        name: &str,
        expect: Option<(&HnswParams, &RabitqParams)>,
    ) -> Result<()> {
        if self.state != SearcherState::Inited {
            return Err(RabitqError::NoReady("searcher expected state Inited".to_string()));
        }
        let loaded = crate::persist::load(backend, name, self.chunk_size, self.check_crc, expect)?;
        self.core = Some(IndexCore {
            graph: loaded.graph,
            quantizer: loaded.quantizer,
            hnsw_params: loaded.hnsw_params,
            rabitq_params: loaded.rabitq_params,
            table: crate::kernel::DistanceTable::detect(),
            magic: std::sync::atomic::AtomicU64::new(1),
        });
        self.state = SearcherState::Opened;
        Ok(())
    }

    /// Opens directly over a core handed off by a `Builder`, skipping a
    /// dump/load round trip.
    pub fn open_core(&mut self, core: IndexCore) -> Result<()> {
        if self.state != SearcherState::Inited {
            return Err(RabitqError::NoReady("searcher expected state Inited".to_string()));
        }
        self.core = Some(core);
        self.state = SearcherState::Opened;
        Ok(())
    }

    fn require_opened(&self) -> Result<&IndexCore> {
        if self.state != SearcherState::Opened {
            return Err(RabitqError::NoReady("searcher expected state Opened".to_string()));
        }
        Ok(self.core.as_ref().expect("Opened implies core is set"))
    }

    /// The `k` nearest neighbors of `query`, by key.
    pub fn search(&self, query: &[f32], k: usize, ctx: &mut Context) -> Result<Vec<(u64, f32)>> {
        let core = self.require_opened()?;
        run_search(core, query, k, &self.policy, ctx)
    }

    /// Brute-force search: skips the graph, scores every live node.
    pub fn search_bf(&self, query: &[f32], k: usize, ctx: &mut Context) -> Result<Vec<(u64, f32)>> {
        let core = self.require_opened()?;
        brute_force(core, query, k, &self.policy, ctx)
    }

    /// Restricts the candidate set to `keys`, used as an allow-list filter
    /// (e.g. partition routing or an external ACL check).
    pub fn search_by_keys(
        &self,
        query: &[f32],
        k: usize,
        keys: &std::collections::HashSet<u64>,
        ctx: &mut Context,
    ) -> Result<Vec<(u64, f32)>> {
        let core = self.require_opened()?;
        ctx.set_key_filter(move |key: Key| keys.contains(&key.0));
        let out = run_search(core, query, k, &self.policy, ctx);
        ctx.clear_key_filter();
        out
    }

    /// Reconstructs the raw vector stored for `key`, if `keep_raw` was set
    /// at training time.
    pub fn reconstruct(&self, key: u64) -> Result<Vec<f32>> {
        let core = self.require_opened()?;
        let id = core
            .graph
            .resolve(Key(key))
            .ok_or(RabitqError::KeyNotFound(key))?;
        core.graph
            .with_encoded(id, |n| n.raw_copy.clone())
            .flatten()
            .ok_or_else(|| RabitqError::NoExist(format!("key {key} has no retained raw vector")))
    }

    /// Closes the searcher; every subsequent call fails `NoReady`.
    pub fn close(&mut self) {
        self.state = SearcherState::Closed;
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SearcherState {
        self.state
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new()
    }
}

/// The 3-step query protocol of §4.4, shared by `Streamer::search` and
/// `Searcher::search`: greedy-descend to level 0's starting node, beam
/// search at level 0 with `ef = max(ef_search, k)` under `policy`'s scan
/// budget, then return the top-k (tombstoned nodes and key-filter rejects
/// are skipped while draining).
pub fn run_search(
    core: &IndexCore,
    query: &[f32],
    k: usize,
    policy: &SearchPolicy,
    ctx: &mut Context,
) -> Result<Vec<(u64, f32)>> {
    core.check_dim(query)?;
    let doc_count = core.graph.published_count();
    if doc_count as u64 <= policy.bruteforce_threshold {
        return brute_force(core, query, k, policy, ctx);
    }

    let Some((entry, max_level)) = core.graph.entry_point() else {
        return Ok(pad_if_needed(Vec::new(), k, policy));
    };

    let query_entity = core.quantizer.prepare_query(query)?;
    let mut src = EstimatorSource {
        graph: &core.graph,
        quantizer: &core.quantizer,
        query: &query_entity,
    };

    let ef = (core.hnsw_params.ef_search as usize).max(k);
    ctx.begin_query(doc_count, ef, k);

    let entry_at_0 = greedy_descend(&core.graph, entry, max_level, 0, &mut src);
    let scan_budget = policy.scan_budget(doc_count);
    let mut w = beam_search_layer(&core.graph, entry_at_0, ef, 0, &mut src, ctx, scan_budget);

    if policy.rerank_size > 0 && core.rabitq_params.keep_raw {
        super::streamer::rerank(core, query, &mut w, policy.rerank_size);
    }

    let out = collect_topk(core, &w, k, ctx)?;
    Ok(pad_if_needed(out, k, policy))
}

fn brute_force(core: &IndexCore, query: &[f32], k: usize, policy: &SearchPolicy, ctx: &mut Context) -> Result<Vec<(u64, f32)>> {
    core.check_dim(query)?;
    let doc_count = core.graph.published_count();
    ctx.begin_query(doc_count, doc_count.max(1), k);
    let query_entity = core.quantizer.prepare_query(query)?;
    let mut src = EstimatorSource {
        graph: &core.graph,
        quantizer: &core.quantizer,
        query: &query_entity,
    };
    let mut scored = Vec::with_capacity(doc_count);
    for i in 0..doc_count {
        let id = NodeId(i as u32);
        scored.push(ScoredNode {
            dist: src.distance(id),
            id,
        });
    }
    if policy.rerank_size > 0 && core.rabitq_params.keep_raw {
        scored.sort();
        super::streamer::rerank(core, query, &mut scored, policy.rerank_size);
    }
    let out = collect_topk(core, &scored, k, ctx)?;
    Ok(pad_if_needed(out, k, policy))
}

fn collect_topk(core: &IndexCore, candidates: &[ScoredNode], k: usize, ctx: &mut Context) -> Result<Vec<(u64, f32)>> {
    for &c in candidates {
        let Some(key) = core.graph.with_node_keys(|keys| keys.get(c.id.index()).copied()) else {
            continue;
        };
        if !core.graph.is_live(c.id) || !ctx.key_admitted(key) {
            continue;
        }
        ctx.topk.offer(c);
    }
    let mut out = Vec::with_capacity(k);
    for s in ctx.topk.sorted_snapshot() {
        if let Some(key) = core.graph.with_node_keys(|keys| keys.get(s.id.index()).copied()) {
            out.push((key.0, s.dist));
        }
    }
    Ok(out)
}

/// `force_padding_result_enable`: pads an under-size result list with
/// `(KEY_INVALID, +inf)` sentinel entries up to `k`, off by default (§9
/// Open Question 3). Left to the caller to filter the sentinel back out if
/// it doesn't want it.
fn pad_if_needed(mut out: Vec<(u64, f32)>, k: usize, policy: &SearchPolicy) -> Vec<(u64, f32)> {
    if policy.force_padding_result_enable {
        while out.len() < k {
            out.push((crate::graph::Key::INVALID.0, f32::INFINITY));
        }
    }
    out
}

/// Also exposes the exact-distance kernel to callers that want a
/// precision re-rank over `keep_raw` vectors without going through the
/// estimator at all.
#[must_use]
pub fn exact_source<'a>(core: &'a IndexCore, query: &'a [f32]) -> ExactSource<'a> {
    ExactSource {
        graph: &core.graph,
        table: &core.table,
        metric: core.metric(),
        query,
    }
}
