//! Batch construction: `init` → `train` → `build` → `dump`, each step
//! gated on the previous one's completion.

use super::IndexCore;
use crate::algorithm::{insert_node, GraphPairwise};
use crate::algorithm::level::draw_level;
use crate::algorithm::search::EstimatorSource;
use crate::config::{HnswParams, RabitqParams};
use crate::context::Context;
use crate::error::{RabitqError, Result};
use crate::graph::{EncodedNode, Key};
use crate::holder::Holder;
use crate::persist::StorageBackend;
use crate::quantizer::RabitqQuantizer;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// `Builder`'s lifecycle gate, checked at every public method entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuilderState {
    Init,
    Inited,
    Trained,
    Built,
    Dumped,
}

fn require(actual: BuilderState, expected: BuilderState) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(RabitqError::NoReady(format!(
            "builder expected state {expected:?}, found {actual:?}"
        )))
    }
}

/// Batch index construction over a caller-owned [`Holder`].
pub struct Builder {
    state: BuilderState,
    hnsw_params: Option<HnswParams>,
    rabitq_params: Option<RabitqParams>,
    chunk_size: usize,
    core: Option<IndexCore>,
}

impl Builder {
    /// A builder in the `Init` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: BuilderState::Init,
            hnsw_params: None,
            rabitq_params: None,
            chunk_size: 1 << 16,
            core: None,
        }
    }

    /// Records the shape parameters. `Init` → `Inited`.
    pub fn init(&mut self, hnsw_params: HnswParams, rabitq_params: RabitqParams, chunk_size: usize) -> Result<()> {
        require(self.state, BuilderState::Init)?;
        self.hnsw_params = Some(hnsw_params);
        self.rabitq_params = Some(rabitq_params);
        self.chunk_size = chunk_size;
        self.state = BuilderState::Inited;
        Ok(())
    }

    /// Trains the RaBitQ quantizer on a sample drawn from `holder`.
    /// `Inited` → `Trained`.
    pub fn train(&mut self, holder: &dyn Holder, seed: u64) -> Result<()> {
        require(self.state, BuilderState::Inited)?;
        let rabitq_params = self.rabitq_params.clone().unwrap();
        let hnsw_params = self.hnsw_params.clone().unwrap();
        let samples = holder.sample(rabitq_params.sample_count);
        let quantizer = RabitqQuantizer::train(&samples, holder.dimension(), &rabitq_params, seed)?;
        self.core = Some(IndexCore::new(quantizer, hnsw_params, rabitq_params, self.chunk_size));
        self.state = BuilderState::Trained;
        Ok(())
    }

    /// Inserts every vector `holder` exposes. With the `parallel` feature,
    /// runs over a `rayon` pool; disjoint inserts coordinate only through
    /// the graph entity's own per-(level,node) locks. Level draws are
    /// seeded per key (`seed ^ key`), so the level a node lands on — and
    /// therefore the *set* of edges the build converges to — is
    /// independent of thread scheduling, even though wiring order across
    /// racing inserts is not. `Trained` → `Built`.
    pub fn build(&mut self, holder: &dyn Holder, seed: u64) -> Result<()> {
        require(self.state, BuilderState::Trained)?;
        let core = self.core.as_ref().expect("Trained implies core is set");
        core.graph.reserve(holder.count());

        let items: Vec<(u64, Vec<f32>)> = holder.iter().collect();
        let insert_one = |key: u64, vector: &[f32]| -> Result<()> {
            insert_item(core, key, vector, seed)
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            items
                .par_iter()
                .try_for_each(|(key, vector)| insert_one(*key, vector))?;
        }
        #[cfg(not(feature = "parallel"))]
        {
            for (key, vector) in &items {
                insert_one(*key, vector)?;
            }
        }

        self.state = BuilderState::Built;
        Ok(())
    }

    /// Serializes the built index into `backend` under `name`. Callable
    /// repeatedly (`Built`/`Dumped` → `Dumped`).
    pub fn dump(&mut self, backend: &dyn StorageBackend, name: &str) -> Result<()> {
        if self.state != BuilderState::Built && self.state != BuilderState::Dumped {
            return Err(RabitqError::NoReady(format!(
                "builder expected state Built or Dumped, found {:?}",
                self.state
            )));
        }
        let core = self.core.as_ref().expect("Built/Dumped implies core is set");
        crate::persist::dump(
            &core.graph,
            &core.quantizer,
            &core.hnsw_params,
            &core.rabitq_params,
            backend,
            name,
        )?;
        self.state = BuilderState::Dumped;
        Ok(())
    }

    /// Consumes the builder, handing its core off to a `Streamer` or
    /// `Searcher` without a dump/load round trip.
    pub fn into_core(self) -> Result<IndexCore> {
        self.core
            .ok_or_else(|| RabitqError::NoReady("builder never reached Built".to_string()))
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BuilderState {
        self.state
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_item(core: &IndexCore, key: u64, vector: &[f32], seed: u64) -> Result<()> {
    core.check_dim(vector)?;
    let code = core.quantizer.encode(vector)?;
    let raw = if core.rabitq_params.keep_raw { Some(vector) } else { None };
    let encoded = EncodedNode::new(&code, raw);

    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ key.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    let level = draw_level(&mut rng, core.hnsw_params.level_mult(), core.hnsw_params.l_max);

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
