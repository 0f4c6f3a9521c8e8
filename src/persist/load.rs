//! Reconstructs a graph + quantizer from the segment stream `dump` wrote.
//! Unknown tags (a newer writer's extra segments) are skipped via their
//! length prefix, never rejected.

use super::backend::StorageBackend;
use super::segment::{
    read_segment, Segment, MAGIC, TAG_ENCODED_CHUNKS, TAG_GRAPH_META, TAG_KEY_MAP, TAG_META,
    TAG_NODE_KEYS, TAG_NODE_LEVELS, TAG_NEIGHBORS_BASE, TAG_RBQ_CODEBOOK,
};
use crate::config::{HnswParams, RabitqParams};
use crate::error::{PersistError, RabitqError, Result};
use crate::graph::{EncodedNode, GraphEntity, Key, Level, NodeId};
use crate::quantizer::RabitqQuantizer;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

#[derive(Deserialize)]
struct MetaPayload {
    version: u32,
    hnsw_params: HnswParams,
    rabitq_params: RabitqParams,
}

#[derive(Serialize, Deserialize)]
struct GraphMetaPayload {
    doc_count: u64,
    live_count: u64,
    entry_point: Option<(u32, u8)>,
    max_level: u8,
}

/// The reconstructed state a successful `load` produces.
pub struct Loaded {
    pub graph: GraphEntity,
    pub quantizer: RabitqQuantizer,
    pub hnsw_params: HnswParams,
    pub rabitq_params: RabitqParams,
}

/// Loads the entity dumped under `name` in `backend`.
///
/// If `expect` is `Some`, the loaded `hnsw_params`/`rabitq_params` must
/// match it exactly or this returns `RabitqError::Mismatch` — the "dumped
/// meta disagrees with supplied meta" check of §7.
pub fn load(
    backend: &dyn StorageBackend,
    name: &str,
    chunk_size: usize,
    check_crc: bool,
    expect: Option<(&HnswParams, &RabitqParams)>,
) -> Result<Loaded> {
    let bytes = backend
        .snapshot(name)?
        .ok_or_else(|| RabitqError::NoExist(format!("no dump named {name}")))?;
    let mut cur = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    std::io::Read::read_exact(&mut cur, &mut magic)?;
    if magic != MAGIC {
        return Err(RabitqError::Corrupt(PersistError::BadMagic {
            expected: MAGIC,
            actual: magic,
        }));
    }
    let mut version_buf = [0u8; 4];
    std::io::Read::read_exact(&mut cur, &mut version_buf)?;

    let mut meta: Option<MetaPayload> = None;
    let mut quantizer: Option<RabitqQuantizer> = None;
    let mut graph_meta: Option<GraphMetaPayload> = None;
    let mut node_keys: Option<Vec<u64>> = None;
    let mut levels: Option<Vec<Level>> = None;
    let mut encoded: Option<Vec<Option<EncodedNode>>> = None;
    let mut neighbors_by_level: Vec<(u8, Vec<Vec<u32>>)> = Vec::new();
    let mut tombstoned: Option<Vec<u64>> = None;

    while let Some(Segment { tag, payload }) = read_segment(&mut cur, check_crc)? {
        match tag {
            TAG_META => meta = Some(de(&payload)?),
            TAG_RBQ_CODEBOOK => {
                let mut q: RabitqQuantizer = de(&payload)?;
                q.rehydrate();
                quantizer = Some(q);
            }
            TAG_GRAPH_META => graph_meta = Some(de(&payload)?),
            TAG_NODE_KEYS => node_keys = Some(de(&payload)?),
            TAG_NODE_LEVELS => levels = Some(de(&payload)?),
            TAG_ENCODED_CHUNKS => encoded = Some(de(&payload)?),
            TAG_KEY_MAP => tombstoned = Some(de(&payload)?),
            t if t >= TAG_NEIGHBORS_BASE && t < TAG_NEIGHBORS_BASE + 256 => {
                let level = (t - TAG_NEIGHBORS_BASE) as u8;
                neighbors_by_level.push((level, de(&payload)?));
            }
            _ => {} // unknown segment from a newer writer; skip
        }
    }

    let meta = meta.ok_or(RabitqError::Corrupt(PersistError::MissingSegment("META")))?;
    if meta.version != super::segment::VERSION {
        return Err(RabitqError::Corrupt(PersistError::MetaMismatch(format!(
            "dump version {} unsupported by this reader",
            meta.version
        ))));
    }
    if let Some((expect_hnsw, expect_rabitq)) = expect {
        if &meta.hnsw_params != expect_hnsw || &meta.rabitq_params != expect_rabitq {
            return Err(RabitqError::Mismatch(
                "dumped params disagree with the params supplied to open/load".to_string(),
            ));
        }
    }
    let quantizer = quantizer.ok_or(RabitqError::Corrupt(PersistError::MissingSegment("RBQ_CODEBOOK")))?;
    let graph_meta = graph_meta.ok_or(RabitqError::Corrupt(PersistError::MissingSegment("GRAPH_META")))?;
    let node_keys = node_keys.ok_or(RabitqError::Corrupt(PersistError::MissingSegment("NODE_KEYS")))?;
    let levels = levels.ok_or(RabitqError::Corrupt(PersistError::MissingSegment("NODE_LEVELS")))?;
    let encoded = encoded.ok_or(RabitqError::Corrupt(PersistError::MissingSegment("ENCODED_CHUNKS")))?;
    let tombstoned = tombstoned.unwrap_or_default();

    let graph = GraphEntity::new(chunk_size);
    graph.reserve(node_keys.len());
    for (i, &key) in node_keys.iter().enumerate() {
        let level = levels[i];
        let node = encoded[i]
            .clone()
            .ok_or_else(|| RabitqError::Corrupt(PersistError::Serialization("hole in ENCODED_CHUNKS".to_string())))?;
        graph.append_with_id(NodeId(i as u32), Key(key), level, node)?;
    }
    for key in &tombstoned {
        graph.tombstone(Key(*key));
    }
    for (level, per_node) in neighbors_by_level {
        for (i, ids) in per_node.into_iter().enumerate() {
            graph.set_neighbors(level, NodeId(i as u32), ids.into_iter().map(NodeId).collect());
        }
    }
    if let Some((id, lvl)) = graph_meta.entry_point {
        graph.set_entry_point(NodeId(id), lvl);
    }

    Ok(Loaded {
        graph,
        quantizer,
        hnsw_params: meta.hnsw_params,
        rabitq_params: meta.rabitq_params,
    })
}

fn de<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes)
        .map_err(|e| RabitqError::Corrupt(PersistError::Serialization(e.to_string())))
}
