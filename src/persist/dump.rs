//! Serializes a graph + quantizer into the named segment stream of §6:
//! `META`, `RBQ_CODEBOOK`, `GRAPH_META`, `NODE_KEYS`, `NODE_LEVELS`,
//! `ENCODED_CHUNKS`, `NEIGHBORS_L{level}` (one per level in use), `KEY_MAP`.

use super::backend::StorageBackend;
use super::segment::{
    neighbors_tag, write_segment, MAGIC, TAG_ENCODED_CHUNKS, TAG_GRAPH_META, TAG_KEY_MAP, TAG_META,
    TAG_NODE_KEYS, TAG_NODE_LEVELS, TAG_RBQ_CODEBOOK, VERSION,
};
use crate::config::{HnswParams, RabitqParams};
use crate::error::Result;
use crate::graph::GraphEntity;
use crate::quantizer::RabitqQuantizer;
use serde::Serialize;

#[derive(Serialize)]
struct MetaPayload<'a> {
    version: u32,
    hnsw_params: &'a HnswParams,
    rabitq_params: &'a RabitqParams,
}

#[derive(Serialize)]
struct GraphMetaPayload {
    doc_count: u64,
    live_count: u64,
    entry_point: Option<(u32, u8)>,
    max_level: u8,
}

/// Serializes the full entity into `backend` under `name`, committing
/// atomically once every segment has been written.
pub fn dump(
    graph: &GraphEntity,
    quantizer: &RabitqQuantizer,
    hnsw_params: &HnswParams,
    rabitq_params: &RabitqParams,
    backend: &dyn StorageBackend,
    name: &str,
) -> Result<()> {
    backend.open(name)?;
    let mut buf = Vec::new();
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    backend.write_segment(name, &buf)?;

    let meta = MetaPayload {
        version: VERSION,
        hnsw_params,
        rabitq_params,
    };
    write_segment(
        &mut Buf(backend, name),
        TAG_META,
        &postcard::to_allocvec(&meta).map_err(ser_err)?,
    )?;

    write_segment(
        &mut Buf(backend, name),
        TAG_RBQ_CODEBOOK,
        &postcard::to_allocvec(quantizer).map_err(ser_err)?,
    )?;

    let (entry_point, max_level) = match graph.entry_point() {
        Some((id, lvl)) => (Some((id.0, lvl)), lvl),
        None => (None, 0),
    };
    let graph_meta = GraphMetaPayload {
        doc_count: graph.published_count() as u64,
        live_count: graph.live_count() as u64,
        entry_point,
        max_level,
    };
    write_segment(
        &mut Buf(backend, name),
        TAG_GRAPH_META,
        &postcard::to_allocvec(&graph_meta).map_err(ser_err)?,
    )?;

    let node_keys: Vec<u64> = graph.with_node_keys(|keys| keys.iter().map(|k| k.0).collect());
    write_segment(
        &mut Buf(backend, name),
        TAG_NODE_KEYS,
        &postcard::to_allocvec(&node_keys).map_err(ser_err)?,
    )?;

    let n = graph.published_count();
    let mut levels = Vec::with_capacity(n);
    let mut encoded = Vec::with_capacity(n);
    for i in 0..n {
        let id = crate::graph::NodeId(i as u32);
        levels.push(graph.level_of(id).unwrap_or(0));
        encoded.push(graph.get_encoded(id));
    }
    write_segment(
        &mut Buf(backend, name),
        TAG_NODE_LEVELS,
        &postcard::to_allocvec(&levels).map_err(ser_err)?,
    )?;
    write_segment(
        &mut Buf(backend, name),
        TAG_ENCODED_CHUNKS,
        &postcard::to_allocvec(&encoded).map_err(ser_err)?,
    )?;

    for level in 0..=max_level {
        let mut per_node = Vec::with_capacity(n);
        let mut any = false;
        for i in 0..n {
            let id = crate::graph::NodeId(i as u32);
            if graph.level_of(id).unwrap_or(0) >= level {
                any = true;
            }
            per_node.push(graph.neighbors(level, id).into_iter().map(|nid| nid.0).collect::<Vec<u32>>());
        }
        if !any {
            continue;
        }
        write_segment(
            &mut Buf(backend, name),
            neighbors_tag(level),
            &postcard::to_allocvec(&per_node).map_err(ser_err)?,
        )?;
    }

    let tombstoned: Vec<u64> = node_keys
        .iter()
        .copied()
        .filter(|&k| graph.resolve(crate::graph::Key(k)).is_none())
        .collect();
    write_segment(
        &mut Buf(backend, name),
        TAG_KEY_MAP,
        &postcard::to_allocvec(&tombstoned).map_err(ser_err)?,
    )?;

    backend.commit(name)
}

fn ser_err(e: postcard::Error) -> crate::error::RabitqError {
    crate::error::RabitqError::Corrupt(crate::error::PersistError::Serialization(e.to_string()))
}

/// Adapts `StorageBackend::write_segment` (append bytes under a name) to
/// `std::io::Write`, so `write_segment`'s framing helper can target either
/// a `Vec<u8>` or a backend transparently.
struct Buf<'a>(&'a dyn StorageBackend, &'a str);

impl std::io::Write for Buf<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .write_segment(self.1, buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
