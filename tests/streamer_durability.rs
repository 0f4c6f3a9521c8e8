//! Scenario S5 (spec.md §8): `Streamer` durability. Add 1,000 vectors,
//! flush with a checkpoint token, reopen the same backing store from a
//! fresh `Streamer`, and confirm the reopened index returns exactly those
//! 1,000 vectors and the checkpoint reads back unchanged.

use rabitq_hnsw::config::{HnswParams, MetricKind, RabitqParams, StreamerLimits};
use rabitq_hnsw::context::Context;
use rabitq_hnsw::holder::VecHolder;
use rabitq_hnsw::index::{Builder, Streamer};
use rabitq_hnsw::persist::{MemoryBackend, StorageBackend};

/// A deterministic, per-key-unique vector: the key itself seeds the first
/// coordinate so no two keys ever collide on distance 0 to their own
/// vector, with the remaining coordinates patterned for realism.
fn vector_for_key(key: u64, dim: u32) -> Vec<f32> {
    (0..dim)
        .map(|d| if d == 0 { key as f32 } else { ((key + u64::from(d)) % 23) as f32 })
        .collect()
}

fn train_only_core(dim: u32) -> Builder {
    let mut rabitq_params = RabitqParams::new();
    rabitq_params.keep_raw = true;
    let mut builder = Builder::new();
    builder
        .init(HnswParams::new(dim, MetricKind::L2Squared), rabitq_params, 1 << 12)
        .unwrap();
    builder
}

#[test]
fn s5_streamer_survives_flush_and_reopen() {
    const DIM: u32 = 8;
    const N: u64 = 1_000;
    const CHECKPOINT: u64 = 0xDEAD_BEEF;

    let train_samples: Vec<(u64, Vec<f32>)> = (0..200)
        .map(|i| (i, (0..DIM).map(|d| ((i + u64::from(d)) % 17) as f32).collect()))
        .collect();
    let holder = VecHolder::new(train_samples);

    let mut builder = train_only_core(DIM);
    builder.train(&holder, 3).unwrap();
    let core = builder.into_core().unwrap();

    let backend = MemoryBackend::new();

    let mut streamer = Streamer::new();
    streamer.init(StreamerLimits::new(), 11).unwrap();
    streamer.open(core).unwrap();

    for key in 0..N {
        let vector = vector_for_key(key, DIM);
        streamer.add(key, &vector).unwrap();
    }

    streamer.flush(&backend, "durable-index", CHECKPOINT).unwrap();

    let readback = backend.snapshot("durable-index.checkpoint").unwrap().unwrap();
    let readback_checkpoint = u64::from_le_bytes(readback.try_into().unwrap());
    assert_eq!(readback_checkpoint, CHECKPOINT);

    // Force the exact brute-force path on readback: durability here is
    // about persistence round-tripping every key, not graph-search recall
    // (covered separately by the recall-oracle property test).
    let mut exact_limits = StreamerLimits::new();
    exact_limits.bruteforce_threshold = N + 1;
    exact_limits.rerank_size = N as usize + 1;

    let mut reopened = Streamer::new();
    reopened.init(exact_limits, 11).unwrap();
    reopened
        .open_from_dump(&backend, "durable-index", 1 << 12, None)
        .unwrap();

    let mut ctx = Context::new();
    let mut found = 0u64;
    for key in 0..N {
        let vector = vector_for_key(key, DIM);
        let results = reopened.search(&vector, 1, &mut ctx).unwrap();
        if results.first().map(|(k, _)| *k) == Some(key) {
            found += 1;
        }
    }
    assert_eq!(found, N, "every one of the {N} inserted keys must round-trip through flush/reopen");
}
