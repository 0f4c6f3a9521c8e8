//! Scenario S3 (spec.md §8): Hamming distance over packed `BIN32` words,
//! top-3 by distance with ties broken by the lower candidate index (the
//! graph-level tie-break rule applied directly to the K1 kernel's output,
//! since Hamming vectors bypass RaBitQ quantization entirely).

use rabitq_hnsw::kernel::DistanceTable;

#[test]
fn s3_hamming_top3_ties_break_on_lower_id() {
    let table = DistanceTable::detect();

    // NodeId 0 -> 0x00000000, NodeId 1 -> 0xFFFFFFFF, NodeId 2 -> 0x0000FFFF
    let vectors: Vec<[u8; 4]> = vec![
        0x0000_0000u32.to_le_bytes(),
        0xFFFF_FFFFu32.to_le_bytes(),
        0x0000_FFFFu32.to_le_bytes(),
    ];
    let query = 0x0000_00FFu32.to_le_bytes();

    let mut scored: Vec<(u32, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(id, v)| (id as u32, table.hamming(v, &query)))
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    assert_eq!(scored[0], (0, 8.0));
    assert_eq!(scored[1], (2, 8.0));
    assert_eq!(scored[2], (1, 24.0));

    let ids: Vec<u32> = scored.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![0, 2, 1]);
}
