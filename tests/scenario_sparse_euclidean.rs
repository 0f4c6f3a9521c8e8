//! Scenario S4 (spec.md §8): sparse squared Euclidean via the merge-join
//! kernel over sorted column indices.

use rabitq_hnsw::kernel::scalar::{sparse_l2_squared, SparseRow};

#[test]
fn s4_sparse_merge_join_squared_distance() {
    // Vec A: indices [2,5,7], values [1.0,1.0,1.0]
    let a = SparseRow {
        indices: &[2, 5, 7],
        values: &[1.0, 1.0, 1.0],
    };
    // Vec B: indices [2,5,9], values [1.0,2.0,1.0]
    let b = SparseRow {
        indices: &[2, 5, 9],
        values: &[1.0, 2.0, 1.0],
    };

    // matched@2: (1-1)^2=0; matched@5: (1-2)^2=1; unmatched@7: 1^2=1;
    // unmatched@9: 1^2=1 -> total 3.0
    let dist = sparse_l2_squared(&a, &b);
    assert!((dist - 3.0).abs() < 1e-6, "got {dist}");
}

#[test]
fn s4_sparse_distance_is_symmetric() {
    let a = SparseRow {
        indices: &[2, 5, 7],
        values: &[1.0, 1.0, 1.0],
    };
    let b = SparseRow {
        indices: &[2, 5, 9],
        values: &[1.0, 2.0, 1.0],
    };
    assert_eq!(sparse_l2_squared(&a, &b), sparse_l2_squared(&b, &a));
}
