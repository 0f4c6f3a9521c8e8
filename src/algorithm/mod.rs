//! K4: level assignment, beam search, greedy descent, and the insertion
//! protocol built on top of the graph entity (K3).

pub mod insert;
pub mod level;
pub mod search;

pub use insert::{insert_node, insert_node_with_id, select_neighbors_heuristic, GraphPairwise, PairwiseDistance};
pub use level::draw_level;
pub use search::{beam_search_layer, greedy_descend, DistanceSource, EstimatorSource, ExactSource};
