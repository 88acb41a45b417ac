// Memory coloring pass: rewrites a graph's allocation nodes to share a
// single contiguous scratch buffer.
//
// Module organization:
// - liveness.rs: backward liveness walk over a linearized instruction stream
// - interference.rs: interference graph built from allocations live together
// - coloring.rs: two-phase greedy graph coloring (assign, then compact)
// - layout.rs: per-color byte sizes, alignment, and offset assignment
// - pass.rs: `MemoryColoring`, the struct that orchestrates the four phases

mod coloring;
mod interference;
mod layout;
mod liveness;
mod pass;

pub use coloring::{next_color, Color, ColorAssignment};
pub use interference::{build as build_interference_graph, InterferenceGraph};
pub use layout::Layout;
pub use liveness::walk_liveness;
pub use pass::MemoryColoring;
