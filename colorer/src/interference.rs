//! Interference graph construction: two allocations interfere if they
//! are ever live at the same time.

use std::collections::{BTreeMap, BTreeSet};

use program::{GraphError, InstructionRef, ReadGraph};

use crate::liveness::walk_liveness;

/// Undirected interference graph over allocation-producing instructions.
///
/// Adjacency is kept in `BTreeMap`/`BTreeSet` rather than the hash-based
/// equivalents so that iterating neighbors, which coloring does as part
/// of computing each allocation's forbidden color set, visits them in a
/// fixed order. The pass's output must not depend on hasher seed.
#[derive(Debug, Clone, Default)]
pub struct InterferenceGraph {
    nodes: BTreeSet<InstructionRef>,
    adjacency: BTreeMap<InstructionRef, BTreeSet<InstructionRef>>,
}

impl InterferenceGraph {
    fn add_node(&mut self, ins: InstructionRef) {
        self.nodes.insert(ins);
        self.adjacency.entry(ins).or_default();
    }

    fn add_edge(&mut self, a: InstructionRef, b: InstructionRef) {
        if a == b {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Allocation instructions, in ascending handle order.
    pub fn nodes(&self) -> impl Iterator<Item = InstructionRef> + '_ {
        self.nodes.iter().copied()
    }

    /// Neighbors of `ins`, in ascending handle order. Empty if `ins` is
    /// not a node of this graph.
    pub fn neighbors(&self, ins: InstructionRef) -> impl Iterator<Item = InstructionRef> + '_ {
        static EMPTY: BTreeSet<InstructionRef> = BTreeSet::new();
        self.adjacency.get(&ins).unwrap_or(&EMPTY).iter().copied()
    }

    pub fn interferes(&self, a: InstructionRef, b: InstructionRef) -> bool {
        self.adjacency.get(&a).is_some_and(|n| n.contains(&b))
    }
}

/// Build the interference graph for every instruction named `allocation_op`.
/// Two allocations interfere iff the liveness walk ever finds them
/// simultaneously live.
pub fn build<G: ReadGraph>(
    graph: &G,
    allocation_op: &str,
) -> Result<InterferenceGraph, GraphError> {
    let mut ig = InterferenceGraph::default();

    // Register every allocation as a node up front, so one with no
    // overlapping neighbor still shows up in `nodes()` with an empty
    // adjacency set.
    for ins in graph.forward_order() {
        if graph.name(ins) == allocation_op {
            ig.add_node(ins);
        }
    }

    walk_liveness(graph, |ins, live| {
        if graph.name(ins) != allocation_op {
            return;
        }
        for &other in live {
            if graph.name(other) == allocation_op {
                ig.add_edge(ins, other);
            }
        }
    })?;

    Ok(ig)
}
