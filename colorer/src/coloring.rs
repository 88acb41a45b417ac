//! Two-phase greedy graph coloring.
//!
//! Phase A assigns each allocation the lowest-numbered color not already
//! taken by a neighbor, processing allocations least-constrained first so
//! that larger, more-constrained allocations are placed once their small
//! neighbors' colors are already fixed. Phase B then revisits every
//! allocation in the same order, migrating it into a different color
//! class when doing so is safe and shrinks the number of classes needed
//! or lines a class's capacity up with the allocation that really needs
//! it.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use program::{InstructionRef, ReadGraph};

use crate::interference::InterferenceGraph;

pub type Color = u32;

/// The result of coloring: a color per allocation, plus the byte capacity
/// each color class needs to hold its largest member.
#[derive(Debug, Clone, Default)]
pub struct ColorAssignment {
    colors: BTreeMap<InstructionRef, Color>,
    capacity: BTreeMap<Color, usize>,
}

impl ColorAssignment {
    pub fn color_of(&self, ins: InstructionRef) -> Option<Color> {
        self.colors.get(&ins).copied()
    }

    /// One past the highest color in use (spec §3): *not* the count of
    /// occupied colors, since compaction can leave an interior color
    /// empty (e.g. occupied colors `{0, 2}` still has `colors() == 3`).
    pub fn colors(&self) -> usize {
        self.capacity
            .keys()
            .next_back()
            .map_or(0, |&c| c as usize + 1)
    }

    pub fn capacity_of(&self, color: Color) -> usize {
        self.capacity.get(&color).copied().unwrap_or(0)
    }

    /// Colors in ascending order.
    pub fn color_ids(&self) -> impl Iterator<Item = Color> + '_ {
        self.capacity.keys().copied()
    }

    /// Allocations sharing `color`, in ascending handle order.
    pub fn members(&self, color: Color) -> impl Iterator<Item = InstructionRef> + '_ {
        self.colors
            .iter()
            .filter(move |(_, &c)| c == color)
            .map(|(&ins, _)| ins)
    }
}

/// The smallest non-negative color not present in `used`, inserted into
/// `used` before returning. Colors are unbounded, so a free one always
/// exists: this is the sole source of new colors, and guarantees the
/// palette stays compact (no gap is ever left behind a returned color
/// without eventually being reused).
pub fn next_color(used: &mut BTreeSet<Color>) -> Color {
    let mut candidate = 0;
    for &taken in used.iter() {
        if taken == candidate {
            candidate += 1;
        } else if taken > candidate {
            break;
        }
    }
    used.insert(candidate);
    candidate
}

/// Allocations ordered ascending by `(degree, size)`, with instruction
/// handle as a final tie-breaker so iteration over the interference
/// graph's node set never leaks nondeterminism into the order. Both
/// phases walk this same queue.
fn ordered_queue<G: ReadGraph>(ig: &InterferenceGraph, graph: &G) -> Vec<InstructionRef> {
    let mut queue: Vec<InstructionRef> = ig.nodes().collect();
    queue.sort_by_key(|&ins| (ig.neighbors(ins).count(), graph.shape_bytes(ins), ins));
    queue
}

/// `graph[parent]`'s neighbors sorted ascending by size, handle as
/// tie-breaker.
fn sorted_children<G: ReadGraph>(
    ig: &InterferenceGraph,
    graph: &G,
    parent: InstructionRef,
) -> Vec<InstructionRef> {
    let mut children: Vec<InstructionRef> = ig.neighbors(parent).collect();
    children.sort_by_key(|&c| (graph.shape_bytes(c), c));
    children
}

/// Phase A: assign every allocation a color distinct from its neighbors',
/// processing least-constrained allocations first. Also colors a
/// parent's still-uncolored children in the same pass, so a node's color
/// is fixed no later than the first time any of its neighbors is visited.
fn assign<G: ReadGraph>(ig: &InterferenceGraph, graph: &G) -> BTreeMap<InstructionRef, Color> {
    let queue = ordered_queue(ig, graph);
    let mut assigned: BTreeMap<InstructionRef, Color> = BTreeMap::new();

    for parent in &queue {
        let children = sorted_children(ig, graph, *parent);

        // Uncolored children impose no constraint yet: they get their
        // turn below, or when their own entry in `queue` comes up.
        let mut used: BTreeSet<Color> = children
            .iter()
            .filter_map(|c| assigned.get(c).copied())
            .collect();

        match assigned.get(parent).copied() {
            Some(existing) if !used.contains(&existing) => {
                // Keep the color this node already holds (assigned as
                // someone else's child earlier in the queue); just mark
                // it taken so siblings don't reuse it.
                used.insert(existing);
            }
            _ => {
                let color = next_color(&mut used);
                trace!("phase A: colored parent {parent} with {color}");
                assigned.insert(*parent, color);
            }
        }

        for child in children {
            if !assigned.contains_key(&child) {
                let color = next_color(&mut used);
                trace!("phase A: colored child {child} with {color}");
                assigned.insert(child, color);
            }
        }
    }

    assigned
}

/// The largest byte size among allocations currently colored `c`. Zero if
/// `c` currently has no members.
fn max_bytes<G: ReadGraph>(assigned: &BTreeMap<InstructionRef, Color>, graph: &G, c: Color) -> usize {
    assigned
        .iter()
        .filter(|&(_, &cc)| cc == c)
        .map(|(&ins, _)| graph.shape_bytes(ins))
        .max()
        .unwrap_or(0)
}

fn class_size(assigned: &BTreeMap<InstructionRef, Color>, c: Color) -> usize {
    assigned.values().filter(|&&cc| cc == c).count()
}

/// Phase B: revisit every allocation in the same order Phase A used,
/// migrating it to a different, already-occupied color class when that
/// is safe and shrinks the number of live classes (or lines a class's
/// capacity up with the allocation that needs it), without ever
/// contradicting an interference edge.
fn compact<G: ReadGraph>(
    ig: &InterferenceGraph,
    graph: &G,
    queue: &[InstructionRef],
    mut assigned: BTreeMap<InstructionRef, Color>,
) -> BTreeMap<InstructionRef, Color> {
    for &parent in queue {
        let children = sorted_children(ig, graph, parent);
        let mut used: BTreeSet<Color> = children
            .iter()
            .filter_map(|c| assigned.get(c).copied())
            .collect();
        let parent_color = assigned[&parent];
        used.insert(parent_color);

        // `colors()`: one past the highest color any allocation currently
        // holds. Candidates beyond this would extend the palette, which
        // compaction never does.
        let palette = assigned.values().copied().max().map_or(0, |m| m + 1);

        let mut probe = used.clone();
        let mut candidates = Vec::new();
        loop {
            let c = next_color(&mut probe);
            if c >= palette {
                break;
            }
            candidates.push(c);
        }
        // Only classes that currently hold at least one allocation are
        // real migration targets.
        candidates.retain(|&c| class_size(&assigned, c) > 0);
        candidates.sort_by_key(|&c| max_bytes(&assigned, graph, c));

        let parent_size = graph.shape_bytes(parent);
        for candidate in candidates {
            let fits = max_bytes(&assigned, graph, candidate) >= parent_size;
            let old_class_collapses = class_size(&assigned, parent_color) == 1;
            let new_class_is_singleton = class_size(&assigned, candidate) == 1;
            if fits || old_class_collapses || new_class_is_singleton {
                trace!(
                    "phase B: migrated {parent} from color {parent_color} to {candidate}"
                );
                assigned.insert(parent, candidate);
                break;
            }
        }
    }

    assigned
}

/// Build the final [`ColorAssignment`] (colors plus per-color capacity)
/// from a finished coloring.
fn finish<G: ReadGraph>(graph: &G, assigned: BTreeMap<InstructionRef, Color>) -> ColorAssignment {
    let mut capacity: BTreeMap<Color, usize> = BTreeMap::new();
    for (&ins, &c) in &assigned {
        let entry = capacity.entry(c).or_insert(0);
        *entry = (*entry).max(graph.shape_bytes(ins));
    }
    ColorAssignment {
        colors: assigned,
        capacity,
    }
}

/// Run both phases of coloring over `ig`, reading allocation sizes from
/// `graph`.
pub fn color<G: ReadGraph>(ig: &InterferenceGraph, graph: &G) -> ColorAssignment {
    let queue = ordered_queue(ig, graph);
    let assigned = assign(ig, graph);

    debug_assert!(
        assigned.keys().copied().collect::<Vec<_>>() == ig.nodes().collect::<Vec<_>>(),
        "every interference-graph node must receive a color"
    );
    for ins in ig.nodes() {
        let c = assigned[&ins];
        for neighbor in ig.neighbors(ins) {
            debug_assert_ne!(
                c, assigned[&neighbor],
                "phase A must never color two interfering allocations alike"
            );
        }
    }

    let compacted = compact(ig, graph, &queue, assigned);

    for ins in ig.nodes() {
        let c = compacted[&ins];
        for neighbor in ig.neighbors(ins) {
            debug_assert_ne!(
                c, compacted[&neighbor],
                "compaction must never merge two interfering allocations"
            );
        }
    }

    finish(graph, compacted)
}
