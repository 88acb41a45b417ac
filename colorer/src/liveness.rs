//! Backward liveness analysis over a linearized instruction stream (spec
//! §4.1).

use std::collections::HashSet;

use program::{GraphError, InstructionRef, ReadGraph};

/// Walk `graph` in reverse program order, invoking `f` once per
/// instruction whose own live range terminates there, with the set of
/// instructions live immediately before it.
///
/// `f` must treat the live set as read-only; the walker keeps mutating
/// the same set as it proceeds, so a caller that needs to keep a live set
/// around past the call must copy it.
pub fn walk_liveness<G: ReadGraph>(
    graph: &G,
    mut f: impl FnMut(InstructionRef, &HashSet<InstructionRef>),
) -> Result<(), GraphError> {
    let mut live: HashSet<InstructionRef> = HashSet::new();
    for ins in graph.reverse_order() {
        // Resolving aliases means a view into another buffer (a reshape)
        // is tracked as the underlying allocation, not as an independent
        // value. The real producer is what interferes.
        for &input in graph.inputs(ins) {
            let resolved = graph.output_alias(input)?;
            live.insert(resolved);
        }

        // `ins` being in `live` here means this is its last forward use
        // (we're walking backward, so the first time we see it live is
        // the latest point it's read at). Emit there, then retire it.
        if live.contains(&ins) {
            f(ins, &live);
            live.remove(&ins);
        }
        // Otherwise `ins` is never read again after being defined: dead
        // code from this pass's point of view, and not emitted.
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use program::{Program, Shape};

    fn collect_emissions(
        p: &Program,
    ) -> Vec<(InstructionRef, Vec<InstructionRef>)> {
        let mut emitted = Vec::new();
        walk_liveness(p, |ins, live| {
            let mut live: Vec<_> = live.iter().copied().collect();
            live.sort();
            emitted.push((ins, live));
        })
        .unwrap();
        emitted
    }

    #[test]
    fn linear_chain_each_allocation_dies_before_the_next_is_born() {
        // a1 = alloc(100); op1(a1) -> a2 = alloc(200); op2(a2) -> a3 = alloc(50); op3(a3)
        let mut p = Program::new();
        let a1 = p.push("allocate", Vec::new(), Shape::new(100));
        let op1 = p.push("op1", vec![a1], Shape::new(100));
        let a2 = p.push("allocate", Vec::new(), Shape::new(200));
        let op2 = p.push("op2", vec![a2], Shape::new(200));
        let a3 = p.push("allocate", Vec::new(), Shape::new(50));
        let op3 = p.push("op3", vec![a3], Shape::new(50));

        let emitted = collect_emissions(&p);
        // Each op is live for exactly the instruction that reads it; a1/a2/a3
        // never appear together in a live set.
        for (ins, live) in &emitted {
            if *ins == op1 {
                assert_eq!(live, &vec![a1]);
            }
            if *ins == op2 {
                assert_eq!(live, &vec![a2]);
            }
            if *ins == op3 {
                assert_eq!(live, &vec![a3]);
            }
        }
        // op1/op2/op3 themselves are never read, so they're never emitted.
        assert!(!emitted.iter().any(|(ins, _)| [op1, op2, op3].contains(ins)));
    }

    #[test]
    fn two_concurrent_live_ranges_are_seen_together() {
        // a1 = alloc(64); a2 = alloc(96); op(a1, a2)
        let mut p = Program::new();
        let a1 = p.push("allocate", Vec::new(), Shape::new(64));
        let a2 = p.push("allocate", Vec::new(), Shape::new(96));
        let _op = p.push("op", vec![a1, a2], Shape::new(4));

        let emitted = collect_emissions(&p);
        let both_live = emitted.iter().find(|(_, live)| live.len() == 2).unwrap();
        let mut expected = vec![a1, a2];
        expected.sort();
        assert_eq!(both_live.1, expected);
    }

    #[test]
    fn reshape_is_tracked_as_the_underlying_allocation() {
        // a1 = alloc(128); v = reshape(a1); op(v) -> a2 = alloc(128); op2(a1, a2)
        let mut p = Program::new();
        let a1 = p.push("allocate", Vec::new(), Shape::new(128));
        let v = p.push_alias("reshape", vec![a1], Shape::new(128), 0);
        let _op = p.push("op", vec![v], Shape::new(4));
        let a2 = p.push("allocate", Vec::new(), Shape::new(128));
        let _op2 = p.push("op2", vec![a1, a2], Shape::new(4));

        let emitted = collect_emissions(&p);
        // `v`'s use must register as a liveness of `a1`, never of `v`.
        assert!(emitted.iter().all(|(ins, _)| *ins != v));
        let a1_live_somewhere = emitted.iter().any(|(_, live)| live.contains(&a1));
        assert!(a1_live_somewhere);
    }

    #[test]
    fn dead_allocation_with_no_consumers_emits_nothing() {
        let mut p = Program::new();
        let _a1 = p.push("allocate", Vec::new(), Shape::new(64));
        let emitted = collect_emissions(&p);
        assert!(emitted.is_empty());
    }
}
