//! `MemoryColoring`: the pass entry point that orchestrates liveness,
//! interference, coloring, and layout into a graph rewrite.

use log::debug;

use model::{Shape, DEFAULT_ALIGNMENT};
use program::{GraphError, Program, ReadGraph};

use crate::coloring::color;
use crate::interference::build as build_interference_graph;
use crate::layout::compute as compute_layout;

/// Configuration for the pass: which instruction name denotes an
/// allocation, and what byte alignment every scratch offset must satisfy.
#[derive(Debug, Clone)]
pub struct MemoryColoring {
    allocation_op: String,
    alignment: usize,
}

impl MemoryColoring {
    pub fn new(allocation_op: impl Into<String>) -> Self {
        Self {
            allocation_op: allocation_op.into(),
            alignment: DEFAULT_ALIGNMENT,
        }
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn name(&self) -> &'static str {
        "memory_coloring"
    }

    /// Run the pass over `program` in place: validate, build the
    /// interference graph, color it, lay out a scratch buffer, then
    /// rewrite every colored allocation into a load from that buffer.
    ///
    /// A program with no instruction matching `allocation_op` is left
    /// untouched apart from appending a zero-byte scratch parameter.
    pub fn apply(&self, program: &mut Program) -> Result<(), GraphError> {
        program.validate()?;

        let ig = build_interference_graph(program, &self.allocation_op)?;
        debug!(
            "memory_coloring: {} allocation(s) under interference",
            ig.len()
        );

        let assignment = color(&ig, program);
        debug!(
            "memory_coloring: compacted to {} color(s)",
            assignment.colors()
        );

        let layout = compute_layout(&assignment, self.alignment);
        debug!(
            "memory_coloring: scratch buffer is {} byte(s)",
            layout.scratch_bytes
        );

        let scratch = program.add_parameter("scratch", Shape::new(layout.scratch_bytes));

        for ins in ig.nodes() {
            let color = assignment
                .color_of(ins)
                .expect("every interference-graph node was colored");
            let offset = layout
                .offset_of(color)
                .expect("every color produced by coloring has a layout offset");
            let shape = Shape::new(program.shape_bytes(ins));
            program.replace_with_load(ins, shape, offset, scratch);
        }

        Ok(())
    }
}
