use std::fmt;

use model::Shape;

use crate::error::GraphError;

/// Opaque, stable, copyable handle to an instruction in a [`Program`].
///
/// Implemented as an index into an append-only arena rather than a
/// pointer/iterator into a linked structure: cheap to copy, hashable, and
/// stable under the only mutation the pass performs (in-place overwrite
/// of a slot via [`Program::replace_with_load`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstructionRef(u32);

impl InstructionRef {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstructionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Whether an instruction produces fresh storage or is a view into one of
/// its own inputs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Alias {
    /// Produces fresh storage; `output_alias` resolves to the instruction
    /// itself.
    Fresh,
    /// A view into `inputs[_0]` (e.g. a reshape); `output_alias` resolves
    /// through it, transitively.
    Input(usize),
}

#[derive(Debug, Clone)]
struct InstructionData {
    name: String,
    inputs: Vec<InstructionRef>,
    shape: Shape,
    alias: Alias,
    /// Set only on instructions produced by [`Program::replace_with_load`].
    load_offset: Option<usize>,
}

/// Read-only capability set the coloring pass needs from a graph: just
/// `{name, inputs, shape, output_alias}`, never the concrete operator.
///
/// `Program` is the only implementation in this crate; a real embedding
/// of this pass would implement `ReadGraph` directly over its own
/// computation graph instead of going through `Program`.
pub trait ReadGraph {
    /// Instruction handles in forward program order.
    fn forward_order(&self) -> Vec<InstructionRef>;

    /// Instruction handles in reverse program order. The default just
    /// reverses `forward_order`; a real graph with cheap bidirectional
    /// iteration may want to override this.
    fn reverse_order(&self) -> Vec<InstructionRef> {
        let mut order = self.forward_order();
        order.reverse();
        order
    }

    fn name(&self, ins: InstructionRef) -> &str;
    fn inputs(&self, ins: InstructionRef) -> &[InstructionRef];
    fn shape_bytes(&self, ins: InstructionRef) -> usize;

    /// Resolve `ins` through any alias chain to the instruction that owns
    /// its storage. The real producer is what interferes, not a view
    /// into it. Returns `Err` if resolution walks off the arena or fails to
    /// terminate. Both are malformed-graph conditions, not bugs in the
    /// pass.
    fn output_alias(&self, ins: InstructionRef) -> Result<InstructionRef, GraphError>;
}

/// A minimal, concrete, arena-backed graph satisfying [`ReadGraph`] plus
/// the mutation primitives the pass needs (`add_parameter`,
/// `replace_with_load`, the only instruction replacement the pass ever
/// performs).
///
/// Because handles are indices, `replace_with_load` is an in-place
/// overwrite of the arena slot: every existing `InstructionRef` pointing
/// at the replaced instruction observes the new data without any separate
/// consumer-rewiring step.
#[derive(Debug, Clone, Default)]
pub struct Program {
    instructions: Vec<InstructionData>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Append an instruction that produces fresh storage.
    pub fn push(
        &mut self,
        name: impl Into<String>,
        inputs: Vec<InstructionRef>,
        shape: Shape,
    ) -> InstructionRef {
        self.push_with_alias(name, inputs, shape, Alias::Fresh)
    }

    /// Append an instruction that is a view into one of its own inputs
    /// (e.g. a reshape), identified by input index.
    pub fn push_alias(
        &mut self,
        name: impl Into<String>,
        inputs: Vec<InstructionRef>,
        shape: Shape,
        aliases_input: usize,
    ) -> InstructionRef {
        self.push_with_alias(name, inputs, shape, Alias::Input(aliases_input))
    }

    fn push_with_alias(
        &mut self,
        name: impl Into<String>,
        inputs: Vec<InstructionRef>,
        shape: Shape,
        alias: Alias,
    ) -> InstructionRef {
        let handle = InstructionRef(self.instructions.len() as u32);
        self.instructions.push(InstructionData {
            name: name.into(),
            inputs,
            shape,
            alias,
            load_offset: None,
        });
        handle
    }

    /// Append a named graph parameter. A parameter has no inputs and
    /// produces fresh storage.
    pub fn add_parameter(&mut self, name: impl Into<String>, shape: Shape) -> InstructionRef {
        self.push(name, Vec::new(), shape)
    }

    /// Replace `old` with `load(shape, offset)` whose single input is
    /// `scratch`. Consumers of `old` are unaffected by identity: they
    /// still hold `old`, which now reads as the load.
    pub fn replace_with_load(
        &mut self,
        old: InstructionRef,
        shape: Shape,
        offset: usize,
        scratch: InstructionRef,
    ) {
        self.instructions[old.index()] = InstructionData {
            name: "load".to_string(),
            inputs: vec![scratch],
            shape,
            alias: Alias::Input(0),
            load_offset: Some(offset),
        };
    }

    /// The byte offset a `load` instruction reads from, if `ins` is one.
    pub fn load_offset(&self, ins: InstructionRef) -> Option<usize> {
        self.instructions.get(ins.index())?.load_offset
    }

    /// Validate every precondition the pass relies on: every input
    /// handle resolves within the arena, and every `output_alias` chain
    /// terminates. Called before the pass ever mutates the graph.
    pub fn validate(&self) -> Result<(), GraphError> {
        for idx in 0..self.instructions.len() {
            let ins = InstructionRef(idx as u32);
            for &input in &self.instructions[idx].inputs {
                if input.index() >= self.instructions.len() {
                    return Err(GraphError::DanglingInput(ins, input));
                }
            }
            self.output_alias(ins)?;
        }
        Ok(())
    }
}

impl ReadGraph for Program {
    fn forward_order(&self) -> Vec<InstructionRef> {
        (0..self.instructions.len() as u32).map(InstructionRef).collect()
    }

    fn name(&self, ins: InstructionRef) -> &str {
        &self.instructions[ins.index()].name
    }

    fn inputs(&self, ins: InstructionRef) -> &[InstructionRef] {
        &self.instructions[ins.index()].inputs
    }

    fn shape_bytes(&self, ins: InstructionRef) -> usize {
        self.instructions[ins.index()].shape.bytes
    }

    fn output_alias(&self, ins: InstructionRef) -> Result<InstructionRef, GraphError> {
        let mut current = ins;
        // Bounded by arena size plus one: a well-formed alias chain visits
        // each instruction at most once, so exceeding this means a cycle.
        for _ in 0..=self.instructions.len() {
            let data = self
                .instructions
                .get(current.index())
                .ok_or(GraphError::DanglingInput(ins, current))?;
            match data.alias {
                Alias::Fresh => return Ok(current),
                Alias::Input(idx) => {
                    current = *data
                        .inputs
                        .get(idx)
                        .ok_or(GraphError::DanglingInput(ins, current))?;
                }
            }
        }
        Err(GraphError::CyclicAlias(ins))
    }
}
