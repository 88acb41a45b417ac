use thiserror::Error;

use crate::graph::InstructionRef;

/// The single error family this crate raises: a malformed input graph.
///
/// These are precondition violations on the producer's output, not
/// recoverable user error. Callers should treat a validation failure as
/// a fatal diagnostic and abort compilation rather than attempt to
/// repair the graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("instruction {0} references input {1}, which is not a live entry in the arena")]
    DanglingInput(InstructionRef, InstructionRef),

    #[error("output_alias resolution for {0} does not terminate (cyclic aliasing)")]
    CyclicAlias(InstructionRef),
}
