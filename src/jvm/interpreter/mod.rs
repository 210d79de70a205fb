//! Straight-line abstract interpretation of instruction streams
//!
//! ### Model
//!
//! The interpreter tracks only the operand stack, as a stack of abstract
//! [`Operand`]s: constants keep their value, runtime-computed values collapse
//! to a per-type "runtime" operand, and array references keep their element
//! type. Local variables, the heap, and control flow are not modelled - the
//! analysis window is the straight-line predecessor chain of an instruction,
//! which is exactly what the provenance queries in [`DataFlow`] need.
//!
//! ### Memoization
//!
//! [`Interpreter`] caches the stack after each instruction it has stepped
//! over, so the many overlapping backward searches dataflow performs each
//! evaluate every instruction's effect at most once per stream.

mod dataflow;
mod effects;
mod interpreter;
mod operand;
mod stack;

pub use dataflow::DataFlow;
pub use interpreter::Interpreter;
pub use operand::{Category, Operand, OperandKind};
pub use stack::OperandStack;
