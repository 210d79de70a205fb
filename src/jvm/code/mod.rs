//! Instruction stream representation and rewriting
//!
//! ### Structure
//!
//! A method body is modelled as an [`InsnList`]: a doubly-linked,
//! order-preserving sequence of arena-allocated [`InsnNode`]s. Nodes have
//! stable identity - inserting elsewhere in the stream never invalidates a
//! held reference - which is what lets analysis results ("*this* instruction
//! introduced the operand") stay meaningful while edits are being planned.
//!
//! ### Rewriting
//!
//! Mutation is split off from analysis: a pass traverses the stream
//! read-only, describing each wanted insertion as an [`InsnEdit`] value, and
//! only once the pass is complete are the collected edits applied. Stack
//! states computed over the original stream are therefore never consulted
//! against a half-rewritten one.

mod edit;
mod insn_list;
mod instructions;

pub use edit::*;
pub use insn_list::*;
pub use instructions::*;
