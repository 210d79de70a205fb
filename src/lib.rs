//! Bytecode-level tracing instrumentation for JVM method bodies
//!
//! This crate rewrites the instruction stream of already-decoded JVM methods
//! so that method calls, their argument values, and stores into local
//! variables, fields, and array elements are reported to an external trace
//! sink at runtime. The program's own semantics are left untouched: every
//! inserted sequence is stack-neutral.
//!
//! The interesting machinery is not the instrumentation policy but the
//! analysis that makes safe insertion possible:
//!
//!   - [`jvm::interpreter`] simulates the operand stack abstractly, one
//!     instruction at a time, memoizing the stack state after every
//!     instruction of a straight-line predecessor chain.
//!
//!   - [`jvm::interpreter::DataFlow`] answers provenance questions over that
//!     simulation ("which instruction produced the array reference this store
//!     writes into, and which local variable holds it?") so the right static
//!     type and variable name can be attached to a recorded event.
//!
//!   - [`jvm::code`] models the instruction stream itself as an arena-backed
//!     doubly-linked list with stable node identity, and represents requested
//!     rewrites as deferred [`jvm::code::InsnEdit`] values that are applied
//!     only after all analysis over the original stream has finished.
//!
//! [`transform`] is the client of all of the above: it classifies each method
//! (constructor, static initializer, entry point, ordinary) and collects the
//! edits that weave the trace-probe calls in.

pub mod jvm;
pub mod transform;
pub mod util;
