//! JVM-side data model: descriptors, access flags, the instruction stream,
//! and the abstract interpreter that analyses it
//!
//! The types in this module describe method bodies the way an agent sees them
//! after class-file decoding: an ordered stream of (non-branching)
//! instructions plus the method's descriptor and debug metadata. Nothing here
//! reads or writes the class-file wire format - that belongs to the embedding.

pub mod code;
mod descriptors;
mod errors;
mod flags;
pub mod interpreter;
mod model;

pub use descriptors::*;
pub use errors::*;
pub use flags::*;
pub use model::*;
