/*!
# Core Module

Error types and source position primitives shared by every subsystem.
*/

pub mod errors;
pub mod position;

pub use errors::{DclError, DclResult};
pub use position::{LineIndex, PackedSpan, Position};
