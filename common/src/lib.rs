//! TCC Common Types
//!
//! This crate contains the participant contract and the types shared by the
//! coordinator and the resource managers that take part in a transaction:
//! the execution context, participant errors and lifecycle enums.

pub mod context;
pub mod error;
pub mod identifiers;
pub mod lifecycle;
pub mod participant;

pub use context::*;
pub use error::*;
pub use identifiers::*;
pub use lifecycle::*;
pub use participant::*;
