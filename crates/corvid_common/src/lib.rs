//! Shared foundational types used across the corvid compiler.
//!
//! This crate provides typed arenas, interned identifiers, the nine-state hardware logic
//! value, logic vectors, and the internal-error result type.

#![warn(missing_docs)]

pub mod arena;
pub mod ident;
pub mod logic;
pub mod logic_vec;
pub mod result;

pub use arena::{Arena, ArenaId};
pub use ident::{Ident, Interner};
pub use logic::Logic;
pub use logic_vec::LogicVec;
pub use result::{CorvidResult, InternalError};
