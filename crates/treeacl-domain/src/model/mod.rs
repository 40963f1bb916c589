//! Reference and access value types.

mod reference;
mod reference_proptest;

pub use reference::{Grant, NodeRef, PairAccess};
