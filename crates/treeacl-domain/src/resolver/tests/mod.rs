//! Tests for the access engine.
//!
//! Organized by functionality:
//! - Checks and inheritance order
//! - Permission and node mutations
//! - Identity resolution and node caching
//! - Listing views


#[cfg(test)]
mod mutation_tests;
