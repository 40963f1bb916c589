//! Property-based tests for reference normalization.
