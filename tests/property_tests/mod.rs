//! Property-based tests for the auth filter
//!
//! Invariants of the configuration matcher, the cache-control parser and the
//! cache entry codec that must hold for any input.

mod filter_invariants;
