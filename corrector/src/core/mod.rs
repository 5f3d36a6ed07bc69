//! Deterministic, pure logic for the correction loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod backoff;
pub mod efficiency;
pub mod policy;
pub mod retry_hint;
pub mod termination;
pub mod types;
pub mod verdict;
