//! Self-correcting task runner for text-generation backends.
//!
//! A task is executed, the result is validated and classified, and a
//! correction policy decides how to retry until a result is accepted or the
//! retry budget runs out. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (policy, backoff, termination,
//!   verdict parsing). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config files, child processes,
//!   metrics files, prompt templates).
//! - **[`agents`]**: The executor, validator, and planner collaborators.
//!
//! [`workflow`] drives the loop; [`cli`] wires it to the command line.

pub mod agents;
pub mod cli;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
