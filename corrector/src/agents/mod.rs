//! Collaborator agents driven by the correction loop.
//!
//! The loop only sees the [`executor::Executor`] and [`validator::Validator`]
//! traits; the backend-driven implementations live next to them.

pub mod executor;
pub mod planner;
pub mod validator;
