//! Quorum core library
//!
//! Multi-agent deliberation behind a chat-completion surface: the
//! conversation model, session correlation marker, task state, the
//! provider client, the speaker-selection scheduler, and the round runner.

pub mod agents;
pub mod ai;
pub mod constants;
pub mod marker;
pub mod model;
pub mod rounds;
pub mod scheduler;
pub mod task;

pub use task::{Task, TaskState, TaskStore};
