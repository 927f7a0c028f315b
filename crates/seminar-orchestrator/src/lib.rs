//! Room lifecycle orchestration for seminar rooms.
//!
//! The [`Orchestrator`] maps a seminar to a provisioned remote room plus at
//! most one supervised agent process, and keeps that mapping consistent
//! under concurrent create/deploy/stop/close calls and agent exits.
//!
//! # Concurrency
//!
//! Every mutation of a room's record happens while holding that room's own
//! async mutex, so operations on one room are linearized and operations on
//! different rooms never wait on each other. The registry map itself sits
//! behind a synchronous lock that is only held for brief lookups and is
//! never held across an `.await`.
//!
//! Agent exits are observed by one watch task per agent. A natural exit is
//! reported as a message and applied through the same per-room lock, tagged
//! with the agent's generation so a late notice can never clear a newer
//! agent.

mod error;
mod orchestrator;
mod supervisor;

pub use error::OrchestratorError;
pub use orchestrator::{CreateSeminarRequest, JoinGrant, Orchestrator};
