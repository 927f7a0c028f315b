//! Shared types for the seminar room service.
//!
//! This crate holds the data model every other crate speaks: the room and
//! agent lifecycle states, the status record for a provisioned seminar room,
//! and the room naming convention. It has no knowledge of LiveKit or of
//! process supervision.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod room;
pub use room::{AgentExitInfo, AgentStatus, ParticipantInfo, SeminarRoom};

/// Prefix prepended to every seminar id to form the LiveKit room name.
pub const ROOM_NAME_PREFIX: &str = "seminar-";

/// Maximum accepted length of a seminar id.
pub const MAX_SEMINAR_ID_LEN: usize = 64;

/// Default participant cap for a seminar room.
pub const DEFAULT_MAX_PARTICIPANTS: u32 = 100;

/// Lifecycle state of a seminar room.
///
/// ```text
/// Requested -> RoomCreated -> AgentDeploying -> AgentRunning -> Stopping -> Closed
/// ```
///
/// A room whose agent has exited (or failed to spawn) sits in `RoomCreated`
/// until a redeploy or a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    /// A create is in flight; the remote room does not exist yet.
    Requested,
    /// The remote room exists and no agent is attached.
    RoomCreated,
    /// An agent process is being spawned.
    AgentDeploying,
    /// An agent process is attached and running.
    AgentRunning,
    /// The agent (and possibly the room) is being torn down.
    Stopping,
    /// The remote room has been deleted.
    Closed,
}

impl RoomState {
    /// Returns the string label for this state.
    pub fn label(self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::RoomCreated => "ROOM_CREATED",
            Self::AgentDeploying => "AGENT_DEPLOYING",
            Self::AgentRunning => "AGENT_RUNNING",
            Self::Stopping => "STOPPING",
            Self::Closed => "CLOSED",
        }
    }

    /// Whether the room is visible to status queries.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Requested | Self::Closed)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: RoomState) -> bool {
        use RoomState::*;
        matches!(
            (self, next),
            (Requested, RoomCreated)
                | (Requested, Closed)
                | (RoomCreated, AgentDeploying)
                | (RoomCreated, Stopping)
                | (AgentDeploying, AgentRunning)
                | (AgentDeploying, RoomCreated)
                | (AgentRunning, AgentDeploying)
                | (AgentRunning, RoomCreated)
                | (AgentRunning, Stopping)
                | (Stopping, RoomCreated)
                | (Stopping, Closed)
        )
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle state of one supervised agent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Spawned; supervision has not taken over yet.
    Starting,
    Running,
    /// A stop was requested and the grace period is running.
    Stopping,
    /// Reaped; the orchestrator has not observed the exit yet.
    Exited,
}

/// Seminar id rejected by [`validate_seminar_id`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeminarIdError {
    #[error("seminar id must not be empty")]
    Empty,
    #[error("seminar id exceeds {MAX_SEMINAR_ID_LEN} characters")]
    TooLong,
    #[error("seminar id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Derives the room name for a seminar.
///
/// The mapping is a fixed prefix concatenation, so it is injective over all
/// strings: two distinct seminar ids never share a room name, and
/// [`seminar_id_from_room_name`] recovers the id.
pub fn derive_room_name(seminar_id: &str) -> String {
    format!("{ROOM_NAME_PREFIX}{seminar_id}")
}

/// Inverse of [`derive_room_name`]. Returns `None` for names without the prefix.
pub fn seminar_id_from_room_name(room_name: &str) -> Option<&str> {
    room_name.strip_prefix(ROOM_NAME_PREFIX)
}

/// Checks that a seminar id uses the accepted charset: ASCII alphanumerics,
/// `-` and `_`, between 1 and [`MAX_SEMINAR_ID_LEN`] characters.
pub fn validate_seminar_id(seminar_id: &str) -> Result<(), SeminarIdError> {
    if seminar_id.is_empty() {
        return Err(SeminarIdError::Empty);
    }
    if seminar_id.len() > MAX_SEMINAR_ID_LEN {
        return Err(SeminarIdError::TooLong);
    }
    if let Some(c) = seminar_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(SeminarIdError::InvalidChar(c));
    }
    Ok(())
}
