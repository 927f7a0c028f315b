//! Seminar room and agent status records.
//!
//! These are the values returned by status queries. The orchestrator owns
//! the live copies; callers always receive clones.

use crate::{derive_room_name, AgentState, RoomState, DEFAULT_MAX_PARTICIPANTS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Join metadata for one participant of a seminar room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Display name presented in the room.
    pub name: String,
    /// When the participant's join token was issued.
    pub joined_at: DateTime<Utc>,
}

/// Outcome of the most recent agent process for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentExitInfo {
    /// Process exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Whether the exit was requested by a stop (as opposed to the agent
    /// exiting on its own).
    pub requested: bool,
    /// Whether the grace period elapsed and the process was force-killed.
    pub forced: bool,
    pub exited_at: DateTime<Utc>,
}

/// Snapshot of a live agent handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub room_name: String,
    pub pid: Option<u32>,
    pub state: AgentState,
    pub started_at: DateTime<Utc>,
}

/// One provisioned room for one seminar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeminarRoom {
    pub seminar_id: String,
    pub room_name: String,
    pub title: String,
    pub max_participants: u32,
    pub recording_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub state: RoomState,
    /// True while an agent process is attached to the room.
    pub agent_deployed: bool,
    /// Participant identity to join metadata.
    pub participants: HashMap<String, ParticipantInfo>,
    pub last_agent_exit: Option<AgentExitInfo>,
}

impl SeminarRoom {
    /// Creates a record in the `Requested` state.
    pub fn new(seminar_id: impl Into<String>, title: impl Into<String>) -> Self {
        let seminar_id = seminar_id.into();
        Self {
            room_name: derive_room_name(&seminar_id),
            seminar_id,
            title: title.into(),
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            recording_enabled: true,
            created_at: Utc::now(),
            state: RoomState::Requested,
            agent_deployed: false,
            participants: HashMap::new(),
            last_agent_exit: None,
        }
    }

    /// Metadata JSON attached to the remote room.
    pub fn metadata_json(&self) -> String {
        serde_json::json!({
            "title": self.title,
            "type": "seminar",
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_room_defaults() {
        let room = SeminarRoom::new("test-001", "On LiveKit Agents");
        assert_eq!(room.room_name, "seminar-test-001");
        assert_eq!(room.max_participants, 100);
        assert!(room.recording_enabled);
        assert_eq!(room.state, RoomState::Requested);
        assert!(!room.agent_deployed);
        assert!(room.participants.is_empty());
    }

    #[test]
    fn metadata_escapes_title() {
        let room = SeminarRoom::new("q", r#"Quotes "inside" title"#);
        let value: serde_json::Value = serde_json::from_str(&room.metadata_json()).unwrap();
        assert_eq!(value["title"], r#"Quotes "inside" title"#);
        assert_eq!(value["type"], "seminar");
    }
}
