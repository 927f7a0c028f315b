//! Error types for the orchestrator.

use seminar_types::SeminarIdError;
use seminar_voice::VoiceError;

/// Caller-visible orchestrator failures.
///
/// Failures in agent supervision never appear here: they are absorbed and
/// reflected in the room's status record instead.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid seminar id: {0}")]
    InvalidSeminarId(#[from] SeminarIdError),

    #[error("max_participants must be positive")]
    InvalidMaxParticipants,

    /// A room for this seminar is already active or being created.
    #[error("seminar room already active: {0}")]
    AlreadyActive(String),

    /// The remote room service rejected or failed the call.
    #[error("room service error: {0}")]
    RoomService(#[source] VoiceError),

    #[error("join token error: {0}")]
    Token(#[source] VoiceError),

    /// The task running the operation panicked or was aborted.
    #[error("orchestrator task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
