use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("LiveKit token error: {0}")]
    LiveKit(#[from] livekit_api::access_token::AccessTokenError),

    #[error("Room service error: {0}")]
    RoomService(String),

    /// The remote room does not exist (already deleted or expired).
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Agent spawn error: {0}")]
    Spawn(String),

    #[error("Agent process error: {0}")]
    Process(String),
}
