//! Room Service Client.
//!
//! The orchestrator talks to the remote room service only through the
//! [`RoomService`] trait. There is no retry logic here; a failed call is
//! reported once and the caller decides.

use crate::config::LiveKitConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use livekit_api::access_token::{AccessToken, VideoGrants};
use livekit_api::services::room::{CreateRoomOptions, RoomClient};
use livekit_protocol::Room;
use std::time::Duration;

/// Reference to a room created on the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRef {
    pub sid: String,
    pub name: String,
}

impl From<Room> for RoomRef {
    fn from(room: Room) -> Self {
        Self {
            sid: room.sid,
            name: room.name,
        }
    }
}

/// Remote API for provisioning rooms.
#[async_trait]
pub trait RoomService: Send + Sync {
    /// Creates a room. On error nothing exists remotely that the caller
    /// needs to clean up.
    async fn create_room(
        &self,
        name: &str,
        max_participants: u32,
        metadata: &str,
    ) -> Result<RoomRef, VoiceError>;

    /// Deletes a room. Returns [`VoiceError::RoomNotFound`] when the room is
    /// already gone.
    async fn delete_room(&self, name: &str) -> Result<(), VoiceError>;

    /// Mints a join token for one participant of `room_name`.
    fn generate_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<String, VoiceError>;

    /// URL participants connect to.
    fn url(&self) -> &str;
}

#[derive(Debug)]
pub struct LiveKitRoomService {
    config: LiveKitConfig,
    room_client: RoomClient,
}

impl LiveKitRoomService {
    pub fn new(config: LiveKitConfig) -> Self {
        let room_client =
            RoomClient::with_api_key(&config.url, &config.api_key, &config.api_secret);
        Self {
            config,
            room_client,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.url.is_empty()
    }
}

/// Maps a room-service failure, separating "room does not exist" from
/// everything else.
fn classify(room_name: &str, message: String) -> VoiceError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("not_found") || lower.contains("not found") {
        VoiceError::RoomNotFound(room_name.to_string())
    } else {
        VoiceError::RoomService(message)
    }
}

#[async_trait]
impl RoomService for LiveKitRoomService {
    async fn create_room(
        &self,
        name: &str,
        max_participants: u32,
        metadata: &str,
    ) -> Result<RoomRef, VoiceError> {
        let options = CreateRoomOptions {
            max_participants,
            metadata: metadata.to_string(),
            ..Default::default()
        };

        self.room_client
            .create_room(name, options)
            .await
            .map(RoomRef::from)
            .map_err(|e| VoiceError::RoomService(e.to_string()))
    }

    async fn delete_room(&self, name: &str) -> Result<(), VoiceError> {
        self.room_client
            .delete_room(name)
            .await
            .map_err(|e| classify(name, e.to_string()))
    }

    fn generate_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<String, VoiceError> {
        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(participant_identity)
            .with_name(participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(VoiceError::LiveKit)
    }

    fn url(&self) -> &str {
        &self.config.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_classified() {
        let err = classify(
            "seminar-x",
            "twirp error: not_found: requested room does not exist".to_string(),
        );
        assert!(matches!(err, VoiceError::RoomNotFound(name) if name == "seminar-x"));
    }

    #[test]
    fn other_failures_stay_room_service_errors() {
        let err = classify("seminar-x", "failed to execute the request".to_string());
        assert!(matches!(err, VoiceError::RoomService(_)));
    }

    #[test]
    fn disabled_without_url() {
        let service = LiveKitRoomService::new(LiveKitConfig::default());
        assert!(!service.is_enabled());
        assert!(LiveKitRoomService::new(LiveKitConfig::dev()).is_enabled());
    }
}
