//! Adapters to the external collaborators of the seminar service.
//!
//! Two things live here:
//!
//! - the Room Service Client: a [`RoomService`] trait with a LiveKit-backed
//!   implementation ([`LiveKitRoomService`]) that creates and deletes rooms and
//!   mints participant join tokens;
//! - the Agent Runner: [`AgentRunner`] spawns one conversational-engine
//!   process per room and [`AgentProcess`] owns it until it has been reaped.
//!
//! Neither keeps any per-room state. The orchestrator stores what they return.

pub mod agent;
pub mod config;
pub mod error;
pub mod service;

pub use agent::{AgentExit, AgentLauncher, AgentProcess, AgentRunner, RunningAgent};
pub use config::{
    AgentConfig, LiveKitConfig, DEV_LIVEKIT_API_KEY, DEV_LIVEKIT_API_SECRET, DEV_LIVEKIT_URL,
};
pub use error::VoiceError;
pub use service::{LiveKitRoomService, RoomRef, RoomService};
