//! Shared fixtures for orchestrator tests.
#![allow(dead_code)]

use async_trait::async_trait;
use seminar_orchestrator::Orchestrator;
use seminar_voice::{
    AgentConfig, AgentExit, AgentLauncher, AgentRunner, LiveKitConfig, RoomRef, RoomService,
    RunningAgent, VoiceError,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// In-memory stand-in for the remote room service.
#[derive(Default)]
pub struct FakeRoomService {
    rooms: Mutex<HashSet<String>>,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub create_delay: Mutex<Option<Duration>>,
    pub delete_delay: Mutex<Option<Duration>>,
}

impl FakeRoomService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn has_room(&self, name: &str) -> bool {
        self.rooms.lock().unwrap().contains(name)
    }

    /// Simulates the room expiring on the remote side.
    pub fn expire_room(&self, name: &str) {
        self.rooms.lock().unwrap().remove(name);
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoomService for FakeRoomService {
    async fn create_room(
        &self,
        name: &str,
        _max_participants: u32,
        _metadata: &str,
    ) -> Result<RoomRef, VoiceError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(VoiceError::RoomService("permission denied".to_string()));
        }
        self.rooms.lock().unwrap().insert(name.to_string());
        Ok(RoomRef {
            sid: format!("RM_{}", name),
            name: name.to_string(),
        })
    }

    async fn delete_room(&self, name: &str) -> Result<(), VoiceError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delete_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(VoiceError::RoomService("service unavailable".to_string()));
        }
        if self.rooms.lock().unwrap().remove(name) {
            Ok(())
        } else {
            Err(VoiceError::RoomNotFound(name.to_string()))
        }
    }

    fn generate_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        _participant_name: &str,
    ) -> Result<String, VoiceError> {
        Ok(format!("token:{}:{}", room_name, participant_identity))
    }

    fn url(&self) -> &str {
        "ws://fake-livekit"
    }
}

/// Launches agents that never exit on their own and fail every stop.
pub struct UnstoppableLauncher;

struct UnstoppableAgent {
    room_name: String,
}

impl AgentLauncher for UnstoppableLauncher {
    fn launch(&self, room_name: &str) -> Result<Box<dyn RunningAgent>, VoiceError> {
        Ok(Box::new(UnstoppableAgent {
            room_name: room_name.to_string(),
        }))
    }

    fn grace_period(&self) -> Duration {
        Duration::from_millis(100)
    }
}

#[async_trait]
impl RunningAgent for UnstoppableAgent {
    fn room_name(&self) -> &str {
        &self.room_name
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    async fn wait(&mut self) -> Result<AgentExit, VoiceError> {
        std::future::pending().await
    }

    async fn stop(&mut self, _grace: Duration) -> Result<AgentExit, VoiceError> {
        Err(VoiceError::Process("agent refused to stop".to_string()))
    }
}

pub fn orchestrator_with_unstoppable_agent(service: Arc<FakeRoomService>) -> Orchestrator {
    Orchestrator::with_launcher(service, Arc::new(UnstoppableLauncher))
}

/// Agent that stays up until signalled.
pub const LONG_RUNNING: &str = "exec sleep 30";
/// Agent that exits on its own right away.
pub const EXITS_IMMEDIATELY: &str = "exit 0";
/// Agent that ignores SIGTERM.
pub const IGNORES_TERM: &str = "trap '' TERM; exec sleep 30";

pub fn orchestrator_with(
    service: Arc<FakeRoomService>,
    script: &str,
    grace: Duration,
) -> Orchestrator {
    let config = AgentConfig::new("sh", ["-c", script]).with_grace_period(grace);
    Orchestrator::new(service, AgentRunner::new(config, LiveKitConfig::dev()))
}

pub fn orchestrator(service: Arc<FakeRoomService>, script: &str) -> Orchestrator {
    orchestrator_with(service, script, Duration::from_secs(5))
}

/// Orchestrator whose agent binary does not exist.
pub fn orchestrator_without_agent(service: Arc<FakeRoomService>) -> Orchestrator {
    let config = AgentConfig::new("/nonexistent/seminar-agent", Vec::<String>::new());
    Orchestrator::new(service, AgentRunner::new(config, LiveKitConfig::dev()))
}

/// Polls `check` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    // SAFETY: signal 0 only checks for existence.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}
