//! The room lifecycle orchestrator.

use crate::error::OrchestratorError;
use crate::supervisor::{AgentHandle, ExitNotice};
use chrono::Utc;
use seminar_types::{
    validate_seminar_id, AgentExitInfo, AgentStatus, ParticipantInfo, RoomState, SeminarRoom,
    DEFAULT_MAX_PARTICIPANTS,
};
use seminar_voice::{AgentExit, AgentLauncher, AgentRunner, RoomService, VoiceError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Parameters for [`Orchestrator::create_seminar_room`].
#[derive(Debug, Clone)]
pub struct CreateSeminarRequest {
    pub seminar_id: String,
    pub title: String,
    pub max_participants: u32,
    pub recording_enabled: bool,
}

impl CreateSeminarRequest {
    pub fn new(seminar_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            seminar_id: seminar_id.into(),
            title: title.into(),
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            recording_enabled: true,
        }
    }

    pub fn with_max_participants(mut self, max_participants: u32) -> Self {
        self.max_participants = max_participants;
        self
    }

    pub fn with_recording(mut self, enabled: bool) -> Self {
        self.recording_enabled = enabled;
        self
    }
}

/// Credentials a participant needs to join a seminar room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGrant {
    pub url: String,
    pub token: String,
}

struct RoomEntry {
    room: SeminarRoom,
    agent: Option<AgentHandle>,
    /// Generation of the most recently deployed agent, 0 before the first.
    last_generation: u64,
    /// Serializes every mutation of this room.
    lock: Arc<Mutex<()>>,
}

impl RoomEntry {
    fn transition(&mut self, next: RoomState) -> bool {
        if self.room.state.can_transition_to(next) {
            self.room.state = next;
            true
        } else {
            warn!(
                room = %self.room.room_name,
                from = %self.room.state,
                to = %next,
                "ignoring illegal room state transition"
            );
            false
        }
    }

    fn record_exit(&mut self, exit: AgentExit, requested: bool) {
        self.room.last_agent_exit = Some(AgentExitInfo {
            code: exit.code,
            requested,
            forced: exit.forced,
            exited_at: Utc::now(),
        });
    }
}

struct Inner {
    room_service: Arc<dyn RoomService>,
    launcher: Arc<dyn AgentLauncher>,
    grace_period: Duration,
    rooms: RwLock<HashMap<String, RoomEntry>>,
    next_generation: AtomicU64,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
}

/// Owns the `room name -> {room, agent}` mapping.
///
/// Cloning is cheap; clones share the same state. Must be constructed inside
/// a tokio runtime.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("rooms", &self.list_active_rooms())
            .field("grace_period", &self.inner.grace_period)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(room_service: Arc<dyn RoomService>, runner: AgentRunner) -> Self {
        Self::with_launcher(room_service, Arc::new(runner))
    }

    /// Builds an orchestrator that starts agents through `launcher`.
    pub fn with_launcher(
        room_service: Arc<dyn RoomService>,
        launcher: Arc<dyn AgentLauncher>,
    ) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            room_service,
            grace_period: launcher.grace_period(),
            launcher,
            rooms: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            exit_tx,
        });
        tokio::spawn(reconcile_exits(Arc::downgrade(&inner), exit_rx));
        Self { inner }
    }

    /// Creates the remote room for a seminar, then deploys its agent.
    ///
    /// Local state is committed only after the remote room exists. A failed
    /// agent deploy does not roll the room back: the room stays registered
    /// with `agent_deployed == false` and [`deploy_agent`](Self::deploy_agent)
    /// can be retried.
    pub async fn create_seminar_room(
        &self,
        request: CreateSeminarRequest,
    ) -> Result<String, OrchestratorError> {
        validate_seminar_id(&request.seminar_id)?;
        if request.max_participants == 0 {
            return Err(OrchestratorError::InvalidMaxParticipants);
        }

        let mut room = SeminarRoom::new(&request.seminar_id, &request.title);
        room.max_participants = request.max_participants;
        room.recording_enabled = request.recording_enabled;
        let room_name = room.room_name.clone();
        let metadata = room.metadata_json();

        let lock = Arc::new(Mutex::new(()));
        let _guard = lock.clone().lock_owned().await;
        {
            let mut rooms = self.inner.write_rooms();
            if rooms.contains_key(&room_name) {
                return Err(OrchestratorError::AlreadyActive(room_name));
            }
            rooms.insert(
                room_name.clone(),
                RoomEntry {
                    room,
                    agent: None,
                    last_generation: 0,
                    lock,
                },
            );
        }
        let pending = PendingRoom {
            inner: self.inner.as_ref(),
            room_name: &room_name,
        };

        let room_ref = match self
            .inner
            .room_service
            .create_room(&room_name, request.max_participants, &metadata)
            .await
        {
            Ok(room_ref) => room_ref,
            Err(e) => {
                error!(room = %room_name, "failed to create room: {}", e);
                return Err(OrchestratorError::RoomService(e));
            }
        };

        {
            let mut rooms = self.inner.write_rooms();
            if let Some(entry) = rooms.get_mut(&room_name) {
                entry.room.created_at = Utc::now();
                entry.transition(RoomState::RoomCreated);
            }
        }
        pending.commit();

        info!(
            room = %room_name,
            sid = %room_ref.sid,
            seminar = %request.seminar_id,
            title = %request.title,
            "created seminar room"
        );

        self.inner.deploy_locked(&room_name);
        Ok(room_name)
    }

    /// Spawns an agent for a registered room.
    ///
    /// Returns `false` when the room is unknown, when an agent is already
    /// live for it (the existing agent is left untouched), or when the
    /// process cannot be spawned.
    pub async fn deploy_agent(&self, room_name: &str) -> bool {
        let Some(_guard) = self.inner.lock_room(room_name).await else {
            warn!(room = %room_name, "cannot deploy agent: room not found");
            return false;
        };
        self.inner.deploy_locked(room_name)
    }

    /// Stops the room's agent, escalating to a kill after the grace period.
    ///
    /// Returns `false` when no agent is registered or the stop failed. The
    /// handle is removed and `agent_deployed` cleared however the process
    /// ended. The stop runs on its own task and completes even if the caller
    /// is cancelled.
    pub async fn stop_agent(&self, room_name: &str) -> bool {
        let inner = Arc::clone(&self.inner);
        let name = room_name.to_string();
        let task = tokio::spawn(async move {
            let Some(_guard) = inner.lock_room(&name).await else {
                warn!(room = %name, "cannot stop agent: room not found");
                return false;
            };
            inner.stop_locked(&name).await
        });

        match task.await {
            Ok(stopped) => stopped,
            Err(e) => {
                error!(room = %room_name, "stop task failed: {}", e);
                false
            }
        }
    }

    /// Stops the agent (best effort), deletes the remote room, and forgets it.
    ///
    /// Returns `Ok(false)` for unknown or already closed rooms. A remote room
    /// that is already gone counts as deleted. Any other remote failure is
    /// returned and the room stays registered so the close can be retried.
    /// Like [`stop_agent`](Self::stop_agent), the close runs on its own task.
    pub async fn close_seminar_room(&self, room_name: &str) -> Result<bool, OrchestratorError> {
        let inner = Arc::clone(&self.inner);
        let name = room_name.to_string();
        tokio::spawn(async move { inner.close(&name).await }).await?
    }

    /// Mints a join token for a participant and records them in the room.
    ///
    /// Returns `Ok(None)` for unknown rooms.
    pub async fn issue_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<Option<JoinGrant>, OrchestratorError> {
        let Some(_guard) = self.inner.lock_room(room_name).await else {
            return Ok(None);
        };

        let token = self
            .inner
            .room_service
            .generate_join_token(room_name, participant_identity, participant_name)
            .map_err(OrchestratorError::Token)?;

        if let Some(entry) = self.inner.write_rooms().get_mut(room_name) {
            entry.room.participants.insert(
                participant_identity.to_string(),
                ParticipantInfo {
                    name: participant_name.to_string(),
                    joined_at: Utc::now(),
                },
            );
        }
        info!(room = %room_name, participant = %participant_identity, "issued join token");

        Ok(Some(JoinGrant {
            url: self.inner.room_service.url().to_string(),
            token,
        }))
    }

    /// Last known status of an active room.
    pub fn get_room_status(&self, room_name: &str) -> Option<SeminarRoom> {
        self.inner
            .read_rooms()
            .get(room_name)
            .filter(|entry| entry.room.state.is_active())
            .map(|entry| entry.room.clone())
    }

    /// Snapshot of the room's live agent, if any.
    pub fn agent_status(&self, room_name: &str) -> Option<AgentStatus> {
        self.inner
            .read_rooms()
            .get(room_name)
            .and_then(|entry| entry.agent.as_ref())
            .map(|handle| handle.status(room_name))
    }

    /// Names of all active rooms, sorted.
    pub fn list_active_rooms(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .read_rooms()
            .iter()
            .filter(|(_, entry)| entry.room.state.is_active())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Closes every active room concurrently. Returns how many were closed.
    pub async fn shutdown(&self) -> usize {
        let rooms = self.list_active_rooms();
        if rooms.is_empty() {
            return 0;
        }
        info!(count = rooms.len(), "closing all seminar rooms");

        let mut tasks = JoinSet::new();
        for room_name in rooms {
            let orchestrator = self.clone();
            tasks.spawn(async move {
                let result = orchestrator.close_seminar_room(&room_name).await;
                (room_name, result)
            });
        }

        let mut closed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(true))) => closed += 1,
                Ok((_, Ok(false))) => {}
                Ok((room_name, Err(e))) => {
                    error!(room = %room_name, "failed to close room during shutdown: {}", e);
                }
                Err(e) => error!("room close task failed: {}", e),
            }
        }
        closed
    }
}

impl Inner {
    fn read_rooms(&self) -> RwLockReadGuard<'_, HashMap<String, RoomEntry>> {
        self.rooms.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_rooms(&self) -> RwLockWriteGuard<'_, HashMap<String, RoomEntry>> {
        self.rooms.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquires the room's mutation lock.
    ///
    /// Returns `None` if the room is unknown, or if it was closed (or closed
    /// and recreated) while we were waiting.
    async fn lock_room(&self, room_name: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = self.read_rooms().get(room_name)?.lock.clone();
        let guard = lock.clone().lock_owned().await;
        let rooms = self.read_rooms();
        let entry = rooms.get(room_name)?;
        (Arc::ptr_eq(&entry.lock, &lock) && entry.room.state.is_active()).then_some(guard)
    }

    async fn close(&self, room_name: &str) -> Result<bool, OrchestratorError> {
        let Some(_guard) = self.lock_room(room_name).await else {
            debug!(room = %room_name, "close requested for unknown room");
            return Ok(false);
        };

        if !self.stop_locked(room_name).await {
            debug!(room = %room_name, "no agent stopped before close, deleting anyway");
        }

        if let Some(entry) = self.write_rooms().get_mut(room_name) {
            entry.transition(RoomState::Stopping);
        }

        match self.room_service.delete_room(room_name).await {
            Ok(()) => {}
            Err(VoiceError::RoomNotFound(_)) => {
                warn!(room = %room_name, "remote room already gone, treating as deleted");
            }
            Err(e) => {
                error!(room = %room_name, "failed to delete room: {}", e);
                if let Some(entry) = self.write_rooms().get_mut(room_name) {
                    entry.transition(RoomState::RoomCreated);
                }
                return Err(OrchestratorError::RoomService(e));
            }
        }

        if let Some(mut entry) = self.write_rooms().remove(room_name) {
            entry.transition(RoomState::Closed);
        }
        info!(room = %room_name, "room closed");
        Ok(true)
    }

    /// Caller must hold the room's lock.
    fn deploy_locked(&self, room_name: &str) -> bool {
        {
            let mut rooms = self.write_rooms();
            let Some(entry) = rooms.get_mut(room_name) else {
                return false;
            };
            if let Some(handle) = &entry.agent {
                warn!(
                    room = %room_name,
                    pid = handle.pid,
                    "agent already running, rejecting deploy"
                );
                return false;
            }
            if !entry.transition(RoomState::AgentDeploying) {
                return false;
            }
        }

        let spawned = self.launcher.launch(room_name);

        let mut rooms = self.write_rooms();
        let Some(entry) = rooms.get_mut(room_name) else {
            return false;
        };
        match spawned {
            Ok(process) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let handle = AgentHandle::supervise(process, generation, self.exit_tx.clone());
                info!(room = %room_name, pid = handle.pid, generation, "agent deployed");
                entry.agent = Some(handle);
                entry.last_generation = generation;
                entry.room.agent_deployed = true;
                entry.transition(RoomState::AgentRunning);
                true
            }
            Err(e) => {
                error!(room = %room_name, "failed to deploy agent: {}", e);
                entry.room.agent_deployed = false;
                entry.transition(RoomState::RoomCreated);
                false
            }
        }
    }

    /// Caller must hold the room's lock.
    ///
    /// The handle stays registered, reporting `Stopping`, until the process
    /// has been reaped.
    async fn stop_locked(&self, room_name: &str) -> bool {
        let (pid, reply) = {
            let mut rooms = self.write_rooms();
            let Some(entry) = rooms.get_mut(room_name) else {
                return false;
            };
            let Some(handle) = entry.agent.as_mut() else {
                debug!(room = %room_name, "no agent process to stop");
                return false;
            };
            let pid = handle.pid;
            let reply = handle.request_stop(self.grace_period);
            entry.transition(RoomState::Stopping);
            (pid, reply)
        };

        let result = match reply {
            Some(reply) => match reply.await {
                Ok(result) => result.map(Some),
                Err(_) => Err(VoiceError::Process(
                    "agent watch task ended without reporting".to_string(),
                )),
            },
            None => Ok(None),
        };

        let mut rooms = self.write_rooms();
        if let Some(entry) = rooms.get_mut(room_name) {
            entry.agent = None;
            entry.room.agent_deployed = false;
            entry.transition(RoomState::RoomCreated);
            if let Ok(Some(exit)) = &result {
                entry.record_exit(*exit, true);
            }
        }

        match result {
            Ok(Some(exit)) => {
                info!(room = %room_name, pid, code = exit.code, forced = exit.forced, "agent stopped");
                true
            }
            Ok(None) => {
                info!(room = %room_name, pid, "agent had already exited");
                true
            }
            Err(e) => {
                error!(room = %room_name, pid, "error stopping agent: {}", e);
                false
            }
        }
    }

    async fn reconcile_exit(&self, notice: ExitNotice) {
        let ExitNotice {
            room_name,
            generation,
            result,
        } = notice;

        let Some(_guard) = self.lock_room(&room_name).await else {
            debug!(room = %room_name, generation, "exit notice for closed room");
            return;
        };

        let mut rooms = self.write_rooms();
        let Some(entry) = rooms.get_mut(&room_name) else {
            return;
        };
        match entry.agent.as_ref().map(|h| h.generation) {
            Some(current) if current == generation => {}
            None if entry.last_generation == generation => {
                // A stop detached this agent after it had already exited.
                if let Ok(exit) = result {
                    info!(room = %room_name, code = exit.code, "agent process exited");
                    entry.record_exit(exit, false);
                }
                return;
            }
            _ => {
                debug!(room = %room_name, generation, "stale exit notice ignored");
                return;
            }
        }

        entry.agent = None;
        entry.room.agent_deployed = false;
        entry.transition(RoomState::RoomCreated);
        match result {
            Ok(exit) => {
                info!(room = %room_name, code = exit.code, "agent process exited");
                entry.record_exit(exit, false);
            }
            Err(e) => {
                error!(room = %room_name, "error waiting for agent: {}", e);
            }
        }
    }
}

/// Removes a `Requested` reservation unless the create completed, so a
/// failed or cancelled create leaves nothing behind.
struct PendingRoom<'a> {
    inner: &'a Inner,
    room_name: &'a str,
}

impl PendingRoom<'_> {
    fn commit(self) {
        std::mem::forget(self);
    }
}

impl Drop for PendingRoom<'_> {
    fn drop(&mut self) {
        let mut rooms = self.inner.write_rooms();
        if rooms
            .get(self.room_name)
            .is_some_and(|entry| entry.room.state == RoomState::Requested)
        {
            rooms.remove(self.room_name);
        }
    }
}

/// Applies natural agent exits. Each notice is handled on its own task so a
/// busy room never delays another room's reconciliation.
async fn reconcile_exits(inner: Weak<Inner>, mut exit_rx: mpsc::UnboundedReceiver<ExitNotice>) {
    while let Some(notice) = exit_rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        tokio::spawn(async move { inner.reconcile_exit(notice).await });
    }
}
