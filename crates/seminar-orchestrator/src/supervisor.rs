//! Per-agent watch tasks.
//!
//! Each deployed agent gets one task that owns its [`RunningAgent`]. The task
//! either observes a natural exit and reports it as an [`ExitNotice`], or
//! receives a [`StopRequest`] from the orchestrator, performs the graceful
//! stop, and replies once the process has been reaped. Dropping the
//! [`AgentHandle`] without a stop request kills the process.
//!
//! The watch task is the only writer of the agent's [`AgentState`]; the
//! handle reads it through a `watch` channel.

use chrono::{DateTime, Utc};
use seminar_types::{AgentState, AgentStatus};
use seminar_voice::{AgentExit, RunningAgent, VoiceError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

/// Sent by a watch task when its agent exits without being asked to.
#[derive(Debug)]
pub(crate) struct ExitNotice {
    pub room_name: String,
    pub generation: u64,
    pub result: Result<AgentExit, VoiceError>,
}

pub(crate) type StopReply = oneshot::Receiver<Result<AgentExit, VoiceError>>;

#[derive(Debug)]
struct StopRequest {
    grace: Duration,
    reply: oneshot::Sender<Result<AgentExit, VoiceError>>,
}

/// The orchestrator's record of one supervised agent.
#[derive(Debug)]
pub(crate) struct AgentHandle {
    pub generation: u64,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    state_rx: watch::Receiver<AgentState>,
    stop_tx: Option<oneshot::Sender<StopRequest>>,
}

impl AgentHandle {
    /// Hands `agent` to a new watch task and returns the handle for it.
    ///
    /// The agent reports `Starting` until the watch task has taken it over.
    pub fn supervise(
        agent: Box<dyn RunningAgent>,
        generation: u64,
        exit_tx: mpsc::UnboundedSender<ExitNotice>,
    ) -> Self {
        let pid = agent.pid();
        let (state_tx, state_rx) = watch::channel(AgentState::Starting);
        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(run_agent(agent, generation, state_tx, stop_rx, exit_tx));
        Self {
            generation,
            pid,
            started_at: Utc::now(),
            state_rx,
            stop_tx: Some(stop_tx),
        }
    }

    pub fn state(&self) -> AgentState {
        *self.state_rx.borrow()
    }

    pub fn status(&self, room_name: &str) -> AgentStatus {
        AgentStatus {
            room_name: room_name.to_string(),
            pid: self.pid,
            state: self.state(),
            started_at: self.started_at,
        }
    }

    /// Asks the watch task to stop the agent. The returned receiver resolves
    /// once the process has been reaped.
    ///
    /// Returns `None` when a stop was already requested or the agent has
    /// already exited on its own; in the latter case the exit arrives as an
    /// [`ExitNotice`].
    pub fn request_stop(&mut self, grace: Duration) -> Option<StopReply> {
        let stop_tx = self.stop_tx.take()?;
        let (reply, reply_rx) = oneshot::channel();
        stop_tx.send(StopRequest { grace, reply }).ok()?;
        Some(reply_rx)
    }
}

async fn run_agent(
    mut agent: Box<dyn RunningAgent>,
    generation: u64,
    state_tx: watch::Sender<AgentState>,
    stop_rx: oneshot::Receiver<StopRequest>,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
) {
    state_tx.send_replace(AgentState::Running);

    tokio::select! {
        result = agent.wait() => {
            state_tx.send_replace(AgentState::Exited);
            let notice = ExitNotice {
                room_name: agent.room_name().to_string(),
                generation,
                result,
            };
            if exit_tx.send(notice).is_err() {
                debug!(room = %agent.room_name(), "orchestrator gone, dropping exit notice");
            }
        }
        request = stop_rx => {
            state_tx.send_replace(AgentState::Stopping);
            match request {
                Ok(StopRequest { grace, reply }) => {
                    let result = agent.stop(grace).await;
                    state_tx.send_replace(AgentState::Exited);
                    let _ = reply.send(result);
                }
                Err(_) => {
                    debug!(room = %agent.room_name(), "agent handle dropped, killing process");
                    let _ = agent.stop(Duration::ZERO).await;
                }
            }
        }
    }
}
