//! Agent Runner: spawns and supervises conversational-engine processes.
//!
//! An [`AgentProcess`] exclusively owns its OS child. The child is spawned
//! with kill-on-drop, so dropping the owner on any path (including a
//! cancelled task) terminates the process.

use crate::config::{AgentConfig, LiveKitConfig};
use crate::error::VoiceError;
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Observable result of an agent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentExit {
    /// Exit code; `None` when the process died from a signal.
    pub code: Option<i32>,
    /// Whether the grace period elapsed and the process had to be killed.
    pub forced: bool,
}

impl AgentExit {
    fn from_status(status: ExitStatus, forced: bool) -> Self {
        Self {
            code: status.code(),
            forced,
        }
    }
}

/// Starts agents for rooms. [`AgentRunner`] is the process-backed
/// implementation.
pub trait AgentLauncher: Send + Sync {
    /// Starts an agent for `room_name` without waiting for it to join.
    fn launch(&self, room_name: &str) -> Result<Box<dyn RunningAgent>, VoiceError>;

    /// Grace period stops should allow before forcing termination.
    fn grace_period(&self) -> Duration;
}

/// A started agent, exclusively owned by whoever supervises it.
#[async_trait]
pub trait RunningAgent: Send {
    fn room_name(&self) -> &str;

    fn pid(&self) -> Option<u32>;

    /// Resolves when the agent exits on its own. Must be cancel-safe.
    async fn wait(&mut self) -> Result<AgentExit, VoiceError>;

    /// Terminates the agent, allowing `grace` before forcing it.
    async fn stop(&mut self, grace: Duration) -> Result<AgentExit, VoiceError>;
}

/// Launches one agent process per room.
#[derive(Debug, Clone)]
pub struct AgentRunner {
    config: AgentConfig,
    livekit: LiveKitConfig,
}

impl AgentRunner {
    pub fn new(config: AgentConfig, livekit: LiveKitConfig) -> Self {
        Self { config, livekit }
    }

    /// Default grace period used by stops.
    pub fn grace_period(&self) -> Duration {
        self.config.grace_period()
    }

    /// Spawns the agent for `room_name` and returns without waiting for it to
    /// join the room.
    ///
    /// Must be called from within a tokio runtime: the process's stdout and
    /// stderr are forwarded to the log by background tasks.
    pub fn start(&self, room_name: &str) -> Result<AgentProcess, VoiceError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg("--room")
            .arg(room_name)
            .env("LIVEKIT_URL", &self.livekit.url)
            .env("LIVEKIT_API_KEY", &self.livekit.api_key)
            .env("LIVEKIT_API_SECRET", &self.livekit.api_secret)
            .env("SEMINAR_ROOM", room_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            VoiceError::Spawn(format!(
                "failed to spawn agent '{}': {}",
                self.config.program, e
            ))
        })?;

        if let Some(stdout) = child.stdout.take() {
            forward_output(room_name.to_string(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(room_name.to_string(), "stderr", stderr);
        }

        let pid = child.id();
        info!(room = %room_name, pid, "agent process spawned");

        Ok(AgentProcess {
            room_name: room_name.to_string(),
            pid,
            child,
        })
    }
}

impl AgentLauncher for AgentRunner {
    fn launch(&self, room_name: &str) -> Result<Box<dyn RunningAgent>, VoiceError> {
        Ok(Box::new(self.start(room_name)?))
    }

    fn grace_period(&self) -> Duration {
        self.config.grace_period()
    }
}

fn forward_output<R>(room_name: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(room = %room_name, stream, "agent: {}", line);
        }
    });
}

/// A running agent process bound to one room.
#[derive(Debug)]
pub struct AgentProcess {
    room_name: String,
    pid: Option<u32>,
    child: Child,
}

impl AgentProcess {
    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    /// OS process id captured at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Waits for the process to exit on its own and reaps it.
    ///
    /// Cancel-safe: dropping the future leaves the process running and owned
    /// by `self`.
    pub async fn wait(&mut self) -> Result<AgentExit, VoiceError> {
        let status = self.child.wait().await.map_err(|e| {
            VoiceError::Process(format!("failed to wait for agent in {}: {}", self.room_name, e))
        })?;
        Ok(AgentExit::from_status(status, false))
    }

    /// Requests graceful termination, waits up to `grace`, then kills.
    ///
    /// Returns only after the process has been reaped.
    pub async fn stop(&mut self, grace: Duration) -> Result<AgentExit, VoiceError> {
        let already = self.child.try_wait().map_err(|e| {
            VoiceError::Process(format!("failed to poll agent in {}: {}", self.room_name, e))
        })?;
        if let Some(status) = already {
            return Ok(AgentExit::from_status(status, false));
        }

        if let Err(e) = self.terminate() {
            warn!(room = %self.room_name, "graceful termination request failed: {}", e);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => Ok(AgentExit::from_status(status, false)),
            Ok(Err(e)) => Err(VoiceError::Process(format!(
                "failed to wait for agent in {}: {}",
                self.room_name, e
            ))),
            Err(_) => {
                warn!(
                    room = %self.room_name,
                    grace_ms = grace.as_millis() as u64,
                    "agent did not exit within grace period, killing"
                );
                self.child.kill().await.map_err(|e| {
                    VoiceError::Process(format!("failed to kill agent in {}: {}", self.room_name, e))
                })?;
                let status = self.child.wait().await.map_err(|e| {
                    VoiceError::Process(format!(
                        "failed to reap agent in {}: {}",
                        self.room_name, e
                    ))
                })?;
                Ok(AgentExit::from_status(status, true))
            }
        }
    }

    #[cfg(unix)]
    fn terminate(&self) -> Result<(), VoiceError> {
        // `Child::id` is None once the child has been reaped.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = libc::pid_t::try_from(pid)
            .map_err(|_| VoiceError::Process(format!("pid {} out of range", pid)))?;
        // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs
        // to a child we have not reaped yet, so it cannot have been recycled.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(VoiceError::Process(format!("SIGTERM failed: {}", err)))
        }
    }

    /// No graceful signal off Unix: the stop goes straight to the kill.
    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<(), VoiceError> {
        self.child
            .start_kill()
            .map_err(|e| VoiceError::Process(format!("kill failed: {}", e)))
    }
}

#[async_trait]
impl RunningAgent for AgentProcess {
    fn room_name(&self) -> &str {
        &self.room_name
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn wait(&mut self) -> Result<AgentExit, VoiceError> {
        AgentProcess::wait(self).await
    }

    async fn stop(&mut self, grace: Duration) -> Result<AgentExit, VoiceError> {
        AgentProcess::stop(self, grace).await
    }
}
