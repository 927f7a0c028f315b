//! Agent Runner behaviour against real `sh` stub processes.
#![cfg(unix)]

use seminar_voice::{AgentConfig, AgentLauncher, AgentRunner, LiveKitConfig, VoiceError};
use std::time::{Duration, Instant};

fn runner(script: &str) -> AgentRunner {
    let config = AgentConfig::new("sh", ["-c", script]);
    AgentRunner::new(config, LiveKitConfig::dev())
}

fn pid_alive(pid: u32) -> bool {
    // SAFETY: signal 0 only checks for existence.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[tokio::test]
async fn test_immediate_exit_reports_code() {
    let runner = runner("exit 3");
    let mut process = runner.start("seminar-exit").expect("spawn");
    assert!(process.pid().is_some());

    let exit = process.wait().await.expect("wait");
    assert_eq!(exit.code, Some(3));
    assert!(!exit.forced);
}

#[tokio::test]
async fn test_environment_and_room_argument() {
    // `sh -c script --room <name>` binds $0 = --room and $1 = <name>.
    let runner = runner(
        r#"[ "$SEMINAR_ROOM" = "seminar-env" ] && [ "$1" = "seminar-env" ] \
           && [ "$LIVEKIT_URL" = "http://localhost:7880" ] \
           && [ "$LIVEKIT_API_KEY" = "devkey" ] && [ -n "$LIVEKIT_API_SECRET" ] \
           && exit 0; exit 7"#,
    );
    let mut process = runner.start("seminar-env").expect("spawn");
    let exit = process.wait().await.expect("wait");
    assert_eq!(exit.code, Some(0));
}

#[tokio::test]
async fn test_missing_binary_is_spawn_error() {
    let config = AgentConfig::new("/nonexistent/seminar-agent", Vec::<String>::new());
    let runner = AgentRunner::new(config, LiveKitConfig::dev());
    match runner.start("seminar-missing") {
        Err(VoiceError::Spawn(msg)) => assert!(msg.contains("/nonexistent/seminar-agent")),
        other => panic!("expected spawn error, got {:?}", other.map(|p| p.pid())),
    }
}

#[tokio::test]
async fn test_graceful_stop() {
    let runner = runner("exec sleep 30");
    let mut process = runner.start("seminar-graceful").expect("spawn");
    let pid = process.pid().expect("pid");

    let exit = process
        .stop(Duration::from_secs(5))
        .await
        .expect("stop");
    assert!(!exit.forced);
    assert_eq!(exit.code, None, "terminated by SIGTERM");
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn test_stop_escalates_to_kill_when_term_is_ignored() {
    let runner = runner("trap '' TERM; exec sleep 30");
    let mut process = runner.start("seminar-stubborn").expect("spawn");
    let pid = process.pid().expect("pid");

    // Give the shell time to install the trap before signalling.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let grace = Duration::from_millis(300);
    let started = Instant::now();
    let exit = process.stop(grace).await.expect("stop");
    let elapsed = started.elapsed();

    assert!(exit.forced, "forced kill path should be taken");
    assert!(elapsed >= grace);
    assert!(elapsed < grace + Duration::from_secs(2), "took {:?}", elapsed);
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn test_stop_after_natural_exit() {
    let runner = runner("exit 0");
    let mut process = runner.start("seminar-done").expect("spawn");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let exit = process.stop(Duration::from_secs(1)).await.expect("stop");
    assert_eq!(exit.code, Some(0));
    assert!(!exit.forced);
}

/// Linux-only: a killed but not yet reaped child is a zombie, which
/// `kill(pid, 0)` still reports as present.
#[cfg(target_os = "linux")]
fn pid_running(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z"),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_drop_kills_process() {
    let runner = runner("exec sleep 30");
    let process = runner.start("seminar-dropped").expect("spawn");
    let pid = process.pid().expect("pid");
    drop(process);

    let deadline = Instant::now() + Duration::from_secs(5);
    while pid_running(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!pid_running(pid));
}

#[tokio::test]
async fn test_launcher_hands_out_stoppable_agents() {
    let launcher: Box<dyn AgentLauncher> = Box::new(runner("exec sleep 30"));
    assert_eq!(launcher.grace_period(), Duration::from_secs(5));

    let mut agent = launcher.launch("seminar-launch").expect("launch");
    assert_eq!(agent.room_name(), "seminar-launch");
    let pid = agent.pid().expect("pid");

    let exit = agent.stop(Duration::from_secs(2)).await.expect("stop");
    assert!(!exit.forced);
    assert!(!pid_alive(pid));
}
