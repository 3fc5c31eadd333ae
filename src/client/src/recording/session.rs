use crate::recording::command::build_record_args;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use perfcap_common::types::record::{RecordRequest, RecordTarget, SessionEvent};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STDERR_TAIL_LINES: usize = 10;

/// Owns the external recorder subprocess. At most one session is active at a
/// time; lifecycle events stream through the channel handed out by [`new`].
///
/// Asynchronous failures (spawn errors, nonzero exits) are reported as
/// [`SessionEvent::Failed`] so a front-end handles every outcome in one
/// place; `start` itself only errors on the already-recording precondition.
///
/// [`new`]: PerfRecorder::new
pub struct PerfRecorder {
    recorder_path: PathBuf,
    grace_period: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
    active: Arc<Mutex<Option<ActiveSession>>>,
}

struct ActiveSession {
    pid: Option<u32>,
    stop: CancellationToken,
    started_at: DateTime<Utc>,
}

impl PerfRecorder {
    pub fn new(
        recorder_path: PathBuf,
        grace_period: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let recorder = PerfRecorder {
            recorder_path,
            grace_period,
            events,
            active: Arc::new(Mutex::new(None)),
        };
        (recorder, rx)
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().expect("recorder state poisoned").is_some()
    }

    /// Launches the recorder for `request`. Must run inside a tokio runtime;
    /// output draining and exit watching happen on spawned tasks, the session
    /// outcome arrives on the event channel.
    pub fn start(&self, request: RecordRequest) -> Result<()> {
        let mut active = self.active.lock().expect("recorder state poisoned");
        if active.is_some() {
            bail!("a recording session is already active");
        }

        let args = build_record_args(&request.options, &request.output_path, &request.target);
        info!(
            "starting recorder: {} {}",
            self.recorder_path.display(),
            args.join(" ")
        );

        let mut command = Command::new(&self.recorder_path);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let RecordTarget::Launch {
            working_dir: Some(dir),
            ..
        } = &request.target
        {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = self.events.send(SessionEvent::Failed(format!(
                    "failed to launch {}: {}",
                    self.recorder_path.display(),
                    e
                )));
                return Ok(());
            }
        };

        let stop = CancellationToken::new();
        *active = Some(ActiveSession {
            pid: child.id(),
            stop: stop.clone(),
            started_at: Utc::now(),
        });

        let stdout_task = child
            .stdout
            .take()
            .map(|stream| forward_lines(stream, self.events.clone(), false));
        let stderr_task = child
            .stderr
            .take()
            .map(|stream| forward_lines(stream, self.events.clone(), true));

        tokio::spawn(watch_session(
            child,
            stop,
            stdout_task,
            stderr_task,
            self.events.clone(),
            Arc::clone(&self.active),
            self.grace_period,
            request.output_path,
        ));

        Ok(())
    }

    /// Requests graceful termination of the active session and returns
    /// immediately; the outcome arrives on the event channel whenever the
    /// child actually exits.
    pub fn stop(&self) -> Result<()> {
        let active = self.active.lock().expect("recorder state poisoned");
        match active.as_ref() {
            Some(session) => {
                debug!("stop requested for recorder pid {:?}", session.pid);
                session.stop.cancel();
                Ok(())
            }
            None => bail!("no recording session is active"),
        }
    }
}

/// Streams lines from a child pipe as `Output` events. For stderr the last
/// few lines are also kept so a failure message can quote them.
fn forward_lines<R>(
    stream: R,
    events: mpsc::UnboundedSender<SessionEvent>,
    keep_tail: bool,
) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = Vec::new();
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if keep_tail {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line.clone());
            }
            let _ = events.send(SessionEvent::Output(line));
        }
        tail
    })
}

#[allow(clippy::too_many_arguments)]
async fn watch_session(
    mut child: Child,
    stop: CancellationToken,
    stdout_task: Option<JoinHandle<Vec<String>>>,
    stderr_task: Option<JoinHandle<Vec<String>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    active: Arc<Mutex<Option<ActiveSession>>>,
    grace_period: Duration,
    output_path: PathBuf,
) {
    let natural_exit = tokio::select! {
        status = child.wait() => Some(status),
        _ = stop.cancelled() => None,
    };
    let status = match natural_exit {
        Some(status) => status,
        None => terminate(&mut child, grace_period).await,
    };

    // both pipes must be drained before the terminal event so Output events
    // always precede it
    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    let mut stderr_tail = Vec::new();
    if let Some(task) = stderr_task {
        if let Ok(tail) = task.await {
            stderr_tail = tail;
        }
    }

    // back to Idle before the terminal event, so a listener may restart
    // from its event handler
    let started_at = active
        .lock()
        .expect("recorder state poisoned")
        .take()
        .map(|session| session.started_at);

    let event = match status {
        Ok(status) if status.success() => {
            let elapsed = started_at
                .map(|t| (Utc::now() - t).num_seconds())
                .unwrap_or_default();
            info!(
                "recording finished after {}s, output at {}",
                elapsed,
                output_path.display()
            );
            SessionEvent::Finished(output_path)
        }
        Ok(status) => SessionEvent::Failed(failure_message(status, &stderr_tail)),
        Err(e) => SessionEvent::Failed(format!("failed to wait for the recorder: {e}")),
    };
    let _ = events.send(event);
}

/// SIGTERM lets the recorder finalize its output file; only when the grace
/// period elapses without an exit is the child killed outright.
async fn terminate(child: &mut Child, grace_period: Duration) -> std::io::Result<ExitStatus> {
    if let Some(pid) = child.id() {
        debug!("sending SIGTERM to recorder pid {pid}");
        if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!("failed to signal recorder pid {pid}: {e}");
        }
    }

    tokio::select! {
        status = child.wait() => status,
        _ = tokio::time::sleep(grace_period) => {
            warn!("recorder ignored SIGTERM for {grace_period:?}, killing it");
            let _ = child.start_kill();
            child.wait().await
        }
    }
}

fn failure_message(status: ExitStatus, stderr_tail: &[String]) -> String {
    let mut message = match status.code() {
        Some(code) => format!("recorder exited with status {code}"),
        None => "recorder was terminated by a signal".to_string(),
    };
    if !stderr_tail.is_empty() {
        message.push_str(": ");
        message.push_str(&stderr_tail.join("\n"));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfcap_common::types::record::{PerfOptions, UnwindMethod};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn recorder(path: impl Into<PathBuf>) -> (PerfRecorder, mpsc::UnboundedReceiver<SessionEvent>) {
        PerfRecorder::new(path.into(), Duration::from_millis(200))
    }

    fn launch_request(dir: &TempDir) -> RecordRequest {
        RecordRequest {
            options: PerfOptions {
                unwind: UnwindMethod::None,
                event_type: None,
            },
            output_path: dir.path().join("out.data"),
            target: RecordTarget::Launch {
                program: PathBuf::from("/bin/true"),
                args: vec![],
                working_dir: None,
            },
        }
    }

    fn stub_recorder(dir: &TempDir, script: &str) -> PathBuf {
        let path = dir.path().join("recorder.sh");
        std::fs::write(&path, script).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    async fn wait_for_terminal(
        rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    ) -> (Vec<SessionEvent>, SessionEvent) {
        let mut outputs = Vec::new();
        loop {
            let event = timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("session event before timeout")
                .expect("event channel open");
            if event.is_terminal() {
                return (outputs, event);
            }
            outputs.push(event);
        }
    }

    #[tokio::test]
    async fn clean_exit_reports_finished() {
        let dir = TempDir::new().unwrap();
        let (recorder, mut rx) = recorder("/bin/true");
        let request = launch_request(&dir);
        let expected_output = request.output_path.clone();

        recorder.start(request).unwrap();
        let (_, terminal) = wait_for_terminal(&mut rx).await;

        assert_eq!(terminal, SessionEvent::Finished(expected_output));
        assert!(!recorder.is_recording());
    }

    #[tokio::test]
    async fn missing_recorder_reports_failed() {
        let dir = TempDir::new().unwrap();
        let (recorder, mut rx) = recorder("/nonexistent/recorder-binary");

        recorder.start(launch_request(&dir)).unwrap();
        let (_, terminal) = wait_for_terminal(&mut rx).await;

        match terminal {
            SessionEvent::Failed(message) => {
                assert!(!message.is_empty());
                assert!(message.contains("failed to launch"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!recorder.is_recording());
    }

    #[tokio::test]
    async fn nonzero_exit_reports_failed() {
        let dir = TempDir::new().unwrap();
        let (recorder, mut rx) = recorder("/bin/false");

        recorder.start(launch_request(&dir)).unwrap();
        let (_, terminal) = wait_for_terminal(&mut rx).await;

        match terminal {
            SessionEvent::Failed(message) => assert!(message.contains("exited with status")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn output_events_precede_the_terminal_event() {
        let dir = TempDir::new().unwrap();
        let (recorder, mut rx) = recorder("/bin/echo");

        recorder.start(launch_request(&dir)).unwrap();
        let (outputs, terminal) = wait_for_terminal(&mut rx).await;

        assert!(!outputs.is_empty());
        assert!(matches!(outputs[0], SessionEvent::Output(_)));
        assert!(matches!(terminal, SessionEvent::Finished(_)));
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_recording() {
        let dir = TempDir::new().unwrap();
        let script = stub_recorder(&dir, "#!/bin/sh\nsleep 30\n");
        let (recorder, mut rx) = recorder(&script);

        recorder.start(launch_request(&dir)).unwrap();
        assert!(recorder.is_recording());

        // rejected for a launch target and for an attach target alike
        assert!(recorder.start(launch_request(&dir)).is_err());
        let attach = RecordRequest {
            target: RecordTarget::Attach { pids: vec![1] },
            ..launch_request(&dir)
        };
        assert!(recorder.start(attach).is_err());

        recorder.stop().unwrap();
        let (_, terminal) = wait_for_terminal(&mut rx).await;
        assert!(matches!(terminal, SessionEvent::Failed(_)));
        assert!(!recorder.is_recording());
    }

    #[tokio::test]
    async fn stop_lets_a_cooperative_recorder_finish() {
        let dir = TempDir::new().unwrap();
        let script = stub_recorder(&dir, "#!/bin/sh\ntrap 'exit 0' TERM\nsleep 30 &\nwait $!\n");
        let (recorder, mut rx) = recorder(&script);
        let request = launch_request(&dir);
        let expected_output = request.output_path.clone();

        recorder.start(request).unwrap();
        // give the script a moment to install its trap
        tokio::time::sleep(Duration::from_millis(200)).await;
        recorder.stop().unwrap();

        let (_, terminal) = wait_for_terminal(&mut rx).await;
        assert_eq!(terminal, SessionEvent::Finished(expected_output));
    }

    #[tokio::test]
    async fn stop_escalates_to_kill_when_sigterm_is_ignored() {
        let dir = TempDir::new().unwrap();
        let script = stub_recorder(&dir, "#!/bin/sh\ntrap '' TERM\nsleep 30 &\nwait $!\n");
        let (recorder, mut rx) = recorder(&script);

        recorder.start(launch_request(&dir)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        recorder.stop().unwrap();

        let (_, terminal) = wait_for_terminal(&mut rx).await;
        match terminal {
            SessionEvent::Failed(message) => assert!(message.contains("signal")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_without_a_session_is_an_error() {
        let (recorder, _rx) = recorder("/bin/true");
        assert!(recorder.stop().is_err());
    }

    #[tokio::test]
    async fn stderr_tail_is_quoted_in_the_failure() {
        let dir = TempDir::new().unwrap();
        let script = stub_recorder(&dir, "#!/bin/sh\necho 'event cycles not supported' >&2\nexit 1\n");
        let (recorder, mut rx) = recorder(&script);

        recorder.start(launch_request(&dir)).unwrap();
        let (outputs, terminal) = wait_for_terminal(&mut rx).await;

        assert!(outputs
            .iter()
            .any(|e| matches!(e, SessionEvent::Output(line) if line.contains("not supported"))));
        match terminal {
            SessionEvent::Failed(message) => assert!(message.contains("not supported")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
