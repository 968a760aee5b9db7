//! Per-unit process lifecycle: spawn, output routing, exit tracking, stop

use crate::config::{LaunchSpec, OutputMode, RestartPolicy};
use crate::runtime::command::UnitCommand;
use indexmap::IndexMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};

/// Lifecycle state of a managed unit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UnitState {
    /// Registered, not yet spawned
    #[default]
    Pending,
    /// Spawn in progress
    Starting,
    /// Process is running
    Running,
    /// Process exited on its own with status 0
    Exited(i32),
    /// Spawn failed or the process terminated abnormally
    Failed(UnitError),
    /// Terminated on request, with its exit code if it had one
    Stopped(Option<i32>),
}

impl UnitState {
    /// Starting or running
    pub fn is_live(&self) -> bool {
        matches!(self, UnitState::Starting | UnitState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitState::Exited(_) | UnitState::Failed(_) | UnitState::Stopped(_)
        )
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitState::Pending => f.write_str("pending"),
            UnitState::Starting => f.write_str("starting"),
            UnitState::Running => f.write_str("running"),
            UnitState::Exited(code) => write!(f, "exited ({})", code),
            UnitState::Failed(err) => write!(f, "failed: {}", err),
            UnitState::Stopped(Some(code)) => write!(f, "stopped ({})", code),
            UnitState::Stopped(None) => f.write_str("stopped"),
        }
    }
}

/// Runtime errors isolated to a single unit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    #[error("Failed to spawn '{unit}': {reason}")]
    SpawnFailure { unit: String, reason: String },

    #[error("'{unit}' terminated unexpectedly ({})", describe_exit(.code, .signal))]
    UnexpectedExit {
        unit: String,
        code: Option<i32>,
        signal: Option<i32>,
    },
}

fn describe_exit(code: &Option<i32>, signal: &Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("exit code {}", code),
        (None, Some(signal)) => format!("signal {}", signal),
        (None, None) => "unknown status".to_string(),
    }
}

/// Observable status of one unit
#[derive(Debug, Clone, Default)]
pub struct UnitStatus {
    pub state: UnitState,
    pub pid: Option<u32>,
    pub restarts: u32,
    pub started_at: Option<Instant>,
    /// Exited or failed, with a respawn scheduled
    pub respawning: bool,
}

impl UnitStatus {
    /// Terminal with no respawn pending
    pub fn is_settled(&self) -> bool {
        self.state.is_terminal() && !self.respawning
    }

    /// Time since the current process was spawned
    pub fn uptime(&self) -> Option<Duration> {
        match self.state {
            UnitState::Running => self.started_at.map(|t| t.elapsed()),
            _ => None,
        }
    }
}

/// Unit name to status, in launch order
pub type StatusTable = IndexMap<String, UnitStatus>;

/// Lifecycle event emitted by a unit's monitor; output lines are logged
/// directly by the reader tasks
#[derive(Debug, Clone, PartialEq)]
pub enum UnitEvent {
    Started { pid: u32 },
    Exited { code: i32 },
    Failed(UnitError),
    Restarting { attempt: u32 },
    Stopped { code: Option<i32> },
}

/// Sent by the supervisor to end a unit's monitor
#[derive(Debug, Clone, Copy)]
pub(crate) struct StopRequest {
    /// Kill the process if it is still alive at this point
    pub deadline: tokio::time::Instant,
    /// Pid the supervisor signals itself; the monitor does not signal it again
    pub signalled_pid: Option<u32>,
}

/// Everything a monitor task needs; owned by that task once started
pub(crate) struct UnitProcess {
    name: String,
    command: UnitCommand,
    output: OutputMode,
    restart: RestartPolicy,
    respawn_delay: Duration,
    startup_delay: Option<Duration>,
    log_dir: PathBuf,
    status: Arc<watch::Sender<StatusTable>>,
    events: mpsc::UnboundedSender<(String, UnitEvent)>,
}

enum Wakeup {
    Exited(std::io::Result<ExitStatus>),
    Stop(Option<StopRequest>),
}

impl UnitProcess {
    pub(crate) fn new(
        name: String,
        command: UnitCommand,
        spec: &LaunchSpec,
        respawn_delay: Duration,
        log_dir: PathBuf,
        status: Arc<watch::Sender<StatusTable>>,
        events: mpsc::UnboundedSender<(String, UnitEvent)>,
    ) -> Self {
        Self {
            name,
            command,
            output: spec.output(),
            restart: spec.restart(),
            respawn_delay: spec
                .respawn_delay_ms()
                .map(Duration::from_millis)
                .unwrap_or(respawn_delay),
            startup_delay: spec.startup_delay_ms().map(Duration::from_millis),
            log_dir,
            status,
            events,
        }
    }

    pub(crate) fn has_startup_delay(&self) -> bool {
        self.startup_delay.is_some()
    }

    fn update(&self, f: impl FnOnce(&mut UnitStatus)) {
        self.status.send_modify(|table| {
            if let Some(status) = table.get_mut(&self.name) {
                f(status);
            }
        });
    }

    fn emit(&self, event: UnitEvent) {
        let _ = self.events.send((self.name.clone(), event));
    }

    fn fail(&self, error: UnitError, respawning: bool) {
        log::error!("[{}] {}", self.name, error);
        self.update(|s| {
            s.state = UnitState::Failed(error.clone());
            s.pid = None;
            s.respawning = respawning;
        });
        self.emit(UnitEvent::Failed(error));
    }

    /// Spawn the process; on failure the unit is marked failed
    pub(crate) fn spawn(&self) -> Result<Child, UnitError> {
        self.update(|s| {
            s.state = UnitState::Starting;
            s.pid = None;
            s.respawning = false;
        });
        log::info!("[{}] Starting: {}", self.name, self.command.command_line());

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .envs(&self.command.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = &self.command.working_dir {
            cmd.current_dir(dir);
        }

        let spawned = self
            .route_output(&mut cmd)
            .and_then(|tee| cmd.spawn().map(|child| (child, tee)));

        match spawned {
            Ok((mut child, tee)) => {
                let pid = child.id().unwrap_or(0);
                self.attach_readers(&mut child, tee);
                self.update(|s| {
                    s.state = UnitState::Running;
                    s.pid = Some(pid);
                    s.started_at = Some(Instant::now());
                });
                self.emit(UnitEvent::Started { pid });
                Ok(child)
            }
            Err(e) => {
                let error = UnitError::SpawnFailure {
                    unit: self.name.clone(),
                    reason: e.to_string(),
                };
                self.fail(error.clone(), false);
                Err(error)
            }
        }
    }

    /// Wire stdout/stderr per output mode; returns the log file to tee into
    fn route_output(&self, cmd: &mut Command) -> std::io::Result<Option<File>> {
        match self.output {
            OutputMode::Screen => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
                Ok(None)
            }
            OutputMode::Log => {
                let file = self.open_log()?;
                cmd.stdout(Stdio::from(file.try_clone()?))
                    .stderr(Stdio::from(file));
                Ok(None)
            }
            OutputMode::Both => {
                let file = self.open_log()?;
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
                Ok(Some(file))
            }
        }
    }

    fn open_log(&self) -> std::io::Result<File> {
        std::fs::create_dir_all(&self.log_dir)?;
        let path = self.log_dir.join(log_file_name(&self.name));
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn attach_readers(&self, child: &mut Child, tee: Option<File>) {
        let tee_for = |tee: &Option<File>| {
            tee.as_ref().and_then(|f| match f.try_clone() {
                Ok(clone) => Some(tokio::fs::File::from_std(clone)),
                Err(e) => {
                    log::warn!("[{}] Cannot duplicate log file handle: {}", self.name, e);
                    None
                }
            })
        };

        if let Some(stdout) = child.stdout.take() {
            self.forward_lines(stdout, false, tee_for(&tee));
        }
        if let Some(stderr) = child.stderr.take() {
            self.forward_lines(stderr, true, tee_for(&tee));
        }
    }

    /// Log every line of `stream` as `[unit] line` and tee it to the log
    /// file. Reads until EOF regardless of encoding so the writer never
    /// sees a closed pipe.
    fn forward_lines<R>(&self, stream: R, is_stderr: bool, mut tee: Option<tokio::fs::File>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let name = self.name.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stream);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::warn!("[{}] Failed to read output: {}", name, e);
                        break;
                    }
                }

                if let Some(file) = tee.as_mut() {
                    let written = async {
                        file.write_all(&buf).await?;
                        if !buf.ends_with(b"\n") {
                            file.write_all(b"\n").await?;
                        }
                        file.flush().await
                    };
                    if let Err(e) = written.await {
                        log::warn!("[{}] Failed to write log file: {}", name, e);
                        tee = None;
                    }
                }

                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if is_stderr {
                    log::warn!("[{}] {}", name, line);
                } else {
                    log::info!("[{}] {}", name, line);
                }
            }
        });
    }

    /// Monitor loop. `first` is the already-spawned child, or None when the
    /// spawn is deferred by a startup delay.
    pub(crate) async fn supervise(
        self,
        first: Option<Child>,
        mut stop_rx: oneshot::Receiver<StopRequest>,
    ) {
        let mut child = match first {
            Some(child) => child,
            None => {
                if let Some(delay) = self.startup_delay {
                    log::debug!("[{}] Waiting {}ms before start", self.name, delay.as_millis());
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = &mut stop_rx => {
                            self.update(|s| s.state = UnitState::Stopped(None));
                            self.emit(UnitEvent::Stopped { code: None });
                            return;
                        }
                    }
                }
                match self.spawn() {
                    Ok(child) => child,
                    Err(_) => return,
                }
            }
        };

        let mut attempt = 0u32;
        loop {
            let wakeup = tokio::select! {
                biased;
                request = &mut stop_rx => Wakeup::Stop(request.ok()),
                status = child.wait() => Wakeup::Exited(status),
            };

            match wakeup {
                Wakeup::Stop(request) => {
                    let code = self.terminate(&mut child, request).await;
                    log::info!("[{}] Stopped", self.name);
                    self.update(|s| {
                        s.state = UnitState::Stopped(code);
                        s.pid = None;
                    });
                    self.emit(UnitEvent::Stopped { code });
                    return;
                }
                Wakeup::Exited(status) => {
                    let outcome = self.classify(status);
                    let restart = match self.restart {
                        RestartPolicy::Never => false,
                        RestartPolicy::Always => true,
                        RestartPolicy::OnFailure => outcome.is_err(),
                    };

                    match outcome {
                        Ok(code) => {
                            log::info!("[{}] Process exited with code: {}", self.name, code);
                            self.update(|s| {
                                s.state = UnitState::Exited(code);
                                s.pid = None;
                                s.respawning = restart;
                            });
                            self.emit(UnitEvent::Exited { code });
                        }
                        Err(error) => self.fail(error, restart),
                    }
                    if !restart {
                        return;
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(self.respawn_delay) => {}
                        _ = &mut stop_rx => {
                            // keep the last exit state, just cancel the respawn
                            self.update(|s| s.respawning = false);
                            return;
                        }
                    }

                    attempt += 1;
                    log::warn!("[{}] Respawning (attempt {})", self.name, attempt);
                    self.update(|s| s.restarts = attempt);
                    self.emit(UnitEvent::Restarting { attempt });

                    child = match self.spawn() {
                        Ok(child) => child,
                        Err(_) => return,
                    };
                }
            }
        }
    }

    /// Exit code 0 is a clean exit; anything else is unexpected
    fn classify(&self, status: std::io::Result<ExitStatus>) -> Result<i32, UnitError> {
        match status {
            Ok(status) if status.success() => Ok(0),
            Ok(status) => Err(UnitError::UnexpectedExit {
                unit: self.name.clone(),
                code: status.code(),
                signal: exit_signal(&status),
            }),
            Err(e) => {
                log::error!("[{}] Error waiting for process: {}", self.name, e);
                Err(UnitError::UnexpectedExit {
                    unit: self.name.clone(),
                    code: None,
                    signal: None,
                })
            }
        }
    }

    /// SIGTERM (unless already sent), wait until the deadline, then SIGKILL
    async fn terminate(&self, child: &mut Child, request: Option<StopRequest>) -> Option<i32> {
        let deadline = request
            .map(|r| r.deadline)
            .unwrap_or_else(tokio::time::Instant::now);

        #[cfg(unix)]
        {
            let signalled = request.and_then(|r| r.signalled_pid);
            if let Some(pid) = child.id().filter(|pid| Some(*pid) != signalled) {
                send_sigterm(&self.name, pid);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
        }

        match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status.code(),
            Ok(Err(e)) => {
                log::error!("[{}] Error waiting for process: {}", self.name, e);
                None
            }
            Err(_) => {
                log::warn!(
                    "[{}] Process did not exit gracefully, forcing kill",
                    self.name
                );
                if let Err(e) = child.kill().await {
                    log::error!("[{}] Failed to kill process: {}", self.name, e);
                }
                None
            }
        }
    }
}

/// Ask a process to terminate; false if the signal could not be sent
#[cfg(unix)]
pub(crate) fn send_sigterm(name: &str, pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("[{}] SIGTERM to {} failed: {}", name, pid, e);
            false
        }
    }
}

#[cfg(not(unix))]
pub(crate) fn send_sigterm(_name: &str, _pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// `camera/driver` -> `camera_driver.log`
pub(crate) fn log_file_name(unit: &str) -> String {
    format!("{}.log", unit.replace('/', "_"))
}
