//! Supervisor - starts, monitors and tears down the processes of a resolved graph

use crate::graph::ResolvedGraph;
use crate::runtime::command::CommandBuilder;
use crate::runtime::plan::LaunchPlan;
use crate::runtime::process::{
    send_sigterm, StatusTable, StopRequest, UnitError, UnitEvent, UnitProcess, UnitState,
    UnitStatus,
};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// What `wait` does when a unit fails at runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and keep the other units running
    #[default]
    Report,
    /// Return from `wait` so the caller shuts everything down
    Shutdown,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "report" => Ok(FailurePolicy::Report),
            "shutdown" => Ok(FailurePolicy::Shutdown),
            other => Err(format!(
                "Invalid failure policy '{}'. Expected 'report' or 'shutdown'",
                other
            )),
        }
    }
}

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Project root; `target/release` under it is searched for executables
    pub project_root: PathBuf,
    /// Time between SIGTERM and SIGKILL on shutdown
    pub grace_period: Duration,
    /// Install prefixes searched for package executables
    pub package_prefixes: Vec<PathBuf>,
    /// Directory for `log` and `both` output
    pub log_dir: PathBuf,
    /// Respawn delay for units that do not set their own
    pub respawn_delay: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            grace_period: Duration::from_secs(5),
            package_prefixes: ament_prefixes(),
            log_dir: default_log_dir(),
            respawn_delay: Duration::from_secs(1),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Package install prefixes from `AMENT_PREFIX_PATH`
pub fn ament_prefixes() -> Vec<PathBuf> {
    std::env::var_os("AMENT_PREFIX_PATH")
        .map(|paths| std::env::split_paths(&paths).collect())
        .unwrap_or_default()
}

/// `~/.graph_launch/log`, or the temp dir when there is no home
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".graph_launch").join("log"))
        .unwrap_or_else(|| std::env::temp_dir().join("graph_launch").join("log"))
}

/// Result of `start`
#[derive(Debug, Clone, Default)]
pub struct StartReport {
    /// Units that have a monitor task, in launch order
    pub launched: Vec<String>,
    /// Units that failed to spawn
    pub failures: Vec<UnitError>,
}

impl StartReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Why `wait` returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    ShutdownRequested,
    /// Every unit reached a terminal state with no respawn pending
    AllTerminated,
    /// A unit failed while the failure policy is `shutdown`
    UnitFailed(String),
    /// A unit marked `required` terminated
    RequiredExited(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Supervisor has already been started")]
    AlreadyStarted,

    #[error("Unit '{0}' appears more than once")]
    DuplicateUnit(String),
}

struct UnitHandle {
    stop_tx: Option<oneshot::Sender<StopRequest>>,
    task: Option<JoinHandle<()>>,
}

/// Owns the process table of one launch
pub struct Supervisor {
    config: SupervisorConfig,
    commands: CommandBuilder,
    units: IndexMap<String, UnitHandle>,
    required: HashSet<String>,
    status_tx: Arc<watch::Sender<StatusTable>>,
    status_rx: watch::Receiver<StatusTable>,
    event_tx: mpsc::UnboundedSender<(String, UnitEvent)>,
    event_rx: mpsc::UnboundedReceiver<(String, UnitEvent)>,
    started: bool,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let commands = CommandBuilder::new(&config.project_root, config.package_prefixes.clone());
        let (status_tx, status_rx) = watch::channel(StatusTable::new());
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            config,
            commands,
            units: IndexMap::new(),
            required: HashSet::new(),
            status_tx: Arc::new(status_tx),
            status_rx,
            event_tx,
            event_rx,
            started: false,
        }
    }

    /// Launch plan for a dry run
    pub fn plan(&self, graph: &ResolvedGraph) -> LaunchPlan {
        LaunchPlan::build(graph, &self.commands)
    }

    /// Spawn every unit in declaration order without waiting for readiness
    pub async fn start(&mut self, graph: &ResolvedGraph) -> Result<StartReport, SupervisorError> {
        if self.started {
            return Err(SupervisorError::AlreadyStarted);
        }

        let mut seen = HashSet::new();
        if let Some(dup) = graph.units().iter().map(|u| u.key()).find(|k| !seen.insert(k.clone())) {
            return Err(SupervisorError::DuplicateUnit(dup));
        }
        self.started = true;

        self.status_tx.send_modify(|table| {
            for unit in graph.launch_order() {
                table.insert(unit.key(), UnitStatus::default());
            }
        });

        log::info!("Launching {} units...", graph.len());

        let mut report = StartReport::default();
        for unit in graph.launch_order() {
            let name = unit.key();
            if unit.spec.is_required() {
                self.required.insert(name.clone());
            }

            let process = UnitProcess::new(
                name.clone(),
                self.commands.build(unit),
                &unit.spec,
                self.config.respawn_delay,
                self.config.log_dir.clone(),
                Arc::clone(&self.status_tx),
                self.event_tx.clone(),
            );

            // Delayed units spawn from their monitor task
            let first = if process.has_startup_delay() {
                None
            } else {
                match process.spawn() {
                    Ok(child) => Some(child),
                    Err(e) => {
                        report.failures.push(e);
                        self.units.insert(
                            name,
                            UnitHandle {
                                stop_tx: None,
                                task: None,
                            },
                        );
                        continue;
                    }
                }
            };

            let (stop_tx, stop_rx) = oneshot::channel();
            let task = tokio::spawn(process.supervise(first, stop_rx));
            self.units.insert(
                name.clone(),
                UnitHandle {
                    stop_tx: Some(stop_tx),
                    task: Some(task),
                },
            );
            report.launched.push(name);
        }

        if report.is_success() {
            log::info!("All units launched");
        } else {
            log::warn!(
                "{} of {} units failed to start",
                report.failures.len(),
                graph.len()
            );
        }
        Ok(report)
    }

    /// Current state of every unit, in launch order
    pub fn status(&self) -> IndexMap<String, UnitState> {
        self.status_rx
            .borrow()
            .iter()
            .map(|(name, status)| (name.clone(), status.state.clone()))
            .collect()
    }

    /// Pid, restart count and uptime next to the state
    pub fn details(&self) -> StatusTable {
        self.status_rx.borrow().clone()
    }

    pub fn state(&self, unit: &str) -> Option<UnitState> {
        self.status_rx.borrow().get(unit).map(|s| s.state.clone())
    }

    /// Receiver that observes every status change
    pub fn subscribe(&self) -> watch::Receiver<StatusTable> {
        self.status_tx.subscribe()
    }

    /// Drain unit events until shutdown is requested or the launch settles.
    /// A dropped shutdown sender only disables that wakeup.
    pub async fn wait(&mut self, mut shutdown_rx: watch::Receiver<()>) -> WaitOutcome {
        let mut status_rx = self.status_tx.subscribe();
        let mut shutdown_open = true;
        loop {
            let outcome = self.outcome(&status_rx.borrow_and_update());
            if let Some(outcome) = outcome {
                return outcome;
            }

            tokio::select! {
                changed = shutdown_rx.changed(), if shutdown_open => match changed {
                    Ok(()) => {
                        log::info!("Shutdown signal received");
                        return WaitOutcome::ShutdownRequested;
                    }
                    Err(_) => {
                        log::debug!("Shutdown sender dropped, waiting for units only");
                        shutdown_open = false;
                    }
                },
                Some((name, event)) = self.event_rx.recv() => log_event(&name, event),
                _ = status_rx.changed() => {}
            }
        }
    }

    fn outcome(&self, table: &StatusTable) -> Option<WaitOutcome> {
        if self.config.failure_policy == FailurePolicy::Shutdown {
            let failed = table
                .iter()
                .find(|(_, s)| s.is_settled() && matches!(s.state, UnitState::Failed(_)));
            if let Some((name, _)) = failed {
                log::error!("Unit '{}' failed, shutting down", name);
                return Some(WaitOutcome::UnitFailed(name.clone()));
            }
        }

        let required = table
            .iter()
            .find(|(name, s)| self.required.contains(*name) && s.is_settled());
        if let Some((name, _)) = required {
            log::warn!("Required unit '{}' terminated, shutting down", name);
            return Some(WaitOutcome::RequiredExited(name.clone()));
        }

        if table.values().all(UnitStatus::is_settled) {
            log::info!("All units have stopped");
            return Some(WaitOutcome::AllTerminated);
        }
        None
    }

    /// Units that still have a monitor, in the order shutdown signals them
    /// (reverse launch order)
    pub fn stop_order(&self) -> Vec<String> {
        self.units
            .iter()
            .rev()
            .filter(|(_, handle)| handle.stop_tx.is_some() || handle.task.is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// SIGTERM every live unit in reverse launch order, wait out the grace
    /// period, SIGKILL what is left. Returns once every unit is terminal.
    pub async fn shutdown(&mut self) {
        let live = self.stop_order();

        if live.is_empty() {
            return;
        }

        log::info!("Shutting down {} units...", live.len());
        let deadline = tokio::time::Instant::now() + self.config.grace_period;
        let table = self.details();

        // Request before signal: the monitor must see the stop before the exit
        for name in &live {
            let pid = table
                .get(name)
                .filter(|s| s.state.is_live())
                .and_then(|s| s.pid);

            if let Some(stop_tx) = self.units.get_mut(name).and_then(|h| h.stop_tx.take()) {
                let request = StopRequest {
                    deadline,
                    signalled_pid: pid,
                };
                if stop_tx.send(request).is_ok() {
                    if let Some(pid) = pid {
                        send_sigterm(name, pid);
                    }
                }
            }
        }

        for name in &live {
            if let Some(task) = self.units.get_mut(name).and_then(|h| h.task.take()) {
                if let Err(e) = task.await {
                    log::error!("[{}] Monitor task failed: {}", name, e);
                }
            }
        }

        self.status_tx.send_modify(|table| {
            for status in table.values_mut() {
                if !status.state.is_terminal() {
                    status.state = UnitState::Stopped(None);
                    status.pid = None;
                }
                status.respawning = false;
            }
        });

        // Flush what the monitors emitted while stopping
        while let Ok((name, event)) = self.event_rx.try_recv() {
            log_event(&name, event);
        }

        log::info!("All units shut down");
    }
}

fn log_event(name: &str, event: UnitEvent) {
    match event {
        UnitEvent::Started { pid } => {
            log::info!("[{}] Process started with PID: {}", name, pid);
        }
        UnitEvent::Restarting { attempt } => {
            log::debug!("[{}] Restart #{}", name, attempt);
        }
        UnitEvent::Exited { code } => {
            log::debug!("[{}] Exited with code {}", name, code);
        }
        UnitEvent::Failed(error) => {
            log::debug!("[{}] {}", name, error);
        }
        UnitEvent::Stopped { code } => {
            log::debug!("[{}] Stopped ({:?})", name, code);
        }
    }
}
