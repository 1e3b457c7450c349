//! Job supervisor.
//!
//! A single actor task owns every registry (job table, tab table, session
//! command channels) so all mutation is single-writer: control commands,
//! worker events, and setup outcomes funnel through one inbound channel and
//! are applied in arrival order. Setup work (opening a tab, waiting for it to
//! load, settling) happens in spawned tasks that report back through the same
//! funnel, so a cancel that lands mid-setup is observed before the
//! registration it races with.
//!
//! At most one job runs per [`JobKey`]. A second start for a live key is
//! rejected with an error event and leaves the running job untouched.

use crate::config::Timing;
use crate::host::TabHost;
use crate::protocol::{now_ms, ControlCommand, Event, JobKey, TabId, WorkerCommand};
use crate::session;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobPhase {
    /// Tab setup is in flight; no worker session exists yet.
    Pending,
    /// A worker session owns the tab and is scraping.
    Running { tab: TabId },
}

/// Messages funneled into the supervisor actor.
enum Inbound {
    AttachControl(mpsc::UnboundedSender<Event>),
    Control(ControlCommand),
    Registered {
        key: JobKey,
        tab: TabId,
        commands: mpsc::UnboundedSender<WorkerCommand>,
    },
    SetupFailed {
        key: JobKey,
        error: String,
    },
    Worker {
        tab: TabId,
        event: Event,
    },
    SessionEnded {
        tab: TabId,
    },
    Snapshot(oneshot::Sender<RegistrySnapshot>),
    Shutdown,
}

/// Point-in-time view of the registries, for inspection and tests.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub jobs: Vec<JobKey>,
    pub tabs: Vec<TabId>,
    pub sessions: Vec<TabId>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.tabs.is_empty() && self.sessions.is_empty()
    }
}

/// Cloneable handle to a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl SupervisorHandle {
    /// Registers the control surface's event sink. The supervisor answers
    /// with a `connected` event.
    pub fn attach_control(&self, sink: mpsc::UnboundedSender<Event>) {
        let _ = self.tx.send(Inbound::AttachControl(sink));
    }

    /// Submits a control command.
    pub fn command(&self, command: ControlCommand) {
        let _ = self.tx.send(Inbound::Control(command));
    }

    /// Convenience for starting a job.
    pub fn start(&self, key: &JobKey) {
        self.command(ControlCommand::Start {
            keyword: key.keyword.clone(),
            site: key.site,
            timestamp: now_ms(),
        });
    }

    /// Convenience for cancelling a job.
    pub fn cancel(&self, key: &JobKey) {
        self.command(ControlCommand::Cancel {
            keyword: key.keyword.clone(),
            site: key.site,
        });
    }

    pub async fn snapshot(&self) -> Result<RegistrySnapshot> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Inbound::Snapshot(tx))
            .ok()
            .context("supervisor is gone")?;
        rx.await.context("supervisor is gone")
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Inbound::Shutdown);
    }
}

pub struct Supervisor<H: TabHost> {
    host: Arc<H>,
    timing: Timing,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    control: Option<mpsc::UnboundedSender<Event>>,
    jobs: HashMap<JobKey, JobPhase>,
    tabs: HashMap<TabId, JobKey>,
    sessions: HashMap<TabId, mpsc::UnboundedSender<WorkerCommand>>,
}

impl<H: TabHost> Supervisor<H> {
    /// Starts the supervisor actor and returns its handle.
    pub fn spawn(host: Arc<H>, timing: Timing) -> SupervisorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Supervisor {
            host,
            timing,
            inbound: rx,
            inbound_tx: tx.clone(),
            control: None,
            jobs: HashMap::new(),
            tabs: HashMap::new(),
            sessions: HashMap::new(),
        };
        tokio::spawn(supervisor.run());
        SupervisorHandle { tx }
    }

    async fn run(mut self) {
        while let Some(message) = self.inbound.recv().await {
            match message {
                Inbound::AttachControl(sink) => {
                    self.control = Some(sink);
                    self.relay(Event::connected());
                }
                Inbound::Control(command) => self.handle_control(command),
                Inbound::Registered { key, tab, commands } => {
                    self.handle_registered(key, tab, commands)
                }
                Inbound::SetupFailed { key, error } => {
                    if self.jobs.remove(&key).is_some() {
                        warn!("Setup for {} failed: {}", key, error);
                        self.relay(Event::error(&key, error));
                    }
                }
                Inbound::Worker { tab, event } => self.handle_worker(tab, event),
                Inbound::SessionEnded { tab } => {
                    // A worker going away without a terminal event gets
                    // registry cleanup only, no synthesized event
                    if self.tabs.contains_key(&tab) {
                        warn!("Session on tab {} ended without a terminal event", tab);
                        self.teardown(tab);
                    }
                }
                Inbound::Snapshot(reply) => {
                    let _ = reply.send(RegistrySnapshot {
                        jobs: self.jobs.keys().cloned().collect(),
                        tabs: self.tabs.keys().copied().collect(),
                        sessions: self.sessions.keys().copied().collect(),
                    });
                }
                Inbound::Shutdown => break,
            }
        }

        for tab in self.tabs.keys().copied().collect::<Vec<_>>() {
            self.teardown(tab);
        }
    }

    fn handle_control(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Start { keyword, site, .. } => {
                let key = JobKey::new(keyword, site);
                if self.jobs.contains_key(&key) {
                    debug!("Rejecting duplicate start for {}", key);
                    self.relay(Event::error(
                        &key,
                        format!("scrape already in progress for {}", key),
                    ));
                    return;
                }
                info!("Starting job {}", key);
                self.jobs.insert(key.clone(), JobPhase::Pending);
                self.spawn_setup(key);
            }
            ControlCommand::Cancel { keyword, site } => {
                let key = JobKey::new(keyword, site);
                match self.jobs.get(&key).copied() {
                    Some(JobPhase::Running { tab }) => {
                        info!("Cancelling running job {}", key);
                        if let Some(commands) = self.sessions.get(&tab) {
                            let _ = commands.send(WorkerCommand::CancelScraping);
                        }
                        // The session answers with a cancelled event, which
                        // tears the registration down on relay
                    }
                    Some(JobPhase::Pending) => {
                        // Setup is in flight; drop the registration so the
                        // eventual tab is closed on arrival
                        info!("Cancelling pending job {}", key);
                        self.jobs.remove(&key);
                        self.relay(Event::cancelled(&key));
                    }
                    None => {
                        debug!("Cancel for unknown job {}, ignoring", key);
                    }
                }
            }
            ControlCommand::Ping => self.relay(Event::pong()),
        }
    }

    fn handle_registered(
        &mut self,
        key: JobKey,
        tab: TabId,
        commands: mpsc::UnboundedSender<WorkerCommand>,
    ) {
        if self.jobs.get(&key) != Some(&JobPhase::Pending) {
            // Cancelled while setup was in flight: closing the orphan tab
            // drops the session's command channel and lets it exit
            debug!("Closing orphan tab {} for withdrawn job {}", tab, key);
            let host = self.host.clone();
            tokio::spawn(async move { host.close_tab(tab).await });
            return;
        }

        debug!("Job {} registered on tab {}", key, tab);
        let _ = commands.send(WorkerCommand::StartScraping {
            keyword: key.keyword.clone(),
            site: key.site,
            url: key.site.search_url(&key.keyword),
            timestamp: now_ms(),
        });
        self.jobs.insert(key.clone(), JobPhase::Running { tab });
        self.tabs.insert(tab, key);
        self.sessions.insert(tab, commands);
    }

    fn handle_worker(&mut self, tab: TabId, event: Event) {
        if !self.tabs.contains_key(&tab) {
            // Torn-down tabs get no second terminal event
            debug!("Dropping event from unregistered tab {}", tab);
            return;
        }
        let terminal = event.is_terminal();
        self.relay(event.with_tab(tab));
        if terminal {
            self.teardown(tab);
        }
    }

    /// Spawns tab setup off-actor; the outcome returns through the funnel.
    fn spawn_setup(&self, key: JobKey) {
        let host = self.host.clone();
        let timing = self.timing;
        let inbound = self.inbound_tx.clone();

        tokio::spawn(async move {
            let url = key.site.search_url(&key.keyword);
            match host.open_tab(&url).await {
                Ok((tab, page)) => {
                    // Bound the load wait and proceed regardless; some pages
                    // never report completion
                    if tokio::time::timeout(timing.load_timeout, host.wait_for_load(tab))
                        .await
                        .is_err()
                    {
                        debug!("Tab {} load wait timed out, proceeding", tab);
                    }
                    tokio::time::sleep(timing.settle_delay).await;

                    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
                    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel();
                    tokio::spawn(session::run(page, cmd_rx, evt_tx, timing));

                    let forward = inbound.clone();
                    tokio::spawn(async move {
                        while let Some(event) = evt_rx.recv().await {
                            if forward.send(Inbound::Worker { tab, event }).is_err() {
                                return;
                            }
                        }
                        let _ = forward.send(Inbound::SessionEnded { tab });
                    });

                    let _ = inbound.send(Inbound::Registered { key, tab, commands: cmd_tx });
                }
                Err(e) => {
                    let _ = inbound.send(Inbound::SetupFailed { key, error: format!("{:#}", e) });
                }
            }
        });
    }

    fn teardown(&mut self, tab: TabId) {
        if let Some(key) = self.tabs.remove(&tab) {
            self.jobs.remove(&key);
        }
        self.sessions.remove(&tab);
        let host = self.host.clone();
        tokio::spawn(async move { host.close_tab(tab).await });
    }

    fn relay(&mut self, event: Event) {
        if let Some(sink) = &self.control {
            if sink.send(event).is_err() {
                debug!("Control surface went away");
                self.control = None;
            }
        }
    }
}
