//! Per-tab worker session.
//!
//! One session owns one tab for the lifetime of one job. It accepts worker
//! commands, drives the page walker, and forwards walker progress upward as
//! protocol events. The supervisor stamps the tab id on relay; events leave
//! here untagged.
//!
//! Cancellation contract: on `CancelScraping` the session emits exactly one
//! `cancelled` event immediately, flips the walker's token, and suppresses
//! every later walker-originated event for the job. A completed or failed
//! walk after cancellation produces nothing.

use crate::config::Timing;
use crate::host::PageTab;
use crate::protocol::{Event, JobKey, WorkerCommand};
use crate::walker::{self, CancelToken, WalkOutcome};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Runs one worker session to completion. Returns when the command channel
/// closes, which the supervisor does by tearing the tab down.
pub async fn run<T: PageTab>(
    mut tab: T,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    events: mpsc::UnboundedSender<Event>,
    timing: Timing,
) {
    while let Some(cmd) = commands.recv().await {
        match cmd {
            WorkerCommand::StartScraping { keyword, site, .. } => {
                let key = JobKey::new(keyword, site);
                info!("Session starting job {}", key);
                run_job(&mut tab, &mut commands, &events, key, timing).await;
                // The session outlives the walk and can take another start;
                // in practice the supervisor tears the tab down after the
                // terminal event, which closes the command channel
            }
            WorkerCommand::CancelScraping => {
                // Nothing to cancel yet
                debug!("Cancel received before any job, ignoring");
            }
        }
    }
}

async fn run_job<T: PageTab>(
    tab: &mut T,
    commands: &mut mpsc::UnboundedReceiver<WorkerCommand>,
    events: &mpsc::UnboundedSender<Event>,
    key: JobKey,
    timing: Timing,
) {
    let token = CancelToken::new();
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let mut active = true;
    let mut commands_open = true;

    let walk = walker::walk(tab, key.site, &key.keyword, token.clone(), timing, progress_tx);
    tokio::pin!(walk);

    let outcome = loop {
        tokio::select! {
            biased;
            cmd = commands.recv(), if commands_open => match cmd {
                Some(WorkerCommand::CancelScraping) => {
                    if active {
                        token.cancel();
                        active = false;
                        let _ = events.send(Event::cancelled(&key));
                    }
                }
                Some(WorkerCommand::StartScraping { keyword, site, .. }) => {
                    if active {
                        let other = JobKey::new(keyword, site);
                        let _ = events
                            .send(Event::error(&other, "a scrape is already running in this tab"));
                    }
                }
                None => commands_open = false,
            },
            count = progress_rx.recv() => {
                // The sender lives inside the walk future, so recv() only
                // pends here while the walk is still running
                if let Some(count) = count {
                    if active {
                        let _ = events.send(Event::progress(&key, count));
                    }
                }
            }
            outcome = &mut walk => break outcome,
        }
    };

    // Flush progress buffered ahead of the terminal event
    while let Ok(count) = progress_rx.try_recv() {
        if active {
            let _ = events.send(Event::progress(&key, count));
        }
    }

    match outcome {
        WalkOutcome::Completed(records) if active => {
            let _ = events.send(Event::result(&key, records));
        }
        WalkOutcome::Failed(error) if active => {
            let _ = events.send(Event::error(&key, error));
        }
        _ => {}
    }
}
