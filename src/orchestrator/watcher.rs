//! Reacts to page changes by rescanning for composer fields.
//!
//! Mutation bursts are debounced: a scan fires once no event has arrived for
//! the debounce interval. Navigation skips the debounce. Before each scan
//! the registry drops fields that are no longer in the document.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dom::PageEvent;

use super::{FieldReport, Orchestrator};

/// Default quiet period before a rescan.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Event loop around an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct Watcher {
    orchestrator: Orchestrator,
    debounce: Duration,
}

enum Wake {
    Settled,
    Navigated(String),
    Closed,
}

impl Watcher {
    /// Watcher with the given debounce interval.
    pub fn new(orchestrator: Orchestrator, debounce: Duration) -> Self {
        Self {
            orchestrator,
            debounce,
        }
    }

    /// Scan once, then rescan after every settled burst of page events
    /// until `shutdown` resolves or the page stops emitting events. Returns
    /// every report produced, including those of scans still running at
    /// shutdown.
    pub async fn run_until<F>(self, shutdown: F) -> Vec<FieldReport>
    where
        F: Future<Output = ()>,
    {
        let mut events = self.orchestrator.page().subscribe();
        let mut last_url = self.orchestrator.page().url();
        let mut scans: JoinSet<Vec<FieldReport>> = JoinSet::new();
        let mut reports = Vec::new();

        self.spawn_scan(&mut scans);
        tokio::pin!(shutdown);

        loop {
            let wake = tokio::select! {
                () = &mut shutdown => {
                    info!("watcher shutting down");
                    break;
                }
                wake = self.next_wake(&mut events) => wake,
            };
            while let Some(joined) = scans.try_join_next() {
                collect(&mut reports, joined);
            }
            match wake {
                Wake::Closed => {
                    debug!("page event stream closed");
                    break;
                }
                Wake::Navigated(url) => {
                    info!(%url, "page navigated");
                    last_url = url;
                }
                Wake::Settled => {
                    let url = self.orchestrator.page().url();
                    if url != last_url {
                        info!(%url, "url changed");
                        last_url = url;
                    }
                }
            }
            self.spawn_scan(&mut scans);
        }

        while let Some(joined) = scans.join_next().await {
            collect(&mut reports, joined);
        }
        reports
    }

    fn spawn_scan(&self, scans: &mut JoinSet<Vec<FieldReport>>) {
        let orchestrator = self.orchestrator.clone();
        orchestrator
            .registry()
            .prune_detached(orchestrator.page().as_ref());
        scans.spawn(async move { orchestrator.scan().await });
    }

    /// Wait for the first event, then keep absorbing events until the page
    /// has been quiet for the debounce interval.
    async fn next_wake(&self, events: &mut tokio::sync::broadcast::Receiver<PageEvent>) -> Wake {
        match events.recv().await {
            Ok(PageEvent::Navigated(url)) => return Wake::Navigated(url),
            Ok(PageEvent::Mutated) => {}
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "page events lagged"),
            Err(RecvError::Closed) => return Wake::Closed,
        }

        loop {
            match tokio::time::timeout(self.debounce, events.recv()).await {
                Err(_elapsed) => return Wake::Settled,
                Ok(Ok(PageEvent::Navigated(url))) => return Wake::Navigated(url),
                Ok(Ok(PageEvent::Mutated)) => {}
                Ok(Err(RecvError::Lagged(skipped))) => debug!(skipped, "page events lagged"),
                Ok(Err(RecvError::Closed)) => return Wake::Settled,
            }
        }
    }
}

fn collect(
    reports: &mut Vec<FieldReport>,
    joined: Result<Vec<FieldReport>, tokio::task::JoinError>,
) {
    match joined {
        Ok(batch) => reports.extend(batch),
        Err(e) => warn!(error = %e, "scan task failed"),
    }
}
