use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::loader::{DiscoveryReport, ModuleLoader};

struct CompletedRefresh {
    id: u64,
    report: DiscoveryReport,
}

/// Background discovery runs. Only the newest one may deliver a result.
pub(crate) struct RefreshTracker {
    latest_id: u64,
    token: Option<CancellationToken>,
    tx: Sender<CompletedRefresh>,
    rx: Receiver<CompletedRefresh>,
}

impl RefreshTracker {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            latest_id: 0,
            token: None,
            tx,
            rx,
        }
    }

    /// Cancel the running refresh, if any, and hand out the next generation
    pub(crate) fn begin(&mut self) -> (u64, CancellationToken) {
        self.cancel();
        self.latest_id = self.latest_id.wrapping_add(1);
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        (self.latest_id, token)
    }

    pub(crate) fn spawn(&mut self, loader: ModuleLoader, root: PathBuf) -> u64 {
        let (id, cancel) = self.begin();
        let tx = self.tx.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("gdk-refresh-{id}"))
            .spawn(move || {
                tracing::debug!("Refresh {} started", id);
                let report = loader.discover_with_report(&root, &cancel);
                // The lobby may be gone already
                let _ = tx.send(CompletedRefresh { id, report });
            });
        if let Err(e) = spawned {
            tracing::warn!("Cannot start refresh thread: {}", e);
            self.token = None;
        }
        id
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            tracing::debug!("Cancelling refresh {}", self.latest_id);
            token.cancel();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn latest_id(&self) -> u64 {
        self.latest_id
    }

    pub(crate) fn try_take(&mut self) -> Option<DiscoveryReport> {
        while let Ok(done) = self.rx.try_recv() {
            if let Some(report) = self.accept(done) {
                return Some(report);
            }
        }
        None
    }

    pub(crate) fn wait(&mut self, timeout: Duration) -> Option<DiscoveryReport> {
        if !self.is_running() {
            return self.try_take();
        }
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok(done) => {
                    if let Some(report) = self.accept(done) {
                        return Some(report);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return None,
                // `self.tx` keeps the channel open
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn accept(&mut self, done: CompletedRefresh) -> Option<DiscoveryReport> {
        if done.id != self.latest_id || done.report.cancelled {
            tracing::debug!(
                "Discarding result of superseded refresh {} (latest is {})",
                done.id,
                self.latest_id
            );
            return None;
        }
        self.token = None;
        Some(done.report)
    }
}

impl Drop for RefreshTracker {
    fn drop(&mut self) {
        self.cancel();
    }
}
