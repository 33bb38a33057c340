use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::HoldingsError;
use crate::monitor::PriceMonitor;
use crate::notifier::ChangeNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    Stopping,
}

/// Owns the recurring monitor→notify cycle on one dedicated task.
///
/// Cycles never overlap: the loop runs a full cycle, then sleeps for the
/// interval. The monitor sits behind a `tokio::sync::Mutex` so `run_once`
/// and the loop share a single logical worker; callers still must not run
/// `run_once` concurrently with the loop by contract.
pub struct Scheduler {
    monitor: Arc<Mutex<PriceMonitor>>,
    notifier: Arc<ChangeNotifier>,
    /// Wait after a failed cycle; shorter than the normal interval so a
    /// transient failure degrades to reduced-frequency polling.
    cycle_backoff: Duration,
    state: SchedulerState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(monitor: PriceMonitor, notifier: ChangeNotifier, cycle_backoff: Duration) -> Self {
        Self {
            monitor: Arc::new(Mutex::new(monitor)),
            notifier: Arc::new(notifier),
            cycle_backoff,
            state: SchedulerState::Stopped,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Begin the recurring cycle. No-op if already running.
    pub fn start(&mut self, interval: Duration) {
        if self.state == SchedulerState::Running {
            warn!("price monitoring scheduler is already running");
            return;
        }

        self.cancel = CancellationToken::new();
        let monitor = Arc::clone(&self.monitor);
        let notifier = Arc::clone(&self.notifier);
        let cancel = self.cancel.clone();
        let backoff = self.cycle_backoff;

        self.handle = Some(tokio::spawn(async move {
            monitoring_loop(monitor, notifier, interval, backoff, cancel).await;
        }));
        self.state = SchedulerState::Running;

        info!(
            interval_secs = interval.as_secs(),
            "price monitoring scheduler started"
        );
    }

    /// Request cancellation and wait for the loop task to exit.
    /// No-op if already stopped.
    pub async fn stop(&mut self) {
        if self.state == SchedulerState::Stopped {
            return;
        }

        self.state = SchedulerState::Stopping;
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }

        self.state = SchedulerState::Stopped;
        info!("price monitoring scheduler stopped");
    }

    /// Execute exactly one cycle outside the recurring loop, for manual
    /// invocation. Returns the number of notifications successfully sent.
    pub async fn run_once(&self) -> usize {
        info!("running one manual monitoring cycle");

        match run_cycle(&self.monitor, &self.notifier).await {
            Ok(sent) => sent,
            Err(e) => {
                error!(error = ?e, "manual monitoring cycle failed");
                0
            }
        }
    }
}

async fn monitoring_loop(
    monitor: Arc<Mutex<PriceMonitor>>,
    notifier: Arc<ChangeNotifier>,
    interval: Duration,
    backoff: Duration,
    cancel: CancellationToken,
) {
    loop {
        let wait = match run_cycle(&monitor, &notifier).await {
            Ok(sent) => {
                if sent > 0 {
                    info!(sent, "scheduled monitoring cycle sent notifications");
                }
                interval
            }
            Err(e) => {
                error!(error = ?e, "monitoring cycle failed, backing off");
                backoff
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("monitoring loop cancelled");
                break;
            }
            _ = sleep(wait) => {}
        }
    }
}

async fn run_cycle(
    monitor: &Mutex<PriceMonitor>,
    notifier: &ChangeNotifier,
) -> Result<usize, Report<HoldingsError>> {
    let changes = monitor.lock().await.check_changes().await?;

    if changes.is_empty() {
        info!("no significant price changes detected");
        return Ok(0);
    }

    info!(changes = changes.len(), "significant price changes detected");
    Ok(notifier.dispatch(&changes).await)
}
