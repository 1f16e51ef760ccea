//! Debounced, single-flight rebuild scheduling.
//!
//! States: idle -> pending (timer armed) -> rebuilding -> idle. Arming while
//! pending aborts the old timer and starts a new one, so a rebuild only fires
//! once no change has arrived for a full debounce period. A timer firing
//! while a rebuild is still running does not start a second one; it queues
//! exactly one follow-up rebuild that runs when the current one completes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::index::AreaIndex;

/// Quiet period before a rebuild fires.
pub const DEFAULT_REBUILD_DEBOUNCE: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct FlightState {
    running: bool,
    rerun: bool,
}

/// Single-flight guard for rebuilds.
#[derive(Debug, Default)]
pub struct RebuildFlight {
    state: Mutex<FlightState>,
}

impl RebuildFlight {
    /// Runs `job`, or queues one follow-up run if a job is already in flight.
    ///
    /// A queued follow-up is executed by the caller that owns the flight,
    /// using that caller's `job`.
    pub async fn run<F, Fut>(&self, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        if !self.try_start() {
            log::debug!("area index rebuild already running, queued one follow-up");
            return;
        }
        loop {
            job().await;
            if !self.finish() {
                break;
            }
            log::debug!("running queued area index rebuild");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn try_start(&self) -> bool {
        let mut state = self.state.lock();
        if state.running {
            state.rerun = true;
            false
        } else {
            state.running = true;
            true
        }
    }

    /// Returns true when a follow-up run was queued meanwhile.
    fn finish(&self) -> bool {
        let mut state = self.state.lock();
        if state.rerun {
            state.rerun = false;
            true
        } else {
            state.running = false;
            false
        }
    }
}

/// Owns the single debounce timer slot for an index.
#[derive(Debug)]
pub struct DebouncedRebuild {
    index: Arc<AreaIndex>,
    delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    flight: Arc<RebuildFlight>,
}

impl DebouncedRebuild {
    pub fn new(index: Arc<AreaIndex>, delay: Duration) -> Self {
        Self {
            index,
            delay,
            timer: Mutex::new(None),
            flight: Arc::new(RebuildFlight::default()),
        }
    }

    /// Cancels any pending timer and schedules a new one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self) {
        let mut slot = self.timer.lock();
        if let Some(pending) = slot.take() {
            pending.abort();
        }

        let index = self.index.clone();
        let flight = self.flight.clone();
        let delay = self.delay;
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detach so a later `arm` aborting this timer cannot cut a
            // rebuild short.
            tokio::spawn(async move {
                log::info!("rebuilding area index after change burst");
                flight.run(|| rebuild_on_blocking_pool(index.clone())).await;
            });
        }));
    }

    /// Drops a pending timer, if any. A rebuild already running is unaffected.
    pub fn cancel(&self) {
        if let Some(pending) = self.timer.lock().take() {
            pending.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

async fn rebuild_on_blocking_pool(index: Arc<AreaIndex>) {
    // Failures are logged by `rebuild` itself.
    if let Err(error) = tokio::task::spawn_blocking(move || index.rebuild()).await {
        log::error!("area index rebuild task failed: {error}");
    }
}
