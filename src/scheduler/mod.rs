//! Single-flight periodic driver.
//!
//! A [`Scheduler`] fires a tick on a fixed interval. A tick starts a pass only
//! if no pass is in flight; ticks landing while a pass runs are dropped, never
//! queued. Whatever the pass does (returns an error, panics), the state goes
//! back to [`SchedulerState::Idle`] when it ends.

use crate::strategy::PassReport;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// One unit of scheduled work.
#[async_trait]
pub trait PassRunner: Send + Sync + 'static {
    async fn run_pass(&self) -> Result<PassReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Resets the running flag when the pass task finishes or unwinds.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    runner: Arc<dyn PassRunner>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn PassRunner>, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::Acquire) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Start a pass if idle.
    ///
    /// Returns the handle of the spawned pass, or `None` if a pass was
    /// already running and this tick was dropped.
    pub fn tick(&self) -> Option<JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("⏭️  [SCHED] Previous pass still running, tick skipped");
            return None;
        }

        let guard = RunGuard(self.running.clone());
        let runner = self.runner.clone();

        Some(tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();

            match AssertUnwindSafe(runner.run_pass()).catch_unwind().await {
                Ok(Ok(report)) => info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "✅ [SCHED] Pass complete: {}",
                    report
                ),
                Ok(Err(e)) => error!(error = ?e, "❌ [SCHED] Pass failed"),
                Err(panic) => error!(panic = %panic_message(&*panic), "❌ [SCHED] Pass panicked"),
            }
        }))
    }

    /// Tick every interval until `shutdown` resolves, then wait for the
    /// in-flight pass to finish.
    ///
    /// The first tick fires immediately.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "🚀 [SCHED] Scheduler started");

        let mut in_flight: Option<JoinHandle<()>> = None;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 [SCHED] Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    if let Some(handle) = self.tick() {
                        in_flight = Some(handle);
                    }
                }
            }
        }

        if let Some(handle) = in_flight {
            if !handle.is_finished() {
                info!("⏳ [SCHED] Waiting for in-flight pass");
            }
            if let Err(e) = handle.await {
                error!(error = %e, "In-flight pass did not complete cleanly");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
