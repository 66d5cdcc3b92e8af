//! Periodic drivers for the create, refresh and process routines.
//!
//! Each routine runs in its own tokio task on its own interval. A task awaits
//! its routine before waiting for the next tick, so no routine overlaps with
//! itself; different routines may run at the same time.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::ScheduleConfig;
use crate::export::{CreateOutcome, Exporter, StepOutcome};

pub struct Scheduler {
    exporter: Arc<Exporter>,
    config: ScheduleConfig,
    shutdown: broadcast::Sender<()>,
    stopped: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(exporter: Arc<Exporter>, config: ScheduleConfig) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            exporter,
            config,
            shutdown,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the three routines. Each runs once right away, then on its
    /// interval until [`Scheduler::stop`] is called.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let exporter = Arc::clone(&self.exporter);
        let create = self.spawn_routine("create", self.config.create_interval(), move || {
            let exporter = Arc::clone(&exporter);
            async move {
                match exporter.create_tick().await {
                    Ok(CreateOutcome::Created(request_id)) => {
                        info!(request_id, "Requested new log export")
                    }
                    Ok(CreateOutcome::AlreadyExists) => {}
                    Err(e) => error!(error = %e, "Create routine failed"),
                }
            }
        });

        let exporter = Arc::clone(&self.exporter);
        let refresh = self.spawn_routine("refresh", self.config.refresh_interval(), move || {
            let exporter = Arc::clone(&exporter);
            async move {
                match exporter.refresh_statuses().await {
                    Ok(summary) if summary.failed > 0 => debug!(
                        checked = summary.checked,
                        updated = summary.updated,
                        failed = summary.failed,
                        "Refresh finished with failures"
                    ),
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Refresh routine failed"),
                }
            }
        });

        let exporter = Arc::clone(&self.exporter);
        let process = self.spawn_routine("process", self.config.process_interval(), move || {
            let exporter = Arc::clone(&exporter);
            async move {
                match exporter.process_tick().await {
                    Ok(StepOutcome::Cleaned { status }) => {
                        info!(status = %status, "Log export finished")
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Process routine failed"),
                }
            }
        });

        vec![create, refresh, process]
    }

    /// Signals every routine to stop after its current run.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        // No receivers means every task has already exited.
        let _ = self.shutdown.send(());
    }

    fn spawn_routine<F, Fut>(&self, name: &'static str, every: Duration, mut run: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown.subscribe();
        let stopped = Arc::clone(&self.stopped);

        tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                debug!(interval_secs = every.as_secs(), "Routine started");

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = shutdown_rx.recv() => break,
                    }

                    if stopped.load(Ordering::Acquire) {
                        break;
                    }

                    run().await;
                }

                debug!("Routine stopped");
            }
            .instrument(info_span!("routine", name)),
        )
    }
}
