//! Timer-driven invocation of reconciliation runs.
//!
//! The scheduler owns the timing; the reconciler only exposes a blocking
//! `run()`. At most one run executes at a time because runs are invoked
//! inline on the scheduler thread.

use crossbeam_channel::{after, never, select, tick, Receiver};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::config::Schedule;
use crate::run::Reconciler;

/// Counts of runs invoked by one scheduler loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub runs: usize,
    pub failures: usize,
}

pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    schedule: Schedule,
    max_runs: Option<usize>,
}

impl Scheduler {
    pub fn new(reconciler: Arc<Reconciler>, schedule: Schedule) -> Self {
        Self {
            reconciler,
            schedule,
            max_runs: None,
        }
    }

    /// Stop after this many runs (successful or not).
    pub fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = Some(max_runs);
        self
    }

    /// Block, invoking runs on schedule until shutdown is signalled, the
    /// shutdown sender is dropped, the run limit is reached, or nothing is left to run.
    pub fn start(&self, shutdown: &Receiver<()>) -> SchedulerSummary {
        let mut summary = SchedulerSummary::default();
        if self.schedule.is_idle() {
            info!("scheduled runs disabled and no startup run requested");
            return summary;
        }

        let startup = match self.schedule.startup_delay {
            Some(delay) => after(delay),
            None => never::<Instant>(),
        };
        let ticker = match self.schedule.interval {
            Some(period) => tick(period),
            None => never::<Instant>(),
        };
        let mut startup_pending = self.schedule.startup_delay.is_some();

        info!(
            interval_secs = self.schedule.interval.map(|d| d.as_secs()),
            startup_delay_secs = self.schedule.startup_delay.map(|d| d.as_secs()),
            "scheduler started"
        );

        loop {
            if self.max_runs.is_some_and(|max| summary.runs >= max) {
                break;
            }
            if !startup_pending && self.schedule.interval.is_none() {
                break;
            }

            select! {
                recv(startup) -> _ => {
                    startup_pending = false;
                    self.invoke(&mut summary);
                }
                recv(ticker) -> _ => self.invoke(&mut summary),
                recv(shutdown) -> _ => break,
            }
        }

        info!(runs = summary.runs, failures = summary.failures, "scheduler stopped");
        summary
    }

    /// A failed run is reported; the next tick starts from a fresh snapshot.
    fn invoke(&self, summary: &mut SchedulerSummary) {
        summary.runs += 1;
        if let Err(e) = self.reconciler.run() {
            summary.failures += 1;
            error!(error = %e, "scheduled reconciliation run failed");
        }
    }
}
