//! Continuations of suspended jobs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scan::Clock;
use crate::storage;

/// Accepts requests to run a job again later.
pub trait Scheduler {
    /// Run `job` again after `delay_ms`. Replaces any pending run of `job`.
    fn schedule_after(&mut self, job: &str, delay_ms: u64) -> Result<()>;

    /// Drop every pending run of `job`. Idempotent.
    fn cancel_all(&mut self, job: &str) -> Result<()>;
}

/// A pending continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRun {
    /// Unix time in milliseconds at which the job is due.
    pub due_at_ms: u64,
}

impl PendingRun {
    /// Milliseconds left until the run is due.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.due_at_ms.saturating_sub(now_ms)
    }
}

/// Scheduler that keeps pending runs in a JSON file, one per job.
///
/// The invoker (the `run` loop or an external timer) reads the pending
/// entry back with [`FileScheduler::pending`].
pub struct FileScheduler<'a> {
    path: PathBuf,
    clock: &'a dyn Clock,
}

impl<'a> FileScheduler<'a> {
    pub fn new(path: impl Into<PathBuf>, clock: &'a dyn Clock) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn pending(&self, job: &str) -> Result<Option<PendingRun>> {
        Ok(self.read()?.remove(job))
    }

    fn read(&self) -> Result<BTreeMap<String, PendingRun>> {
        Ok(storage::read_json(&self.path)?.unwrap_or_default())
    }

    fn write(&self, runs: &BTreeMap<String, PendingRun>) -> Result<()> {
        if runs.is_empty() {
            storage::remove_file(&self.path)
        } else {
            storage::write_json(&self.path, runs)
        }
    }
}

impl Scheduler for FileScheduler<'_> {
    fn schedule_after(&mut self, job: &str, delay_ms: u64) -> Result<()> {
        let mut runs = self.read()?;
        let due_at_ms = self.clock.now_millis().saturating_add(delay_ms);
        runs.insert(job.to_string(), PendingRun { due_at_ms });
        log::info!("Scheduled '{}' to run again in {} ms", job, delay_ms);
        self.write(&runs)
    }

    fn cancel_all(&mut self, job: &str) -> Result<()> {
        let mut runs = self.read()?;
        if runs.remove(job).is_some() {
            log::debug!("Cancelled pending run of '{}'", job);
            self.write(&runs)?;
        }
        Ok(())
    }
}

/// Scheduler that only records requests.
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    /// Pending delay per job.
    pub pending: BTreeMap<String, u64>,
    /// Every `schedule_after` call, in order.
    pub requests: Vec<(String, u64)>,
    /// Number of `cancel_all` calls.
    pub cancels: usize,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule_after(&mut self, job: &str, delay_ms: u64) -> Result<()> {
        self.pending.insert(job.to_string(), delay_ms);
        self.requests.push((job.to_string(), delay_ms));
        Ok(())
    }

    fn cancel_all(&mut self, job: &str) -> Result<()> {
        self.cancels += 1;
        self.pending.remove(job);
        Ok(())
    }
}
