//! One invocation of the sync job: scan, then suspend or materialize.

use crate::checkpoint::CheckpointStore;
use crate::config::RunPolicy;
use crate::error::Result;
use crate::scan::{Clock, ScanDriver, ScanOutcome};
use crate::schedule::Scheduler;
use crate::sheets::{plan_workbook, WorkbookPlan};
use crate::types::Slide;

/// Name under which the sync job is scheduled.
pub const SYNC_JOB: &str = "update-index-and-task-sheets";

/// Executes a workbook plan against a real document.
pub trait Materializer {
    fn materialize(&mut self, plan: &WorkbookPlan) -> Result<()>;
}

/// Materializer that keeps the plans it was given.
#[derive(Debug, Clone, Default)]
pub struct RecordingMaterializer {
    pub plans: Vec<WorkbookPlan>,
}

impl Materializer for RecordingMaterializer {
    fn materialize(&mut self, plan: &WorkbookPlan) -> Result<()> {
        self.plans.push(plan.clone());
        Ok(())
    }
}

/// Collaborators of a run.
pub struct JobContext<'a> {
    pub store: &'a mut dyn CheckpointStore,
    pub scheduler: &'a mut dyn Scheduler,
    pub materializer: &'a mut dyn Materializer,
    pub clock: &'a dyn Clock,
}

/// What a run achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Sheets were written and the checkpoint cleared.
    Completed { groups: usize, tasks: usize },
    /// The checkpoint was saved and a continuation scheduled.
    Suspended { resume_index: usize },
}

/// A named job over a deck.
#[derive(Debug, Clone)]
pub struct SyncJob {
    name: String,
    policy: RunPolicy,
    index_sheet: String,
}

impl SyncJob {
    pub fn new(policy: RunPolicy, index_sheet: impl Into<String>) -> Self {
        Self {
            name: SYNC_JOB.to_string(),
            policy,
            index_sheet: index_sheet.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run once.
    ///
    /// The checkpoint store is written exactly once: `save` when the budget
    /// runs out, `clear` after the sheets are written.
    pub fn run(&self, slides: &[Slide], ctx: &mut JobContext<'_>) -> Result<JobStatus> {
        self.policy.validate()?;

        let checkpoint = ctx.store.load()?;
        log::info!(
            "Starting '{}' at slide {} of {}",
            self.name,
            checkpoint.resume_index + 1,
            slides.len()
        );

        let driver = ScanDriver::new(self.policy.budget_ms);
        match driver.run(slides, checkpoint, ctx.clock) {
            ScanOutcome::Suspended(checkpoint) => {
                ctx.store.save(&checkpoint)?;
                ctx.scheduler
                    .schedule_after(&self.name, self.policy.resume_delay_ms)?;
                Ok(JobStatus::Suspended {
                    resume_index: checkpoint.resume_index,
                })
            }
            ScanOutcome::Completed(groups) => {
                let plan = plan_workbook(&groups, &self.index_sheet);
                ctx.materializer.materialize(&plan)?;
                ctx.store.clear()?;
                ctx.scheduler.cancel_all(&self.name)?;

                let tasks: usize = groups.iter().map(|g| g.tasks.len()).sum();
                log::info!("Wrote {} task sheets with {} tasks", groups.len(), tasks);
                Ok(JobStatus::Completed {
                    groups: groups.len(),
                    tasks,
                })
            }
        }
    }
}
