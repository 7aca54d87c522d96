//! Folding slide contributions into category groups.

use crate::extract::{CategoryKey, SlideContribution};
use crate::types::{CategoryGroup, ScanCheckpoint, TaskRecord};

/// Accumulates tasks into groups, opening a new group at every category change.
///
/// Groups are never merged: a category that reappears after another one
/// starts a fresh group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupAccumulator {
    completed: Vec<CategoryGroup>,
    current: Option<CategoryGroup>,
}

impl GroupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a checkpoint's groups.
    pub fn from_checkpoint(checkpoint: ScanCheckpoint) -> Self {
        Self {
            completed: checkpoint.completed_groups,
            current: checkpoint.in_progress_group,
        }
    }

    /// Fold one slide's contribution.
    pub fn fold(&mut self, contribution: SlideContribution) {
        if let Some(key) = contribution.category {
            self.enter_category(key);
        }
        if let Some(task) = contribution.task {
            self.push_task(task);
        }
    }

    fn enter_category(&mut self, key: CategoryKey) {
        let same = self
            .current
            .as_ref()
            .is_some_and(|g| g.has_identity(&key.work_category, &key.sub_work_category));
        if same {
            return;
        }
        self.close_current();
        self.current = Some(CategoryGroup::new(key.work_category, key.sub_work_category));
    }

    fn push_task(&mut self, task: TaskRecord) {
        match self.current.as_mut() {
            Some(group) => group.tasks.push(task),
            None => log::debug!("Dropping task '{}': no category seen yet", task.name),
        }
    }

    fn close_current(&mut self) {
        if let Some(group) = self.current.take() {
            if !group.is_empty() {
                self.completed.push(group);
            }
        }
    }

    /// Snapshot the state with the cursor where scanning should resume.
    pub fn checkpoint(&self, resume_index: usize) -> ScanCheckpoint {
        ScanCheckpoint {
            completed_groups: self.completed.clone(),
            in_progress_group: self.current.clone(),
            resume_index,
        }
    }

    /// Close the in-progress group and return every non-empty group.
    pub fn finish(mut self) -> Vec<CategoryGroup> {
        self.close_current();
        self.completed
    }

    pub fn completed(&self) -> &[CategoryGroup] {
        &self.completed
    }

    pub fn current(&self) -> Option<&CategoryGroup> {
        self.current.as_ref()
    }
}
