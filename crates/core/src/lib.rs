//! Task extraction from slide decks, grouped by category, with a
//! time-budgeted scan that suspends to a checkpoint and resumes later.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod extract;
pub mod group;
pub mod job;
pub mod lock;
pub mod scan;
pub mod schedule;
pub mod sheets;
pub mod storage;
pub mod types;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::{RunPolicy, SettingKey, Settings, SettingsStore};
pub use error::{Error, Result};
pub use extract::{CategoryKey, ExtractedField, FieldExtractor, SlideIssue};
pub use group::GroupAccumulator;
pub use job::{JobContext, JobStatus, Materializer, SyncJob, SYNC_JOB};
pub use lock::RunLock;
pub use scan::{Clock, ScanDriver, ScanOutcome, SystemClock};
pub use schedule::{FileScheduler, PendingRun, RecordingScheduler, Scheduler};
pub use sheets::{
    plan_reset, plan_workbook, CellStyle, CellValue, LinkTarget, SheetOp, WorkbookPlan,
};
pub use storage::StateDir;
pub use types::{CategoryGroup, Deck, ScanCheckpoint, Slide, TaskRecord};
