//! Suspend/resume behaviour across separate runs of the sync job.

use std::cell::Cell;

use tasksheet_core::job::RecordingMaterializer;
use tasksheet_core::{
    CategoryGroup, CheckpointStore, Clock, FileCheckpointStore, JobContext, JobStatus,
    RecordingScheduler, RunPolicy, ScanCheckpoint, ScanDriver, ScanOutcome, Slide, SyncJob,
    SYNC_JOB,
};

/// Clock that advances one millisecond per read.
struct TickClock(Cell<u64>);

impl TickClock {
    fn new() -> Self {
        Self(Cell::new(0))
    }
}

impl Clock for TickClock {
    fn now_millis(&self) -> u64 {
        let now = self.0.get();
        self.0.set(now + 1);
        now
    }
}

fn category(n: usize, work: &str, sub: &str) -> Slide {
    Slide::new(n, format!("#{}", n)).with_shape(format!("Category: 【{}】{}", work, sub))
}

fn task(n: usize, name: &str) -> Slide {
    Slide::new(n, format!("#{}", n))
        .with_shape(format!("Task: {}", name))
        .with_shape(format!("Summary: about {}", name))
}

/// Categories A, A, B, A with tasks t1, t2 under the first A, t3 under B, t4 under the last A.
fn deck() -> Vec<Slide> {
    vec![
        category(1, "A", "x"),
        task(2, "t1"),
        category(3, "A", "x"),
        task(4, "t2"),
        category(5, "B", "y"),
        task(6, "t3"),
        category(7, "A", "x"),
        task(8, "t4"),
        Slide::new(9, "#9").with_shape("Closing remarks"),
    ]
}

fn names(group: &CategoryGroup) -> Vec<&str> {
    group.tasks.iter().map(|t| t.name.as_str()).collect()
}

fn completed(outcome: ScanOutcome) -> Vec<CategoryGroup> {
    match outcome {
        ScanOutcome::Completed(groups) => groups,
        ScanOutcome::Suspended(c) => panic!("unexpected suspension at {}", c.resume_index),
    }
}

fn scan_all(slides: &[Slide]) -> Vec<CategoryGroup> {
    completed(ScanDriver::new(u64::MAX).run(slides, ScanCheckpoint::default(), &TickClock::new()))
}

#[test]
fn category_boundaries_do_not_merge() {
    let groups = scan_all(&deck());

    assert_eq!(groups.len(), 3);
    assert!(groups[0].has_identity("A", "x"));
    assert_eq!(names(&groups[0]), vec!["t1", "t2"]);
    assert!(groups[1].has_identity("B", "y"));
    assert_eq!(names(&groups[1]), vec!["t3"]);
    assert!(groups[2].has_identity("A", "x"));
    assert_eq!(names(&groups[2]), vec!["t4"]);
}

#[test]
fn split_scan_matches_single_pass_for_every_cut() {
    let slides = deck();
    let single = scan_all(&slides);

    // With a tick clock, budget b suspends before index b - 1.
    for budget in 1..=slides.len() as u64 {
        let first =
            ScanDriver::new(budget).run(&slides, ScanCheckpoint::default(), &TickClock::new());
        let ScanOutcome::Suspended(checkpoint) = first else {
            panic!("budget {} should suspend", budget);
        };
        assert_eq!(checkpoint.resume_index, budget as usize - 1);

        let dir = tempfile::tempdir().unwrap();
        let mut store = FileCheckpointStore::new(dir.path().join("checkpoint.json"));
        store.save(&checkpoint).unwrap();
        let restored = store.load().unwrap();
        assert_eq!(restored, checkpoint);

        let resumed =
            completed(ScanDriver::new(u64::MAX).run(&slides, restored, &TickClock::new()));
        assert_eq!(resumed, single, "cut before index {}", budget - 1);
    }
}

#[test]
fn invalid_category_is_skipped_and_scan_continues() {
    let slides = vec![
        category(1, "A", "x"),
        Slide::new(2, "#2").with_shape("Category: 【B】"),
        task(3, "t1"),
        category(4, "C", "z"),
        task(5, "t2"),
    ];

    let groups = scan_all(&slides);
    assert_eq!(groups.len(), 2);
    assert!(groups[0].has_identity("A", "x"));
    assert_eq!(names(&groups[0]), vec!["t1"]);
    assert!(groups[1].has_identity("C", "z"));
}

#[test]
fn job_runs_until_complete_with_one_checkpoint_write_per_run() {
    let slides = deck();
    let dir = tempfile::tempdir().unwrap();
    let checkpoint_path = dir.path().join("checkpoint.json");
    let mut scheduler = RecordingScheduler::new();
    let mut sink = RecordingMaterializer::default();

    // Each run gets a fresh clock; a budget of 4 ticks processes 3 slides.
    let job = SyncJob::new(RunPolicy::new().with_budget_ms(4), "Index");
    let mut statuses = Vec::new();
    for _ in 0..10 {
        let mut store = FileCheckpointStore::new(&checkpoint_path);
        let status = job
            .run(
                &slides,
                &mut JobContext {
                    store: &mut store,
                    scheduler: &mut scheduler,
                    materializer: &mut sink,
                    clock: &TickClock::new(),
                },
            )
            .unwrap();
        statuses.push(status);

        match status {
            JobStatus::Suspended { resume_index } => {
                assert_eq!(store.load().unwrap().resume_index, resume_index);
                assert!(scheduler.pending.contains_key(SYNC_JOB));
            }
            JobStatus::Completed { .. } => {
                assert!(!checkpoint_path.exists());
                assert!(scheduler.pending.is_empty());
                break;
            }
        }
    }

    assert_eq!(
        statuses,
        vec![
            JobStatus::Suspended { resume_index: 3 },
            JobStatus::Suspended { resume_index: 6 },
            JobStatus::Completed { groups: 3, tasks: 4 },
        ]
    );
    assert_eq!(scheduler.requests.len(), 2);
    assert_eq!(sink.plans.len(), 1);
    assert_eq!(sink.plans[0].created_sheets(), vec!["A: x", "B: y", "A: x (2)"]);
}
