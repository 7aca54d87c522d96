//! Time-budgeted scan over a deck's slides.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Error;
use crate::extract::FieldExtractor;
use crate::group::GroupAccumulator;
use crate::types::{CategoryGroup, ScanCheckpoint, Slide};

/// Millisecond wall clock.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// How a scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every slide was processed.
    Completed(Vec<CategoryGroup>),
    /// The budget ran out; the checkpoint holds the state to resume from.
    Suspended(ScanCheckpoint),
}

/// Drives extraction and grouping from a resume cursor under a time budget.
#[derive(Debug, Clone)]
pub struct ScanDriver {
    budget_ms: u64,
    extractor: FieldExtractor,
}

impl ScanDriver {
    pub fn new(budget_ms: u64) -> Self {
        Self {
            budget_ms,
            extractor: FieldExtractor::new(),
        }
    }

    /// Scan `slides` starting at `start.resume_index`.
    ///
    /// The budget is checked before each slide; a slide is never split.
    pub fn run(&self, slides: &[Slide], start: ScanCheckpoint, clock: &dyn Clock) -> ScanOutcome {
        let mut cursor = start.resume_index;
        let mut acc = GroupAccumulator::from_checkpoint(start);
        let started = clock.now_millis();

        if cursor > 0 {
            log::info!("Resuming scan at slide {} of {}", cursor + 1, slides.len());
        }

        while cursor < slides.len() {
            let elapsed = clock.now_millis().saturating_sub(started);
            if elapsed >= self.budget_ms {
                log::info!(
                    "Time budget of {} ms reached before slide {}, suspending",
                    self.budget_ms,
                    cursor + 1
                );
                return ScanOutcome::Suspended(acc.checkpoint(cursor));
            }

            let slide = &slides[cursor];
            let extraction = self.extractor.extract(slide);
            if let Some(issue) = extraction.issue {
                log::warn!(
                    "{}",
                    Error::SlideValidation {
                        slide: slide.number,
                        issue,
                    }
                );
            }
            log::debug!("Slide {}: {:?}", slide.number, extraction.contribution);
            acc.fold(extraction.contribution);
            cursor += 1;
        }

        let groups = acc.finish();
        log::info!(
            "Scan complete: {} slides, {} groups",
            slides.len(),
            groups.len()
        );
        ScanOutcome::Completed(groups)
    }
}
