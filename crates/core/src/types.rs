//! Domain types for decks, extracted tasks and scan state.

use serde::{Deserialize, Serialize};

/// A slide deck with its slides in presentation order.
#[derive(Debug, Clone)]
pub struct Deck {
    /// Locator of the whole deck (URL or file URL).
    pub locator: String,

    /// Slides in presentation order.
    pub slides: Vec<Slide>,
}

impl Deck {
    /// Create an empty deck with the given locator.
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            slides: Vec::new(),
        }
    }

    /// Add a slide to the deck.
    pub fn add_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
    }

    /// Build the locator of a slide inside this deck.
    ///
    /// Uses the slide's object id when known, its number otherwise.
    pub fn slide_locator(&self, slide_id: Option<&str>, number: usize) -> String {
        match slide_id {
            Some(id) => format!("{}#slide=id.{}", self.locator, id),
            None => format!("{}#slide={}", self.locator, number),
        }
    }
}

/// A single slide: its position, locator and shape texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    /// 1-based slide number.
    pub number: usize,

    /// Stable locator of this slide, stamped into task records.
    pub locator: String,

    /// Trimmed text of each text-bearing shape, in shape order.
    pub shapes: Vec<String>,
}

impl Slide {
    /// Create a slide with no shapes.
    pub fn new(number: usize, locator: impl Into<String>) -> Self {
        Self {
            number,
            locator: locator.into(),
            shapes: Vec::new(),
        }
    }

    /// Add a shape's text. Blank shapes are ignored.
    pub fn add_shape(&mut self, text: impl Into<String>) {
        let text = text.into();
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.shapes.push(trimmed.to_string());
        }
    }

    /// Builder form of [`Slide::add_shape`].
    pub fn with_shape(mut self, text: impl Into<String>) -> Self {
        self.add_shape(text);
        self
    }

    /// All shape texts joined with single spaces.
    pub fn content(&self) -> String {
        self.shapes.join(" ")
    }
}

/// One task found on a slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub summary: String,
    /// Locator of the slide the task came from.
    pub source_ref: String,
}

impl TaskRecord {
    pub fn new(
        name: impl Into<String>,
        summary: impl Into<String>,
        source_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            source_ref: source_ref.into(),
        }
    }

    /// A record is usable only when every field is non-empty.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.summary.is_empty() && !self.source_ref.is_empty()
    }
}

/// Tasks sharing a `(work category, sub-category)` pair, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub work_category: String,
    pub sub_work_category: String,
    pub tasks: Vec<TaskRecord>,
}

impl CategoryGroup {
    /// Create an empty group.
    pub fn new(work_category: impl Into<String>, sub_work_category: impl Into<String>) -> Self {
        Self {
            work_category: work_category.into(),
            sub_work_category: sub_work_category.into(),
            tasks: Vec::new(),
        }
    }

    /// Whether this group has the given identity.
    pub fn has_identity(&self, work_category: &str, sub_work_category: &str) -> bool {
        self.work_category == work_category && self.sub_work_category == sub_work_category
    }

    /// Name of the destination sheet for this group.
    pub fn sheet_name(&self) -> String {
        format!("{}: {}", self.work_category, self.sub_work_category)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Persisted resume state of an interrupted scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCheckpoint {
    /// Groups closed before the interruption, in encounter order.
    pub completed_groups: Vec<CategoryGroup>,

    /// Group still accepting tasks when the scan stopped.
    pub in_progress_group: Option<CategoryGroup>,

    /// 0-based index of the first slide not yet processed.
    pub resume_index: usize,
}

impl ScanCheckpoint {
    /// Whether this is the state of a scan that has not started.
    pub fn is_fresh(&self) -> bool {
        self.resume_index == 0
            && self.completed_groups.is_empty()
            && self.in_progress_group.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_ignores_blank_shapes_and_trims() {
        let slide = Slide::new(1, "deck#slide=1")
            .with_shape("  Task: Pour concrete  ")
            .with_shape("   ")
            .with_shape("Summary: Level 2");

        assert_eq!(slide.shapes, vec!["Task: Pour concrete", "Summary: Level 2"]);
        assert_eq!(slide.content(), "Task: Pour concrete Summary: Level 2");
    }

    #[test]
    fn test_slide_locator() {
        let deck = Deck::new("https://example.com/deck");
        assert_eq!(
            deck.slide_locator(Some("256"), 1),
            "https://example.com/deck#slide=id.256"
        );
        assert_eq!(deck.slide_locator(None, 4), "https://example.com/deck#slide=4");
    }

    #[test]
    fn test_task_record_validity() {
        assert!(TaskRecord::new("t", "s", "ref").is_valid());
        assert!(!TaskRecord::new("", "s", "ref").is_valid());
        assert!(!TaskRecord::new("t", "", "ref").is_valid());
        assert!(!TaskRecord::new("t", "s", "").is_valid());
    }

    #[test]
    fn test_group_identity_and_sheet_name() {
        let group = CategoryGroup::new("土工", "掘削");
        assert!(group.has_identity("土工", "掘削"));
        assert!(!group.has_identity("土工", "盛土"));
        assert_eq!(group.sheet_name(), "土工: 掘削");
        assert!(group.is_empty());
    }

    #[test]
    fn test_default_checkpoint_is_fresh() {
        assert!(ScanCheckpoint::default().is_fresh());
        let moved = ScanCheckpoint {
            resume_index: 3,
            ..Default::default()
        };
        assert!(!moved.is_fresh());
    }
}
