//! Marker extraction from slide shapes.
//!
//! A slide carries its task through labeled shapes:
//!
//! ```text
//! Category: 【Earthwork】Excavation
//! Task: Trench layout
//! Summary: Mark the trench line before digging
//! ```
//!
//! Each shape is scanned on its own, so the markers may live in separate
//! shapes in any order, or share one shape on separate lines.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::types::{Slide, TaskRecord};

/// Marker prefixes, recognized at the start of a line.
static MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(Category:|Task:|Summary: )").unwrap());

/// Body of a category marker: bracketed work category, then the sub-category.
static CATEGORY_BODY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*【(.*?)】(.*)$").unwrap());

/// A single marker found in a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedField {
    CategoryMarker {
        work_category: String,
        sub_work_category: String,
    },
    TaskMarker {
        name: String,
    },
    SummaryMarker {
        text: String,
    },
}

/// Identity of a category group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryKey {
    pub work_category: String,
    pub sub_work_category: String,
}

impl CategoryKey {
    pub fn new(work_category: impl Into<String>, sub_work_category: impl Into<String>) -> Self {
        Self {
            work_category: work_category.into(),
            sub_work_category: sub_work_category.into(),
        }
    }
}

/// Why a slide's markers could not be used as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideIssue {
    /// Category marker without both a work category and a sub-category.
    IncompleteCategory,
    /// Task marker with no summary on the same slide.
    TaskWithoutSummary,
    /// Summary marker with no task on the same slide.
    SummaryWithoutTask,
    /// Task and summary present but one of them is empty.
    IncompleteTask,
}

impl fmt::Display for SlideIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SlideIssue::IncompleteCategory => {
                "category marker is missing a work category or sub-category"
            }
            SlideIssue::TaskWithoutSummary => "task has no summary",
            SlideIssue::SummaryWithoutTask => "summary has no task",
            SlideIssue::IncompleteTask => "task name or summary is empty",
        };
        f.write_str(text)
    }
}

/// Raw markers collected from one slide. Later markers overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideFields {
    pub category: Option<(String, String)>,
    pub task_name: Option<String>,
    pub summary: Option<String>,
}

impl SlideFields {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.task_name.is_none() && self.summary.is_none()
    }

    fn absorb(&mut self, field: ExtractedField) {
        match field {
            ExtractedField::CategoryMarker {
                work_category,
                sub_work_category,
            } => self.category = Some((work_category, sub_work_category)),
            ExtractedField::TaskMarker { name } => self.task_name = Some(name),
            ExtractedField::SummaryMarker { text } => self.summary = Some(text),
        }
    }
}

/// What a slide contributes to the grouping, after validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideContribution {
    pub category: Option<CategoryKey>,
    pub task: Option<TaskRecord>,
}

/// Result of extracting one slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub contribution: SlideContribution,
    pub issue: Option<SlideIssue>,
}

/// Extracts and validates the markers of a slide.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor;

impl FieldExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Collect the markers of every shape of the slide.
    pub fn fields(&self, slide: &Slide) -> SlideFields {
        let mut fields = SlideFields::default();
        for shape in &slide.shapes {
            for field in extract_fields(shape) {
                fields.absorb(field);
            }
        }
        fields
    }

    /// Extract a slide and decide what it contributes.
    ///
    /// An incomplete category voids the whole slide. A task problem only
    /// voids the task; a valid category on the same slide still counts.
    pub fn extract(&self, slide: &Slide) -> Extraction {
        let fields = self.fields(slide);

        let category = match fields.category {
            Some((work, sub)) if work.is_empty() || sub.is_empty() => {
                return Extraction {
                    contribution: SlideContribution::default(),
                    issue: Some(SlideIssue::IncompleteCategory),
                };
            }
            Some((work, sub)) => Some(CategoryKey::new(work, sub)),
            None => None,
        };

        let (task, issue) = match (fields.task_name, fields.summary) {
            (Some(name), Some(summary)) => {
                let record = TaskRecord::new(name, summary, slide.locator.clone());
                if record.is_valid() {
                    (Some(record), None)
                } else {
                    (None, Some(SlideIssue::IncompleteTask))
                }
            }
            (Some(_), None) => (None, Some(SlideIssue::TaskWithoutSummary)),
            (None, Some(_)) => (None, Some(SlideIssue::SummaryWithoutTask)),
            (None, None) => (None, None),
        };

        Extraction {
            contribution: SlideContribution { category, task },
            issue,
        }
    }
}

/// Normalize shape text before matching: NFC, `\n` line endings, trimmed.
pub fn normalize_shape_text(text: &str) -> String {
    let text: String = text.nfc().collect();
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Find every marker in one shape's text.
///
/// A marker's value runs until the next marker or the end of the text.
pub fn extract_fields(shape_text: &str) -> Vec<ExtractedField> {
    let text = normalize_shape_text(shape_text);
    let markers: Vec<_> = MARKER_REGEX.captures_iter(&text).collect();

    let mut fields = Vec::with_capacity(markers.len());
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let value = &text[whole.end()..end];

        let field = match label.as_str() {
            "Category:" => parse_category(value),
            "Task:" => ExtractedField::TaskMarker {
                name: value.trim().to_string(),
            },
            _ => ExtractedField::SummaryMarker {
                text: value.trim().to_string(),
            },
        };
        fields.push(field);
    }
    fields
}

/// Parse `【work】sub`. Anything else yields an empty work category.
fn parse_category(value: &str) -> ExtractedField {
    match CATEGORY_BODY_REGEX.captures(value) {
        Some(caps) => ExtractedField::CategoryMarker {
            work_category: caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
            sub_work_category: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
        },
        None => ExtractedField::CategoryMarker {
            work_category: String::new(),
            sub_work_category: value.trim().to_string(),
        },
    }
}
