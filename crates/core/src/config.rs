//! Run policy and persisted settings.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::storage;

/// Default time budget for one invocation (5 minutes).
pub const DEFAULT_BUDGET_MS: u64 = 300_000;

/// Default delay before a suspended job is run again.
pub const DEFAULT_RESUME_DELAY_MS: u64 = 10_000;

/// Characters a sheet name may not contain.
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Timing constants for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    pub budget_ms: u64,
    pub resume_delay_ms: u64,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            budget_ms: DEFAULT_BUDGET_MS,
            resume_delay_ms: DEFAULT_RESUME_DELAY_MS,
        }
    }
}

impl RunPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget_ms(mut self, budget_ms: u64) -> Self {
        self.budget_ms = budget_ms;
        self
    }

    pub fn with_resume_delay_ms(mut self, resume_delay_ms: u64) -> Self {
        self.resume_delay_ms = resume_delay_ms;
        self
    }

    /// A zero budget would suspend before every slide and never finish.
    pub fn validate(&self) -> Result<()> {
        if self.budget_ms == 0 {
            return Err(Error::Configuration(
                "time budget must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Keys of the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettingKey {
    /// Path of the deck to scan.
    SlideSource,
    /// Base locator stamped into task links.
    SlideLocator,
    /// Destination workbook.
    Workbook,
    /// Name of the index sheet.
    IndexSheet,
}

impl SettingKey {
    pub const ALL: [SettingKey; 4] = [
        SettingKey::SlideSource,
        SettingKey::SlideLocator,
        SettingKey::Workbook,
        SettingKey::IndexSheet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::SlideSource => "SLIDE_SOURCE",
            SettingKey::SlideLocator => "SLIDE_LOCATOR",
            SettingKey::Workbook => "WORKBOOK",
            SettingKey::IndexSheet => "INDEX_SHEET",
        }
    }

    /// Human-readable label, e.g. `SLIDE_SOURCE` -> `Slide Source`.
    pub fn label(&self) -> String {
        to_title_case(self.as_str())
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace('-', "_").to_uppercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| Error::Configuration(format!("unknown setting '{}'", s)))
    }
}

/// Convert `SNAKE_CASE` to `Title Case`.
pub fn to_title_case(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Key-value settings persisted as a JSON object.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl SettingsStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = storage::read_json(&path)?.unwrap_or_default();
        Ok(Self { path, values })
    }

    pub fn get(&self, key: SettingKey) -> Option<&str> {
        self.values.get(key.as_str()).map(String::as_str)
    }

    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) -> Result<()> {
        self.values.insert(key.as_str().to_string(), value.into());
        self.persist()
    }

    pub fn delete(&mut self, key: SettingKey) -> Result<()> {
        self.values.remove(key.as_str());
        self.persist()
    }

    pub fn delete_all(&mut self) -> Result<()> {
        self.values.clear();
        storage::remove_file(&self.path)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn persist(&self) -> Result<()> {
        storage::write_json(&self.path, &self.values)
    }
}

/// Settings a run needs, resolved from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub slide_source: PathBuf,
    /// Deck locator used in task links.
    pub slide_locator: String,
    pub workbook: PathBuf,
    pub index_sheet: String,
}

impl Settings {
    /// Resolve and check every setting. Fails before any scanning starts.
    pub fn resolve(store: &SettingsStore) -> Result<Self> {
        let slide_source = PathBuf::from(require(store, SettingKey::SlideSource)?);
        if !slide_source.is_file() {
            return Err(Error::Configuration(format!(
                "slide source {} does not exist",
                slide_source.display()
            )));
        }

        let slide_locator = match store.get(SettingKey::SlideLocator) {
            Some(locator) if !locator.trim().is_empty() => locator.trim().to_string(),
            _ => file_locator(&slide_source),
        };

        let workbook = PathBuf::from(require(store, SettingKey::Workbook)?);
        let index_sheet = require(store, SettingKey::IndexSheet)?.to_string();
        validate_sheet_name(&index_sheet)?;

        Ok(Self {
            slide_source,
            slide_locator,
            workbook,
            index_sheet,
        })
    }
}

fn require(store: &SettingsStore, key: SettingKey) -> Result<&str> {
    match store.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim()),
        _ => Err(Error::Configuration(format!(
            "{} is not set",
            key.label()
        ))),
    }
}

/// Check that a name can be used as a sheet name.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Configuration("sheet name is empty".to_string()));
    }
    if trimmed.chars().count() > 31 {
        return Err(Error::Configuration(format!(
            "sheet name '{}' is longer than 31 characters",
            trimmed
        )));
    }
    if let Some(c) = trimmed.chars().find(|c| FORBIDDEN_SHEET_CHARS.contains(c)) {
        return Err(Error::Configuration(format!(
            "sheet name '{}' contains '{}'",
            trimmed, c
        )));
    }
    Ok(())
}

/// `file://` locator for a local deck.
pub fn file_locator(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = absolute.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{}", text)
    } else {
        format!("file:///{}", text)
    }
}
