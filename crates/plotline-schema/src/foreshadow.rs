use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde_helpers::{lenient_timestamp, null_as_default};
use crate::ValidationError;

pub const TITLE_MAX_CHARS: usize = 200;
pub const IMPORTANCE_RANGE: (u8, u8) = (1, 10);
pub const REMIND_BEFORE_RANGE: (u32, u32) = (1, 50);
pub const DEFAULT_IMPORTANCE: u8 = 5;
pub const DEFAULT_REMIND_BEFORE_CHAPTERS: u32 = 5;

/// Reminders this close to their expected chapter are shown as imminent.
pub const IMMINENT_WITHIN_CHAPTERS: i32 = 3;

// ============================================================
// Classification
// ============================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ForeshadowType {
    Character,
    #[default]
    Plot,
    Item,
    Setting,
    Relationship,
}

impl ForeshadowType {
    pub const ALL: [Self; 5] = [
        Self::Character,
        Self::Plot,
        Self::Item,
        Self::Setting,
        Self::Relationship,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Plot => "plot",
            Self::Item => "item",
            Self::Setting => "setting",
            Self::Relationship => "relationship",
        }
    }
}

impl fmt::Display for ForeshadowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForeshadowType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: "foreshadow type",
                value: s.to_string(),
            })
    }
}

/// Lifecycle of a foreshadow.
///
/// `planted -> hinted -> resolved`, with `abandoned` reachable from either
/// unresolved state. `resolved` and `abandoned` are terminal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ForeshadowStatus {
    #[default]
    Planted,
    Hinted,
    Resolved,
    Abandoned,
}

impl ForeshadowStatus {
    pub const ALL: [Self; 4] = [Self::Planted, Self::Hinted, Self::Resolved, Self::Abandoned];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planted => "planted",
            Self::Hinted => "hinted",
            Self::Resolved => "resolved",
            Self::Abandoned => "abandoned",
        }
    }

    /// Not yet paid off and not given up on.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Planted | Self::Hinted)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Abandoned)
    }

    /// Whether `next` is reachable from `self`. Staying put is always allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }
        match (self, next) {
            (Self::Planted, Self::Hinted) => true,
            (Self::Planted | Self::Hinted, Self::Resolved | Self::Abandoned) => true,
            (Self::Planted, _) | (Self::Hinted, _) => false,
            (Self::Resolved, _) | (Self::Abandoned, _) => false,
        }
    }

    pub fn ensure_transition(self, next: Self) -> Result<(), ValidationError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(ValidationError::IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for ForeshadowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForeshadowStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: "foreshadow status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImportanceLevel {
    Low,
    Medium,
    High,
}

impl ImportanceLevel {
    pub fn of(importance: u8) -> Self {
        match importance {
            8.. => Self::High,
            5..=7 => Self::Medium,
            _ => Self::Low,
        }
    }
}

// ============================================================
// Entity
// ============================================================

/// A narrative element planted in one chapter and meant to pay off later.
///
/// Before resolution, `resolved_chapter_number` carries the advisory
/// expected-resolve chapter; see [`Foreshadow::expected_resolve_chapter`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Foreshadow {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub foreshadow_type: ForeshadowType,
    #[serde(default)]
    pub status: ForeshadowStatus,
    #[serde(default = "default_importance")]
    pub importance: u8,
    #[serde(default)]
    pub planted_chapter_id: Option<String>,
    #[serde(default)]
    pub planted_chapter_number: Option<u32>,
    #[serde(default)]
    pub planted_content: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub planted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_chapter_id: Option<String>,
    #[serde(default)]
    pub resolved_chapter_number: Option<u32>,
    #[serde(default)]
    pub resolved_content: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub related_characters: BTreeSet<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub related_foreshadows: BTreeSet<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeSet<String>,
    #[serde(default = "default_remind_before")]
    pub remind_before_chapters: u32,
    #[serde(default = "default_true")]
    pub auto_remind: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_importance() -> u8 {
    DEFAULT_IMPORTANCE
}

fn default_remind_before() -> u32 {
    DEFAULT_REMIND_BEFORE_CHAPTERS
}

fn default_true() -> bool {
    true
}

impl Foreshadow {
    /// The chapter this foreshadow is expected to pay off in, while unresolved.
    pub fn expected_resolve_chapter(&self) -> Option<u32> {
        match self.status {
            ForeshadowStatus::Resolved => None,
            _ => self.resolved_chapter_number,
        }
    }

    /// Still pending although its expected chapter has been reached.
    pub fn is_late(&self, current_chapter: u32) -> bool {
        self.status.is_pending()
            && self
                .expected_resolve_chapter()
                .is_some_and(|expected| expected <= current_chapter)
    }

    pub fn importance_level(&self) -> ImportanceLevel {
        ImportanceLevel::of(self.importance)
    }

    /// Resolution fields are populated exactly when the status is `resolved`.
    pub fn check_resolution_fields(&self) -> Result<(), String> {
        if self.status == ForeshadowStatus::Resolved {
            if self.resolved_chapter_number.is_none() {
                return Err(format!("foreshadow {} resolved without a chapter", self.id));
            }
            if self.resolved_at.is_none() {
                return Err(format!("foreshadow {} resolved without a timestamp", self.id));
            }
            return Ok(());
        }
        if self.resolved_at.is_some() || self.resolved_chapter_id.is_some() {
            return Err(format!(
                "foreshadow {} carries resolution fields while {}",
                self.id, self.status
            ));
        }
        Ok(())
    }
}

// ============================================================
// Requests
// ============================================================

/// Body of `POST /api/foreshadows`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForeshadowCreate {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub foreshadow_type: ForeshadowType,
    pub importance: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planted_chapter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planted_chapter_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planted_content: Option<String>,
    /// Expected resolve chapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_chapter_number: Option<u32>,
    #[serde(default)]
    pub related_characters: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub remind_before_chapters: u32,
    pub auto_remind: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ForeshadowCreate {
    pub fn new(
        project_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            description: description.into(),
            foreshadow_type: ForeshadowType::default(),
            importance: DEFAULT_IMPORTANCE,
            planted_chapter_id: None,
            planted_chapter_number: None,
            planted_content: None,
            resolved_chapter_number: None,
            related_characters: BTreeSet::new(),
            tags: BTreeSet::new(),
            remind_before_chapters: DEFAULT_REMIND_BEFORE_CHAPTERS,
            auto_remind: true,
            notes: None,
        }
    }

    pub fn with_type(mut self, foreshadow_type: ForeshadowType) -> Self {
        self.foreshadow_type = foreshadow_type;
        self
    }

    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance;
        self
    }

    pub fn planted_in(mut self, chapter_number: u32, excerpt: Option<String>) -> Self {
        self.planted_chapter_number = Some(chapter_number);
        self.planted_content = excerpt;
        self
    }

    pub fn expected_in(mut self, chapter_number: u32) -> Self {
        self.resolved_chapter_number = Some(chapter_number);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_character(mut self, character_id: impl Into<String>) -> Self {
        self.related_characters.insert(character_id.into());
        self
    }

    pub fn with_reminder(mut self, remind_before_chapters: u32, auto_remind: bool) -> Self {
        self.remind_before_chapters = remind_before_chapters;
        self.auto_remind = auto_remind;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_description(&self.description)?;
        validate_importance(self.importance)?;
        validate_remind_before(self.remind_before_chapters)?;
        if let Some(chapter) = self.resolved_chapter_number {
            validate_chapter_number("resolved_chapter_number", chapter)?;
        }
        if let Some(chapter) = self.planted_chapter_number {
            validate_chapter_number("planted_chapter_number", chapter)?;
        }
        Ok(())
    }
}

/// Body of `PUT /api/foreshadows/{id}`. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ForeshadowUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreshadow_type: Option<ForeshadowType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ForeshadowStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planted_chapter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planted_chapter_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planted_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_chapter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_chapter_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_characters: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_foreshadows: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remind_before_chapters: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_remind: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ForeshadowUpdate {
    pub fn status(status: ForeshadowStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Same rules as creation, applied to whichever fields are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(importance) = self.importance {
            validate_importance(importance)?;
        }
        if let Some(remind) = self.remind_before_chapters {
            validate_remind_before(remind)?;
        }
        if let Some(chapter) = self.resolved_chapter_number {
            validate_chapter_number("resolved_chapter_number", chapter)?;
        }
        if let Some(chapter) = self.planted_chapter_number {
            validate_chapter_number("planted_chapter_number", chapter)?;
        }
        Ok(())
    }
}

/// Body of `POST /api/foreshadows/{id}/resolve`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolveForeshadowRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_chapter_id: Option<String>,
    pub resolved_chapter_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ResolveForeshadowRequest {
    pub fn at_chapter(chapter_number: u32) -> Self {
        Self {
            resolved_chapter_id: None,
            resolved_chapter_number: chapter_number,
            resolved_content: None,
            notes: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_chapter_number("resolved_chapter_number", self.resolved_chapter_number)
    }
}

/// Optional narrowing of `GET /api/foreshadows`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeshadowFilter {
    pub status: Option<ForeshadowStatus>,
    pub foreshadow_type: Option<ForeshadowType>,
    /// Matches either the planted or the resolved chapter.
    pub chapter_number: Option<u32>,
}

impl ForeshadowFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(foreshadow_type) = self.foreshadow_type {
            pairs.push(("foreshadow_type", foreshadow_type.as_str().to_string()));
        }
        if let Some(chapter) = self.chapter_number {
            pairs.push(("chapter_number", chapter.to_string()));
        }
        pairs
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing { field: "title" });
    }
    let len = trimmed.chars().count();
    if len > TITLE_MAX_CHARS {
        return Err(ValidationError::TooLong {
            field: "title",
            max: TITLE_MAX_CHARS,
            len,
        });
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.trim().is_empty() {
        return Err(ValidationError::Missing {
            field: "description",
        });
    }
    Ok(())
}

fn validate_importance(importance: u8) -> Result<(), ValidationError> {
    ValidationError::check_range(
        "importance",
        i64::from(importance),
        i64::from(IMPORTANCE_RANGE.0),
        i64::from(IMPORTANCE_RANGE.1),
    )
}

fn validate_remind_before(remind: u32) -> Result<(), ValidationError> {
    ValidationError::check_range(
        "remind_before_chapters",
        i64::from(remind),
        i64::from(REMIND_BEFORE_RANGE.0),
        i64::from(REMIND_BEFORE_RANGE.1),
    )
}

fn validate_chapter_number(field: &'static str, chapter: u32) -> Result<(), ValidationError> {
    ValidationError::check_range(field, i64::from(chapter), 1, i64::from(u32::MAX))
}

// ============================================================
// Responses
// ============================================================

/// Counters reported alongside a foreshadow listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForeshadowStats {
    pub total: usize,
    pub planted: usize,
    pub resolved: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForeshadowListResponse {
    pub items: Vec<Foreshadow>,
    pub total: usize,
    #[serde(default)]
    pub planted_count: usize,
    #[serde(default)]
    pub resolved_count: usize,
    #[serde(default)]
    pub pending_count: usize,
}

impl ForeshadowListResponse {
    pub fn stats(&self) -> ForeshadowStats {
        ForeshadowStats {
            total: self.total,
            planted: self.planted_count,
            resolved: self.resolved_count,
            pending: self.pending_count,
        }
    }

    pub fn counts_balance(&self) -> bool {
        self.planted_count + self.resolved_count + self.pending_count == self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReminderUrgency {
    Overdue,
    Imminent,
    Upcoming,
}

/// A foreshadow whose expected chapter is close or already past.
/// Computed by the backend for a given current chapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForeshadowReminder {
    pub foreshadow_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub planted_chapter_number: u32,
    pub expected_resolve_chapter: u32,
    pub current_chapter: u32,
    pub chapters_remaining: i32,
    #[serde(default = "default_importance")]
    pub importance: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub related_characters: Vec<String>,
}

impl ForeshadowReminder {
    pub fn is_overdue(&self) -> bool {
        self.chapters_remaining <= 0
    }

    pub fn urgency(&self) -> ReminderUrgency {
        match self.chapters_remaining {
            i32::MIN..=0 => ReminderUrgency::Overdue,
            1..=IMMINENT_WITHIN_CHAPTERS => ReminderUrgency::Imminent,
            _ => ReminderUrgency::Upcoming,
        }
    }
}

/// Most urgent first; more important first among equally urgent.
pub fn sort_reminders(reminders: &mut [ForeshadowReminder]) {
    reminders.sort_by(|a, b| {
        a.chapters_remaining
            .cmp(&b.chapters_remaining)
            .then_with(|| b.importance.cmp(&a.importance))
    });
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForeshadowReminderResponse {
    pub reminders: Vec<ForeshadowReminder>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrgentForeshadow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expected_chapter: Option<u32>,
    #[serde(default = "default_importance")]
    pub importance: u8,
}

/// Pending foreshadows relevant to writing a given chapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterForeshadowContext {
    pub total_pending: usize,
    pub urgent_count: usize,
    #[serde(default)]
    pub foreshadow_summary: String,
    #[serde(default)]
    pub urgent_foreshadows: Vec<UrgentForeshadow>,
}
