use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde_helpers::{lenient_timestamp, null_as_default};
use crate::ValidationError;

/// Human review state of a refined chapter. Missing or `null` on the wire
/// means nobody has looked at it yet.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two verdicts a reviewer can hand down.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl From<ReviewDecision> for ReviewStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approved => Self::Approved,
            ReviewDecision::Rejected => Self::Rejected,
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ReviewStatus::from(*self).fmt(f)
    }
}

/// One row of `GET /api/refinement/project/{id}/chapters`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefinedChapter {
    pub id: String,
    pub chapter_number: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub word_count: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_refined: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub refined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub review_status: ReviewStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefinedChapterList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub chapters: Vec<RefinedChapter>,
}

/// Body of `POST /api/refinement/chapter/{id}/review`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewRequest {
    pub status: ReviewDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewAck {
    pub chapter_id: String,
    pub review_status: ReviewStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Project-wide review counters. `approved + rejected + pending == total`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewSummary {
    pub total: u32,
    pub approved: u32,
    pub rejected: u32,
    pub pending: u32,
}

impl ReviewSummary {
    pub fn is_balanced(&self) -> bool {
        self.approved + self.rejected + self.pending == self.total
    }

    fn bucket_mut(&mut self, status: ReviewStatus) -> &mut u32 {
        match status {
            ReviewStatus::Pending => &mut self.pending,
            ReviewStatus::Approved => &mut self.approved,
            ReviewStatus::Rejected => &mut self.rejected,
        }
    }

    /// Move one chapter from its previous bucket into the new one.
    pub fn apply_review(&mut self, previous: ReviewStatus, next: ReviewStatus) {
        if previous == next {
            return;
        }
        let from = self.bucket_mut(previous);
        *from = from.saturating_sub(1);
        *self.bucket_mut(next) += 1;
    }
}

/// One aligned slice of a chapter before and after refinement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentDiff {
    pub segment: u32,
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub refined: Option<String>,
    #[serde(default)]
    pub original_words: u64,
    #[serde(default)]
    pub refined_words: u64,
}

impl SegmentDiff {
    pub fn word_delta(&self) -> i64 {
        word_delta(self.original_words, self.refined_words)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSide {
    Original,
    Refined,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiffData {
    pub chapter_id: String,
    pub chapter_number: u32,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_word_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub refined_word_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub segments: Vec<SegmentDiff>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl DiffData {
    pub fn word_delta(&self) -> i64 {
        word_delta(self.original_word_count, self.refined_word_count)
    }

    /// A refinement that did not shrink the chapter is shown favorably.
    pub fn delta_is_favorable(&self) -> bool {
        self.word_delta() >= 0
    }

    /// Segment texts joined by a blank line; missing text counts as empty.
    pub fn full_text(&self, side: TextSide) -> String {
        self.segments
            .iter()
            .map(|segment| match side {
                TextSide::Original => segment.original.as_deref().unwrap_or_default(),
                TextSide::Refined => segment.refined.as_deref().unwrap_or_default(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn word_delta(original: u64, refined: u64) -> i64 {
    i64::try_from(refined).unwrap_or(i64::MAX) - i64::try_from(original).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Txt,
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(ValidationError::UnknownVariant {
                kind: "export format",
                value: other.to_string(),
            }),
        }
    }
}
