//! Sequential human review of refined chapters.
//!
//! Review decisions are applied to the local chapter list and summary
//! counters before the backend confirms them. Each decision is an
//! [`OptimisticUpdate`]; a rejected write is undone locally and leaves the
//! flow flagged for a full reload, which [`ReviewFlow::review`] performs
//! right away.

use std::sync::Arc;

use plotline_client::{ApiResult, ExportFile, NovelBackend};
use plotline_schema::{
    DiffData, ExportFormat, RefinedChapter, ReviewAck, ReviewDecision, ReviewRequest,
    ReviewStatus, ReviewSummary, TextSide,
};
use tracing::{debug, info, warn};

use crate::{
    ChapterDirectory, InFlight, Notice, Notices, OptimisticPhase, OptimisticUpdate, SessionError,
};

/// Handle for one diff request. Stale once the user has moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffTicket {
    chapter_id: String,
    epoch: u64,
}

impl DiffTicket {
    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }
}

/// A review decision already applied locally and awaiting the backend.
#[derive(Debug)]
pub struct ReviewTicket {
    chapter_id: String,
    decision: ReviewDecision,
    comment: Option<String>,
    generation: u64,
    update: OptimisticUpdate<ReviewStatus>,
}

impl ReviewTicket {
    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    pub fn decision(&self) -> ReviewDecision {
        self.decision
    }

    pub fn phase(&self) -> OptimisticPhase {
        self.update.phase()
    }

    pub fn request(&self) -> ReviewRequest {
        ReviewRequest {
            status: self.decision,
            comment: self.comment.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    Confirmed { advanced: bool },
    Reverted { error: String },
}

/// What the review screen shows for the current chapter.
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterView<'a> {
    Empty,
    Loading {
        chapter: &'a RefinedChapter,
    },
    /// The diff could not be loaded.
    Unavailable {
        chapter: &'a RefinedChapter,
    },
    ReadOnly {
        chapter: &'a RefinedChapter,
        refined: String,
    },
    Compare {
        chapter: &'a RefinedChapter,
        original: String,
        refined: String,
        original_words: u64,
        refined_words: u64,
        delta: i64,
        favorable: bool,
    },
}

pub struct ReviewFlow {
    backend: Arc<dyn NovelBackend>,
    project_id: String,
    chapters: Vec<RefinedChapter>,
    summary: ReviewSummary,
    index: usize,
    diff: Option<DiffData>,
    diff_loading: bool,
    // Bumped whenever the diff on screen stops being wanted.
    epoch: u64,
    // Bumped on every reload of the chapter list.
    generation: u64,
    in_flight: InFlight,
    summary_dirty: bool,
    needs_reload: bool,
    notices: Notices,
}

impl ReviewFlow {
    pub fn new(backend: Arc<dyn NovelBackend>, project_id: impl Into<String>) -> Self {
        Self {
            backend,
            project_id: project_id.into(),
            chapters: Vec::new(),
            summary: ReviewSummary::default(),
            index: 0,
            diff: None,
            diff_loading: false,
            epoch: 0,
            generation: 0,
            in_flight: InFlight::new(),
            summary_dirty: false,
            needs_reload: false,
            notices: Notices::default(),
        }
    }

    pub fn from_directory(
        backend: Arc<dyn NovelBackend>,
        directory: &dyn ChapterDirectory,
    ) -> Result<Self, SessionError> {
        let project_id = directory
            .current_project_id()
            .ok_or(SessionError::NoProject)?;
        Ok(Self::new(backend, project_id))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Refined chapters only, in backend order.
    pub fn chapters(&self) -> &[RefinedChapter] {
        &self.chapters
    }

    pub fn summary(&self) -> ReviewSummary {
        self.summary
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn current(&self) -> Option<&RefinedChapter> {
        self.chapters.get(self.index)
    }

    pub fn diff(&self) -> Option<&DiffData> {
        self.diff.as_ref()
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.chapters.len()
    }

    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    /// Whether the current chapter's review buttons should be disabled.
    pub fn is_busy(&self) -> bool {
        self.current()
            .is_some_and(|chapter| self.in_flight.is_busy(&chapter.id))
    }

    /// Set after a reverted review until the next successful reload.
    pub fn needs_reload(&self) -> bool {
        self.needs_reload
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    /// Fetch the chapter list and the summary. The summary always comes from
    /// the backend; locally applied reviews are replaced by it.
    pub async fn load_chapters(&mut self) -> Result<(), SessionError> {
        let (chapters, summary) = tokio::join!(
            self.backend.project_chapters(&self.project_id),
            self.backend.review_summary(&self.project_id),
        );

        let chapters = match chapters {
            Ok(chapters) => chapters,
            Err(e) => {
                warn!(project_id = %self.project_id, error = %e, "failed to load refined chapters");
                self.notices.error(format!("加载章节失败: {e}"));
                return Err(e.into());
            }
        };

        let current_id = self.current().map(|c| c.id.clone());
        self.chapters = chapters.into_iter().filter(|c| c.is_refined).collect();
        self.index = current_id
            .as_deref()
            .and_then(|id| self.chapters.iter().position(|c| c.id == id))
            .unwrap_or_else(|| self.index.min(self.chapters.len().saturating_sub(1)));
        if self.current().map(|c| c.id.as_str()) != current_id.as_deref() {
            self.reset_diff();
        }
        self.generation += 1;

        match summary {
            Ok(summary) => {
                if self.summary_dirty && summary != self.summary {
                    warn!(
                        project_id = %self.project_id,
                        local = ?self.summary,
                        backend = ?summary,
                        "review summary differs from locally applied reviews"
                    );
                }
                if !summary.is_balanced() {
                    warn!(project_id = %self.project_id, ?summary, "review summary does not balance");
                }
                self.summary = summary;
                self.summary_dirty = false;
                self.needs_reload = false;
            }
            Err(e) => {
                warn!(project_id = %self.project_id, error = %e, "failed to load review summary");
                self.notices.warning(format!("加载审核统计失败: {e}"));
            }
        }

        debug!(
            project_id = %self.project_id,
            chapters = self.chapters.len(),
            "refined chapters loaded"
        );
        Ok(())
    }

    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.index += 1;
        self.reset_diff();
        true
    }

    pub fn prev(&mut self) -> bool {
        if !self.has_prev() {
            return false;
        }
        self.index -= 1;
        self.reset_diff();
        true
    }

    /// Jump to `index`. Out of range or already there is a no-op.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.chapters.len() || index == self.index {
            return false;
        }
        self.index = index;
        self.reset_diff();
        true
    }

    fn reset_diff(&mut self) {
        self.epoch += 1;
        self.diff = None;
        self.diff_loading = false;
    }

    /// Start loading the current chapter's diff. The previous diff is
    /// dropped so nothing stale is shown meanwhile.
    pub fn begin_diff_load(&mut self) -> Option<DiffTicket> {
        let chapter_id = self.current()?.id.clone();
        self.reset_diff();
        self.diff_loading = true;
        Some(DiffTicket {
            chapter_id,
            epoch: self.epoch,
        })
    }

    /// Deliver a diff response. Returns false, changing nothing, when the
    /// user has navigated away since the ticket was issued.
    pub fn apply_diff(&mut self, ticket: DiffTicket, result: ApiResult<DiffData>) -> bool {
        let still_current = self.current().is_some_and(|c| c.id == ticket.chapter_id);
        if ticket.epoch != self.epoch || !still_current {
            debug!(chapter_id = %ticket.chapter_id, "discarding stale diff response");
            return false;
        }
        self.diff_loading = false;
        match result {
            Ok(diff) => self.diff = Some(diff),
            Err(e) => {
                warn!(chapter_id = %ticket.chapter_id, error = %e, "failed to load diff");
                self.notices.warning(format!("加载对比失败: {e}"));
                self.diff = None;
            }
        }
        true
    }

    pub async fn load_diff(&mut self) -> Option<&DiffData> {
        let ticket = self.begin_diff_load()?;
        let result = self.backend.chapter_diff(&ticket.chapter_id).await;
        self.apply_diff(ticket, result);
        self.diff.as_ref()
    }

    pub fn view(&self) -> ChapterView<'_> {
        let Some(chapter) = self.current() else {
            return ChapterView::Empty;
        };
        if self.diff_loading {
            return ChapterView::Loading { chapter };
        }
        let Some(diff) = &self.diff else {
            return ChapterView::Unavailable { chapter };
        };
        match chapter.review_status {
            ReviewStatus::Approved => ChapterView::ReadOnly {
                chapter,
                refined: diff.full_text(TextSide::Refined),
            },
            ReviewStatus::Pending | ReviewStatus::Rejected => ChapterView::Compare {
                chapter,
                original: diff.full_text(TextSide::Original),
                refined: diff.full_text(TextSide::Refined),
                original_words: diff.original_word_count,
                refined_words: diff.refined_word_count,
                delta: diff.word_delta(),
                favorable: diff.delta_is_favorable(),
            },
        }
    }

    /// Apply `decision` to the current chapter locally and return the ticket
    /// to complete once the backend answers.
    pub fn begin_review(
        &mut self,
        decision: ReviewDecision,
        comment: Option<String>,
    ) -> Result<ReviewTicket, SessionError> {
        let chapter = self.current().ok_or(SessionError::NoChapter)?;
        let chapter_id = chapter.id.clone();
        let previous = chapter.review_status;
        self.in_flight.begin(&chapter_id)?;

        let mut update = OptimisticUpdate::new(previous);
        self.set_status(&chapter_id, decision.into());
        update.advance(OptimisticPhase::Applying);

        Ok(ReviewTicket {
            chapter_id,
            decision,
            comment: comment.filter(|c| !c.trim().is_empty()),
            generation: self.generation,
            update,
        })
    }

    /// Settle a review with the backend's answer.
    pub fn complete_review(
        &mut self,
        mut ticket: ReviewTicket,
        result: ApiResult<ReviewAck>,
    ) -> ReviewOutcome {
        self.in_flight.finish(&ticket.chapter_id);
        let next = ReviewStatus::from(ticket.decision);

        match result {
            Ok(ack) => {
                ticket.update.advance(OptimisticPhase::Confirmed);
                // No-op unless a reload replaced the local change meanwhile.
                self.set_status(&ticket.chapter_id, next);
                self.summary_dirty = true;
                if ack.review_status != next {
                    warn!(
                        chapter_id = %ticket.chapter_id,
                        sent = %next,
                        acknowledged = %ack.review_status,
                        "backend acknowledged a different review status"
                    );
                }
                info!(chapter_id = %ticket.chapter_id, status = %next, "chapter reviewed");
                self.notices.success(match ticket.decision {
                    ReviewDecision::Approved => "已批准",
                    ReviewDecision::Rejected => "已拒绝",
                });

                let still_current = self.current().is_some_and(|c| c.id == ticket.chapter_id);
                let advanced = still_current && self.next();
                ReviewOutcome::Confirmed { advanced }
            }
            Err(e) => {
                ticket.update.advance(OptimisticPhase::Reverted);
                if ticket.generation == self.generation {
                    self.set_status(&ticket.chapter_id, *ticket.update.undo());
                }
                self.needs_reload = true;
                warn!(chapter_id = %ticket.chapter_id, error = %e, "review rejected by backend, reverted");
                self.notices.error(format!("审核失败: {e}"));
                ReviewOutcome::Reverted {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Review the current chapter. A reverted review reloads the whole list.
    pub async fn review(
        &mut self,
        decision: ReviewDecision,
        comment: Option<String>,
    ) -> Result<ReviewOutcome, SessionError> {
        let ticket = self.begin_review(decision, comment)?;
        let result = self
            .backend
            .review_chapter(&ticket.chapter_id, &ticket.request())
            .await;
        let outcome = self.complete_review(ticket, result);
        if matches!(outcome, ReviewOutcome::Reverted { .. }) {
            // A failed reload leaves needs_reload set and is already a notice.
            let _ = self.load_chapters().await;
        }
        Ok(outcome)
    }

    /// Move one chapter between summary buckets, keyed on its local status.
    fn set_status(&mut self, chapter_id: &str, next: ReviewStatus) {
        let Some(chapter) = self.chapters.iter_mut().find(|c| c.id == chapter_id) else {
            return;
        };
        let previous = std::mem::replace(&mut chapter.review_status, next);
        self.summary.apply_review(previous, next);
    }

    /// Download the project. Local state is untouched.
    pub async fn export(
        &mut self,
        format: ExportFormat,
        include_original: bool,
    ) -> Result<ExportFile, SessionError> {
        match self
            .backend
            .export_project(&self.project_id, format, include_original)
            .await
        {
            Ok(file) => {
                info!(
                    project_id = %self.project_id,
                    format = %format,
                    bytes = file.bytes.len(),
                    "project exported"
                );
                self.notices.success(format!("已导出 {}", file.file_name));
                Ok(file)
            }
            Err(e) => {
                warn!(project_id = %self.project_id, error = %e, "export failed");
                self.notices.error(format!("导出失败: {e}"));
                Err(e.into())
            }
        }
    }
}
