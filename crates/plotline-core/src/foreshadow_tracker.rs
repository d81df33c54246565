//! View session over one project's foreshadows.
//!
//! The tracker owns a read-through cache of the backend's foreshadow list,
//! its counters and the reminder list for the current chapter. Every
//! mutation goes to the backend first; the cache is refreshed only after
//! the mutation's response arrives.

use std::sync::Arc;

use plotline_client::NovelBackend;
use plotline_schema::{
    sort_reminders, ChapterForeshadowContext, Foreshadow, ForeshadowCreate, ForeshadowFilter,
    ForeshadowReminder, ForeshadowStats, ForeshadowStatus, ForeshadowUpdate,
    ResolveForeshadowRequest, ValidationError, DEFAULT_REMINDER_DISPLAY_LIMIT,
};
use tracing::{debug, info, warn};

use crate::{ChapterDirectory, ChapterRef, InFlight, Notice, Notices, SessionError};

/// How a delete request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The backend no longer knew the id; treated as already done.
    AlreadyGone,
}

pub struct ForeshadowTracker {
    backend: Arc<dyn NovelBackend>,
    project_id: String,
    current_chapter: u32,
    chapters: Vec<ChapterRef>,
    filter: ForeshadowFilter,
    items: Vec<Foreshadow>,
    stats: ForeshadowStats,
    reminders: Vec<ForeshadowReminder>,
    display_limit: usize,
    in_flight: InFlight,
    notices: Notices,
}

impl ForeshadowTracker {
    pub fn new(backend: Arc<dyn NovelBackend>, project_id: impl Into<String>) -> Self {
        Self {
            backend,
            project_id: project_id.into(),
            current_chapter: 1,
            chapters: Vec::new(),
            filter: ForeshadowFilter::default(),
            items: Vec::new(),
            stats: ForeshadowStats::default(),
            reminders: Vec::new(),
            display_limit: DEFAULT_REMINDER_DISPLAY_LIMIT,
            in_flight: InFlight::new(),
            notices: Notices::default(),
        }
    }

    /// Open a tracker on the directory's active project, positioned at its
    /// furthest chapter.
    pub fn from_directory(
        backend: Arc<dyn NovelBackend>,
        directory: &dyn ChapterDirectory,
    ) -> Result<Self, SessionError> {
        let project_id = directory
            .current_project_id()
            .ok_or(SessionError::NoProject)?;
        let mut tracker = Self::new(backend, project_id);
        tracker.chapters = directory.chapters().to_vec();
        tracker.current_chapter = directory.current_chapter();
        Ok(tracker)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn current_chapter(&self) -> u32 {
        self.current_chapter
    }

    pub fn set_current_chapter(&mut self, chapter_number: u32) {
        self.current_chapter = chapter_number.max(1);
    }

    pub fn set_display_limit(&mut self, limit: usize) {
        self.display_limit = limit.max(1);
    }

    pub fn filter(&self) -> &ForeshadowFilter {
        &self.filter
    }

    /// Takes effect on the next [`refresh`](Self::refresh).
    pub fn set_filter(&mut self, filter: ForeshadowFilter) {
        self.filter = filter;
    }

    pub fn items(&self) -> &[Foreshadow] {
        &self.items
    }

    pub fn find(&self, id: &str) -> Option<&Foreshadow> {
        self.items.iter().find(|f| f.id == id)
    }

    /// Counters exactly as the backend reported them.
    pub fn stats(&self) -> ForeshadowStats {
        self.stats
    }

    pub fn reminders(&self) -> &[ForeshadowReminder] {
        &self.reminders
    }

    /// The reminders worth showing, most urgent first.
    pub fn top_reminders(&self) -> &[ForeshadowReminder] {
        let end = self.reminders.len().min(self.display_limit);
        &self.reminders[..end]
    }

    /// Unresolved foreshadows whose expected chapter has already been reached.
    pub fn late(&self) -> impl Iterator<Item = &Foreshadow> {
        let current = self.current_chapter;
        self.items.iter().filter(move |f| f.is_late(current))
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.in_flight.is_busy(id)
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    /// Fetch the list and counters. On failure the previous cache stays.
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        let resp = match self
            .backend
            .list_foreshadows(&self.project_id, &self.filter)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(project_id = %self.project_id, error = %e, "failed to load foreshadows");
                self.notices.error(format!("加载伏笔失败: {e}"));
                return Err(e.into());
            }
        };

        if !resp.counts_balance() {
            warn!(
                project_id = %self.project_id,
                total = resp.total,
                planted = resp.planted_count,
                resolved = resp.resolved_count,
                pending = resp.pending_count,
                "foreshadow counters do not add up to total"
            );
        }
        for foreshadow in &resp.items {
            if let Err(problem) = foreshadow.check_resolution_fields() {
                warn!(%problem, "inconsistent foreshadow from backend");
            }
        }

        self.stats = resp.stats();
        self.items = resp.items;
        debug!(project_id = %self.project_id, count = self.items.len(), "foreshadow cache refreshed");
        Ok(())
    }

    /// Fetch reminders for the current chapter. A failure only warns; the
    /// previous reminders stay.
    pub async fn refresh_reminders(&mut self) -> Result<(), SessionError> {
        match self
            .backend
            .foreshadow_reminders(&self.project_id, self.current_chapter)
            .await
        {
            Ok(resp) => {
                let mut reminders = resp.reminders;
                sort_reminders(&mut reminders);
                self.reminders = reminders;
                debug!(
                    project_id = %self.project_id,
                    current_chapter = self.current_chapter,
                    count = self.reminders.len(),
                    "reminders refreshed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(project_id = %self.project_id, error = %e, "failed to load reminders");
                self.notices.warning(format!("加载伏笔提醒失败: {e}"));
                Err(e.into())
            }
        }
    }

    /// List first, reminders second.
    pub async fn load(&mut self) -> Result<(), SessionError> {
        self.refresh().await?;
        self.refresh_reminders().await
    }

    async fn refresh_after_mutation(&mut self) {
        // Failures are already surfaced as notices.
        let _ = self.refresh().await;
        let _ = self.refresh_reminders().await;
    }

    /// Fetch one foreshadow and replace it in the cache.
    pub async fn get(&mut self, id: &str) -> Result<Foreshadow, SessionError> {
        match self.backend.get_foreshadow(id).await {
            Ok(foreshadow) => {
                self.upsert(foreshadow.clone());
                Ok(foreshadow)
            }
            Err(e) => {
                if e.is_not_found() {
                    self.items.retain(|f| f.id != id);
                }
                self.notices.error(format!("加载伏笔失败: {e}"));
                Err(e.into())
            }
        }
    }

    pub async fn create(&mut self, mut draft: ForeshadowCreate) -> Result<Foreshadow, SessionError> {
        draft.project_id = self.project_id.clone();
        if let Err(e) = draft.validate() {
            self.notices.error(e.to_string());
            return Err(e.into());
        }

        // Keyed by title so the same draft cannot be submitted twice.
        let key = format!("new:{}", draft.title);
        self.in_flight.begin(&key)?;
        let result = self.backend.create_foreshadow(&draft).await;
        self.in_flight.finish(&key);

        let created = match result {
            Ok(created) => created,
            Err(e) => {
                warn!(project_id = %self.project_id, error = %e, "failed to create foreshadow");
                self.notices.error(format!("创建伏笔失败: {e}"));
                return Err(e.into());
            }
        };
        info!(id = %created.id, title = %created.title, "foreshadow created");
        self.notices.success(format!("伏笔「{}」已创建", created.title));
        self.refresh_after_mutation().await;
        Ok(created)
    }

    /// Partial update. A status change must follow the lifecycle, and
    /// `resolved` is reached only through [`resolve`](Self::resolve).
    /// `resolved_chapter_number` doubles as the expected chapter, so it may
    /// be set at any time; the other resolution fields may not.
    pub async fn update(
        &mut self,
        id: &str,
        update: ForeshadowUpdate,
    ) -> Result<Foreshadow, SessionError> {
        if let Err(e) = self.check_update(id, &update) {
            self.notices.error(e.to_string());
            return Err(e.into());
        }
        if update.is_empty() {
            if let Some(cached) = self.find(id) {
                return Ok(cached.clone());
            }
        }

        self.in_flight.begin(id)?;
        let result = self.backend.update_foreshadow(id, &update).await;
        self.in_flight.finish(id);

        let updated = match result {
            Ok(updated) => updated,
            Err(e) => {
                warn!(id, error = %e, "failed to update foreshadow");
                self.notices.error(format!("更新伏笔失败: {e}"));
                return Err(e.into());
            }
        };
        info!(id, status = %updated.status, "foreshadow updated");
        self.notices.success("伏笔已更新");
        self.upsert(updated.clone());
        self.refresh_after_mutation().await;
        Ok(updated)
    }

    fn check_update(&self, id: &str, update: &ForeshadowUpdate) -> Result<(), ValidationError> {
        update.validate()?;
        let current = self.find(id).map(|f| f.status);
        if let Some(next) = update.status {
            // Only the resolve endpoint stamps resolved_at.
            if next == ForeshadowStatus::Resolved && current != Some(ForeshadowStatus::Resolved) {
                return Err(ValidationError::ResolveRequired);
            }
            if let Some(current) = current {
                current.ensure_transition(next)?;
            }
        }
        if update.status.or(current) != Some(ForeshadowStatus::Resolved) {
            if update.resolved_chapter_id.is_some() {
                return Err(ValidationError::OnlyWhenResolved {
                    field: "resolved_chapter_id",
                });
            }
            if update.resolved_content.is_some() {
                return Err(ValidationError::OnlyWhenResolved {
                    field: "resolved_content",
                });
            }
        }
        Ok(())
    }

    pub async fn hint(&mut self, id: &str) -> Result<Foreshadow, SessionError> {
        self.update(id, ForeshadowUpdate::status(ForeshadowStatus::Hinted))
            .await
    }

    pub async fn abandon(&mut self, id: &str) -> Result<Foreshadow, SessionError> {
        self.update(id, ForeshadowUpdate::status(ForeshadowStatus::Abandoned))
            .await
    }

    /// Delete `id`. A not-found answer counts as success: the entity is
    /// gone either way, and the local removal is never rolled back.
    pub async fn delete(&mut self, id: &str) -> Result<DeleteOutcome, SessionError> {
        self.in_flight.begin(id)?;
        let result = self.backend.delete_foreshadow(id).await;
        self.in_flight.finish(id);

        let outcome = match result {
            Ok(()) => {
                info!(id, "foreshadow deleted");
                self.notices.success("伏笔已删除");
                DeleteOutcome::Deleted
            }
            Err(e) if e.is_not_found() => {
                debug!(id, "foreshadow already gone");
                self.notices.info("伏笔已不存在");
                DeleteOutcome::AlreadyGone
            }
            Err(e) => {
                warn!(id, error = %e, "failed to delete foreshadow");
                self.notices.error(format!("删除伏笔失败: {e}"));
                return Err(e.into());
            }
        };
        self.items.retain(|f| f.id != id);
        self.refresh_after_mutation().await;
        Ok(outcome)
    }

    /// Mark `id` resolved at `chapter_number`, or at the current chapter
    /// when none is given.
    pub async fn resolve(
        &mut self,
        id: &str,
        chapter_number: Option<u32>,
        resolved_content: Option<String>,
        notes: Option<String>,
    ) -> Result<Foreshadow, SessionError> {
        let mut request =
            ResolveForeshadowRequest::at_chapter(chapter_number.unwrap_or(self.current_chapter));
        request.resolved_content = resolved_content.filter(|c| !c.trim().is_empty());
        request.notes = notes.filter(|n| !n.trim().is_empty());
        request.resolved_chapter_id = self
            .chapters
            .iter()
            .find(|c| c.chapter_number == request.resolved_chapter_number)
            .map(|c| c.id.clone());

        let checked = request.validate().and_then(|()| match self.find(id) {
            Some(current) => current.status.ensure_transition(ForeshadowStatus::Resolved),
            None => Ok(()),
        });
        if let Err(e) = checked {
            self.notices.error(e.to_string());
            return Err(e.into());
        }

        self.in_flight.begin(id)?;
        let result = self.backend.resolve_foreshadow(id, &request).await;
        self.in_flight.finish(id);

        let resolved = match result {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(id, error = %e, "failed to resolve foreshadow");
                self.notices.error(format!("回收伏笔失败: {e}"));
                return Err(e.into());
            }
        };
        info!(
            id,
            chapter = request.resolved_chapter_number,
            "foreshadow resolved"
        );
        self.notices
            .success(format!("伏笔已在第 {} 章回收", request.resolved_chapter_number));
        self.upsert(resolved.clone());
        self.refresh_after_mutation().await;
        Ok(resolved)
    }

    /// Pending and urgent foreshadows as seen from one chapter.
    pub async fn chapter_context(
        &mut self,
        chapter_id: &str,
    ) -> Result<ChapterForeshadowContext, SessionError> {
        self.backend
            .chapter_foreshadow_context(chapter_id)
            .await
            .map_err(|e| {
                self.notices.warning(format!("加载章节伏笔上下文失败: {e}"));
                e.into()
            })
    }

    fn upsert(&mut self, foreshadow: Foreshadow) {
        match self.items.iter_mut().find(|f| f.id == foreshadow.id) {
            Some(slot) => *slot = foreshadow,
            None => self.items.push(foreshadow),
        }
    }
}
