//! In-memory [`NovelBackend`] for session tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use plotline_client::{ApiError, ApiResult, ExportFile, NovelBackend};
use plotline_schema::{
    sort_reminders, ChapterForeshadowContext, DiffData, ExportFormat, Foreshadow,
    ForeshadowCreate, ForeshadowFilter, ForeshadowListResponse, ForeshadowReminder,
    ForeshadowReminderResponse, ForeshadowStatus, ForeshadowUpdate, RefinedChapter,
    ResolveForeshadowRequest, ReviewAck, ReviewRequest, ReviewStatus, ReviewSummary,
    SegmentDiff,
};

#[derive(Default)]
pub(crate) struct FakeState {
    pub foreshadows: Vec<Foreshadow>,
    pub chapters: Vec<RefinedChapter>,
    pub summary: ReviewSummary,
    pub failing: HashSet<&'static str>,
    pub calls: Vec<String>,
    next_id: u32,
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.state.lock().unwrap().failing.remove(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == op).count()
    }

    pub fn seed_foreshadow(&self, draft: ForeshadowCreate) -> Foreshadow {
        self.state.lock().unwrap().insert(draft)
    }

    pub fn seed_chapter(&self, id: &str, number: u32, refined: bool, status: ReviewStatus) {
        let mut state = self.state.lock().unwrap();
        state.chapters.push(RefinedChapter {
            id: id.to_string(),
            chapter_number: number,
            title: format!("Chapter {number}"),
            word_count: Some(3000),
            is_refined: refined,
            refined_at: None,
            model: None,
            review_status: status,
        });
        if refined {
            state.summary.total += 1;
            match status {
                ReviewStatus::Pending => state.summary.pending += 1,
                ReviewStatus::Approved => state.summary.approved += 1,
                ReviewStatus::Rejected => state.summary.rejected += 1,
            }
        }
    }

    pub fn foreshadow(&self, id: &str) -> Option<Foreshadow> {
        let state = self.state.lock().unwrap();
        state.foreshadows.iter().find(|f| f.id == id).cloned()
    }

    fn enter(&self, op: &'static str) -> ApiResult<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op.to_string());
        if state.failing.contains(op) {
            return Err(ApiError::Server {
                resource: op.to_string(),
                status: 500,
                body: "injected failure".into(),
            });
        }
        Ok(state)
    }
}

impl FakeState {
    fn insert(&mut self, draft: ForeshadowCreate) -> Foreshadow {
        self.next_id += 1;
        let foreshadow = Foreshadow {
            id: format!("f-{}", self.next_id),
            project_id: draft.project_id,
            title: draft.title,
            description: draft.description,
            foreshadow_type: draft.foreshadow_type,
            status: ForeshadowStatus::Planted,
            importance: draft.importance,
            planted_chapter_id: draft.planted_chapter_id,
            planted_chapter_number: draft.planted_chapter_number,
            planted_content: draft.planted_content,
            planted_at: Some(Utc::now()),
            resolved_chapter_id: None,
            resolved_chapter_number: draft.resolved_chapter_number,
            resolved_content: None,
            resolved_at: None,
            related_characters: draft.related_characters,
            related_foreshadows: Default::default(),
            tags: draft.tags,
            remind_before_chapters: draft.remind_before_chapters,
            auto_remind: draft.auto_remind,
            notes: draft.notes,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        self.foreshadows.push(foreshadow.clone());
        foreshadow
    }

    fn find_mut(&mut self, id: &str) -> ApiResult<&mut Foreshadow> {
        self.foreshadows
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("foreshadow {id}"),
            })
    }
}

#[async_trait]
impl NovelBackend for FakeBackend {
    async fn list_foreshadows(
        &self,
        project_id: &str,
        filter: &ForeshadowFilter,
    ) -> ApiResult<ForeshadowListResponse> {
        let state = self.enter("list")?;
        let items: Vec<Foreshadow> = state
            .foreshadows
            .iter()
            .filter(|f| f.project_id == project_id)
            .filter(|f| filter.status.map_or(true, |s| f.status == s))
            .filter(|f| filter.foreshadow_type.map_or(true, |t| f.foreshadow_type == t))
            .filter(|f| {
                filter.chapter_number.map_or(true, |n| {
                    f.planted_chapter_number == Some(n) || f.resolved_chapter_number == Some(n)
                })
            })
            .cloned()
            .collect();
        let count = |pred: fn(&Foreshadow) -> bool| items.iter().filter(|&f| pred(f)).count();
        // Pending overlaps planted, exactly as the real backend counts it.
        Ok(ForeshadowListResponse {
            total: items.len(),
            planted_count: count(|f| f.status == ForeshadowStatus::Planted),
            resolved_count: count(|f| f.status == ForeshadowStatus::Resolved),
            pending_count: count(|f| f.status.is_pending()),
            items,
        })
    }

    async fn get_foreshadow(&self, id: &str) -> ApiResult<Foreshadow> {
        let mut state = self.enter("get")?;
        state.find_mut(id).map(|f| f.clone())
    }

    async fn foreshadow_reminders(
        &self,
        project_id: &str,
        current_chapter: u32,
    ) -> ApiResult<ForeshadowReminderResponse> {
        let state = self.enter("reminders")?;
        let mut reminders: Vec<ForeshadowReminder> = state
            .foreshadows
            .iter()
            .filter(|f| f.project_id == project_id && f.status.is_pending() && f.auto_remind)
            .filter_map(|f| {
                let expected = f.resolved_chapter_number?;
                let remaining = expected as i32 - current_chapter as i32;
                (remaining <= f.remind_before_chapters as i32).then(|| ForeshadowReminder {
                    foreshadow_id: f.id.clone(),
                    title: f.title.clone(),
                    description: f.description.clone(),
                    planted_chapter_number: f.planted_chapter_number.unwrap_or(0),
                    expected_resolve_chapter: expected,
                    current_chapter,
                    chapters_remaining: remaining,
                    importance: f.importance,
                    related_characters: f.related_characters.iter().cloned().collect(),
                })
            })
            .collect();
        sort_reminders(&mut reminders);
        Ok(ForeshadowReminderResponse {
            total: reminders.len(),
            reminders,
        })
    }

    async fn create_foreshadow(&self, request: &ForeshadowCreate) -> ApiResult<Foreshadow> {
        let mut state = self.enter("create")?;
        Ok(state.insert(request.clone()))
    }

    async fn update_foreshadow(
        &self,
        id: &str,
        update: &ForeshadowUpdate,
    ) -> ApiResult<Foreshadow> {
        let mut state = self.enter("update")?;
        let f = state.find_mut(id)?;
        if let Some(title) = &update.title {
            f.title = title.clone();
        }
        if let Some(description) = &update.description {
            f.description = description.clone();
        }
        if let Some(status) = update.status {
            f.status = status;
        }
        if let Some(importance) = update.importance {
            f.importance = importance;
        }
        if let Some(chapter) = update.resolved_chapter_number {
            f.resolved_chapter_number = Some(chapter);
        }
        if let Some(chapter_id) = &update.resolved_chapter_id {
            f.resolved_chapter_id = Some(chapter_id.clone());
        }
        if let Some(content) = &update.resolved_content {
            f.resolved_content = Some(content.clone());
        }
        if let Some(auto_remind) = update.auto_remind {
            f.auto_remind = auto_remind;
        }
        if let Some(tags) = &update.tags {
            f.tags = tags.clone();
        }
        f.updated_at = Some(Utc::now());
        Ok(f.clone())
    }

    async fn delete_foreshadow(&self, id: &str) -> ApiResult<()> {
        let mut state = self.enter("delete")?;
        let before = state.foreshadows.len();
        state.foreshadows.retain(|f| f.id != id);
        if state.foreshadows.len() == before {
            return Err(ApiError::NotFound {
                resource: format!("foreshadow {id}"),
            });
        }
        Ok(())
    }

    async fn resolve_foreshadow(
        &self,
        id: &str,
        request: &ResolveForeshadowRequest,
    ) -> ApiResult<Foreshadow> {
        let mut state = self.enter("resolve")?;
        let f = state.find_mut(id)?;
        f.status = ForeshadowStatus::Resolved;
        if request.resolved_chapter_id.is_some() {
            f.resolved_chapter_id = request.resolved_chapter_id.clone();
        }
        f.resolved_chapter_number = Some(request.resolved_chapter_number);
        f.resolved_content = request.resolved_content.clone();
        f.resolved_at = Some(Utc::now());
        if request.notes.is_some() {
            f.notes = request.notes.clone();
        }
        Ok(f.clone())
    }

    async fn chapter_foreshadow_context(
        &self,
        chapter_id: &str,
    ) -> ApiResult<ChapterForeshadowContext> {
        let _state = self.enter("context")?;
        Err(ApiError::NotFound {
            resource: format!("chapter {chapter_id}"),
        })
    }

    async fn project_chapters(&self, _project_id: &str) -> ApiResult<Vec<RefinedChapter>> {
        let state = self.enter("chapters")?;
        Ok(state.chapters.clone())
    }

    async fn review_summary(&self, _project_id: &str) -> ApiResult<ReviewSummary> {
        let state = self.enter("summary")?;
        Ok(state.summary)
    }

    async fn chapter_diff(&self, chapter_id: &str) -> ApiResult<DiffData> {
        let state = self.enter("diff")?;
        let chapter = state
            .chapters
            .iter()
            .find(|c| c.id == chapter_id && c.is_refined)
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("diff of chapter {chapter_id}"),
            })?;
        Ok(DiffData {
            chapter_id: chapter.id.clone(),
            chapter_number: chapter.chapter_number,
            version: Some(1),
            model_used: Some("fake".into()),
            original_word_count: 1000,
            refined_word_count: 1100,
            segments: vec![SegmentDiff {
                segment: 1,
                original: Some(format!("original {}", chapter.chapter_number)),
                refined: Some(format!("refined {}", chapter.chapter_number)),
                original_words: 1000,
                refined_words: 1100,
            }],
            status: "completed".into(),
            created_at: None,
        })
    }

    async fn review_chapter(
        &self,
        chapter_id: &str,
        request: &ReviewRequest,
    ) -> ApiResult<ReviewAck> {
        let mut state = self.enter("review")?;
        let next = ReviewStatus::from(request.status);
        let previous = {
            let chapter = state
                .chapters
                .iter_mut()
                .find(|c| c.id == chapter_id)
                .ok_or_else(|| ApiError::NotFound {
                    resource: format!("refinement of chapter {chapter_id}"),
                })?;
            std::mem::replace(&mut chapter.review_status, next)
        };
        state.summary.apply_review(previous, next);
        Ok(ReviewAck {
            chapter_id: chapter_id.to_string(),
            review_status: next,
            message: Some("审核完成".into()),
        })
    }

    async fn export_project(
        &self,
        project_id: &str,
        format: ExportFormat,
        _include_original: bool,
    ) -> ApiResult<ExportFile> {
        let _state = self.enter("export")?;
        Ok(ExportFile {
            file_name: format!("{project_id}.{}", format.extension()),
            content_type: None,
            bytes: b"exported".to_vec(),
        })
    }
}

pub(crate) fn foreshadow_ids(items: &[Foreshadow]) -> Vec<&str> {
    items.iter().map(|f| f.id.as_str()).collect()
}
