pub mod error;
pub mod http;

use async_trait::async_trait;
use plotline_schema::{
    ChapterForeshadowContext, DiffData, ExportFormat, Foreshadow, ForeshadowCreate,
    ForeshadowFilter, ForeshadowListResponse, ForeshadowReminderResponse, ForeshadowUpdate,
    RefinedChapter, ResolveForeshadowRequest, ReviewAck, ReviewRequest, ReviewSummary,
};

pub use error::{ApiError, ApiResult};
pub use http::HttpBackend;

/// A file produced by the backend's export endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// The novel backend's REST surface. The backend owns all persistent state;
/// callers only mirror what these calls return.
#[async_trait]
pub trait NovelBackend: Send + Sync {
    async fn list_foreshadows(
        &self,
        project_id: &str,
        filter: &ForeshadowFilter,
    ) -> ApiResult<ForeshadowListResponse>;

    async fn get_foreshadow(&self, id: &str) -> ApiResult<Foreshadow>;

    async fn foreshadow_reminders(
        &self,
        project_id: &str,
        current_chapter: u32,
    ) -> ApiResult<ForeshadowReminderResponse>;

    async fn create_foreshadow(&self, request: &ForeshadowCreate) -> ApiResult<Foreshadow>;

    async fn update_foreshadow(&self, id: &str, update: &ForeshadowUpdate)
        -> ApiResult<Foreshadow>;

    async fn delete_foreshadow(&self, id: &str) -> ApiResult<()>;

    async fn resolve_foreshadow(
        &self,
        id: &str,
        request: &ResolveForeshadowRequest,
    ) -> ApiResult<Foreshadow>;

    async fn chapter_foreshadow_context(
        &self,
        chapter_id: &str,
    ) -> ApiResult<ChapterForeshadowContext>;

    /// Every chapter of the project, refined or not.
    async fn project_chapters(&self, project_id: &str) -> ApiResult<Vec<RefinedChapter>>;

    async fn review_summary(&self, project_id: &str) -> ApiResult<ReviewSummary>;

    async fn chapter_diff(&self, chapter_id: &str) -> ApiResult<DiffData>;

    async fn review_chapter(&self, chapter_id: &str, request: &ReviewRequest)
        -> ApiResult<ReviewAck>;

    async fn export_project(
        &self,
        project_id: &str,
        format: ExportFormat,
        include_original: bool,
    ) -> ApiResult<ExportFile>;
}
