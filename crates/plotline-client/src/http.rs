use std::time::Duration;

use async_trait::async_trait;
use plotline_schema::{
    ChapterForeshadowContext, DiffData, ExportFormat, Foreshadow, ForeshadowCreate,
    ForeshadowFilter, ForeshadowListResponse, ForeshadowReminderResponse, ForeshadowUpdate,
    RefinedChapter, RefinedChapterList, ResolveForeshadowRequest, ReviewAck, ReviewRequest,
    ReviewSummary,
};
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{ApiError, ApiResult, ExportFile, NovelBackend};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`NovelBackend`] over the backend's JSON REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.api_token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, resource: &str) -> ApiResult<Response> {
        let resp = self.authorize(req).send().await?;
        let status = resp.status();
        debug!(resource, status = status.as_u16(), "backend responded");
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::from_status(resource, status, body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        resource: &str,
    ) -> ApiResult<T> {
        let resp = self.send(req, resource).await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
            resource: resource.to_string(),
            source,
        })
    }
}

#[async_trait]
impl NovelBackend for HttpBackend {
    async fn list_foreshadows(
        &self,
        project_id: &str,
        filter: &ForeshadowFilter,
    ) -> ApiResult<ForeshadowListResponse> {
        let mut query = vec![("project_id", project_id.to_string())];
        query.extend(filter.query_pairs());
        let req = self.client.get(self.url("/foreshadows")).query(&query);
        self.send_json(req, "foreshadow list").await
    }

    async fn get_foreshadow(&self, id: &str) -> ApiResult<Foreshadow> {
        let req = self.client.get(self.url(&format!("/foreshadows/{id}")));
        self.send_json(req, &format!("foreshadow {id}")).await
    }

    async fn foreshadow_reminders(
        &self,
        project_id: &str,
        current_chapter: u32,
    ) -> ApiResult<ForeshadowReminderResponse> {
        let req = self.client.get(self.url("/foreshadows/reminders")).query(&[
            ("project_id", project_id.to_string()),
            ("current_chapter", current_chapter.to_string()),
        ]);
        self.send_json(req, "foreshadow reminders").await
    }

    async fn create_foreshadow(&self, request: &ForeshadowCreate) -> ApiResult<Foreshadow> {
        let req = self.client.post(self.url("/foreshadows")).json(request);
        self.send_json(req, "foreshadow").await
    }

    async fn update_foreshadow(
        &self,
        id: &str,
        update: &ForeshadowUpdate,
    ) -> ApiResult<Foreshadow> {
        let req = self
            .client
            .put(self.url(&format!("/foreshadows/{id}")))
            .json(update);
        self.send_json(req, &format!("foreshadow {id}")).await
    }

    async fn delete_foreshadow(&self, id: &str) -> ApiResult<()> {
        let req = self.client.delete(self.url(&format!("/foreshadows/{id}")));
        self.send(req, &format!("foreshadow {id}")).await?;
        Ok(())
    }

    async fn resolve_foreshadow(
        &self,
        id: &str,
        request: &ResolveForeshadowRequest,
    ) -> ApiResult<Foreshadow> {
        let req = self
            .client
            .post(self.url(&format!("/foreshadows/{id}/resolve")))
            .json(request);
        self.send_json(req, &format!("foreshadow {id}")).await
    }

    async fn chapter_foreshadow_context(
        &self,
        chapter_id: &str,
    ) -> ApiResult<ChapterForeshadowContext> {
        let req = self
            .client
            .get(self.url(&format!("/foreshadows/chapter/{chapter_id}/context")));
        self.send_json(req, &format!("chapter {chapter_id}")).await
    }

    async fn project_chapters(&self, project_id: &str) -> ApiResult<Vec<RefinedChapter>> {
        let req = self
            .client
            .get(self.url(&format!("/refinement/project/{project_id}/chapters")));
        let list: RefinedChapterList = self
            .send_json(req, &format!("chapters of project {project_id}"))
            .await?;
        Ok(list.chapters)
    }

    async fn review_summary(&self, project_id: &str) -> ApiResult<ReviewSummary> {
        let req = self
            .client
            .get(self.url(&format!("/refinement/project/{project_id}/review-summary")));
        self.send_json(req, &format!("review summary of project {project_id}"))
            .await
    }

    async fn chapter_diff(&self, chapter_id: &str) -> ApiResult<DiffData> {
        let req = self
            .client
            .get(self.url(&format!("/refinement/chapter/{chapter_id}/diff")));
        self.send_json(req, &format!("diff of chapter {chapter_id}"))
            .await
    }

    async fn review_chapter(
        &self,
        chapter_id: &str,
        request: &ReviewRequest,
    ) -> ApiResult<ReviewAck> {
        let req = self
            .client
            .post(self.url(&format!("/refinement/chapter/{chapter_id}/review")))
            .json(request);
        self.send_json(req, &format!("refinement of chapter {chapter_id}"))
            .await
    }

    async fn export_project(
        &self,
        project_id: &str,
        format: ExportFormat,
        include_original: bool,
    ) -> ApiResult<ExportFile> {
        let req = self
            .client
            .get(self.url(&format!("/refinement/project/{project_id}/export")))
            .query(&[
                ("format", format.as_str().to_string()),
                ("include_original", include_original.to_string()),
            ]);
        let resp = self.send(req, &format!("project {project_id}")).await?;
        let file_name = header_value(&resp, CONTENT_DISPOSITION)
            .and_then(|value| disposition_file_name(&value))
            .unwrap_or_else(|| format!("{project_id}.{}", format.extension()));
        let content_type = header_value(&resp, CONTENT_TYPE);
        let bytes = resp.bytes().await?.to_vec();
        Ok(ExportFile {
            file_name,
            content_type,
            bytes,
        })
    }
}

fn header_value(resp: &Response, name: HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Pull the file name out of a `Content-Disposition` header, preferring the
/// RFC 5987 `filename*=UTF-8''...` form the backend uses for non-ASCII titles.
fn disposition_file_name(value: &str) -> Option<String> {
    let mut plain = None;
    for part in value.split(';').map(str::trim) {
        if let Some(encoded) = part.strip_prefix("filename*=") {
            let encoded = encoded
                .split_once("''")
                .map(|(_, rest)| rest)
                .unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded) {
                return sanitize_file_name(&decoded);
            }
        } else if let Some(raw) = part.strip_prefix("filename=") {
            plain = sanitize_file_name(raw.trim_matches('"'));
        }
    }
    plain
}

fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    (!base.is_empty() && base != "." && base != "..").then(|| base.to_string())
}
