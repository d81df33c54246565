use plotline_client::{ApiResult, NovelBackend};
use plotline_schema::RefinedChapter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
    pub id: String,
    pub chapter_number: u32,
    pub title: String,
}

impl From<&RefinedChapter> for ChapterRef {
    fn from(chapter: &RefinedChapter) -> Self {
        Self {
            id: chapter.id.clone(),
            chapter_number: chapter.chapter_number,
            title: chapter.title.clone(),
        }
    }
}

/// Source of the active project and its chapters.
pub trait ChapterDirectory: Send + Sync {
    fn current_project_id(&self) -> Option<&str>;

    fn chapters(&self) -> &[ChapterRef];

    /// The furthest chapter written so far, or 1 for an empty project.
    fn current_chapter(&self) -> u32 {
        self.chapters()
            .iter()
            .map(|c| c.chapter_number)
            .max()
            .unwrap_or(1)
    }

    fn chapter_by_number(&self, chapter_number: u32) -> Option<&ChapterRef> {
        self.chapters()
            .iter()
            .find(|c| c.chapter_number == chapter_number)
    }
}

/// A directory snapshot for one project.
#[derive(Debug, Clone, Default)]
pub struct ProjectDirectory {
    project_id: Option<String>,
    chapters: Vec<ChapterRef>,
}

impl ProjectDirectory {
    pub fn new(project_id: impl Into<String>, chapters: Vec<ChapterRef>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            chapters,
        }
    }

    /// Build the directory from the backend's chapter listing.
    pub async fn fetch(backend: &dyn NovelBackend, project_id: &str) -> ApiResult<Self> {
        let chapters = backend.project_chapters(project_id).await?;
        Ok(Self::new(
            project_id,
            chapters.iter().map(ChapterRef::from).collect(),
        ))
    }
}

impl ChapterDirectory for ProjectDirectory {
    fn current_project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    fn chapters(&self) -> &[ChapterRef] {
        &self.chapters
    }
}
