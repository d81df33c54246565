use std::sync::Arc;

use plotline_client::NovelBackend;
use plotline_core::{Notice, NoticeLevel, PlotlineConfig};

pub mod foreshadow;
pub mod review;

pub struct Session {
    pub backend: Arc<dyn NovelBackend>,
    pub project_id: String,
    pub config: PlotlineConfig,
}

pub fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{tag}] {}", notice.message);
    }
}

/// Cut `text` to `max` characters for table cells.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
