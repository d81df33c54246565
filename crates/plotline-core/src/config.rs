use std::{fs, path::Path, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use plotline_client::{HttpBackend, NovelBackend};
use plotline_schema::{ExportFormat, DEFAULT_REMINDER_DISPLAY_LIMIT};
use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_display_limit() -> usize {
    DEFAULT_REMINDER_DISPLAY_LIMIT
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub default_project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            display_limit: default_display_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub default_format: ExportFormat,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: ExportFormat::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// Contents of `main.yaml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlotlineConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl PlotlineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Load `main.yaml` from `config_dir`, falling back to defaults when the
/// file does not exist.
pub fn load_config(config_dir: &Path) -> Result<PlotlineConfig> {
    let path = config_dir.join("main.yaml");
    let mut config = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_yaml::from_str::<Option<PlotlineConfig>>(&content)
            .with_context(|| format!("failed to parse yaml file: {}", path.display()))?
            .unwrap_or_default()
    } else {
        PlotlineConfig::default()
    };

    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &PlotlineConfig) -> Result<()> {
    let base_url = config.backend.base_url.as_str();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(anyhow!(
            "backend.base_url must start with http:// or https://: {base_url}"
        ));
    }
    if config.backend.timeout_secs == 0 {
        return Err(anyhow!("backend.timeout_secs must be greater than 0"));
    }
    if config.reminders.display_limit == 0 {
        return Err(anyhow!("reminders.display_limit must be greater than 0"));
    }
    Ok(())
}

fn resolve_config_env(config: &mut PlotlineConfig) {
    config.backend.base_url = resolve_env_var(&config.backend.base_url);
    config.backend.api_token = config
        .backend
        .api_token
        .take()
        .map(|token| resolve_env_var(&token))
        .filter(|token| !token.is_empty());
    config.project.default_project_id = config
        .project
        .default_project_id
        .take()
        .map(|id| resolve_env_var(&id))
        .filter(|id| !id.is_empty());
}

/// Build the HTTP backend described by `config`.
pub fn connect(config: &BackendConfig) -> Arc<dyn NovelBackend> {
    let mut backend = HttpBackend::with_timeout(
        config.base_url.clone(),
        Duration::from_secs(config.timeout_secs),
    );
    if let Some(token) = &config.api_token {
        backend = backend.with_api_token(token.clone());
    }
    Arc::new(backend)
}
