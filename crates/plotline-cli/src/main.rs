use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

use commands::foreshadow::{handle_foreshadow_command, ForeshadowCommands};
use commands::review::{handle_review_command, ReviewCommands};
use commands::Session;
use plotline_core::{connect, load_config, validate_config, PlotlineConfig};

#[derive(Parser)]
#[command(
    name = "plotline",
    version,
    about = "Foreshadow tracking and refinement review for novel projects"
)]
struct Cli {
    #[arg(
        long,
        default_value = "~/.plotline",
        help = "Config root directory (contains config/ and logs/)"
    )]
    config_root: PathBuf,

    #[arg(long, global = true, help = "Backend base URL, overrides backend.base_url")]
    base_url: Option<String>,

    #[arg(
        long,
        short = 'p',
        global = true,
        help = "Project ID, overrides project.default_project_id"
    )]
    project: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate config files")]
    Validate,
    #[command(subcommand, about = "Foreshadow tracking")]
    Foreshadow(ForeshadowCommands),
    #[command(subcommand, about = "Refinement review")]
    Review(ReviewCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "plotline.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let mut config = load_config(&cli.config_root.join("config"))?;
    apply_overrides(&mut config, cli.base_url, cli.project);
    validate_config(&config)?;

    match command {
        Commands::Validate => {
            println!(
                "Config valid. Backend {} (timeout {}s), project {}.",
                config.backend.base_url,
                config.backend.timeout_secs,
                config
                    .project
                    .default_project_id
                    .as_deref()
                    .unwrap_or("-"),
            );
        }
        Commands::Foreshadow(cmd) => {
            let session = open_session(config)?;
            handle_foreshadow_command(cmd, &session).await?;
        }
        Commands::Review(cmd) => {
            let session = open_session(config)?;
            handle_review_command(cmd, &session).await?;
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut PlotlineConfig, base_url: Option<String>, project: Option<String>) {
    if let Some(base_url) = base_url {
        config.backend.base_url = base_url;
    }
    if let Some(project) = project {
        config.project.default_project_id = Some(project);
    }
}

fn open_session(config: PlotlineConfig) -> Result<Session> {
    let project_id = config.project.default_project_id.clone().ok_or_else(|| {
        anyhow!("no project selected: pass --project or set project.default_project_id")
    })?;
    Ok(Session {
        backend: connect(&config.backend),
        project_id,
        config,
    })
}
