use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use plotline_core::{ChapterView, ReviewFlow, ReviewOutcome};
use plotline_schema::{ExportFormat, ReviewDecision, ReviewSummary};

use super::{or_dash, print_notices, truncate, Session};

#[derive(Subcommand)]
pub enum ReviewCommands {
    #[command(about = "List refined chapters and their review status")]
    Chapters,
    #[command(about = "Show review counters")]
    Summary,
    #[command(about = "Compare a chapter before and after refinement")]
    Diff {
        #[arg(help = "Chapter number")]
        chapter: u32,
        #[arg(long, help = "Print the full texts, not just word counts")]
        full: bool,
    },
    #[command(about = "Approve a refined chapter")]
    Approve {
        #[arg(help = "Chapter number")]
        chapter: u32,
        #[arg(long)]
        comment: Option<String>,
    },
    #[command(about = "Reject a refined chapter")]
    Reject {
        #[arg(help = "Chapter number")]
        chapter: u32,
        #[arg(long)]
        comment: Option<String>,
    },
    #[command(about = "Download the refined project")]
    Export {
        #[arg(long, help = "txt, markdown or json (default from config)")]
        format: Option<ExportFormat>,
        #[arg(long, help = "Include the original text next to the refined one")]
        include_original: bool,
        #[arg(long, help = "Output directory (default from config)")]
        output: Option<PathBuf>,
    },
}

pub async fn handle_review_command(cmd: ReviewCommands, session: &Session) -> Result<()> {
    let mut flow = ReviewFlow::new(session.backend.clone(), &session.project_id);
    let result = run(cmd, &mut flow, session).await;
    print_notices(flow.drain_notices());
    result
}

async fn run(cmd: ReviewCommands, flow: &mut ReviewFlow, session: &Session) -> Result<()> {
    match cmd {
        ReviewCommands::Chapters => {
            flow.load_chapters().await?;
            println!(
                "{:<8} {:<38} {:<10} {:<8} {:<30}",
                "CHAPTER", "ID", "STATUS", "WORDS", "TITLE"
            );
            println!("{}", "-".repeat(96));
            for chapter in flow.chapters() {
                println!(
                    "{:<8} {:<38} {:<10} {:<8} {:<30}",
                    chapter.chapter_number,
                    chapter.id,
                    chapter.review_status,
                    or_dash(chapter.word_count),
                    truncate(&chapter.title, 30),
                );
            }
            println!();
            print_summary(flow.summary());
        }
        ReviewCommands::Summary => {
            flow.load_chapters().await?;
            print_summary(flow.summary());
        }
        ReviewCommands::Diff { chapter, full } => {
            flow.load_chapters().await?;
            select_chapter(flow, chapter)?;
            flow.load_diff().await;
            print_view(flow.view(), full);
        }
        ReviewCommands::Approve { chapter, comment } => {
            review(flow, chapter, ReviewDecision::Approved, comment).await?;
        }
        ReviewCommands::Reject { chapter, comment } => {
            review(flow, chapter, ReviewDecision::Rejected, comment).await?;
        }
        ReviewCommands::Export {
            format,
            include_original,
            output,
        } => {
            let format = format.unwrap_or(session.config.export.default_format);
            let dir = output.unwrap_or_else(|| session.config.export.output_dir.clone());
            let file = flow.export(format, include_original).await?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create output dir: {}", dir.display()))?;
            let path = dir.join(&file.file_name);
            std::fs::write(&path, &file.bytes)
                .with_context(|| format!("failed to write export: {}", path.display()))?;
            println!("Exported {} bytes to {}", file.bytes.len(), path.display());
        }
    }
    Ok(())
}

async fn review(
    flow: &mut ReviewFlow,
    chapter: u32,
    decision: ReviewDecision,
    comment: Option<String>,
) -> Result<()> {
    flow.load_chapters().await?;
    select_chapter(flow, chapter)?;
    match flow.review(decision, comment).await? {
        ReviewOutcome::Confirmed { advanced } => {
            println!("Chapter {chapter} {decision}.");
            print_summary(flow.summary());
            if advanced {
                if let Some(next) = flow.current() {
                    println!(
                        "Next up: chapter {} ({})",
                        next.chapter_number, next.review_status
                    );
                }
            }
            Ok(())
        }
        ReviewOutcome::Reverted { error } => Err(anyhow!("review of chapter {chapter} failed: {error}")),
    }
}

fn select_chapter(flow: &mut ReviewFlow, chapter_number: u32) -> Result<()> {
    let index = flow
        .chapters()
        .iter()
        .position(|c| c.chapter_number == chapter_number)
        .ok_or_else(|| anyhow!("chapter {chapter_number} has no refinement to review"))?;
    flow.select(index);
    Ok(())
}

fn print_summary(summary: ReviewSummary) {
    println!(
        "Total: {}  Approved: {}  Rejected: {}  Pending: {}",
        summary.total, summary.approved, summary.rejected, summary.pending
    );
}

fn print_view(view: ChapterView<'_>, full: bool) {
    match view {
        ChapterView::Empty => println!("No refined chapters."),
        ChapterView::Loading { chapter } => {
            println!("Chapter {} is still loading.", chapter.chapter_number)
        }
        ChapterView::Unavailable { chapter } => {
            println!("No diff available for chapter {}.", chapter.chapter_number)
        }
        ChapterView::ReadOnly { chapter, refined } => {
            println!(
                "Chapter {} {} (approved, read-only)",
                chapter.chapter_number, chapter.title
            );
            println!();
            println!("{refined}");
        }
        ChapterView::Compare {
            chapter,
            original,
            refined,
            original_words,
            refined_words,
            delta,
            favorable,
        } => {
            println!(
                "Chapter {} {} ({})",
                chapter.chapter_number, chapter.title, chapter.review_status
            );
            println!(
                "Words: {original_words} -> {refined_words} ({delta:+}{})",
                if favorable { "" } else { ", shorter" }
            );
            if full {
                println!();
                println!("=== Original ===");
                println!("{original}");
                println!();
                println!("=== Refined ===");
                println!("{refined}");
            }
        }
    }
}
