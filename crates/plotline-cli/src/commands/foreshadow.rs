use std::collections::BTreeSet;

use anyhow::{Context, Result};
use clap::Subcommand;
use plotline_core::{DeleteOutcome, ForeshadowTracker, ProjectDirectory};
use plotline_schema::{
    Foreshadow, ForeshadowCreate, ForeshadowFilter, ForeshadowStatus, ForeshadowType,
    ForeshadowUpdate, ReminderUrgency, DEFAULT_IMPORTANCE, DEFAULT_REMIND_BEFORE_CHAPTERS,
};

use super::{or_dash, print_notices, truncate, Session};

#[derive(Subcommand)]
pub enum ForeshadowCommands {
    #[command(about = "List foreshadows with project counters")]
    List {
        #[arg(long, help = "Only this status (planted, hinted, resolved, abandoned)")]
        status: Option<ForeshadowStatus>,
        #[arg(long = "type", help = "Only this type (character, plot, item, setting, relationship)")]
        foreshadow_type: Option<ForeshadowType>,
        #[arg(long, help = "Only foreshadows planted or resolved in this chapter")]
        chapter: Option<u32>,
    },
    #[command(about = "Show foreshadow details")]
    Show {
        #[arg(help = "Foreshadow ID")]
        id: String,
    },
    #[command(about = "Plant a new foreshadow")]
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long = "type", default_value = "plot")]
        foreshadow_type: ForeshadowType,
        #[arg(long, default_value_t = DEFAULT_IMPORTANCE, help = "1-10")]
        importance: u8,
        #[arg(long, help = "Chapter number it is planted in")]
        planted_chapter: Option<u32>,
        #[arg(long, help = "Excerpt where it is planted")]
        planted_content: Option<String>,
        #[arg(long, help = "Chapter number it should pay off in")]
        expected_chapter: Option<u32>,
        #[arg(long, default_value_t = DEFAULT_REMIND_BEFORE_CHAPTERS, help = "Remind this many chapters ahead (1-50)")]
        remind_before: u32,
        #[arg(long, help = "Never show reminders for it")]
        no_auto_remind: bool,
        #[arg(long = "tag", help = "Tag, repeatable")]
        tags: Vec<String>,
        #[arg(long = "character", help = "Related character ID, repeatable")]
        characters: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    #[command(about = "Change fields of a foreshadow")]
    Update {
        #[arg(help = "Foreshadow ID")]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "type")]
        foreshadow_type: Option<ForeshadowType>,
        #[arg(long)]
        importance: Option<u8>,
        #[arg(long)]
        expected_chapter: Option<u32>,
        #[arg(long)]
        remind_before: Option<u32>,
        #[arg(long, help = "true or false")]
        auto_remind: Option<bool>,
        #[arg(long = "tag", help = "Replace tags, repeatable")]
        tags: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    #[command(about = "Mark a foreshadow as hinted")]
    Hint {
        #[arg(help = "Foreshadow ID")]
        id: String,
    },
    #[command(about = "Give up on a foreshadow")]
    Abandon {
        #[arg(help = "Foreshadow ID")]
        id: String,
    },
    #[command(about = "Delete a foreshadow")]
    Delete {
        #[arg(help = "Foreshadow ID")]
        id: String,
    },
    #[command(about = "Mark a foreshadow as paid off")]
    Resolve {
        #[arg(help = "Foreshadow ID")]
        id: String,
        #[arg(long, help = "Chapter number, defaults to the latest chapter")]
        chapter: Option<u32>,
        #[arg(long, help = "Excerpt where it pays off")]
        content: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    #[command(about = "Show foreshadows due soon or overdue")]
    Reminders {
        #[arg(long, help = "Chapter being written, defaults to the latest chapter")]
        current_chapter: Option<u32>,
        #[arg(long, help = "Show every reminder instead of the top few")]
        all: bool,
    },
    #[command(about = "Pending and urgent foreshadows for one chapter")]
    Context {
        #[arg(help = "Chapter ID")]
        chapter_id: String,
    },
}

pub async fn handle_foreshadow_command(cmd: ForeshadowCommands, session: &Session) -> Result<()> {
    let mut tracker = open_tracker(session).await;
    let result = run(cmd, &mut tracker).await;
    print_notices(tracker.drain_notices());
    result
}

async fn open_tracker(session: &Session) -> ForeshadowTracker {
    let mut tracker = match ProjectDirectory::fetch(session.backend.as_ref(), &session.project_id).await
    {
        Ok(directory) => ForeshadowTracker::from_directory(session.backend.clone(), &directory)
            .unwrap_or_else(|_| ForeshadowTracker::new(session.backend.clone(), &session.project_id)),
        Err(e) => {
            tracing::warn!("Failed to load chapters, assuming chapter 1: {e}");
            ForeshadowTracker::new(session.backend.clone(), &session.project_id)
        }
    };
    tracker.set_display_limit(session.config.reminders.display_limit);
    tracker
}

async fn run(cmd: ForeshadowCommands, tracker: &mut ForeshadowTracker) -> Result<()> {
    match cmd {
        ForeshadowCommands::List {
            status,
            foreshadow_type,
            chapter,
        } => {
            tracker.set_filter(ForeshadowFilter {
                status,
                foreshadow_type,
                chapter_number: chapter,
            });
            tracker.refresh().await?;
            print_table(tracker);
        }
        ForeshadowCommands::Show { id } => {
            let foreshadow = tracker
                .get(&id)
                .await
                .with_context(|| format!("foreshadow not found: {id}"))?;
            print_details(&foreshadow);
        }
        ForeshadowCommands::Create {
            title,
            description,
            foreshadow_type,
            importance,
            planted_chapter,
            planted_content,
            expected_chapter,
            remind_before,
            no_auto_remind,
            tags,
            characters,
            notes,
        } => {
            let mut draft = ForeshadowCreate::new(tracker.project_id(), title, description)
                .with_type(foreshadow_type)
                .with_importance(importance)
                .with_reminder(remind_before, !no_auto_remind);
            if let Some(chapter) = planted_chapter {
                draft = draft.planted_in(chapter, planted_content);
            }
            if let Some(chapter) = expected_chapter {
                draft = draft.expected_in(chapter);
            }
            for tag in tags {
                draft = draft.with_tag(tag);
            }
            for character in characters {
                draft = draft.with_character(character);
            }
            if let Some(notes) = notes {
                draft = draft.with_notes(notes);
            }
            let created = tracker.create(draft).await?;
            println!("Created foreshadow {}", created.id);
        }
        ForeshadowCommands::Update {
            id,
            title,
            description,
            foreshadow_type,
            importance,
            expected_chapter,
            remind_before,
            auto_remind,
            tags,
            notes,
        } => {
            tracker.refresh().await?;
            let update = ForeshadowUpdate {
                title,
                description,
                foreshadow_type,
                importance,
                resolved_chapter_number: expected_chapter,
                remind_before_chapters: remind_before,
                auto_remind,
                tags: (!tags.is_empty()).then(|| tags.into_iter().collect::<BTreeSet<_>>()),
                notes,
                ..ForeshadowUpdate::default()
            };
            let updated = tracker.update(&id, update).await?;
            print_details(&updated);
        }
        ForeshadowCommands::Hint { id } => {
            tracker.refresh().await?;
            let updated = tracker.hint(&id).await?;
            println!("Foreshadow {} is now {}", updated.id, updated.status);
        }
        ForeshadowCommands::Abandon { id } => {
            tracker.refresh().await?;
            let updated = tracker.abandon(&id).await?;
            println!("Foreshadow {} is now {}", updated.id, updated.status);
        }
        ForeshadowCommands::Delete { id } => match tracker.delete(&id).await? {
            DeleteOutcome::Deleted => println!("Deleted foreshadow {id}"),
            DeleteOutcome::AlreadyGone => println!("Foreshadow {id} was already gone"),
        },
        ForeshadowCommands::Resolve {
            id,
            chapter,
            content,
            notes,
        } => {
            tracker.refresh().await?;
            let resolved = tracker.resolve(&id, chapter, content, notes).await?;
            println!(
                "Resolved foreshadow {} in chapter {}",
                resolved.id,
                or_dash(resolved.resolved_chapter_number)
            );
        }
        ForeshadowCommands::Reminders {
            current_chapter,
            all,
        } => {
            if let Some(chapter) = current_chapter {
                tracker.set_current_chapter(chapter);
            }
            tracker.refresh_reminders().await?;
            let reminders = if all {
                tracker.reminders()
            } else {
                tracker.top_reminders()
            };
            if reminders.is_empty() {
                println!("No reminders at chapter {}.", tracker.current_chapter());
                return Ok(());
            }
            println!(
                "{:<10} {:<38} {:<10} {:<6} {:<30}",
                "URGENCY", "ID", "EXPECTED", "LEFT", "TITLE"
            );
            println!("{}", "-".repeat(96));
            for reminder in reminders {
                let urgency = match reminder.urgency() {
                    ReminderUrgency::Overdue => "overdue",
                    ReminderUrgency::Imminent => "imminent",
                    ReminderUrgency::Upcoming => "upcoming",
                };
                println!(
                    "{:<10} {:<38} {:<10} {:<6} {:<30}",
                    urgency,
                    reminder.foreshadow_id,
                    reminder.expected_resolve_chapter,
                    reminder.chapters_remaining,
                    truncate(&reminder.title, 30),
                );
            }
            if !all && tracker.reminders().len() > reminders.len() {
                println!(
                    "... {} more, use --all to see them",
                    tracker.reminders().len() - reminders.len()
                );
            }
        }
        ForeshadowCommands::Context { chapter_id } => {
            let context = tracker.chapter_context(&chapter_id).await?;
            println!(
                "Pending: {}  Urgent: {}",
                context.total_pending, context.urgent_count
            );
            for urgent in &context.urgent_foreshadows {
                println!(
                    "  ! {} (chapter {}, importance {})",
                    urgent.title,
                    or_dash(urgent.expected_chapter),
                    urgent.importance
                );
            }
            if !context.foreshadow_summary.is_empty() {
                println!();
                println!("{}", context.foreshadow_summary);
            }
        }
    }
    Ok(())
}

fn print_table(tracker: &ForeshadowTracker) {
    println!(
        "{:<38} {:<10} {:<13} {:<4} {:<8} {:<9} {:<30}",
        "ID", "STATUS", "TYPE", "IMP", "PLANTED", "EXPECTED", "TITLE"
    );
    println!("{}", "-".repeat(118));
    let current = tracker.current_chapter();
    for foreshadow in tracker.items() {
        let late = if foreshadow.is_late(current) { " (late)" } else { "" };
        println!(
            "{:<38} {:<10} {:<13} {:<4} {:<8} {:<9} {:<30}",
            foreshadow.id,
            foreshadow.status,
            foreshadow.foreshadow_type,
            foreshadow.importance,
            or_dash(foreshadow.planted_chapter_number),
            format!("{}{late}", or_dash(foreshadow.expected_resolve_chapter())),
            truncate(&foreshadow.title, 30),
        );
    }
    let stats = tracker.stats();
    println!();
    println!(
        "Total: {}  Planted: {}  Resolved: {}  Pending: {}",
        stats.total, stats.planted, stats.resolved, stats.pending
    );
}

fn print_details(foreshadow: &Foreshadow) {
    println!("ID:          {}", foreshadow.id);
    println!("Title:       {}", foreshadow.title);
    println!("Type:        {}", foreshadow.foreshadow_type);
    println!("Status:      {}", foreshadow.status);
    println!(
        "Importance:  {} ({:?})",
        foreshadow.importance,
        foreshadow.importance_level()
    );
    println!("Planted:     {}", or_dash(foreshadow.planted_chapter_number));
    match foreshadow.status {
        ForeshadowStatus::Resolved => {
            println!("Resolved:    {}", or_dash(foreshadow.resolved_chapter_number));
            if let Some(content) = &foreshadow.resolved_content {
                println!("Payoff:      {content}");
            }
        }
        ForeshadowStatus::Planted | ForeshadowStatus::Hinted | ForeshadowStatus::Abandoned => {
            println!(
                "Expected:    {}",
                or_dash(foreshadow.expected_resolve_chapter())
            );
        }
    }
    println!(
        "Reminders:   {}",
        if foreshadow.auto_remind {
            format!("{} chapters ahead", foreshadow.remind_before_chapters)
        } else {
            "off".to_string()
        }
    );
    if !foreshadow.tags.is_empty() {
        let tags: Vec<&str> = foreshadow.tags.iter().map(String::as_str).collect();
        println!("Tags:        {}", tags.join(", "));
    }
    println!();
    println!("{}", foreshadow.description);
    if let Some(notes) = &foreshadow.notes {
        println!();
        println!("Notes: {notes}");
    }
}
