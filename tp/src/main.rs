//! TripPlanner - conversational trip planning
//!
//! CLI entry point over the trip service.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use tripplanner::cli::{Cli, Command, OutputFormat, SessionsCommand, ShareCommand, TimelineCommand};
use tripplanner::config::Config;
use tripplanner::domain::{Activity, Category, SlotPatch, generate_id};
use tripplanner::events::spawn_event_logger;
use tripplanner::repl::{ChatRepl, print_plan};
use tripplanner::service::TripService;
use tripplanner::session::TurnOutcome;
use tripplanner::sharing::{Access, NewSuggestion};
use tripplanner::timeline::TimelineEdit;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("tripplanner.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    let service = Arc::new(TripService::open(config).context("Failed to start trip service")?);
    let format = cli.format;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None => cmd_chat(service, None).await,
        Some(Command::Chat { session }) => cmd_chat(service, session).await,
        Some(Command::Say { text, session }) => {
            let outcome = match session {
                Some(id) => service.continue_conversation(&id, &text).await?,
                None => service.start_conversation(&text).await?,
            };
            print_outcome(&outcome, format)
        }
        Some(Command::Plan {
            from,
            to,
            start,
            end,
            adults,
            children,
            prefer,
            budget,
        }) => {
            let patch = SlotPatch {
                origin: Some(from),
                destination: Some(to),
                start_date: Some(start),
                end_date: Some(end),
                adults: Some(adults),
                children,
                preferences: (!prefer.is_empty()).then_some(prefer),
                budget,
            };
            let outcome = service.plan_direct(patch).await?;
            print_outcome(&outcome, format)
        }
        Some(Command::Show { session }) => {
            let plan = service.plan(&session).await?;
            match format {
                OutputFormat::Json => print_json(&plan),
                OutputFormat::Text => {
                    print_plan(&plan);
                    Ok(())
                }
            }
        }
        Some(Command::Revise { session, instruction }) => {
            let revision = service.revise_plan(&session, &instruction).await?;
            match format {
                OutputFormat::Json => print_json(&revision),
                OutputFormat::Text => {
                    println!("{}", revision.summary);
                    if revision.changed {
                        print_plan(&revision.plan);
                    }
                    Ok(())
                }
            }
        }
        Some(Command::Timeline { command }) => cmd_timeline(&service, command, format).await,
        Some(Command::Share { command }) => cmd_share(&service, command, format).await,
        Some(Command::Suggest {
            token,
            slot,
            index,
            title,
            description,
            category,
            price,
            location,
            reason,
            by_id,
            by_name,
        }) => {
            let category = category.map(|c| parse_category(&c)).transpose()?;
            let day = day_of_slot(&slot);
            let suggestion = service
                .create_suggestion(
                    &token,
                    NewSuggestion {
                        day,
                        time_slot_id: slot,
                        activity_index: index,
                        original_activity: None,
                        suggested_activity: Activity {
                            id: generate_id("act"),
                            title,
                            description,
                            duration: None,
                            price,
                            location,
                            rating: None,
                            category,
                            booking_url: None,
                        },
                        reason,
                        suggested_by_name: by_name.unwrap_or_else(|| by_id.clone()),
                        suggested_by_id: by_id,
                    },
                )
                .await?;
            match format {
                OutputFormat::Json => print_json(&suggestion),
                OutputFormat::Text => {
                    println!("Suggestion {} created (pending review)", suggestion.id.bright_white());
                    Ok(())
                }
            }
        }
        Some(Command::Review {
            suggestion,
            action,
            owner,
            token,
            note,
        }) => {
            let access = match (owner, token) {
                (Some(owner), _) => Access::Owner(owner),
                (None, Some(token)) => Access::Token(token),
                (None, None) => eyre::bail!("either --owner or --token is required"),
            };
            let reviewed = service.review_suggestion(&access, &suggestion, action, note).await?;
            match format {
                OutputFormat::Json => print_json(&reviewed),
                OutputFormat::Text => {
                    println!("Suggestion {} {}", reviewed.id.bright_white(), reviewed.status.as_str());
                    Ok(())
                }
            }
        }
        Some(Command::Suggestions { trip, status }) => {
            let list = service.list_suggestions(&trip, status).await?;
            match format {
                OutputFormat::Json => print_json(&list),
                OutputFormat::Text => {
                    println!(
                        "{} pending, {} accepted, {} rejected",
                        list.pending, list.accepted, list.rejected
                    );
                    for s in &list.suggestions {
                        println!(
                            "  {} [{}] day {} {}: \"{}\" -> \"{}\" by {}",
                            s.id.bright_white(),
                            s.status.as_str(),
                            s.day,
                            s.time_slot_id,
                            s.original_activity.title,
                            s.suggested_activity.title,
                            s.suggested_by_name
                        );
                    }
                    Ok(())
                }
            }
        }
        Some(Command::Notifications { user, unread, mark_read }) => {
            if let Some(id) = mark_read {
                service.mark_notification_read(&user, &id).await?;
            }
            let notes = service.notifications(&user, unread).await?;
            match format {
                OutputFormat::Json => print_json(&notes),
                OutputFormat::Text => {
                    if notes.is_empty() {
                        println!("{}", "No notifications.".dimmed());
                    }
                    for n in &notes {
                        let marker = if n.read { " " } else { "*" };
                        println!("{} {} {}", marker.yellow(), n.id.dimmed(), n.message);
                    }
                    Ok(())
                }
            }
        }
        Some(Command::Sessions {
            command: SessionsCommand::Expire { older_than_secs },
        }) => {
            let expired = service.expire_sessions(older_than_secs.map(Duration::from_secs)).await?;
            match format {
                OutputFormat::Json => print_json(&expired),
                OutputFormat::Text => {
                    println!("Expired {} session(s)", expired.len());
                    Ok(())
                }
            }
        }
    }
}

/// Run the interactive chat
async fn cmd_chat(service: Arc<TripService>, session: Option<String>) -> Result<()> {
    debug!(?session, "cmd_chat: called");
    if let Some(id) = &session {
        service.session(id).await?;
    }
    if let Err(e) = spawn_event_logger(service.bus()) {
        warn!(error = %e, "cmd_chat: event log unavailable");
    }
    ChatRepl::new(service, session).run().await
}

async fn cmd_timeline(service: &TripService, command: TimelineCommand, format: OutputFormat) -> Result<()> {
    debug!(?command, "cmd_timeline: called");
    let (session, edit) = match command {
        TimelineCommand::Alternatives { session, slot } => {
            let options = service.alternatives(&session, &slot).await?;
            return match format {
                OutputFormat::Json => print_json(&options),
                OutputFormat::Text => {
                    for (i, a) in options.iter().enumerate() {
                        let price = a.price.map(|p| format!(" ({p:.2})")).unwrap_or_default();
                        println!("  {i}. {}{}  {}", a.title, price, a.id.dimmed());
                    }
                    Ok(())
                }
            };
        }
        TimelineCommand::Reorder {
            session,
            from_slot,
            to_slot,
            index,
        } => (
            session,
            TimelineEdit::Reorder {
                from_slot_id: from_slot,
                to_slot_id: to_slot,
                activity_index: index,
            },
        ),
        TimelineCommand::Remove { session, slot, index } => (
            session,
            TimelineEdit::Remove {
                slot_id: slot,
                activity_index: index,
            },
        ),
        TimelineCommand::Retime {
            session,
            slot,
            start,
            end,
        } => (session, TimelineEdit::Retime { slot_id: slot, start, end }),
        TimelineCommand::Select { session, slot, index } => (session, TimelineEdit::Select { slot_id: slot, index }),
    };

    let plan = service.edit(&session, &edit).await?;
    match format {
        OutputFormat::Json => print_json(&plan),
        OutputFormat::Text => {
            println!("Applied {} (revision {})", edit.name(), plan.revision);
            print_plan(&plan);
            Ok(())
        }
    }
}

async fn cmd_share(service: &TripService, command: ShareCommand, format: OutputFormat) -> Result<()> {
    debug!(?command, "cmd_share: called");
    match command {
        ShareCommand::Create {
            session,
            owner,
            name,
            permission,
            public,
            expires_days,
        } => {
            let name = name.unwrap_or_else(|| owner.clone());
            let share = service
                .create_share(&session, &owner, &name, permission, public, expires_days)
                .await?;
            match format {
                OutputFormat::Json => print_json(&share),
                OutputFormat::Text => {
                    println!("{}", service.share_url(&share.token).bright_white());
                    println!("token: {}  permission: {}", share.token, share.permission_level.as_str());
                    Ok(())
                }
            }
        }
        ShareCommand::Show { token } => {
            let view = service.read_share(&token).await?;
            match format {
                OutputFormat::Json => print_json(&view),
                OutputFormat::Text => {
                    println!(
                        "Shared by {} ({} access, {} views)",
                        view.owner_name,
                        view.permission_level.as_str(),
                        view.view_count
                    );
                    print_plan(&view.plan);
                    Ok(())
                }
            }
        }
        ShareCommand::List { trip } => {
            let shares = service.list_shares(&trip).await?;
            match format {
                OutputFormat::Json => print_json(&shares),
                OutputFormat::Text => {
                    for s in &shares {
                        let state = if s.is_active() { "active" } else { "inactive" };
                        println!(
                            "  {} {} {} views={}",
                            s.token,
                            s.permission_level.as_str(),
                            state,
                            s.view_count
                        );
                    }
                    Ok(())
                }
            }
        }
        ShareCommand::Revoke { token, owner } => {
            service.revoke_share(&owner, &token).await?;
            println!("Revoked");
            Ok(())
        }
        ShareCommand::Pull { session, owner } => {
            let plan = service.pull_trip(&session, &owner).await?;
            match format {
                OutputFormat::Json => print_json(&plan),
                OutputFormat::Text => {
                    println!("Pulled shared changes (revision {})", plan.revision);
                    print_plan(&plan);
                    Ok(())
                }
            }
        }
    }
}

fn print_outcome(outcome: &TurnOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(outcome),
        OutputFormat::Text => {
            println!("{}", outcome.assistant_text);
            println!("session: {}", outcome.session_id.bright_white());
            if outcome.complete
                && let Some(plan) = &outcome.plan
            {
                print_plan(plan);
            }
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_category(s: &str) -> Result<Category> {
    serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
        .context(format!("Unknown category '{}'", s))
}

/// Slot ids start with `d{day}-`
fn day_of_slot(slot_id: &str) -> u32 {
    slot_id
        .strip_prefix('d')
        .and_then(|rest| rest.split('-').next())
        .and_then(|day| day.parse().ok())
        .unwrap_or(1)
}
