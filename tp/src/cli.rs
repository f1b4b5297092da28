//! CLI command definitions and subcommands

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::domain::{ClockTime, Permission, SuggestionStatus};
use crate::sharing::ReviewAction;

/// TripPlanner - conversational trip planning
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Conversational trip planner: chat to a full itinerary, then edit and share it",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chat your way to an itinerary (default)
    Chat {
        /// Resume an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Send one message to a session, or start a new one
    Say {
        /// Message text
        text: String,

        /// Session to continue
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Generate a plan directly from trip details
    Plan {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        #[arg(long, default_value = "1")]
        adults: u32,

        #[arg(long)]
        children: Option<u32>,

        /// Interests, comma separated (museums,food,...)
        #[arg(long, value_delimiter = ',')]
        prefer: Vec<String>,

        #[arg(long)]
        budget: Option<String>,
    },

    /// Show a session's current plan
    Show {
        session: String,
    },

    /// Revise a session's plan with a free-text instruction
    Revise {
        session: String,

        /// e.g. "make day 2 more relaxed"
        instruction: String,
    },

    /// Edit a session's timeline directly
    Timeline {
        #[command(subcommand)]
        command: TimelineCommand,
    },

    /// Manage share links
    Share {
        #[command(subcommand)]
        command: ShareCommand,
    },

    /// Suggest a replacement activity through a share link
    Suggest {
        /// Share token
        token: String,

        /// Time slot id
        slot: String,

        /// Index of the option to replace
        index: usize,

        /// Title of the suggested activity
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Category (breakfast, lunch, dinner, sightseeing, culture, ...)
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        price: Option<f64>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        reason: Option<String>,

        /// Suggesting user id
        #[arg(long = "by")]
        by_id: String,

        /// Suggesting user's display name
        #[arg(long = "by-name")]
        by_name: Option<String>,
    },

    /// Accept or reject a suggestion
    Review {
        suggestion: String,

        /// accept or reject
        action: ReviewAction,

        /// Review as the trip owner
        #[arg(long, conflicts_with = "token", required_unless_present = "token")]
        owner: Option<String>,

        /// Review through an edit link
        #[arg(long)]
        token: Option<String>,

        #[arg(long)]
        note: Option<String>,
    },

    /// List suggestions for a trip
    Suggestions {
        /// Trip id (the session id)
        trip: String,

        /// pending, accepted or rejected
        #[arg(short, long)]
        status: Option<SuggestionStatus>,
    },

    /// Show notifications for a user
    Notifications {
        user: String,

        /// Only unread notifications
        #[arg(long)]
        unread: bool,

        /// Mark this notification as read
        #[arg(long)]
        mark_read: Option<String>,
    },

    /// Session maintenance
    Sessions {
        #[command(subcommand)]
        command: SessionsCommand,
    },
}

/// Timeline edit subcommands
#[derive(Debug, Subcommand)]
pub enum TimelineCommand {
    /// Move an option from one slot to another
    Reorder {
        session: String,
        from_slot: String,
        to_slot: String,
        index: usize,
    },

    /// Remove an option from a slot
    Remove {
        session: String,
        slot: String,
        index: usize,
    },

    /// Move a slot to a new window (HH:MM HH:MM)
    Retime {
        session: String,
        slot: String,
        start: ClockTime,
        end: ClockTime,
    },

    /// Choose which option of a slot counts
    Select {
        session: String,
        slot: String,
        index: usize,
    },

    /// Fetch fresh options for a slot
    Alternatives {
        session: String,
        slot: String,
    },
}

/// Share link subcommands
#[derive(Debug, Subcommand)]
pub enum ShareCommand {
    /// Share a session's plan
    Create {
        session: String,

        /// Owner user id
        #[arg(long)]
        owner: String,

        /// Owner display name
        #[arg(long)]
        name: Option<String>,

        /// view, suggest or edit
        #[arg(short, long, default_value = "view")]
        permission: Permission,

        #[arg(long)]
        public: bool,

        /// Link lifetime in days
        #[arg(long)]
        expires_days: Option<u32>,
    },

    /// Open a share link
    Show {
        token: String,
    },

    /// List links for a trip
    List {
        /// Trip id (the session id)
        trip: String,
    },

    /// Revoke a link
    Revoke {
        token: String,

        #[arg(long)]
        owner: String,
    },

    /// Bring accepted suggestions and shared edits back into the session
    Pull {
        session: String,

        #[arg(long)]
        owner: String,
    },
}

/// Session maintenance subcommands
#[derive(Debug, Subcommand)]
pub enum SessionsCommand {
    /// Remove sessions idle for longer than the TTL
    Expire {
        /// Override the configured TTL (seconds)
        #[arg(long)]
        older_than_secs: Option<u64>,
    },
}

/// Output format for plan and listing commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

/// Path of the log file written by `tp`
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs")
        .join("tripplanner.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan_command() {
        let cli = Cli::try_parse_from([
            "tp", "plan", "--from", "Istanbul", "--to", "Berlin", "--start", "2025-11-20", "--end", "2025-11-23",
            "--adults", "2", "--prefer", "museums,food", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Some(Command::Plan { adults, prefer, .. }) => {
                assert_eq!(adults, 2);
                assert_eq!(prefer, vec!["museums", "food"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_review_requires_actor() {
        assert!(Cli::try_parse_from(["tp", "review", "sugg-1", "accept"]).is_err());
        let cli = Cli::try_parse_from(["tp", "review", "sugg-1", "reject", "--owner", "me"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Review {
                action: ReviewAction::Reject,
                ..
            })
        ));
        assert!(Cli::try_parse_from(["tp", "timeline", "retime", "s", "d1", "10:00", "9am"]).is_err());
    }
}
