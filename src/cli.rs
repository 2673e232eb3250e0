use crate::models::Priority;
use crate::query::{SortDirection, SortField, StatusFilter};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskflow")]
#[command(about = "Personal task manager with filtering, analytics and reminders", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of ~/.config/taskflow/config.json
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a new task
    Add {
        /// Task title (quoted if it has spaces)
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// high, medium or low (defaults to the configured priority)
        #[arg(short, long)]
        priority: Option<Priority>,
        /// Due date, e.g. 2025-03-01 or "2025-03-01 17:00"
        #[arg(long)]
        due: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        /// Tag; repeat for several
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        #[arg(long, default_value_t = 0)]
        progress: u8,
        /// Remind at this time
        #[arg(long)]
        remind: Option<String>,
        /// Estimated effort in hours
        #[arg(long)]
        estimate: Option<f64>,
    },
    /// List tasks
    List {
        #[arg(long, value_enum, default_value_t = StatusArg::All)]
        status: StatusArg,
        /// Category name, or "all"
        #[arg(short, long, default_value = "all")]
        category: String,
        /// high, medium, low or all
        #[arg(short, long, default_value = "all")]
        priority: String,
        /// Only tasks due at or after this time
        #[arg(long)]
        from: Option<String>,
        /// Only tasks due at or before this time
        #[arg(long)]
        to: Option<String>,
        /// Case-insensitive text search over title, description and tags
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(long, value_enum, default_value_t = SortArg::DueDate)]
        sort: SortArg,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one task in full
    Show { id: String },
    /// Change fields of a task
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long)]
        progress: Option<u8>,
        /// Replace the tags; repeat for several
        #[arg(short, long = "tag")]
        tags: Option<Vec<String>>,
        #[arg(long, conflicts_with = "no_remind")]
        remind: Option<String>,
        /// Turn the reminder off
        #[arg(long)]
        no_remind: bool,
        #[arg(long)]
        estimate: Option<f64>,
        /// Hours actually spent
        #[arg(long)]
        actual: Option<f64>,
    },
    /// Toggle a task between active and completed
    Done { id: String },
    /// Delete a task
    Delete { id: String },
    /// Copy a task under a new id
    Duplicate { id: String },
    /// Apply one change to several tasks
    Bulk {
        #[command(subcommand)]
        command: BulkCommands,
    },
    /// Summary counters over all tasks
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Dashboard views
    Analytics {
        #[command(subcommand)]
        command: AnalyticsCommands,
    },
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Write a backup of all tasks and categories
    Export {
        /// Output file; a dated file name in the current directory when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print to stdout instead of writing a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },
    /// Replace all tasks and categories with a backup
    Import { file: PathBuf },
    /// Deliver due reminders
    Remind {
        /// Keep running and deliver reminders as they come due
        #[arg(short, long)]
        watch: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Delete all tasks and restore the default categories
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BulkCommands {
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Toggle {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Priority {
        priority: Priority,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Category {
        category: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AnalyticsCommands {
    /// Per-category counts
    Categories,
    /// Per-priority counts
    Priorities,
    /// Created and completed tasks over the last seven days
    Week,
    /// What is due today, tomorrow and this week
    Summary,
    /// Recently created and completed tasks
    Activity {
        #[arg(short, long, default_value_t = crate::analytics::DEFAULT_ACTIVITY_LIMIT)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommands {
    List,
    Add {
        name: String,
        #[arg(long, default_value = "#6b7280")]
        color: String,
        #[arg(long, default_value = "📁")]
        icon: String,
    },
    Rename {
        old_name: String,
        new_name: String,
    },
    Delete {
        name: String,
        /// Move the category's tasks here instead of the fallback category
        #[arg(long)]
        move_to: Option<String>,
    },
    /// Restore the built-in categories
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusArg {
    All,
    Active,
    Completed,
}

impl From<StatusArg> for StatusFilter {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::All => StatusFilter::All,
            StatusArg::Active => StatusFilter::Active,
            StatusArg::Completed => StatusFilter::Completed,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortArg {
    Title,
    DueDate,
    Priority,
    CreatedAt,
    Progress,
    /// Keep storage order
    None,
}

impl From<SortArg> for SortField {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Title => SortField::Title,
            SortArg::DueDate => SortField::DueDate,
            SortArg::Priority => SortField::Priority,
            SortArg::CreatedAt => SortField::CreatedAt,
            SortArg::Progress => SortField::Progress,
            SortArg::None => SortField::Unsorted,
        }
    }
}

pub fn sort_direction(desc: bool) -> SortDirection {
    if desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    }
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
    fn test_parse_list_options() {
        let cli = Cli::try_parse_from([
            "taskflow", "list", "--status", "active", "--sort", "created-at", "--desc", "-s", "report",
        ])
        .unwrap();
        match cli.command {
            Commands::List { status, sort, desc, search, .. } => {
                assert_eq!(StatusFilter::from(status), StatusFilter::Active);
                assert_eq!(SortField::from(sort), SortField::CreatedAt);
                assert_eq!(sort_direction(desc), SortDirection::Desc);
                assert_eq!(search, "report");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_priority_and_global_config() {
        let cli = Cli::try_parse_from([
            "taskflow", "add", "Write report", "-p", "high", "--config", "/tmp/cfg.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cfg.json")));
        match cli.command {
            Commands::Add { title, priority, .. } => {
                assert_eq!(title, "Write report");
                assert_eq!(priority, Some(Priority::High));
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["taskflow", "add", "x", "-p", "urgent"]).is_err());
    }

    #[test]
    fn test_bulk_requires_ids() {
        assert!(Cli::try_parse_from(["taskflow", "bulk", "delete"]).is_err());
        assert!(Cli::try_parse_from(["taskflow", "bulk", "priority", "low", "abc"]).is_ok());
    }
}
