use std::path::PathBuf;

use clap::{Parser, Subcommand};
use horizon::commands::App;
use horizon::config::{Config, DEFAULT_CONFIG_FILE};
use horizon::error::Result;
use horizon::grouping::SortKey;
use horizon::model::{AccessLevel, ResourceType, Status};
use horizon::output::Format;

#[derive(Parser)]
#[command(
    name = "horizon",
    version,
    about = "Recurring tasks, timezone-correct day views and dashboards"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    /// Configuration file (missing file means defaults)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load users, projects, tasks and grants from a JSON or YAML snapshot ("-" for stdin)
    Import {
        source: String,
    },
    /// Materialize missing occurrences of a user's recurring tasks
    Generate {
        #[arg(long)]
        user: i64,
        /// Days ahead to fill (default: horizon_days from config)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Drop future occurrences after a template's rule was edited, then regenerate
    RuleChanged {
        template_id: i64,
    },
    /// Dashboard counts, lists and the 7-day completion histogram
    Metrics {
        #[arg(long)]
        user: i64,
        /// IANA timezone (default: the user's profile)
        #[arg(long)]
        tz: Option<String>,
    },
    /// Open tasks for the next few days, grouped by day
    Upcoming {
        #[arg(long)]
        user: i64,
        /// Days ahead to show (default: upcoming_days from config)
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        tz: Option<String>,
        /// Ordering within each day
        #[arg(long, value_enum, default_value = "priority")]
        order: SortKey,
    },
    /// Open tasks due today or flagged for today
    Today {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        tz: Option<String>,
    },
    /// Open tasks due before today
    Overdue {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        tz: Option<String>,
    },
    /// List resources a user may see
    Visible {
        #[arg(long)]
        user: i64,
        #[arg(long, value_enum, default_value = "task")]
        resource: ResourceType,
    },
    /// Change a task's status and cascade to its parent
    Status {
        task_id: i64,
        #[arg(value_enum)]
        status: Status,
    },
    /// Share a task or project with another user
    Grant {
        #[arg(long, value_enum, default_value = "task")]
        resource: ResourceType,
        /// Resource ID
        id: i64,
        /// User receiving access
        #[arg(long)]
        to: i64,
        #[arg(long, value_enum, default_value = "read_only")]
        level: AccessLevel,
        /// User granting access
        #[arg(long)]
        by: i64,
    },
    /// Remove a previously granted share
    Revoke {
        #[arg(long, value_enum, default_value = "task")]
        resource: ResourceType,
        id: i64,
        #[arg(long)]
        from: i64,
    },
    /// List grants held by a user
    Grants {
        #[arg(long)]
        user: i64,
    },
    /// Print build information
    Version,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("HORIZON_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

fn run(cli: Cli, format: Format) -> Result<()> {
    if let Commands::Version = cli.command {
        return horizon::commands::version::run(format);
    }

    let config = Config::load(&cli.config)?;
    let app = App::open(config)?;

    match cli.command {
        Commands::Import { source } => horizon::commands::import::run(&app, &source, format),
        Commands::Generate { user, days } => {
            horizon::commands::generate::run(&app, user, days, format)
        }
        Commands::RuleChanged { template_id } => {
            horizon::commands::generate::rule_changed(&app, template_id, format)
        }
        Commands::Metrics { user, tz } => horizon::commands::metrics::run(&app, user, tz, format),
        Commands::Upcoming {
            user,
            days,
            tz,
            order,
        } => horizon::commands::views::upcoming(&app, user, days, tz, order, format),
        Commands::Today { user, tz } => horizon::commands::views::today(&app, user, tz, format),
        Commands::Overdue { user, tz } => {
            horizon::commands::views::overdue(&app, user, tz, format)
        }
        Commands::Visible { user, resource } => {
            horizon::commands::visible::run(&app, user, resource, format)
        }
        Commands::Status { task_id, status } => {
            horizon::commands::status::run(&app, task_id, status, format)
        }
        Commands::Grant {
            resource,
            id,
            to,
            level,
            by,
        } => horizon::commands::grants::grant(&app, resource, id, to, level, by, format),
        Commands::Revoke { resource, id, from } => {
            horizon::commands::grants::revoke(&app, resource, id, from, format)
        }
        Commands::Grants { user } => horizon::commands::grants::list(&app, user, format),
        Commands::Version => horizon::commands::version::run(format),
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
