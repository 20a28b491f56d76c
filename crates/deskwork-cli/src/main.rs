#![forbid(unsafe_code)]

mod cmd;
mod identity;
mod output;

use clap::{Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use deskwork_core::config;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "dw: helpdesk tickets and tasks with audited updates",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Act as this user id (overrides DESKWORK_USER).
    #[arg(long = "as", global = true, value_name = "USER_ID")]
    as_user: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize a deskwork workspace",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    dw init"
    )]
    Init(cmd::init::InitArgs),

    #[command(about = "Manage users")]
    User {
        #[command(subcommand)]
        command: cmd::user::UserCommand,
    },

    #[command(
        about = "Manage tickets",
        after_help = "EXAMPLES:\n    # File a ticket for a walk-in request\n    dw ticket create --title \"Printer jam\" --submitter-name Linus --submitter-email linus@example.com"
    )]
    Ticket {
        #[command(subcommand)]
        command: cmd::create::TicketCommand,
    },

    #[command(
        about = "Manage tasks",
        after_help = "EXAMPLES:\n    # Create a weekly task\n    dw --as 1 task create --title \"Rotate backups\" --recur FREQ=WEEKLY"
    )]
    Task {
        #[command(subcommand)]
        command: cmd::create::TaskCommand,
    },

    #[command(
        about = "Update a ticket or task",
        long_about = "Apply a partial update. Only the given fields change; one audit comment \
                      describes the change and notifications go out after commit.",
        after_help = "EXAMPLES:\n    # Resolve a ticket (closes it)\n    dw --as 2 update TKT-4 --resolution \"Replaced toner\"\n\n    # Reassign\n    dw --as 1 update TKT-4 --assign 3\n\n    # Emit machine-readable output\n    dw --as 1 update TSK-2 --status in_progress --json"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(about = "Show one ticket or task with its comments")]
    Show(cmd::show::ShowArgs),

    #[command(about = "Add tags to a ticket or task")]
    Tag(cmd::tag::TagArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DESKWORK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "deskwork=debug,info"
        } else {
            "deskwork=info,warn"
        })
    });

    let format = env::var("DESKWORK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let user_config = config::load_user_config().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable user config");
        config::UserConfig::default()
    });

    let ctx = cmd::Ctx {
        output: resolve_output_mode(cli.format, cli.json, user_config.output.as_deref()),
        as_user: cli.as_user,
        config_user: user_config.acting_user,
        project_root: env::current_dir()?,
    };

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &ctx),
        Commands::User { command } => cmd::user::run_user(command, &ctx),
        Commands::Ticket { command } => cmd::create::run_ticket(command, &ctx),
        Commands::Task { command } => cmd::create::run_task(command, &ctx),
        Commands::Update(args) => cmd::update::run_update(args, &ctx),
        Commands::Show(args) => cmd::show::run_show(args, &ctx),
        Commands::Tag(args) => cmd::tag::run_tag(args, &ctx),
    }
}
