use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use fintrack::cli::transactions::TransactionChanges;
use fintrack::core::filter::DateFilter;
use fintrack::core::log::init_logging;
use fintrack::core::transaction::{TransactionDraft, TransactionKind};
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct FilterArg {
    /// Date window: week, month, year or all
    #[arg(short, long)]
    filter: Option<DateFilter>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Sign in with email and password
    Login {
        email: String,
        /// Read from the terminal when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account
    Register {
        name: String,
        email: String,
        /// Read from the terminal when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show or change the display name and currency
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        currency: Option<String>,
    },
    /// Record an income or expense
    Add {
        /// income or expense
        kind: TransactionKind,
        amount: Decimal,
        category: String,
        /// ISO-8601 date, today when omitted
        #[arg(short, long)]
        date: Option<String>,
    },
    /// List transactions
    List(FilterArg),
    /// Change fields of a transaction
    Edit {
        id: String,
        #[arg(long = "type")]
        kind: Option<TransactionKind>,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete one or more transactions
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Display income, expenses and balance
    Summary(FilterArg),
    /// Display category breakdowns and daily trends
    Analytics(FilterArg),
}

impl TryFrom<Commands> for fintrack::AppCommand {
    type Error = anyhow::Error;

    fn try_from(cmd: Commands) -> Result<fintrack::AppCommand> {
        Ok(match cmd {
            Commands::Login { email, password } => fintrack::AppCommand::Login {
                email,
                password: password_or_prompt(password)?,
            },
            Commands::Register {
                name,
                email,
                password,
            } => fintrack::AppCommand::Register {
                name,
                email,
                password: password_or_prompt(password)?,
            },
            Commands::Logout => fintrack::AppCommand::Logout,
            Commands::Profile { name, currency } => {
                fintrack::AppCommand::Profile { name, currency }
            }
            Commands::Add {
                kind,
                amount,
                category,
                date,
            } => fintrack::AppCommand::Add(TransactionDraft::new(
                kind,
                amount,
                &category,
                date.as_deref(),
            )),
            Commands::List(arg) => fintrack::AppCommand::List { filter: arg.filter },
            Commands::Edit {
                id,
                kind,
                amount,
                category,
                date,
            } => fintrack::AppCommand::Edit {
                id,
                changes: TransactionChanges {
                    kind,
                    amount,
                    category,
                    date,
                },
            },
            Commands::Delete { ids } => fintrack::AppCommand::Delete { ids },
            Commands::Summary(arg) => fintrack::AppCommand::Summary { filter: arg.filter },
            Commands::Analytics(arg) => fintrack::AppCommand::Analytics { filter: arg.filter },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        })
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let term = console::Term::stderr();
    term.write_str("Password: ")?;
    term.read_secure_line().context("Failed to read password")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => fintrack::cli::setup::setup_at_path(path),
            None => fintrack::cli::setup::setup(),
        },
        Some(cmd) => match fintrack::AppCommand::try_from(cmd) {
            Ok(command) => fintrack::run_command(command, cli.config_path.as_deref()).await,
            Err(e) => Err(e),
        },
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
