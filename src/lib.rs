pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::App;
use crate::cli::transactions::TransactionChanges;
use crate::cli::ui::ConsoleNotifier;
use crate::core::config::AppConfig;
use crate::core::filter::DateFilter;
use crate::core::transaction::TransactionDraft;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Login {
        email: String,
        password: String,
    },
    Register {
        name: String,
        email: String,
        password: String,
    },
    Logout,
    Profile {
        name: Option<String>,
        currency: Option<String>,
    },
    Add(TransactionDraft),
    List {
        filter: Option<DateFilter>,
    },
    Edit {
        id: String,
        changes: TransactionChanges,
    },
    Delete {
        ids: Vec<String>,
    },
    Summary {
        filter: Option<DateFilter>,
    },
    Analytics {
        filter: Option<DateFilter>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fintrack starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let default_filter = config.filter;
    let app = App::new(config, Arc::new(ConsoleNotifier::new()))?;

    match command {
        AppCommand::Login { email, password } => {
            cli::account::login(&app, &email, &password).await
        }
        AppCommand::Register {
            name,
            email,
            password,
        } => cli::account::register(&app, &name, &email, &password).await,
        AppCommand::Logout => cli::account::logout(&app).await,
        AppCommand::Profile { name, currency } => {
            cli::account::profile(&app, name, currency).await
        }
        AppCommand::Add(draft) => cli::transactions::add(&app, draft).await,
        AppCommand::List { filter } => {
            cli::transactions::list(&app, filter.unwrap_or(default_filter)).await
        }
        AppCommand::Edit { id, changes } => cli::transactions::edit(&app, &id, changes).await,
        AppCommand::Delete { ids } => cli::transactions::delete(&app, &ids).await,
        AppCommand::Summary { filter } => {
            cli::summary::run(&app, filter.unwrap_or(default_filter)).await
        }
        AppCommand::Analytics { filter } => {
            cli::analytics::run(&app, filter.unwrap_or(default_filter)).await
        }
    }
}
