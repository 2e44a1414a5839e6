//! mfa-gate audit tool.
//!
//! Reports which users of the protected application have a second factor
//! configured and, when account disabling is switched on, disables the
//! active ones that do not. Uses the same compliance predicate and
//! exemption list as the request gate.

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod report;

use crate::cli::{Cli, Command};
use crate::commands::{Context, PromptConfirm};
use crate::config::AuditConfig;
use crate::db::PersonRepository;
use crate::error::AuditError;
use rootcause::prelude::Report;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::io::Write;
use std::str::FromStr;
use tracing::info;

/// Runs one command.
///
/// # Errors
///
/// Returns an error if configuration or the database is unavailable, or the
/// command itself fails.
pub async fn run(cli: Cli) -> Result<(), Report<AuditError>> {
    let config = AuditConfig::from_env()?;
    let exemptions = config.exemptions();

    let options = match &cli.database_url {
        Some(url) => PgConnectOptions::from_str(url).map_err(AuditError::from)?,
        None => config.database.connect_options(),
    };
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .map_err(AuditError::from)?;
    info!("Connected to database");

    let store = PersonRepository::new(pool);
    let ctx = Context {
        store: &store,
        exemptions: &exemptions,
        legacy_disable_enabled: config.enforcement.legacy_disable_enabled,
    };

    let mut out = std::io::stdout();
    let mut confirm = PromptConfirm::new(std::io::stdin().lock(), std::io::stdout());

    match cli.command {
        Command::Report { format } => commands::report(&ctx, format, &mut out).await?,
        Command::Enforce { yes } => {
            commands::enforce(&ctx, yes, &mut confirm, &mut out).await?;
        }
        Command::EnableUser { email, force } => {
            commands::enable_user(&ctx, &email, force, &mut confirm, &mut out).await?;
        }
    }
    out.flush().map_err(AuditError::from)?;
    Ok(())
}
