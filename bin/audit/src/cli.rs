//! Command-line interface.

use crate::commands::OutputFormat;
use clap::{Parser, Subcommand};

/// Audits second-factor configuration of the protected application's users
/// and optionally disables accounts without one.
#[derive(Debug, Parser)]
#[command(name = "mfa-gate-audit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// PostgreSQL connection URL; overrides the DATABASE__* and DB_* settings
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List users and their second-factor status
    Report {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Disable active users without a second factor
    ///
    /// Only prints the affected users unless
    /// ENFORCEMENT__LEGACY_DISABLE_ENABLED is true.
    Enforce {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Re-enable a disabled user
    EnableUser {
        /// Email of the user
        email: String,

        /// Enable even if the user has no second factor, without asking
        #[arg(short, long)]
        force: bool,
    },
}
