//! The audit tool's commands.
//!
//! Commands print their results to `out` and ask questions through a
//! [`Confirm`], so they run against any [`PersonStore`] without a terminal.

use crate::db::{PersonRecord, PersonStore};
use crate::error::AuditError;
use crate::report::AuditReport;
use chrono::Utc;
use clap::ValueEnum;
use mfa_gate_core::ExemptionSet;
use rootcause::prelude::Report;
use std::io::{BufRead, Write};
use tracing::{info, warn};

/// Output format of `report`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Asks the operator a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> Result<bool, Report<AuditError>>;
}

/// Reads the answer from a line of input; only `yes` confirms.
pub struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self, question: &str) -> Result<bool, Report<AuditError>> {
        write!(self.output, "{question} (yes/no): ").map_err(AuditError::from)?;
        self.output.flush().map_err(AuditError::from)?;
        let mut answer = String::new();
        self.input
            .read_line(&mut answer)
            .map_err(AuditError::from)?;
        Ok(answer.trim().eq_ignore_ascii_case("yes"))
    }
}

/// Everything the commands share.
pub struct Context<'a> {
    pub store: &'a dyn PersonStore,
    pub exemptions: &'a ExemptionSet,
    /// Whether `enforce` may disable accounts.
    pub legacy_disable_enabled: bool,
}

/// Accounts `enforce` would disable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementPlan {
    /// Active people without a second factor.
    pub without_second_factor: usize,
    /// Of those, the ones not exempt.
    pub targets: Vec<PersonRecord>,
}

impl EnforcementPlan {
    #[must_use]
    pub fn build(people: &[PersonRecord], exemptions: &ExemptionSet) -> Self {
        let candidates: Vec<&PersonRecord> = people
            .iter()
            .filter(|person| person.active && !person.has_second_factor())
            .collect();
        let targets = candidates
            .iter()
            .filter(|person| !exemptions.contains(person.principal().identity()))
            .map(|person| (*person).clone())
            .collect();
        Self {
            without_second_factor: candidates.len(),
            targets,
        }
    }
}

/// Outcome of one `enforce` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnforcementOutcome {
    pub disabled: Vec<String>,
    pub already_inactive: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub async fn report(
    ctx: &Context<'_>,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), Report<AuditError>> {
    let people = ctx.store.list().await?;
    let report = AuditReport::build(&people, ctx.exemptions, Utc::now());
    info!(
        total = report.summary.total,
        needing_action = report.needing_action(),
        "audit complete"
    );

    let rendered = match format {
        OutputFormat::Text => report.render_text(),
        OutputFormat::Json => {
            let mut json =
                serde_json::to_string_pretty(&report).map_err(|err| AuditError::Render {
                    details: err.to_string(),
                })?;
            json.push('\n');
            json
        }
    };
    out.write_all(rendered.as_bytes())
        .map_err(AuditError::from)?;
    Ok(())
}

/// Disables active, non-exempt accounts without a second factor.
///
/// Prints the plan only unless `legacy_disable_enabled` is set. Accounts
/// that fail to update are reported and the run continues.
pub async fn enforce(
    ctx: &Context<'_>,
    assume_yes: bool,
    confirm: &mut dyn Confirm,
    out: &mut dyn Write,
) -> Result<EnforcementOutcome, Report<AuditError>> {
    let people = ctx.store.list().await?;
    let plan = EnforcementPlan::build(&people, ctx.exemptions);

    if plan.without_second_factor == 0 {
        writeln!(out, "All active users have 2FA enabled. No action needed.")
            .map_err(AuditError::from)?;
        return Ok(EnforcementOutcome::default());
    }
    if plan.targets.is_empty() {
        writeln!(
            out,
            "All users without 2FA are in the exempt list. No action needed."
        )
        .map_err(AuditError::from)?;
        return Ok(EnforcementOutcome::default());
    }

    write_plan(&plan, ctx.legacy_disable_enabled, out).map_err(AuditError::from)?;

    if !ctx.legacy_disable_enabled {
        writeln!(
            out,
            "Account disabling is off (ENFORCEMENT__LEGACY_DISABLE_ENABLED); nothing was changed."
        )
        .map_err(AuditError::from)?;
        return Ok(EnforcementOutcome::default());
    }

    if !assume_yes && !confirm.confirm("Do you want to proceed?")? {
        writeln!(out, "Operation cancelled.").map_err(AuditError::from)?;
        return Ok(EnforcementOutcome::default());
    }

    let mut outcome = EnforcementOutcome::default();
    for person in &plan.targets {
        match ctx.store.set_active(&person.id, false).await {
            Ok(true) => {
                info!(email = %person.email, "account disabled");
                writeln!(out, "  ✓ Disabled: {}", person.email).map_err(AuditError::from)?;
                outcome.disabled.push(person.email.clone());
            }
            Ok(false) => {
                writeln!(out, "  - Already inactive: {}", person.email)
                    .map_err(AuditError::from)?;
                outcome.already_inactive.push(person.email.clone());
            }
            Err(report) => {
                warn!(email = %person.email, error = %report, "failed to disable account");
                writeln!(out, "  ✗ Failed to disable {}: {}", person.email, report)
                    .map_err(AuditError::from)?;
                outcome
                    .failed
                    .push((person.email.clone(), report.to_string()));
            }
        }
    }

    writeln!(out).map_err(AuditError::from)?;
    writeln!(
        out,
        "Successfully disabled {} user(s).",
        outcome.disabled.len()
    )
    .map_err(AuditError::from)?;

    if outcome.failed.is_empty() {
        Ok(outcome)
    } else {
        Err(AuditError::PartialFailure {
            failed: outcome.failed.len(),
        }
        .into())
    }
}

fn write_plan(
    plan: &EnforcementPlan,
    will_disable: bool,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    let verb = if will_disable {
        "will be disabled"
    } else {
        "would be disabled"
    };
    writeln!(out, "2FA ENFORCEMENT")?;
    writeln!(
        out,
        "Found {} active user(s) without 2FA that {verb}:",
        plan.targets.len()
    )?;
    writeln!(out)?;
    for person in &plan.targets {
        writeln!(
            out,
            "  • {} (Name: {}, Role: {})",
            person.email,
            person.display_name(),
            person.role_label()
        )?;
    }
    writeln!(out)?;
    if will_disable {
        writeln!(out, "These users will be disabled until they configure 2FA.")?;
        writeln!(
            out,
            "An administrator will need to re-enable them after they set up 2FA."
        )?;
    }
    Ok(())
}

/// Re-activates one account.
///
/// Returns whether the account was changed. An account that still lacks a
/// second factor is only enabled with `force` or an explicit confirmation.
pub async fn enable_user(
    ctx: &Context<'_>,
    email: &str,
    force: bool,
    confirm: &mut dyn Confirm,
    out: &mut dyn Write,
) -> Result<bool, Report<AuditError>> {
    let person = ctx
        .store
        .find_by_email(email)
        .await?
        .ok_or_else(|| AuditError::UserNotFound {
            email: email.to_string(),
        })?;

    let has_second_factor = person.has_second_factor();
    writeln!(out, "User: {}", person.email).map_err(AuditError::from)?;
    writeln!(out, "Name: {}", person.display_name()).map_err(AuditError::from)?;
    writeln!(
        out,
        "2FA Status: {}",
        if has_second_factor {
            "Enabled"
        } else {
            "Not configured"
        }
    )
    .map_err(AuditError::from)?;
    writeln!(
        out,
        "Active: {}",
        if person.active { "Yes" } else { "No" }
    )
    .map_err(AuditError::from)?;
    writeln!(out).map_err(AuditError::from)?;

    if person.active {
        writeln!(out, "User is already active.").map_err(AuditError::from)?;
        return Ok(false);
    }

    if !has_second_factor && !force {
        writeln!(out, "WARNING: This user does not have 2FA configured!")
            .map_err(AuditError::from)?;
        writeln!(
            out,
            "If enforcement is active, they may be disabled again."
        )
        .map_err(AuditError::from)?;
        if !confirm.confirm("Do you still want to enable this user?")? {
            writeln!(out, "Operation cancelled.").map_err(AuditError::from)?;
            return Ok(false);
        }
    }

    let changed = ctx.store.set_active(&person.id, true).await?;
    info!(email = %person.email, "account enabled");
    writeln!(out, "✓ User {} has been enabled.", person.email).map_err(AuditError::from)?;
    Ok(changed)
}
