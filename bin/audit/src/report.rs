//! Second-factor audit report.

use crate::db::PersonRecord;
use chrono::{DateTime, Utc};
use mfa_gate_core::ExemptionSet;
use serde::Serialize;
use std::fmt::Write as _;

const RULE: &str =
    "================================================================================";
const THIN_RULE: &str =
    "--------------------------------------------------------------------------------";

/// One person in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub email: String,
    pub name: String,
    pub role: Option<String>,
    pub methods: Vec<&'static str>,
    pub has_second_factor: bool,
    pub exempt: bool,
}

impl ReportEntry {
    fn from_person(person: &PersonRecord, exemptions: &ExemptionSet) -> Self {
        Self {
            email: person.email.clone(),
            name: person.display_name(),
            role: person.role.clone(),
            methods: person.flags().enabled_methods().map(|m| m.label()).collect(),
            has_second_factor: person.has_second_factor(),
            exempt: exemptions.contains(person.principal().identity()),
        }
    }

    fn exempt_marker(&self) -> &'static str {
        if self.exempt { " [EXEMPT]" } else { "" }
    }

    fn role_label(&self) -> &str {
        self.role.as_deref().unwrap_or("-")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub with_second_factor: usize,
    pub without_second_factor: usize,
    pub inactive: usize,
    pub exempt: usize,
}

/// People grouped by compliance.
///
/// Active people without a second factor are the ones the gate redirects
/// and `enforce` would disable, unless exempt.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub summary: Summary,
    pub with_second_factor: Vec<ReportEntry>,
    pub without_second_factor: Vec<ReportEntry>,
    pub inactive: Vec<ReportEntry>,
    pub configured_exemptions: Vec<String>,
}

impl AuditReport {
    #[must_use]
    pub fn build(
        people: &[PersonRecord],
        exemptions: &ExemptionSet,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut with_second_factor = Vec::new();
        let mut without_second_factor = Vec::new();
        let mut inactive = Vec::new();

        for person in people {
            let entry = ReportEntry::from_person(person, exemptions);
            if !person.active {
                inactive.push(entry);
            } else if entry.has_second_factor {
                with_second_factor.push(entry);
            } else {
                without_second_factor.push(entry);
            }
        }

        let exempt = with_second_factor
            .iter()
            .chain(&without_second_factor)
            .chain(&inactive)
            .filter(|entry| entry.exempt)
            .count();

        Self {
            generated_at,
            summary: Summary {
                total: people.len(),
                with_second_factor: with_second_factor.len(),
                without_second_factor: without_second_factor.len(),
                inactive: inactive.len(),
                exempt,
            },
            with_second_factor,
            without_second_factor,
            inactive,
            configured_exemptions: exemptions.iter().map(str::to_string).collect(),
        }
    }

    /// Active people without a second factor who are not exempt.
    #[must_use]
    pub fn needing_action(&self) -> usize {
        self.without_second_factor
            .iter()
            .filter(|entry| !entry.exempt)
            .count()
    }

    /// Human-readable rendering.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "{RULE}")?;
        writeln!(out, "2FA AUDIT REPORT")?;
        writeln!(out, "{RULE}")?;
        writeln!(
            out,
            "Generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(out)?;

        let summary = &self.summary;
        writeln!(out, "SUMMARY:")?;
        writeln!(out, "  Total users: {}", summary.total)?;
        writeln!(out, "  Users with 2FA: {}", summary.with_second_factor)?;
        writeln!(out, "  Users without 2FA: {}", summary.without_second_factor)?;
        writeln!(out, "  Inactive users: {}", summary.inactive)?;
        writeln!(out, "  Exempt users: {}", summary.exempt)?;
        writeln!(out)?;

        if !self.with_second_factor.is_empty() {
            writeln!(out, "USERS WITH 2FA ENABLED:")?;
            writeln!(out, "{THIN_RULE}")?;
            for entry in &self.with_second_factor {
                writeln!(
                    out,
                    "  ✓ {:<40} {}{}",
                    entry.email,
                    entry.methods.join(", "),
                    entry.exempt_marker()
                )?;
                writeln!(out, "    Name: {}, Role: {}", entry.name, entry.role_label())?;
            }
            writeln!(out)?;
        }

        if !self.without_second_factor.is_empty() {
            writeln!(out, "USERS WITHOUT 2FA:")?;
            writeln!(out, "{THIN_RULE}")?;
            for entry in &self.without_second_factor {
                writeln!(out, "  ✗ {:<40} Active{}", entry.email, entry.exempt_marker())?;
                writeln!(out, "    Name: {}, Role: {}", entry.name, entry.role_label())?;
            }
            writeln!(out)?;
        }

        if !self.inactive.is_empty() {
            writeln!(out, "INACTIVE USERS:")?;
            writeln!(out, "{THIN_RULE}")?;
            for entry in &self.inactive {
                let status = if entry.has_second_factor {
                    "with 2FA"
                } else {
                    "without 2FA"
                };
                writeln!(
                    out,
                    "  - {:<40} {}{}",
                    entry.email,
                    status,
                    entry.exempt_marker()
                )?;
                writeln!(out, "    Name: {}, Role: {}", entry.name, entry.role_label())?;
            }
            writeln!(out)?;
        }

        if !self.configured_exemptions.is_empty() {
            writeln!(out, "CONFIGURED EXEMPT USERS:")?;
            writeln!(out, "{THIN_RULE}")?;
            for identity in &self.configured_exemptions {
                writeln!(out, "  • {identity}")?;
            }
            writeln!(out)?;
        }

        writeln!(out, "{RULE}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::person;
    use chrono::TimeZone;
    use mfa_gate_core::MfaFlags;

    fn report() -> AuditReport {
        let people = vec![
            person("ann@example.com", MfaFlags::none().with_totp(true), true),
            person("bob@example.com", MfaFlags::none(), true),
            person("Admin@Example.com", MfaFlags::none(), true),
            person(
                "old@example.com",
                MfaFlags::none().with_fido(true).with_email_otp(true),
                false,
            ),
        ];
        let exemptions = ExemptionSet::parse_list("admin@example.com");
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("time");
        AuditReport::build(&people, &exemptions, at)
    }

    #[test]
    fn groups_people_by_compliance() {
        let report = report();
        assert_eq!(
            report.summary,
            Summary {
                total: 4,
                with_second_factor: 1,
                without_second_factor: 2,
                inactive: 1,
                exempt: 1,
            }
        );
        assert_eq!(report.inactive[0].methods, vec!["Email OTP", "FIDO"]);
        assert_eq!(report.needing_action(), 1);
    }

    #[test]
    fn exemption_matching_ignores_case() {
        let report = report();
        let admin = report
            .without_second_factor
            .iter()
            .find(|entry| entry.email == "Admin@Example.com")
            .expect("admin listed");
        assert!(admin.exempt);
    }

    #[test]
    fn text_lists_sections_and_markers() {
        let text = report().render_text();
        assert!(text.contains("Generated: 2026-01-02 03:04:05 UTC"));
        assert!(text.contains("Users without 2FA: 2"));
        assert!(text.contains("USERS WITH 2FA ENABLED:"));
        assert!(text.contains("TOTP"));
        assert!(text.contains("Admin@Example.com"));
        assert!(text.contains("[EXEMPT]"));
        assert!(text.contains("  • admin@example.com"));
    }

    #[test]
    fn json_carries_summary() {
        let value = serde_json::to_value(report()).expect("serialize");
        assert_eq!(value["summary"]["without_second_factor"], 2);
        assert_eq!(value["configured_exemptions"][0], "admin@example.com");
    }
}
