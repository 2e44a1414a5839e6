//! Access to the protected application's `person` table.

use crate::error::AuditError;
use async_trait::async_trait;
use mfa_gate_core::{Identity, MfaFlags, Principal};
use rootcause::prelude::Report;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

/// One row of the `person` table, as far as the audit is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PersonRecord {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub totp_enabled: bool,
    pub email_otp_enabled: bool,
    pub fido_enabled: bool,
    pub active: bool,
    pub role: Option<String>,
}

impl PersonRecord {
    #[must_use]
    pub fn flags(&self) -> MfaFlags {
        MfaFlags::none()
            .with_totp(self.totp_enabled)
            .with_email_otp(self.email_otp_enabled)
            .with_fido(self.fido_enabled)
    }

    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal::new(Identity::new(self.email.clone()), self.flags())
    }

    #[must_use]
    pub fn has_second_factor(&self) -> bool {
        self.flags().has_second_factor()
    }

    /// "First Last", with missing parts left out.
    #[must_use]
    pub fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[must_use]
    pub fn role_label(&self) -> &str {
        self.role.as_deref().unwrap_or("-")
    }
}

/// Reads and updates people.
#[async_trait]
pub trait PersonStore: Send + Sync {
    /// All people with an email address, ordered by email.
    async fn list(&self) -> Result<Vec<PersonRecord>, Report<AuditError>>;

    /// Looks a person up by email, ignoring case.
    async fn find_by_email(&self, email: &str)
    -> Result<Option<PersonRecord>, Report<AuditError>>;

    /// Sets the `active` flag. Returns `false` if it already had that value.
    async fn set_active(&self, id: &str, active: bool) -> Result<bool, Report<AuditError>>;
}

const SELECT_PERSON: &str = r#"
    SELECT id::text AS id,
           email,
           first_name,
           last_name,
           COALESCE(totp_enabled, FALSE) AS totp_enabled,
           COALESCE(email_otp_enabled, FALSE) AS email_otp_enabled,
           COALESCE(fido_enabled, FALSE) AS fido_enabled,
           COALESCE(active, FALSE) AS active,
           role::text AS role
    FROM person
"#;

/// Repository for the `person` table.
pub struct PersonRepository {
    pool: PgPool,
}

impl PersonRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonStore for PersonRepository {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<PersonRecord>, Report<AuditError>> {
        let query = format!("{SELECT_PERSON} WHERE email IS NOT NULL ORDER BY email");
        let rows = sqlx::query_as::<_, PersonRecord>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(AuditError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<PersonRecord>, Report<AuditError>> {
        let query = format!("{SELECT_PERSON} WHERE lower(email) = lower($1) LIMIT 1");
        let row = sqlx::query_as::<_, PersonRecord>(&query)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(AuditError::from)?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn set_active(&self, id: &str, active: bool) -> Result<bool, Report<AuditError>> {
        let result = sqlx::query(
            "UPDATE person SET active = $2 WHERE id = $1::uuid AND active IS DISTINCT FROM $2",
        )
        .bind(id)
        .bind(active)
        .execute(&self.pool)
        .await
        .map_err(AuditError::from)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store for command tests.

    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub(crate) people: Mutex<Vec<PersonRecord>>,
        pub(crate) failing_ids: HashSet<String>,
    }

    impl MemoryStore {
        pub(crate) fn new(people: Vec<PersonRecord>) -> Self {
            Self {
                people: Mutex::new(people),
                failing_ids: HashSet::new(),
            }
        }

        pub(crate) fn is_active(&self, email: &str) -> bool {
            self.people
                .lock()
                .expect("lock")
                .iter()
                .any(|person| person.email == email && person.active)
        }
    }

    #[async_trait]
    impl PersonStore for MemoryStore {
        async fn list(&self) -> Result<Vec<PersonRecord>, Report<AuditError>> {
            let mut people = self.people.lock().expect("lock").clone();
            people.sort_by(|a, b| a.email.cmp(&b.email));
            Ok(people)
        }

        async fn find_by_email(
            &self,
            email: &str,
        ) -> Result<Option<PersonRecord>, Report<AuditError>> {
            Ok(self
                .people
                .lock()
                .expect("lock")
                .iter()
                .find(|person| person.email.eq_ignore_ascii_case(email.trim()))
                .cloned())
        }

        async fn set_active(&self, id: &str, active: bool) -> Result<bool, Report<AuditError>> {
            if self.failing_ids.contains(id) {
                return Err(AuditError::Database {
                    details: "row locked".to_string(),
                }
                .into());
            }
            let mut people = self.people.lock().expect("lock");
            let person = people
                .iter_mut()
                .find(|person| person.id == id)
                .ok_or_else(|| AuditError::Database {
                    details: format!("no person with id {id}"),
                })?;
            let changed = person.active != active;
            person.active = active;
            Ok(changed)
        }
    }

    pub(crate) fn person(email: &str, flags: MfaFlags, active: bool) -> PersonRecord {
        PersonRecord {
            id: format!("id-{email}"),
            email: email.to_string(),
            first_name: Some("Test".to_string()),
            last_name: Some("User".to_string()),
            totp_enabled: flags.totp_enabled,
            email_otp_enabled: flags.email_otp_enabled,
            fido_enabled: flags.fido_enabled,
            active,
            role: Some("user".to_string()),
        }
    }
}
