//! The watcher state machine.
//!
//! One [`Watcher`] exists per page load. The runtime feeds it [`Event`]s and
//! executes the returned [`Effect`]s; at most one status request is in
//! flight at any time.

use crate::config::{RetryPolicy, WatcherConfig};
use crate::location::{ConfigurationArea, Location};
use mfa_gate_core::{Identity, Principal, WhoAmI};
use std::time::Duration;
use tracing::debug;

/// What the watcher last learned about the signed-in user.
///
/// Tab-scoped and discarded on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSideStatus {
    pub identity: Identity,
    pub has_second_factor: bool,
}

impl From<&Principal> for ClientSideStatus {
    fn from(principal: &Principal) -> Self {
        Self {
            identity: principal.identity().clone(),
            has_second_factor: principal.has_second_factor(),
        }
    }
}

/// Result of one status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The endpoint identified the user.
    Status(ClientSideStatus),
    /// The endpoint reports no session (yet).
    NotAuthenticated,
    /// Network error, unexpected status or undecodable body.
    Failed { reason: String },
}

impl PollOutcome {
    /// Interprets a successful response body.
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        match WhoAmI::from_json(body) {
            Ok(WhoAmI::Authenticated(principal)) => Self::Status((&principal).into()),
            Ok(WhoAmI::Anonymous) => Self::NotAuthenticated,
            Err(report) => Self::Failed {
                reason: report.to_string(),
            },
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A status request finished.
    StatusReceived(PollOutcome),
    /// The wait requested by [`Effect::Wait`] is over.
    RetryElapsed,
    /// The URL (path or fragment) may have changed.
    Navigated(Location),
}

/// Work the runtime must carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Request the "who am I" endpoint and report back with
    /// [`Event::StatusReceived`].
    FetchStatus,
    /// Sleep, then report back with [`Event::RetryElapsed`].
    Wait(Duration),
    ShowModal,
    HideModal,
}

/// Where the watcher stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started.
    Idle,
    /// Polling for a first definitive answer; `attempts` requests made.
    Init { attempts: u32 },
    /// Polling gave up, or the session ended. Nothing more happens.
    Unresolved,
    /// The user has a second factor. Terminal.
    Compliant,
    /// No second factor, modal hidden: the user is in the configuration
    /// area, or the last re-check could not be completed.
    NonCompliant,
    /// No second factor, modal on screen.
    ModalShown,
    /// Re-checking after the user left the configuration area.
    Verifying,
}

/// Watcher for one page load.
#[derive(Debug)]
pub struct Watcher {
    policy: RetryPolicy,
    area: ConfigurationArea,
    phase: Phase,
    location: Location,
    last_status: Option<ClientSideStatus>,
    modal_visible: bool,
}

impl Watcher {
    /// Creates a watcher for a page currently at `location`.
    #[must_use]
    pub fn new(config: &WatcherConfig, location: Location) -> Self {
        Self::with_parts(config.retry_policy(), config.configuration_area(), location)
    }

    #[must_use]
    pub fn with_parts(policy: RetryPolicy, area: ConfigurationArea, location: Location) -> Self {
        Self {
            policy,
            area,
            phase: Phase::Idle,
            location,
            last_status: None,
            modal_visible: false,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[must_use]
    pub fn last_status(&self) -> Option<&ClientSideStatus> {
        self.last_status.as_ref()
    }

    #[must_use]
    pub fn modal_visible(&self) -> bool {
        self.modal_visible
    }

    /// Starts the first poll. Calling it again has no effect.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Idle {
            return Vec::new();
        }
        self.phase = Phase::Init { attempts: 0 };
        vec![Effect::FetchStatus]
    }

    /// Advances the machine.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::StatusReceived(outcome) => self.on_status(outcome),
            Event::RetryElapsed => match self.phase {
                Phase::Init { .. } => vec![Effect::FetchStatus],
                _ => Vec::new(),
            },
            Event::Navigated(location) => self.on_navigated(location),
        }
    }

    fn on_status(&mut self, outcome: PollOutcome) -> Vec<Effect> {
        match (self.phase, outcome) {
            (Phase::Init { .. } | Phase::Verifying, PollOutcome::Status(status)) => {
                self.settle(status)
            }
            (Phase::Init { attempts }, PollOutcome::NotAuthenticated | PollOutcome::Failed { .. }) => {
                let attempts = attempts + 1;
                if attempts >= self.policy.max_attempts {
                    debug!(attempts, "no definitive status; watcher stops polling");
                    self.phase = Phase::Unresolved;
                    Vec::new()
                } else {
                    self.phase = Phase::Init { attempts };
                    vec![Effect::Wait(self.policy.interval)]
                }
            }
            (Phase::Verifying, PollOutcome::NotAuthenticated) => {
                self.phase = Phase::Unresolved;
                Vec::new()
            }
            (Phase::Verifying, PollOutcome::Failed { reason }) => {
                debug!(%reason, "re-check failed; modal stays hidden");
                self.phase = Phase::NonCompliant;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn settle(&mut self, status: ClientSideStatus) -> Vec<Effect> {
        let compliant = status.has_second_factor;
        self.last_status = Some(status);

        if compliant {
            self.phase = Phase::Compliant;
            self.set_modal(false)
        } else if self.area.contains(&self.location) {
            self.phase = Phase::NonCompliant;
            self.set_modal(false)
        } else {
            self.phase = Phase::ModalShown;
            self.set_modal(true)
        }
    }

    fn on_navigated(&mut self, location: Location) -> Vec<Effect> {
        if location == self.location {
            return Vec::new();
        }
        self.location = location;
        let inside = self.area.contains(&self.location);

        match self.phase {
            Phase::ModalShown if inside => {
                self.phase = Phase::NonCompliant;
                self.set_modal(false)
            }
            Phase::NonCompliant if !inside => {
                self.phase = Phase::Verifying;
                vec![Effect::FetchStatus]
            }
            _ => Vec::new(),
        }
    }

    fn set_modal(&mut self, visible: bool) -> Vec<Effect> {
        if self.modal_visible == visible {
            return Vec::new();
        }
        self.modal_visible = visible;
        if visible {
            vec![Effect::ShowModal]
        } else {
            vec![Effect::HideModal]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watcher_at(url: &str) -> Watcher {
        Watcher::new(&WatcherConfig::default(), Location::parse(url))
    }

    fn status(has_second_factor: bool) -> Event {
        Event::StatusReceived(PollOutcome::Status(ClientSideStatus {
            identity: Identity::new("alice@example.com"),
            has_second_factor,
        }))
    }

    fn failed() -> Event {
        Event::StatusReceived(PollOutcome::Failed {
            reason: "network error".to_string(),
        })
    }

    fn navigate(url: &str) -> Event {
        Event::Navigated(Location::parse(url))
    }

    /// Drives the watcher with a simulated clock, answering every fetch
    /// with `answer`. Returns (fetches, elapsed, effects seen).
    fn simulate(
        watcher: &mut Watcher,
        mut answer: impl FnMut(u32) -> Event,
    ) -> (u32, Duration, Vec<Effect>) {
        let mut pending = watcher.start();
        let mut fetches = 0;
        let mut elapsed = Duration::ZERO;
        let mut seen = Vec::new();

        while let Some(effect) = pending.first().copied() {
            pending.remove(0);
            seen.push(effect);
            let next = match effect {
                Effect::FetchStatus => {
                    fetches += 1;
                    watcher.handle(answer(fetches))
                }
                Effect::Wait(duration) => {
                    elapsed += duration;
                    watcher.handle(Event::RetryElapsed)
                }
                Effect::ShowModal | Effect::HideModal => Vec::new(),
            };
            pending.extend(next);
        }
        (fetches, elapsed, seen)
    }

    #[test]
    fn gives_up_after_max_attempts_without_modal() {
        let mut watcher = watcher_at("/projects");

        let (fetches, elapsed, seen) = simulate(&mut watcher, |_| failed());

        assert_eq!(fetches, 50);
        assert_eq!(elapsed, Duration::from_millis(200) * 49);
        assert!(!seen.contains(&Effect::ShowModal));
        assert_eq!(watcher.phase(), Phase::Unresolved);
        assert!(!watcher.modal_visible());
    }

    #[test]
    fn unauthenticated_answers_keep_polling() {
        let mut watcher = watcher_at("/login");

        let (fetches, _, _) = simulate(&mut watcher, |n| {
            if n < 3 {
                Event::StatusReceived(PollOutcome::NotAuthenticated)
            } else {
                status(true)
            }
        });

        assert_eq!(fetches, 3);
        assert_eq!(watcher.phase(), Phase::Compliant);
    }

    #[test]
    fn late_login_is_still_detected() {
        let mut watcher = watcher_at("/projects");

        let (fetches, _, seen) = simulate(&mut watcher, |n| if n < 10 { failed() } else { status(false) });

        assert_eq!(fetches, 10);
        assert_eq!(seen.last(), Some(&Effect::ShowModal));
        assert_eq!(watcher.phase(), Phase::ModalShown);
    }

    #[test]
    fn compliant_user_never_sees_modal() {
        let mut watcher = watcher_at("/projects");
        watcher.start();

        assert!(watcher.handle(status(true)).is_empty());
        assert_eq!(watcher.phase(), Phase::Compliant);
        assert!(watcher.handle(navigate("/profile")).is_empty());
        assert!(watcher.handle(navigate("/projects")).is_empty());
        assert_eq!(
            watcher.last_status().map(|s| s.has_second_factor),
            Some(true)
        );
    }

    #[test]
    fn noncompliant_user_in_configuration_area_has_no_modal() {
        let mut watcher = watcher_at("/profile");
        watcher.start();

        assert!(watcher.handle(status(false)).is_empty());
        assert_eq!(watcher.phase(), Phase::NonCompliant);
    }

    #[test]
    fn modal_hides_in_configuration_area_and_stays_hidden_once_compliant() {
        let mut watcher = watcher_at("/projects");
        watcher.start();

        assert_eq!(watcher.handle(status(false)), vec![Effect::ShowModal]);
        assert_eq!(watcher.handle(navigate("/profile")), vec![Effect::HideModal]);
        assert_eq!(watcher.phase(), Phase::NonCompliant);

        assert_eq!(watcher.handle(navigate("/projects")), vec![Effect::FetchStatus]);
        assert_eq!(watcher.phase(), Phase::Verifying);

        assert!(watcher.handle(status(true)).is_empty());
        assert_eq!(watcher.phase(), Phase::Compliant);
        assert!(!watcher.modal_visible());
    }

    #[test]
    fn modal_reappears_when_still_noncompliant() {
        let mut watcher = watcher_at("/projects");
        watcher.start();
        watcher.handle(status(false));
        watcher.handle(navigate("/#/profile"));

        assert_eq!(watcher.handle(navigate("/#/projects")), vec![Effect::FetchStatus]);
        assert_eq!(watcher.handle(status(false)), vec![Effect::ShowModal]);
        assert_eq!(watcher.phase(), Phase::ModalShown);
    }

    #[test]
    fn failed_recheck_keeps_modal_hidden_and_retries_on_next_navigation() {
        let mut watcher = watcher_at("/projects");
        watcher.start();
        watcher.handle(status(false));
        watcher.handle(navigate("/profile"));
        watcher.handle(navigate("/projects"));

        assert!(watcher.handle(failed()).is_empty());
        assert_eq!(watcher.phase(), Phase::NonCompliant);
        assert!(!watcher.modal_visible());

        assert_eq!(watcher.handle(navigate("/tasks")), vec![Effect::FetchStatus]);
    }

    #[test]
    fn modal_ignores_navigation_outside_configuration_area() {
        let mut watcher = watcher_at("/projects");
        watcher.start();
        watcher.handle(status(false));

        assert!(watcher.handle(navigate("/tasks")).is_empty());
        assert_eq!(watcher.phase(), Phase::ModalShown);
    }

    #[test]
    fn repeated_location_is_ignored() {
        let mut watcher = watcher_at("/profile");
        watcher.start();
        watcher.handle(status(false));

        assert!(watcher.handle(navigate("/profile")).is_empty());
        assert_eq!(watcher.phase(), Phase::NonCompliant);
    }

    #[test]
    fn navigation_during_initial_poll_is_remembered() {
        let mut watcher = watcher_at("/projects");
        watcher.start();
        assert!(watcher.handle(navigate("/profile")).is_empty());

        assert!(watcher.handle(status(false)).is_empty());
        assert_eq!(watcher.phase(), Phase::NonCompliant);
    }

    #[test]
    fn stale_timer_is_ignored_after_settling() {
        let mut watcher = watcher_at("/projects");
        watcher.start();
        watcher.handle(status(true));

        assert!(watcher.handle(Event::RetryElapsed).is_empty());
    }

    #[test]
    fn start_is_idempotent() {
        let mut watcher = watcher_at("/projects");
        assert_eq!(watcher.start(), vec![Effect::FetchStatus]);
        assert!(watcher.start().is_empty());
    }

    #[test]
    fn poll_outcome_from_body() {
        let outcome = PollOutcome::from_body(
            r#"{"authenticated": true, "user": {"email": "a@example.com", "fido_enabled": true}}"#,
        );
        assert_eq!(
            outcome,
            PollOutcome::Status(ClientSideStatus {
                identity: Identity::new("a@example.com"),
                has_second_factor: true,
            })
        );
        assert_eq!(
            PollOutcome::from_body(r#"{"authenticated": false}"#),
            PollOutcome::NotAuthenticated
        );
        assert!(matches!(
            PollOutcome::from_body("<html>"),
            PollOutcome::Failed { .. }
        ));
    }
}
