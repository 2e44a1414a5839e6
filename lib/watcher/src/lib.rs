//! Browser-side second-factor watcher.
//!
//! The watcher runs inside the already-loaded single-page application and
//! blocks the UI with a non-dismissible modal while the signed-in user has
//! no second factor configured. It is advisory only; the request gate is the
//! access control.
//!
//! The state machine in [`machine`] performs no I/O. It consumes [`Event`]s
//! and returns [`Effect`]s (fetch the status, wait, show or hide the modal),
//! so every transition can be exercised without a DOM or real timers. The
//! `browser` feature adds the web-sys runtime that executes those effects.

pub mod config;
pub mod location;
pub mod machine;

#[cfg(feature = "browser")]
pub mod browser;

pub use config::{RetryPolicy, WatcherConfig};
pub use location::{ConfigurationArea, Location};
pub use machine::{ClientSideStatus, Effect, Event, Phase, PollOutcome, Watcher};
