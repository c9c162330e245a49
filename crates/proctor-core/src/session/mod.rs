//! Interview sessions.
//!
//! - [`state`]     : `Session` record and the `SessionState` machine
//! - [`controller`]: `SessionController`: consent, acquisition, the
//!   monitor task (sampling, evaluation, countdown), submission
//! - [`error`]     : `SessionError`

pub mod controller;
pub mod error;
pub mod state;

pub use controller::{SessionController, SessionSnapshot};
pub use error::SessionError;
pub use state::{Session, SessionState};
