//! Session lifecycle
//!
//! ```text
//! LoggedOut → LoggingIn ─┬────────────────→ LoggedIn → Navigating → Reconciling → LoggingOut → LoggedOut
//!                        └→ ForcedSession ─┘
//!
//! any state ──→ Aborted
//! ```
//!
//! `ForcedSession` is entered when the router reports another administrator
//! is already logged in. `LoggedIn` and `Navigating` may also go straight to
//! `LoggingOut` when a fatal error occurs inside the session envelope.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// State of one router management session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    LoggedOut,
    LoggingIn,
    ForcedSession,
    LoggedIn,
    Navigating,
    Reconciling,
    LoggingOut,
    Aborted,
}

impl SessionState {
    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Aborted, _) => false,
            (_, Aborted) => true,
            (LoggedOut, LoggingIn)
            | (LoggingIn, ForcedSession)
            | (LoggingIn, LoggedIn)
            | (ForcedSession, LoggedIn)
            | (LoggedIn, Navigating)
            | (LoggedIn, LoggingOut)
            | (Navigating, Reconciling)
            | (Navigating, LoggingOut)
            | (Reconciling, LoggingOut)
            | (LoggingOut, LoggedOut) => true,
            _ => false,
        }
    }
}

/// Tracks the current state and every state visited during one run
#[derive(Debug, Clone)]
pub struct SessionTracker {
    current: SessionState,
    history: Vec<SessionState>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            current: SessionState::LoggedOut,
            history: vec![SessionState::LoggedOut],
        }
    }

    pub fn current(&self) -> SessionState {
        self.current
    }

    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Move to `next`, returning the previous state
    pub fn advance(&mut self, next: SessionState) -> Result<SessionState> {
        if !self.current.can_transition_to(next) {
            return Err(Error::Other(format!(
                "illegal session transition {:?} -> {:?}",
                self.current, next
            )));
        }
        let previous = self.current;
        self.current = next;
        self.history.push(next);
        Ok(previous)
    }

    /// The run ended, either logged out again or aborted
    pub fn is_finished(&self) -> bool {
        match self.current {
            SessionState::Aborted => true,
            SessionState::LoggedOut => self.history.len() > 1,
            _ => false,
        }
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}
