//! Typing presence for the active channel.
//!
//! [`TypingTracker`] is a pure state machine: callers pass the current
//! [`Instant`] in and ask for [`TypingTracker::next_deadline`] to know when to
//! call [`TypingTracker::poll`] again.

use std::time::Duration;

use tokio::time::Instant;
use wellspring_config::TypingConfig;

use crate::types::UserId;

/// Outbound typing signal the caller should emit for the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

/// Ephemeral per-channel typing flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypingState {
    pub active: bool,
    pub updated_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct TypingTracker {
    local_idle: Duration,
    remote_timeout: Duration,
    self_user: Option<UserId>,
    local_deadline: Option<Instant>,
    remote: TypingState,
    remote_deadline: Option<Instant>,
}

impl TypingTracker {
    pub fn new(local_idle: Duration, remote_timeout: Duration) -> Self {
        Self {
            local_idle,
            remote_timeout,
            self_user: None,
            local_deadline: None,
            remote: TypingState::default(),
            remote_deadline: None,
        }
    }

    pub fn from_config(config: &TypingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.local_idle_ms),
            Duration::from_millis(config.remote_timeout_ms),
        )
    }

    /// Typing events from this user id are the local user's own echo.
    pub fn with_self_user(mut self, user_id: Option<UserId>) -> Self {
        self.self_user = user_id;
        self
    }

    /// Local keystroke. Always yields `Start` and re-arms the idle timer.
    pub fn keystroke(&mut self, now: Instant) -> TypingSignal {
        self.local_deadline = Some(now + self.local_idle);
        TypingSignal::Start
    }

    /// Fire due timers. Returns `Stop` when the local idle timer expired.
    pub fn poll(&mut self, now: Instant) -> Option<TypingSignal> {
        if self.remote_deadline.is_some_and(|deadline| deadline <= now) {
            self.remote_deadline = None;
            self.remote = TypingState {
                active: false,
                updated_at: Some(now),
            };
        }

        match self.local_deadline {
            Some(deadline) if deadline <= now => {
                self.local_deadline = None;
                Some(TypingSignal::Stop)
            }
            _ => None,
        }
    }

    /// Cancel local typing, e.g. on send. Yields `Stop` only if it was active.
    pub fn stop_local(&mut self) -> Option<TypingSignal> {
        self.local_deadline.take().map(|_| TypingSignal::Stop)
    }

    /// Remote `user_typing`. Returns whether the event was applied.
    pub fn remote_start(&mut self, user_id: &str, now: Instant) -> bool {
        if self.self_user.as_deref() == Some(user_id) {
            return false;
        }

        self.remote = TypingState {
            active: true,
            updated_at: Some(now),
        };
        self.remote_deadline = Some(now + self.remote_timeout);
        true
    }

    /// Remote `user_stop_typing`.
    pub fn remote_stop(&mut self, now: Instant) {
        self.remote_deadline = None;
        self.remote = TypingState {
            active: false,
            updated_at: Some(now),
        };
    }

    pub fn is_local_typing(&self) -> bool {
        self.local_deadline.is_some()
    }

    pub fn is_remote_typing(&self) -> bool {
        self.remote.active
    }

    pub fn remote_state(&self) -> TypingState {
        self.remote
    }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.local_deadline, self.remote_deadline) {
            (Some(local), Some(remote)) => Some(local.min(remote)),
            (local, remote) => local.or(remote),
        }
    }

    /// Forget all state, e.g. on channel switch. Yields `Stop` if the local
    /// user was typing.
    pub fn reset(&mut self) -> Option<TypingSignal> {
        let signal = self.stop_local();
        self.remote = TypingState::default();
        self.remote_deadline = None;
        signal
    }
}
