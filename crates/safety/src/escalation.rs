//! Session-scoped escalation state.
//!
//! Once a positive signal is dispatched the session stays in crisis mode until
//! it ends. Escalation is additive: it never blocks or suppresses messaging.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::detector::{CrisisSignal, Severity};

/// Chat surface a signal originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Companion,
    CompanionReply,
    Community,
}

/// Fixed navigation targets every escalation must offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    CrisisResources,
    UrgentBooking,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::CrisisResources => "/resources/crisis",
            Route::UrgentBooking => "/booking?urgent=true",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationLink {
    pub label: &'static str,
    pub route: Route,
}

/// What a front-end renders for a positive signal: the banner text plus both
/// mandatory links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Escalation {
    pub severity: Severity,
    pub surface: Surface,
    pub message: &'static str,
    pub links: [EscalationLink; 2],
}

impl Escalation {
    fn new(severity: Severity, surface: Surface) -> Self {
        Self {
            severity,
            surface,
            message: banner_message(severity),
            links: [
                EscalationLink {
                    label: "Get immediate crisis support",
                    route: Route::CrisisResources,
                },
                EscalationLink {
                    label: "Book an urgent session with a counsellor",
                    route: Route::UrgentBooking,
                },
            ],
        }
    }
}

fn banner_message(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => {
            "It sounds like you might be in danger. Please reach out for immediate help right now."
        }
        Severity::Elevated => {
            "It sounds like things are really hard at the moment. You don't have to face this alone."
        }
    }
}

/// Observable escalation state for the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscalationState {
    pub crisis_active: bool,
    /// Highest severity seen this session.
    pub severity: Option<Severity>,
    pub last_surface: Option<Surface>,
    pub signals: u64,
}

impl EscalationState {
    /// The persistent banner, present once crisis mode is active.
    pub fn banner(&self) -> Option<Escalation> {
        if !self.crisis_active {
            return None;
        }
        Some(Escalation::new(self.severity?, self.last_surface?))
    }
}

/// Shared handle that every chat surface dispatches signals into.
///
/// Clones observe and mutate the same session state.
#[derive(Debug, Clone)]
pub struct EscalationDispatcher {
    state: Arc<watch::Sender<EscalationState>>,
}

impl Default for EscalationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EscalationDispatcher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(EscalationState::default());
        Self {
            state: Arc::new(sender),
        }
    }

    /// Apply a signal. Returns the per-message escalation when it is positive.
    pub fn dispatch(&self, surface: Surface, signal: &CrisisSignal) -> Option<Escalation> {
        let severity = signal.severity?;

        let mut activated = false;
        self.state.send_modify(|state| {
            activated = !state.crisis_active;
            state.crisis_active = true;
            state.severity = state.severity.max(Some(severity));
            state.last_surface = Some(surface);
            state.signals += 1;
        });

        warn!(?surface, ?severity, matches = signal.matched.len(), "crisis signal detected");
        if activated {
            info!("crisis escalation activated for session");
        }

        Some(Escalation::new(severity, surface))
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().crisis_active
    }

    pub fn state(&self) -> EscalationState {
        self.state.borrow().clone()
    }

    /// Receiver that yields every state change, for rendering the persistent banner.
    pub fn subscribe(&self) -> watch::Receiver<EscalationState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::assess;

    #[test]
    fn test_negative_signal_leaves_state_untouched() {
        let dispatcher = EscalationDispatcher::new();
        let escalation = dispatcher.dispatch(Surface::Companion, &assess("good morning"));

        assert!(escalation.is_none());
        assert!(!dispatcher.is_active());
        assert_eq!(dispatcher.state(), EscalationState::default());
    }

    #[test]
    fn test_positive_signal_renders_both_links() {
        let dispatcher = EscalationDispatcher::new();
        let escalation = dispatcher
            .dispatch(Surface::Community, &assess("I feel like giving up on this deadline"))
            .expect("positive signal escalates");

        assert!(dispatcher.is_active());
        assert_eq!(escalation.severity, Severity::Elevated);
        let routes: Vec<Route> = escalation.links.iter().map(|link| link.route).collect();
        assert_eq!(routes, vec![Route::CrisisResources, Route::UrgentBooking]);
    }

    #[test]
    fn test_crisis_flag_is_monotonic() {
        let dispatcher = EscalationDispatcher::new();
        dispatcher.dispatch(Surface::Companion, &assess("I want to end it all"));
        dispatcher.dispatch(Surface::Companion, &assess("thanks, that helped a bit"));
        dispatcher.dispatch(Surface::Community, &assess("feeling hopeless"));

        let state = dispatcher.state();
        assert!(state.crisis_active);
        assert_eq!(state.severity, Some(Severity::Critical));
        assert_eq!(state.signals, 2);
    }

    #[test]
    fn test_clones_share_session_state() {
        let companion = EscalationDispatcher::new();
        let community = companion.clone();

        community.dispatch(Surface::Community, &assess("I'm worthless"));
        assert!(companion.is_active());
        assert!(companion.state().banner().is_some());
    }

    #[tokio::test]
    async fn test_subscribers_observe_activation() {
        let dispatcher = EscalationDispatcher::new();
        let mut receiver = dispatcher.subscribe();

        dispatcher.dispatch(Surface::CompanionReply, &assess("kill myself"));

        receiver.changed().await.expect("sender alive");
        let state = receiver.borrow_and_update().clone();
        assert!(state.crisis_active);
        assert_eq!(
            state.banner().map(|banner| banner.severity),
            Some(Severity::Critical)
        );
    }

    #[test]
    fn test_route_paths_are_fixed() {
        assert_eq!(Route::CrisisResources.path(), "/resources/crisis");
        assert_eq!(Route::UrgentBooking.path(), "/booking?urgent=true");
    }
}
