//! # Wellspring Safety Crate
//!
//! Crisis-signal detection and escalation shared by every chat surface.
//!
//! ## Architecture
//!
//! - **Detector**: auditable keyword matcher over user-authored text
//! - **Escalation**: session-scoped "crisis active" flag and the banner/links it renders
//!
//! ## Usage
//!
//! ```rust
//! use wellspring_safety::{assess, EscalationDispatcher, Surface};
//!
//! let dispatcher = EscalationDispatcher::new();
//! let signal = assess("I feel like giving up on this deadline");
//! let escalation = dispatcher.dispatch(Surface::Community, &signal);
//!
//! assert!(dispatcher.is_active());
//! assert_eq!(escalation.map(|e| e.links.len()), Some(2));
//! ```

pub mod detector;
pub mod escalation;

pub use detector::{assess, detect, CrisisSignal, Severity, RISK_PHRASES};
pub use escalation::{
    Escalation, EscalationDispatcher, EscalationLink, EscalationState, Route, Surface,
};
