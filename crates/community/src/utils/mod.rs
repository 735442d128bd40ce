//! Input validation shared by the send and join paths.

pub mod validation;

pub use validation::*;
