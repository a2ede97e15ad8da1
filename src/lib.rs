//! Samples what is on the user's screen and asks a hosted model what the
//! user is doing. The probe process captures observations on a timer, the
//! monitor process classifies every new observation, and small offline modes
//! re-classify stored observation files on demand.

pub mod classify;
pub mod cli;
pub mod desktop;
pub mod hover;
pub mod monitor;
pub mod probe;
pub mod store;
pub mod utils;
