//! Bounded-retry fetch shared by the resolver and the segment engine.
//!
//! The page/API call sites and the segment call sites historically drifted
//! apart; one parameterized loop with per-class policies keeps them
//! consistent.

mod policy;
mod run;

pub use policy::{FetchPolicy, PolicyKind};
pub use run::fetch_with_retry;
