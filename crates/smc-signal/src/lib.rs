//! Scoring and veto engine.
//!
//! Turns a [`smc_analysis::MarketSnapshot`] plus the symbol's sequence
//! state into at most one [`Signal`], recording every run as a
//! [`TradeDecision`] for the journal. The hard vetoes reject before any
//! points are awarded; the additive score is capped at 100; stop and
//! target construction enforce the side and reward/risk invariants before
//! a signal leaves this crate.

mod engine;
mod policy;
mod stops;
mod types;

pub use engine::{SignalContext, SignalEngine};
pub use policy::SignalPolicy;
pub use stops::{build_stops, StopPlan};
pub use types::{Quality, Rejection, Signal, TradeDecision};
