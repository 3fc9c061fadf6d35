//! Risk and exposure control.
//!
//! Consulted before every order: kill switches, cooldowns, stacking and
//! duplicate guards, session/weekend/lunch gates, the manual blackout
//! calendar, the news boundary and the correlation guard. All state this
//! crate owns is either per-symbol counters or the cooldown ledger file;
//! exposure aggregates are recomputed from the broker's positions list on
//! every call.

mod controller;
mod cooldown;
mod correlation;
mod news;
mod sizing;
mod types;

pub use controller::{RiskController, TradeRequest};
pub use cooldown::CooldownLedger;
pub use correlation::{CorrelationGroup, CorrelationGuard};
pub use news::{AlwaysClear, BlackoutCalendar, BlackoutWindow, NewsFilter, NewsVerdict};
pub use sizing::{size_position, SizingError};
pub use types::{RiskConfig, RiskRefusal};
