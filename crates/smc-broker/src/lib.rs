//! Broker port boundary.
//!
//! This crate defines the contract the engine consumes — OHLC frames,
//! quotes, instrument/account metadata, order entry — plus the tagged
//! failure kinds every implementation must distinguish. The only concrete
//! implementation shipped in-tree is [`sim::SimBroker`], a deterministic
//! in-memory adapter used by paper mode and the scenario tests. Real
//! adapters (MT5 bridge, replay feeds) live outside this repository and
//! implement [`BrokerPort`].

mod error;
mod port;
mod types;

pub mod sim;

pub use error::{BrokerError, TransientKind};
pub use port::BrokerPort;
pub use types::{Deal, ExitReason, FillMode, OrderAck, OrderRequest, Position};
