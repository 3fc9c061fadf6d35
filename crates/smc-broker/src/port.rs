use smc_schemas::{AccountInfo, Candle, InstrumentSpec, Tick, Timeframe};

use crate::{BrokerError, Deal, OrderAck, OrderRequest, Position};

/// The broker contract the engine consumes.
///
/// Implementations must be `Send + Sync`; the daemon calls the port from
/// the supervisor task and the position-manager task. Every well-defined
/// broker condition surfaces as a [`BrokerError`] variant — implementations
/// must not panic on expected failures.
///
/// Calls are the engine's only blocking operations; each is expected to
/// observe its own wall-clock limit and report an overrun as
/// `BrokerError::Transient(TransientKind::Timeout)`.
pub trait BrokerPort: Send + Sync {
    /// Most recent `count` closed candles, oldest first, gaps filled at
    /// source. `DataUnavailable` after the adapter's own retry.
    fn ohlc(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>, BrokerError>;

    fn tick(&self, symbol: &str) -> Result<Tick, BrokerError>;

    fn symbol_info(&self, symbol: &str) -> Result<InstrumentSpec, BrokerError>;

    fn account_info(&self) -> Result<AccountInfo, BrokerError>;

    /// Submit a market order with the requested filling mode. Filling-mode
    /// fallback and transient retries are the executor's job; the port
    /// reports each attempt's outcome verbatim.
    fn open_market(&self, request: &OrderRequest) -> Result<OrderAck, BrokerError>;

    fn modify_sltp(&self, ticket: u64, sl: f64, tp: f64) -> Result<(), BrokerError>;

    fn close(&self, ticket: u64) -> Result<(), BrokerError>;

    /// Close `percent` (0..100) of the position's volume.
    fn partial_close(&self, ticket: u64, percent: f64) -> Result<(), BrokerError>;

    /// Open positions, optionally restricted to one symbol.
    fn positions(&self, symbol: Option<&str>) -> Result<Vec<Position>, BrokerError>;

    /// Deal history for a closed position ticket, oldest first.
    fn history(&self, position_ticket: u64) -> Result<Vec<Deal>, BrokerError>;
}
