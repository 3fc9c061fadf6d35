use std::fmt;

/// Transient broker retcodes. The executor retries these (with a fresh
/// quote per attempt); everything else is final for the current signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Requote,
    Connection,
    Timeout,
    PriceOff,
    PriceChanged,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransientKind::Requote => "REQUOTE",
            TransientKind::Connection => "CONNECTION",
            TransientKind::Timeout => "TIMEOUT",
            TransientKind::PriceOff => "PRICE_OFF",
            TransientKind::PriceChanged => "PRICE_CHANGED",
        };
        f.write_str(s)
    }
}

/// Failure kinds a broker port must distinguish.
///
/// These are *expected* conditions: the engine never unwinds on them, it
/// downgrades to skip-cycle / skip-signal / retry-later and journals the
/// outcome. Only configuration and safety failures abort the process, and
/// those are not broker errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// No candles returned for (symbol, timeframe) after the port's own
    /// retry. The cycle skips this symbol.
    DataUnavailable { symbol: String, timeframe: String },
    /// Symbol not known / not visible / not tradable.
    SymbolUnknown(String),
    InsufficientMargin,
    /// SL/TP rejected after the executor's auto-correction pass.
    InvalidStops,
    SpreadTooWide,
    /// Requested price no longer executable within the slippage budget.
    Slippage,
    MarketClosed,
    /// The venue rejected the requested filling mode; the executor falls
    /// back FOK -> IOC -> RETURN.
    UnsupportedFilling,
    /// Retryable condition with its subcode.
    Transient(TransientKind),
}

impl BrokerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Transient(_))
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::DataUnavailable { symbol, timeframe } => {
                write!(f, "no candles for {symbol} {timeframe}")
            }
            BrokerError::SymbolUnknown(s) => write!(f, "unknown symbol {s}"),
            BrokerError::InsufficientMargin => f.write_str("insufficient margin"),
            BrokerError::InvalidStops => f.write_str("invalid stops"),
            BrokerError::SpreadTooWide => f.write_str("spread too wide"),
            BrokerError::Slippage => f.write_str("slippage budget exceeded"),
            BrokerError::MarketClosed => f.write_str("market closed"),
            BrokerError::UnsupportedFilling => f.write_str("unsupported filling mode"),
            BrokerError::Transient(kind) => write!(f, "transient broker error: {kind}"),
        }
    }
}

impl std::error::Error for BrokerError {}
