//! Shared value types for the SMC engine.
//!
//! Everything in this crate is a plain value record: no I/O, no detector
//! logic, no broker knowledge beyond the instrument metadata the broker
//! reports. Heavier domain types (order blocks, snapshots, signals) live in
//! the crate that produces them; this crate only holds what every layer
//! needs to agree on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Timeframe
// ---------------------------------------------------------------------------

/// Broker chart timeframe. The engine runs three of these per symbol
/// (low / medium / high), mapped from config labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Bar duration in minutes.
    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    /// Canonical broker label (`"M15"`, `"H1"`, ...).
    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }

    /// Parse a broker label. Case-insensitive.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "M1" => Some(Timeframe::M1),
            "M5" => Some(Timeframe::M5),
            "M15" => Some(Timeframe::M15),
            "M30" => Some(Timeframe::M30),
            "H1" => Some(Timeframe::H1),
            "H4" => Some(Timeframe::H4),
            "D1" => Some(Timeframe::D1),
            _ => None,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Direction / Trend
// ---------------------------------------------------------------------------

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }

    /// +1 for buy, -1 for sell. Used by exposure accounting.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => f.write_str("BUY"),
            Direction::Sell => f.write_str("SELL"),
        }
    }
}

/// Market structure trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Bullish,
    Bearish,
    Ranging,
}

impl Trend {
    /// The trade direction this trend supports, if any.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Trend::Bullish => Some(Direction::Buy),
            Trend::Bearish => Some(Direction::Sell),
            Trend::Ranging => None,
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Bullish => f.write_str("BULLISH"),
            Trend::Bearish => f.write_str("BEARISH"),
            Trend::Ranging => f.write_str("RANGING"),
        }
    }
}

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

/// One OHLC bar. Frames are ordered oldest-first, contiguous, and indexed
/// by position; detectors rely on both properties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body_high(&self) -> f64 {
        self.open.max(self.close)
    }

    pub fn body_low(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.body_high()
    }

    pub fn lower_wick(&self) -> f64 {
        self.body_low() - self.low
    }
}

// ---------------------------------------------------------------------------
// Asset class / instrument metadata
// ---------------------------------------------------------------------------

/// Coarse instrument class driving profile overrides and pip heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    ForexMajor,
    Crypto,
    Commodity,
    Indices,
}

impl AssetClass {
    /// Classify a broker symbol by name. Broker suffixes ("m", ".") are
    /// ignored. Unknown symbols fall back to forex.
    pub fn classify(symbol: &str) -> Self {
        let s = normalize_symbol(symbol);
        if s.contains("BTC") || s.contains("ETH") {
            AssetClass::Crypto
        } else if s.contains("XAU") || s.contains("XAG") {
            AssetClass::Commodity
        } else if s.contains("US30") || s.contains("USTEC") || s.contains("NAS") || s.contains("SPX")
        {
            AssetClass::Indices
        } else {
            AssetClass::ForexMajor
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetClass::ForexMajor => f.write_str("forex_major"),
            AssetClass::Crypto => f.write_str("crypto"),
            AssetClass::Commodity => f.write_str("commodity"),
            AssetClass::Indices => f.write_str("indices"),
        }
    }
}

/// Strip broker decorations so symbol heuristics see the raw pair name.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .trim_end_matches('m')
        .replace('.', "")
        .to_ascii_uppercase()
}

/// Base/quote currency split for a forex-style symbol name.
///
/// Non-forex instruments report their pricing currency as quote (e.g.
/// `XAUUSD` -> `("XAU", "USD")`); the correlation guard treats those codes
/// like currencies, which matches how the exposure rules are written.
pub fn split_currencies(symbol: &str) -> (String, String) {
    let s = normalize_symbol(symbol);
    if s.len() >= 6 {
        (s[..3].to_string(), s[3..6].to_string())
    } else {
        (s.clone(), String::new())
    }
}

/// Instrument contract metadata as reported by the broker. Read-only during
/// a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub name: String,
    pub asset_class: AssetClass,
    /// Price increment representing one pip (0.0001 forex, 0.01 JPY/gold).
    pub pip_size: f64,
    /// Smallest broker price increment (point).
    pub point: f64,
    /// Price decimal digits.
    pub digits: u32,
    pub contract_size: f64,
    /// Account-currency value of one pip for one lot, broker-reported.
    pub pip_value_per_lot: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
    /// Broker minimum stop distance, in points.
    pub stops_level_points: f64,
    pub bid: f64,
    pub ask: f64,
}

impl InstrumentSpec {
    pub fn spread_pips(&self) -> f64 {
        if self.pip_size > 0.0 {
            (self.ask - self.bid) / self.pip_size
        } else {
            0.0
        }
    }

    /// Round a price to the instrument's quoted digits.
    pub fn round_price(&self, price: f64) -> f64 {
        let factor = 10f64.powi(self.digits as i32);
        (price * factor).round() / factor
    }

    /// Broker minimum stop distance expressed in price units.
    pub fn min_stop_distance(&self) -> f64 {
        self.stops_level_points * self.point
    }

    pub fn pips(&self, price_distance: f64) -> f64 {
        if self.pip_size > 0.0 {
            price_distance / self.pip_size
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Tick / account
// ---------------------------------------------------------------------------

/// Fresh quote used by the executor and spread sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
    pub spread_pips: f64,
    pub point: f64,
}

/// Broker account snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub login: u64,
    pub balance: f64,
    pub equity: f64,
    pub free_margin: f64,
    pub leverage: u32,
    pub trade_allowed: bool,
    pub trade_algo_allowed: bool,
    pub currency: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timeframe_labels_round_trip() {
        for tf in [
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ] {
            assert_eq!(Timeframe::from_label(tf.label()), Some(tf));
        }
        assert_eq!(Timeframe::from_label("m15"), Some(Timeframe::M15));
        assert_eq!(Timeframe::from_label("W1"), None);
    }

    #[test]
    fn direction_opposite_and_sign() {
        assert_eq!(Direction::Buy.opposite(), Direction::Sell);
        assert_eq!(Direction::Sell.opposite(), Direction::Buy);
        assert_eq!(Direction::Buy.sign(), 1.0);
        assert_eq!(Direction::Sell.sign(), -1.0);
    }

    #[test]
    fn candle_geometry() {
        let c = Candle {
            ts: Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
            open: 1.0850,
            high: 1.0870,
            low: 1.0840,
            close: 1.0860,
            volume: 1200.0,
        };
        assert!(c.is_bullish());
        assert!((c.body() - 0.0010).abs() < 1e-12);
        assert!((c.upper_wick() - 0.0010).abs() < 1e-12);
        assert!((c.lower_wick() - 0.0010).abs() < 1e-12);
        assert!((c.range() - 0.0030).abs() < 1e-12);
    }

    #[test]
    fn asset_class_heuristics() {
        assert_eq!(AssetClass::classify("EURUSDm"), AssetClass::ForexMajor);
        assert_eq!(AssetClass::classify("XAUUSD"), AssetClass::Commodity);
        assert_eq!(AssetClass::classify("BTCUSDm"), AssetClass::Crypto);
        assert_eq!(AssetClass::classify("US30"), AssetClass::Indices);
    }

    #[test]
    fn currency_split_handles_suffixes() {
        assert_eq!(
            split_currencies("EURUSDm"),
            ("EUR".to_string(), "USD".to_string())
        );
        assert_eq!(
            split_currencies("XAUUSD"),
            ("XAU".to_string(), "USD".to_string())
        );
    }

    #[test]
    fn instrument_rounding_and_stops() {
        let spec = InstrumentSpec {
            name: "EURUSD".to_string(),
            asset_class: AssetClass::ForexMajor,
            pip_size: 0.0001,
            point: 0.00001,
            digits: 5,
            contract_size: 100_000.0,
            pip_value_per_lot: 10.0,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
            stops_level_points: 30.0,
            bid: 1.08500,
            ask: 1.08512,
        };
        assert!((spec.spread_pips() - 1.2).abs() < 1e-9);
        assert_eq!(spec.round_price(1.085123), 1.08512);
        assert!((spec.min_stop_distance() - 0.0003).abs() < 1e-12);
        assert!((spec.pips(0.0025) - 25.0).abs() < 1e-9);
    }
}
