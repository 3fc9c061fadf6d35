use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the cycle did with the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleOutcome {
    Taken,
    Rejected,
    None,
}

/// One analysis-cycle decision, taken or not. Field values are the
/// display forms of the engine's enums so the stream stays readable
/// without the engine's type definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub outcome: CycleOutcome,
    pub direction: Option<String>,
    pub score: f64,
    pub rejection_reason: Option<String>,
    pub rsi: Option<f64>,
    pub pd_zone: Option<String>,
    pub htf_trend: String,
    pub ltf_trend: String,
    pub sweep_detected: bool,
    pub smt_signal: Option<String>,
    pub session: String,
    /// Scoring components as "name: points" strings.
    pub confluences: Vec<String>,
}

/// One order-open event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOpenRecord {
    pub timestamp: DateTime<Utc>,
    pub ticket: u64,
    pub symbol: String,
    pub direction: String,
    pub entry: f64,
    pub sl: f64,
    pub tp: f64,
    pub lots: f64,
    pub risk_usd: f64,
    pub rr: f64,
    pub rsi: Option<f64>,
    pub pd_zone: Option<String>,
    pub pd_percent: Option<f64>,
    pub htf_trend: String,
    pub ltf_trend: String,
    pub mtf_bias: Option<String>,
    /// Which sweep strategy produced the setup.
    pub setup_type: String,
    pub confluences: Vec<String>,
    pub confidence: f64,
    pub session: String,
    pub is_killzone: bool,
}

impl TradeOpenRecord {
    /// Shared CSV header for the trades mirror (open and close rows
    /// interleave; close rows leave open-only columns empty).
    pub const CSV_HEADER: [&'static str; 12] = [
        "event",
        "timestamp",
        "ticket",
        "symbol",
        "direction",
        "price",
        "sl",
        "tp",
        "lots",
        "confidence",
        "pnl_usd",
        "reason",
    ];

    pub fn csv_row(&self) -> Vec<String> {
        vec![
            "open".to_string(),
            self.timestamp.to_rfc3339(),
            self.ticket.to_string(),
            self.symbol.clone(),
            self.direction.clone(),
            format!("{:.5}", self.entry),
            format!("{:.5}", self.sl),
            format!("{:.5}", self.tp),
            format!("{:.2}", self.lots),
            format!("{:.1}", self.confidence),
            String::new(),
            self.setup_type.clone(),
        ]
    }
}

/// One order-close event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCloseRecord {
    pub ticket: u64,
    pub symbol: String,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub profit_usd: f64,
    pub profit_pips: f64,
    /// Profit as a percent of the balance at close.
    pub profit_percent: f64,
    pub exit_reason: String,
}

impl TradeCloseRecord {
    pub fn csv_row(&self) -> Vec<String> {
        vec![
            "close".to_string(),
            self.exit_time.to_rfc3339(),
            self.ticket.to_string(),
            self.symbol.clone(),
            String::new(),
            format!("{:.5}", self.exit_price),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            format!("{:.2}", self.profit_usd),
            self.exit_reason.clone(),
        ]
    }
}
