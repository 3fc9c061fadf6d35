use serde::{Deserialize, Serialize};

/// Risk thresholds and gate toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Percent of balance per trade.
    pub risk_per_trade_percent: f64,
    pub use_fixed_lot: bool,
    pub fixed_lot_size: f64,
    /// Daily realised loss as percent of balance that halts new trading.
    pub max_daily_loss_percent: f64,
    /// Consecutive losing trades on one symbol that bench it for the day.
    pub max_consecutive_losses: u32,
    pub max_trades_per_day: u32,
    pub max_open_trades: u32,
    pub cooldown_same_symbol_seconds: i64,
    pub min_stacking_time_seconds: i64,
    pub min_stacking_distance_pips: f64,
    /// Same side + entry within this distance counts as a duplicate.
    pub duplicate_distance_pips: f64,
    /// No new entries 12:00-13:00 UTC.
    pub lunch_break_filter: bool,
    /// Outside the tradable window only crypto may trade.
    pub weekend_gate: bool,
    pub friday_force_close: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_percent: 0.5,
            use_fixed_lot: false,
            fixed_lot_size: 0.01,
            max_daily_loss_percent: 2.0,
            max_consecutive_losses: 3,
            max_trades_per_day: 10,
            max_open_trades: 5,
            cooldown_same_symbol_seconds: 60,
            min_stacking_time_seconds: 300,
            min_stacking_distance_pips: 15.0,
            duplicate_distance_pips: 5.0,
            lunch_break_filter: false,
            weekend_gate: true,
            friday_force_close: false,
        }
    }
}

/// Why the risk controller refused the trade. Stable codes; journaled
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskRefusal {
    DailyLossHalt { loss_percent: f64 },
    ConsecutiveLossHalt { symbol: String, losses: u32 },
    WeekendGate,
    LunchBreak,
    ManualBlackout { label: String },
    Cooldown { remaining_seconds: i64 },
    DuplicatePosition { ticket: u64 },
    Stacking { reason: String },
    NewsBlackout { reason: String },
    Correlation { reasons: Vec<String> },
    MaxTradesPerDay { count: u32 },
    MaxOpenTrades { count: u32 },
}

impl std::fmt::Display for RiskRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskRefusal::DailyLossHalt { loss_percent } => {
                write!(f, "daily loss kill switch ({loss_percent:.2}%)")
            }
            RiskRefusal::ConsecutiveLossHalt { symbol, losses } => {
                write!(f, "{losses} consecutive losses on {symbol}")
            }
            RiskRefusal::WeekendGate => f.write_str("outside tradable window"),
            RiskRefusal::LunchBreak => f.write_str("lunch-break filter"),
            RiskRefusal::ManualBlackout { label } => write!(f, "manual blackout: {label}"),
            RiskRefusal::Cooldown { remaining_seconds } => {
                write!(f, "cooldown active ({remaining_seconds}s remaining)")
            }
            RiskRefusal::DuplicatePosition { ticket } => {
                write!(f, "duplicate of open position {ticket}")
            }
            RiskRefusal::Stacking { reason } => write!(f, "stacking guard: {reason}"),
            RiskRefusal::NewsBlackout { reason } => write!(f, "news blackout: {reason}"),
            RiskRefusal::Correlation { reasons } => {
                write!(f, "correlation guard: {}", reasons.join("; "))
            }
            RiskRefusal::MaxTradesPerDay { count } => {
                write!(f, "daily trade cap reached ({count})")
            }
            RiskRefusal::MaxOpenTrades { count } => {
                write!(f, "open-position cap reached ({count})")
            }
        }
    }
}
