use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smc_schemas::Direction;

/// Order filling policy, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMode {
    Fok,
    Ioc,
    Return,
}

impl FillMode {
    /// The next mode to try when the venue rejects this one, or `None`
    /// when the fallback chain is exhausted.
    pub fn fallback(self) -> Option<FillMode> {
        match self {
            FillMode::Fok => Some(FillMode::Ioc),
            FillMode::Ioc => Some(FillMode::Return),
            FillMode::Return => None,
        }
    }
}

/// Market order submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub sl: f64,
    pub tp: f64,
    pub fill_mode: FillMode,
    pub comment: String,
    pub magic: u64,
}

/// Broker acknowledgement of a filled market order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub ticket: u64,
    pub fill_price: f64,
}

/// Open position as the broker reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub open_price: f64,
    pub volume: f64,
    pub sl: f64,
    pub tp: f64,
    pub open_time: DateTime<Utc>,
    pub magic: u64,
    pub comment: String,
}

/// Why a position left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    Manual,
    Expert,
    StopOut,
    News,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitReason::TakeProfit => "TP",
            ExitReason::StopLoss => "SL",
            ExitReason::Manual => "manual",
            ExitReason::Expert => "expert",
            ExitReason::StopOut => "stop-out",
            ExitReason::News => "news",
        };
        f.write_str(s)
    }
}

/// Closed-trade deal record from broker history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub ticket: u64,
    pub position_ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub price: f64,
    pub time: DateTime<Utc>,
    pub profit: f64,
    pub swap: f64,
    pub commission: f64,
    pub reason: ExitReason,
}

impl Deal {
    /// Net result of the deal: profit plus financing and fees.
    pub fn net_pnl(&self) -> f64 {
        self.profit + self.swap + self.commission
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_mode_fallback_chain() {
        assert_eq!(FillMode::Fok.fallback(), Some(FillMode::Ioc));
        assert_eq!(FillMode::Ioc.fallback(), Some(FillMode::Return));
        assert_eq!(FillMode::Return.fallback(), None);
    }

    #[test]
    fn deal_net_pnl_includes_costs() {
        let d = Deal {
            ticket: 2,
            position_ticket: 1,
            symbol: "EURUSD".into(),
            direction: Direction::Buy,
            volume: 0.10,
            price: 1.0900,
            time: Utc::now(),
            profit: 42.0,
            swap: -1.5,
            commission: -0.7,
            reason: ExitReason::TakeProfit,
        };
        assert!((d.net_pnl() - 39.8).abs() < 1e-12);
    }
}
