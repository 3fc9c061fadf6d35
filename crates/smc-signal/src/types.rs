use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smc_schemas::Direction;

/// Quality band assigned from final confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    APlus,
    A,
    B,
    C,
    Reject,
}

impl Quality {
    /// Confidence banding: A+ >= 85, A 70-84, B 55-69, C 40-54.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 85.0 {
            Quality::APlus
        } else if confidence >= 70.0 {
            Quality::A
        } else if confidence >= 55.0 {
            Quality::B
        } else if confidence >= 40.0 {
            Quality::C
        } else {
            Quality::Reject
        }
    }

    pub fn base_lot_multiplier(self) -> f64 {
        match self {
            Quality::APlus => 1.0,
            Quality::A => 0.8,
            Quality::B => 0.5,
            Quality::C => 0.3,
            Quality::Reject => 0.0,
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Quality::APlus => "A+",
            Quality::A => "A",
            Quality::B => "B",
            Quality::C => "C",
            Quality::Reject => "REJECT",
        };
        f.write_str(s)
    }
}

/// Why the engine refused to emit a signal. Stable codes; the journal
/// persists the `Display` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    NoBias,
    Killzone,
    AsianSession,
    ZoneConflict,
    ForceLongOnly,
    ForceShortOnly,
    RsiContrarian,
    ImpulsiveRegime,
    StrictTrendSafety,
    MtfConflict,
    MomentumVeto(String),
    SpreadAbsolute,
    SpreadVsOrderBlock,
    SpreadVsStopDistance,
    TrendStrength,
    NotInOrderBlock,
    BreakerRequired,
    CounterTrendZone,
    CounterTrendNeedsSweep,
    ScoreFloor { score: f64, floor: f64 },
    InsufficientConfluence { count: usize, required: usize },
    NoSweepGoldenSetup,
    RiskReward { rr: f64, floor: f64 },
    InvalidStops,
    EliteOrNothing { lot: f64, score: f64 },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NoBias => f.write_str("no directional bias"),
            Rejection::Killzone => f.write_str("outside killzone"),
            Rejection::AsianSession => f.write_str("asian session block"),
            Rejection::ZoneConflict => f.write_str("zone conflict without exception"),
            Rejection::ForceLongOnly => f.write_str("force long-only profile"),
            Rejection::ForceShortOnly => f.write_str("force short-only profile"),
            Rejection::RsiContrarian => f.write_str("late entry (RSI contrarian)"),
            Rejection::ImpulsiveRegime => f.write_str("impulsive regime without exception"),
            Rejection::StrictTrendSafety => f.write_str("counter-trend forbidden by profile"),
            Rejection::MtfConflict => f.write_str("MTF bias conflict"),
            Rejection::MomentumVeto(reason) => write!(f, "momentum veto: {reason}"),
            Rejection::SpreadAbsolute => f.write_str("spread over absolute cap"),
            Rejection::SpreadVsOrderBlock => f.write_str("spread too wide vs OB height"),
            Rejection::SpreadVsStopDistance => f.write_str("spread too wide vs stop distance"),
            Rejection::TrendStrength => f.write_str("HTF ADX under threshold"),
            Rejection::NotInOrderBlock => f.write_str("price not in matching order block"),
            Rejection::BreakerRequired => f.write_str("breaker-only mode: no breaker at price"),
            Rejection::CounterTrendZone => f.write_str("counter-trend outside extreme zone"),
            Rejection::CounterTrendNeedsSweep => {
                f.write_str("counter-trend requires liquidity sweep")
            }
            Rejection::ScoreFloor { score, floor } => {
                write!(f, "score {score:.0} under floor {floor:.0}")
            }
            Rejection::InsufficientConfluence { count, required } => {
                write!(f, "only {count} confluences of {required} required")
            }
            Rejection::NoSweepGoldenSetup => f.write_str("no liquidity sweep (golden-setup mode)"),
            Rejection::RiskReward { rr, floor } => {
                write!(f, "risk/reward {rr:.2} under {floor:.2}")
            }
            Rejection::InvalidStops => f.write_str("stop construction produced invalid sides"),
            Rejection::EliteOrNothing { lot, score } => {
                write!(f, "elite-or-nothing: lot {lot:.2} at score {score:.0}")
            }
        }
    }
}

/// A tradable signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Final confidence in [0, 100].
    pub confidence: f64,
    pub quality: Quality,
    /// Risk-size scaling in [0, 1.5].
    pub lot_multiplier: f64,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub is_secondary: bool,
}

impl Signal {
    pub fn risk(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    pub fn reward(&self) -> f64 {
        (self.take_profit - self.entry_price).abs()
    }

    pub fn risk_reward(&self) -> f64 {
        let r = self.risk();
        if r > 0.0 {
            self.reward() / r
        } else {
            0.0
        }
    }
}

/// What one scoring run decided, taken or not. One of these is journaled
/// per analysis cycle per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub direction: Option<Direction>,
    /// Component name -> points awarded (may be negative).
    pub components: Vec<(String, f64)>,
    pub score: f64,
    pub rejection: Option<Rejection>,
    pub taken: bool,
}

impl TradeDecision {
    pub fn new(symbol: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp,
            direction: None,
            components: Vec::new(),
            score: 0.0,
            rejection: None,
            taken: false,
        }
    }

    pub fn add(&mut self, component: &str, points: f64) {
        self.components.push((component.to_string(), points));
        self.score += points;
    }

    pub fn reject(mut self, rejection: Rejection) -> Self {
        self.rejection = Some(rejection);
        self.taken = false;
        self
    }
}
