use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smc_schemas::{Direction, Tick, Trend};

use smc_detect::{
    AdxSnapshot, AsianRange, AsianSweep, BreakerBlock, Divergence, Fvg, InvertedFvg, LiquiditySet,
    MacdSnapshot, MomentumVerdict, OrderBlockSet, OteZone, PdZone, PreviousDayLevels,
    StructureView, SweepEvent, VolumePressure,
};

use crate::amd::AmdView;
use crate::killzones::KillzoneInfo;
use crate::silver_bullet::SilverBulletView;
use crate::smt::SmtView;

/// Where a confirmed sweep came from, in scoring priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepSource {
    PdhPdl,
    AsianRange,
    SilverBullet,
    Amd,
    GenericKillzone,
    /// RSI climax trigger used by the state machine, never scored as a
    /// liquidity sweep.
    MomentumClimax,
}

impl std::fmt::Display for SweepSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SweepSource::PdhPdl => "pdh_pdl",
            SweepSource::AsianRange => "asian_range",
            SweepSource::SilverBullet => "silver_bullet",
            SweepSource::Amd => "amd",
            SweepSource::GenericKillzone => "generic_killzone",
            SweepSource::MomentumClimax => "momentum_climax",
        };
        f.write_str(s)
    }
}

/// The sweep the cycle trades off, if any.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedSweep {
    pub source: SweepSource,
    pub direction: Direction,
    /// Scoring points this sweep is worth (25 for the named strategies,
    /// 15 for a generic in-killzone grab).
    pub bonus: f64,
}

/// Everything one analysis cycle learned about one symbol.
///
/// Built once per cycle by the [`crate::Analyzer`] and then read-only: the
/// state machine, scoring engine and journal all consume the same value, so
/// no component ever sees a partially-updated view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub tick: Tick,

    pub ltf_trend: Trend,
    pub mtf_trend: Trend,
    pub htf_trend: Trend,
    pub mtf_bias: Option<Direction>,
    pub htf_bias: Option<Direction>,
    /// Direction of the most recent CHoCH on the medium timeframe, if one
    /// has printed. Feeds the HTF-conflict reversal exception.
    pub mtf_last_choch: Option<Direction>,

    pub structure: StructureView,
    pub order_blocks: OrderBlockSet,
    pub breakers: Vec<BreakerBlock>,
    pub fvgs: Vec<Fvg>,
    pub ifvgs: Vec<InvertedFvg>,
    pub liquidity: LiquiditySet,
    pub pd_zone: Option<PdZone>,
    /// Optimal Trade Entry band for the pending reversal, computed once a
    /// sweep names the direction.
    pub ote: Option<OteZone>,

    pub asian_range: Option<AsianRange>,
    pub asian_sweep: Option<AsianSweep>,
    pub daily_levels: Option<PreviousDayLevels>,
    pub daily_sweep: Option<SweepEvent>,
    pub silver_bullet: SilverBulletView,
    pub amd: AmdView,
    pub smt: SmtView,

    pub rsi: Option<f64>,
    pub macd: Option<MacdSnapshot>,
    pub divergence: Option<Divergence>,
    pub volume: VolumePressure,
    pub atr: Option<f64>,
    /// Trend strength measured on the high timeframe.
    pub htf_adx: Option<AdxSnapshot>,
    /// Today's realised range as a percentage of the 5-day average daily
    /// range. Low values mean the day still has room to travel.
    pub adr_percent: Option<f64>,
    /// Extreme-zone momentum confirmation, evaluated once per side.
    pub momentum_buy: MomentumVerdict,
    pub momentum_sell: MomentumVerdict,

    pub killzone: KillzoneInfo,
    pub sweep: Option<ConfirmedSweep>,
    /// Combined directional bias; `None` is NEUTRAL.
    pub bias: Option<Direction>,
    /// HTF, MTF and LTF all point the same way.
    pub tta_aligned: bool,
    /// The market-regime veto flagged this as a counter-setup needing
    /// extra scrutiny (flag only; rejection is the scoring engine's call).
    pub regime_scrutiny: bool,
    /// Displacement tag printed on one of the last two bars.
    pub recent_displacement: bool,
}

impl MarketSnapshot {
    /// Strongest inverted FVG supporting `direction`, if any.
    pub fn best_ifvg(&self, direction: Direction) -> Option<&InvertedFvg> {
        self.ifvgs
            .iter()
            .filter(|i| i.direction == direction)
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
    }

    /// Confidence of the strongest in-direction iFVG, 0 when absent.
    pub fn ifvg_confidence(&self, direction: Direction) -> f64 {
        self.best_ifvg(direction).map_or(0.0, |i| i.confidence)
    }

    /// A sweep confirmed by one of the named strategies (not the generic
    /// killzone grab).
    pub fn has_strategy_sweep(&self) -> bool {
        self.sweep
            .is_some_and(|s| !matches!(s.source, SweepSource::GenericKillzone))
    }
}
