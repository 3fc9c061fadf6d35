//! Primitive SMC detectors.
//!
//! Every detector in this crate is a pure function of a candle frame plus a
//! [`DetectorParams`] value: same frame in, same primitives out. No detector
//! holds state between calls and none touches a broker. The multi-timeframe
//! analyzer owns per-symbol caching and profile overrides; this crate only
//! computes.

mod asian;
mod breakers;
mod daily_levels;
mod fvg;
mod indicators;
mod liquidity;
mod momentum;
mod order_blocks;
mod structure;
mod swings;
mod volume;
mod zones;

pub use asian::{detect_asian_range, AsianRange, AsianSweep, AsianSweepDetector};
pub use breakers::{breakers_from_invalidated, BreakerBlock, BreakerStatus};
pub use daily_levels::{
    previous_day_levels, DailySweepDetector, PreviousDayLevels, SweepEvent, SweepLevel,
};
pub use fvg::{detect_fvgs, Fvg, FvgKind, FvgStatus, InvertedFvg};
pub use indicators::{
    adx, atr, cmf, macd, relative_volume, rsi, AdxRegime, AdxSnapshot, MacdSnapshot,
};
pub use liquidity::{detect_liquidity, LiquidityKind, LiquiditySet, LiquiditySweep, LiquidityZone};
pub use momentum::{divergence, momentum_confirmation, Divergence, MomentumVerdict};
pub use order_blocks::{detect_order_blocks, ObStatus, OrderBlock, OrderBlockSet};
pub use structure::{analyze_structure, is_displaced, BreakKind, StructureBreak, StructureView};
pub use swings::{detect_swings, SwingKind, SwingPoint};
pub use volume::{volume_pressure, VolumePressure, VsaTag};
pub use zones::{ote_zone, premium_discount, OteZone, PdZone, ZoneKind};

/// Detector tuning knobs, after asset-profile overrides have been merged.
///
/// One value of this struct is built per (symbol, cycle); detectors never
/// mutate it. Pip-denominated knobs are converted to price units with
/// `pip_size` at the call site inside each detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorParams {
    /// Instrument pip size in price units.
    pub pip_size: f64,
    /// Fractal width for swing detection.
    pub swing_strength: usize,
    /// Bars after which the latest structure event is considered stale.
    pub max_structure_age: usize,
    /// Impulse body vs prior body ratio for order-block qualification.
    pub min_imbalance_ratio: f64,
    /// Order blocks older than this are purged.
    pub ob_max_age_bars: usize,
    /// Minimum 3-bar imbalance, in pips.
    pub min_gap_pips: f64,
    /// Gap overlap fraction at which an FVG is invalidated.
    pub fvg_invalidation_fraction: f64,
    /// Equal-high/low clustering tolerance, in pips.
    pub equal_level_pips: f64,
    /// Rolling window for equal-level clustering.
    pub liquidity_lookback: usize,
    /// Half-width of the equilibrium band, in pips.
    pub equilibrium_buffer_pips: f64,
    /// Fallback premium/discount range window when no confirmed swings.
    pub pd_lookback: usize,
    /// OTE retracement band.
    pub ote_fib_start: f64,
    pub ote_fib_end: f64,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub adx_period: usize,
    pub cmf_period: usize,
}

impl DetectorParams {
    /// Conservative defaults for a 5-digit forex instrument.
    pub fn forex_defaults(pip_size: f64) -> Self {
        Self {
            pip_size,
            swing_strength: 5,
            max_structure_age: 50,
            min_imbalance_ratio: 1.5,
            ob_max_age_bars: 50,
            min_gap_pips: 2.0,
            fvg_invalidation_fraction: 1.0,
            equal_level_pips: 3.0,
            liquidity_lookback: 20,
            equilibrium_buffer_pips: 5.0,
            pd_lookback: 50,
            ote_fib_start: 0.618,
            ote_fib_end: 0.786,
            rsi_period: 14,
            atr_period: 14,
            adx_period: 14,
            cmf_period: 20,
        }
    }

    /// Pip-denominated knob converted to price units.
    pub fn price(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }
}
