use chrono::{DateTime, Utc};
use smc_schemas::{Candle, Direction, Tick, Trend};
use tracing::debug;

use smc_detect::{
    adx, analyze_structure, atr, breakers_from_invalidated, detect_asian_range,
    detect_fvgs, detect_liquidity, detect_order_blocks, divergence, is_displaced, macd, ote_zone,
    premium_discount, previous_day_levels, rsi, volume_pressure, AsianSweep, AsianSweepDetector,
    DailySweepDetector, DetectorParams, SweepEvent,
};

use crate::amd::{detect_amd, AmdPhase};
use crate::killzones::killzone_info;
use crate::silver_bullet::{silver_bullet_view, SilverBulletPhase};
use crate::smt::smt_divergence;
use crate::snapshot::{ConfirmedSweep, MarketSnapshot, SweepSource};

/// Per-symbol strategy toggles from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyToggles {
    pub pdh_pdl_sweep: bool,
    pub asian_range_sweep: bool,
    pub fvg_entry: bool,
    pub silver_bullet: bool,
    pub amd: bool,
    pub smt: bool,
}

impl Default for StrategyToggles {
    fn default() -> Self {
        Self {
            pdh_pdl_sweep: true,
            asian_range_sweep: true,
            fvg_entry: true,
            silver_bullet: true,
            amd: true,
            smt: true,
        }
    }
}

/// Analyzer knobs for one symbol, after asset-profile overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub params: DetectorParams,
    pub strategies: StrategyToggles,
    pub killzones_enabled: bool,
    /// Broker clock offset from UTC, hours.
    pub timezone_offset_hours: i64,
    pub asian_start_hour: u32,
    pub asian_end_hour: u32,
    /// Pierce buffers, pips.
    pub asian_buffer_pips: f64,
    pub daily_buffer_pips: f64,
    pub sb_use_pm_window: bool,
    pub amd_min_range_bars: usize,
    pub amd_max_range_percentage: f64,
    /// Unconfirmed Asian sweeps older than this expire.
    pub asian_pending_window_minutes: i64,
    /// Correlated reference trades inversely (DXY-style).
    pub smt_inverted: bool,
}

impl AnalyzerConfig {
    pub fn forex_defaults(pip_size: f64) -> Self {
        Self {
            params: DetectorParams::forex_defaults(pip_size),
            strategies: StrategyToggles::default(),
            killzones_enabled: true,
            timezone_offset_hours: 0,
            asian_start_hour: 0,
            asian_end_hour: 7,
            asian_buffer_pips: 2.0,
            daily_buffer_pips: 2.0,
            sb_use_pm_window: false,
            amd_min_range_bars: 10,
            amd_max_range_percentage: 0.3,
            asian_pending_window_minutes: 15,
            smt_inverted: false,
        }
    }
}

/// The OHLC frames one cycle analyses.
#[derive(Debug, Clone)]
pub struct FrameBundle {
    pub ltf: Vec<Candle>,
    pub mtf: Vec<Candle>,
    pub htf: Vec<Candle>,
    /// Correlated instrument's LTF frame for SMT, when configured.
    pub smt: Option<Vec<Candle>>,
}

/// Multi-timeframe analyzer.
///
/// Stateless by construction: every detector is a pure function of the
/// frame, so re-running the same bundle yields the same snapshot and there
/// is no per-symbol cache to leak between symbols.
#[derive(Debug, Default)]
pub struct Analyzer;

impl Analyzer {
    pub fn new() -> Self {
        Self
    }

    /// One full analysis pass for one symbol.
    pub fn analyze(
        &self,
        symbol: &str,
        config: &AnalyzerConfig,
        frames: &FrameBundle,
        tick: Tick,
        now: DateTime<Utc>,
    ) -> MarketSnapshot {
        let params = &config.params;
        let ltf = &frames.ltf;

        // LTF primitives.
        let structure = analyze_structure(ltf, params);
        let order_blocks = detect_order_blocks(ltf, params);
        let breakers = breakers_from_invalidated(ltf, &order_blocks.invalidated, params);
        let (fvgs, ifvgs) = detect_fvgs(ltf, params);
        let liquidity = detect_liquidity(ltf, &structure.swings, params);
        let pd_zone = premium_discount(ltf, &structure, params);

        // Higher-timeframe context.
        let mtf_structure = analyze_structure(&frames.mtf, params);
        let htf_structure = analyze_structure(&frames.htf, params);
        let mtf_trend = mtf_structure.trend;
        let htf_trend = htf_structure.trend;
        let mtf_bias = mtf_trend.direction();
        let htf_bias = htf_trend.direction();
        let mtf_last_choch = mtf_structure.last_choch().map(|b| b.direction);
        let htf_adx = adx(&frames.htf, params.adx_period);

        // Session-window detectors.
        let today = now.date_naive();
        let asian_range = detect_asian_range(
            ltf,
            today,
            config.asian_start_hour,
            config.asian_end_hour,
        );
        let asian_sweep: Option<AsianSweep> = if config.strategies.asian_range_sweep {
            asian_range.as_ref().and_then(|range| {
                AsianSweepDetector {
                    buffer: params.price(config.asian_buffer_pips),
                    session_end_hour: config.asian_end_hour,
                    pending_window_minutes: config.asian_pending_window_minutes,
                }
                .detect(ltf, range)
            })
        } else {
            None
        };

        let daily_levels = previous_day_levels(ltf, now);
        let daily_sweep: Option<SweepEvent> = if config.strategies.pdh_pdl_sweep {
            daily_levels.as_ref().and_then(|levels| {
                DailySweepDetector {
                    buffer: params.price(config.daily_buffer_pips),
                }
                .detect(ltf, levels, today)
            })
        } else {
            None
        };

        let silver_bullet = if config.strategies.silver_bullet {
            silver_bullet_view(
                ltf,
                &liquidity,
                &fvgs,
                config.timezone_offset_hours,
                config.sb_use_pm_window,
            )
        } else {
            crate::silver_bullet::SilverBulletView {
                phase: SilverBulletPhase::Waiting,
                direction: None,
            }
        };

        let amd = if config.strategies.amd {
            detect_amd(ltf, config.amd_min_range_bars, config.amd_max_range_percentage)
        } else {
            crate::amd::AmdView {
                phase: AmdPhase::None,
                direction: None,
                range_high: 0.0,
                range_low: 0.0,
            }
        };

        let smt = if config.strategies.smt {
            frames
                .smt
                .as_ref()
                .map(|correlated| {
                    smt_divergence(ltf, correlated, params.swing_strength, config.smt_inverted)
                })
                .unwrap_or(crate::smt::SmtView {
                    signal: None,
                    symbol_made_new_extreme: false,
                })
        } else {
            crate::smt::SmtView {
                signal: None,
                symbol_made_new_extreme: false,
            }
        };

        // Momentum / volume.
        let rsi_value = rsi(ltf, params.rsi_period);
        let macd_snap = macd(ltf, 12, 26, 9);
        let diverg = macd_snap
            .as_ref()
            .and_then(|m| divergence(&structure.swings, m));
        let volume = volume_pressure(ltf, params);
        let atr_value = atr(ltf, params.atr_period);
        let adr_percent = adr_percent(ltf, today);

        let pd_pct = pd_zone.as_ref().map_or(50.0, |z| z.percentage);
        let atr_for_momentum = atr_value.unwrap_or(0.0);
        let momentum_buy = smc_detect::momentum_confirmation(
            ltf,
            Direction::Buy,
            pd_pct,
            atr_for_momentum,
            volume.rvol,
        );
        let momentum_sell = smc_detect::momentum_confirmation(
            ltf,
            Direction::Sell,
            pd_pct,
            atr_for_momentum,
            volume.rvol,
        );

        let killzone = killzone_info(now, config.timezone_offset_hours, config.killzones_enabled);

        // Sweep context for state machine and scoring, strongest source
        // first. Scoring weights: 25 for a named-strategy sweep, 15 for a
        // generic in-killzone grab.
        let sweep = pick_sweep(
            daily_sweep.as_ref(),
            asian_sweep.as_ref(),
            &silver_bullet,
            &amd,
            &liquidity,
            killzone.is_killzone,
        );

        // FVG entries can be disabled per symbol; Silver Bullet staging
        // above still saw the raw gaps.
        let fvgs = if config.strategies.fvg_entry {
            fvgs
        } else {
            Vec::new()
        };

        let ltf_trend = structure.trend;
        let price = tick.bid;

        // OTE retracement band once a sweep names the reversal direction.
        let ote = sweep.and_then(|s| {
            structure
                .reference_range()
                .and_then(|(low, high)| ote_zone(high, low, s.direction, params))
        });

        let snapshot_bias = combined_bias(
            ltf_trend,
            pd_zone.as_ref(),
            sweep.as_ref(),
            &ifvgs,
            price,
        );

        let tta_aligned = match (htf_bias, mtf_bias, ltf_trend.direction()) {
            (Some(h), Some(m), Some(l)) => h == m && m == l,
            _ => false,
        };

        let regime_scrutiny = match (snapshot_bias, rsi_value) {
            (Some(Direction::Buy), Some(r)) => {
                htf_trend == Trend::Bearish && ltf_trend == Trend::Bearish && r < 30.0
            }
            (Some(Direction::Sell), Some(r)) => {
                htf_trend == Trend::Bullish && ltf_trend == Trend::Bullish && r > 70.0
            }
            _ => false,
        };

        let n = ltf.len();
        let recent_displacement = n >= 1 && (is_displaced(ltf, n - 1) || (n >= 2 && is_displaced(ltf, n - 2)));

        debug!(
            symbol,
            bias = ?snapshot_bias,
            ltf = %ltf_trend,
            htf = %htf_trend,
            sweep = ?sweep.map(|s| s.source),
            "analysis cycle"
        );

        MarketSnapshot {
            symbol: symbol.to_string(),
            timestamp: now,
            price,
            tick,
            ltf_trend,
            mtf_trend,
            htf_trend,
            mtf_bias,
            htf_bias,
            mtf_last_choch,
            structure,
            order_blocks,
            breakers,
            fvgs,
            ifvgs,
            liquidity,
            pd_zone,
            ote,
            asian_range,
            asian_sweep,
            daily_levels,
            daily_sweep,
            silver_bullet,
            amd,
            smt,
            rsi: rsi_value,
            macd: macd_snap,
            divergence: diverg,
            volume,
            atr: atr_value,
            htf_adx,
            adr_percent,
            momentum_buy,
            momentum_sell,
            killzone,
            sweep,
            bias: snapshot_bias,
            tta_aligned,
            regime_scrutiny,
            recent_displacement,
        }
    }
}

/// Today's realised range against the mean daily range of the five most
/// recent completed days in the frame.
fn adr_percent(frame: &[Candle], today: chrono::NaiveDate) -> Option<f64> {
    use std::collections::BTreeMap;
    let mut by_day: BTreeMap<chrono::NaiveDate, (f64, f64)> = BTreeMap::new();
    for c in frame {
        let entry = by_day
            .entry(c.ts.date_naive())
            .or_insert((f64::MIN, f64::MAX));
        entry.0 = entry.0.max(c.high);
        entry.1 = entry.1.min(c.low);
    }
    let today_range = by_day.get(&today).map(|(h, l)| h - l)?;
    let previous: Vec<f64> = by_day
        .iter()
        .rev()
        .filter(|(d, _)| **d != today)
        .take(5)
        .map(|(_, (h, l))| h - l)
        .collect();
    if previous.is_empty() {
        return None;
    }
    let avg = previous.iter().sum::<f64>() / previous.len() as f64;
    if avg <= 0.0 {
        return None;
    }
    Some(today_range / avg * 100.0)
}

fn pick_sweep(
    daily: Option<&SweepEvent>,
    asian: Option<&AsianSweep>,
    silver_bullet: &crate::silver_bullet::SilverBulletView,
    amd: &crate::amd::AmdView,
    liquidity: &smc_detect::LiquiditySet,
    in_killzone: bool,
) -> Option<ConfirmedSweep> {
    if let Some(s) = daily.filter(|s| s.confirmed) {
        return Some(ConfirmedSweep {
            source: SweepSource::PdhPdl,
            direction: s.direction,
            bonus: 25.0,
        });
    }
    if let Some(s) = asian.filter(|s| s.confirmed) {
        return Some(ConfirmedSweep {
            source: SweepSource::AsianRange,
            direction: s.direction,
            bonus: 25.0,
        });
    }
    if matches!(
        silver_bullet.phase,
        SilverBulletPhase::SweepDetected | SilverBulletPhase::EntryReady
    ) {
        if let Some(direction) = silver_bullet.direction {
            return Some(ConfirmedSweep {
                source: SweepSource::SilverBullet,
                direction,
                bonus: 25.0,
            });
        }
    }
    if matches!(amd.phase, AmdPhase::Manipulation | AmdPhase::Distribution) {
        if let Some(direction) = amd.direction {
            return Some(ConfirmedSweep {
                source: SweepSource::Amd,
                direction,
                bonus: 25.0,
            });
        }
    }
    if in_killzone {
        if let Some(s) = liquidity.sweeps.last() {
            return Some(ConfirmedSweep {
                source: SweepSource::GenericKillzone,
                direction: s.kind.reversal_direction(),
                bonus: 15.0,
            });
        }
    }
    None
}

/// Combined-bias precedence (first match wins):
/// 1. golden iFVG (confidence >= 80) dictates its direction;
/// 2. trend x zone default: bullish trend in discount/equilibrium buys,
///    bearish trend in premium/equilibrium sells;
/// 3. a NEUTRAL default is overridden by a confirmed sweep whose direction
///    the zone does not contradict;
/// 4. a NEUTRAL default is overridden by an iFVG of confidence >= 70.
fn combined_bias(
    ltf_trend: Trend,
    pd_zone: Option<&smc_detect::PdZone>,
    sweep: Option<&ConfirmedSweep>,
    ifvgs: &[smc_detect::InvertedFvg],
    _price: f64,
) -> Option<Direction> {
    let best_ifvg = |dir: Direction| -> f64 {
        ifvgs
            .iter()
            .filter(|i| i.direction == dir)
            .map(|i| i.confidence)
            .fold(0.0, f64::max)
    };

    for dir in [Direction::Buy, Direction::Sell] {
        if best_ifvg(dir) >= 80.0 {
            return Some(dir);
        }
    }

    let base = match (ltf_trend, pd_zone) {
        (Trend::Bullish, Some(zone)) if zone.allows(Direction::Buy) => Some(Direction::Buy),
        (Trend::Bearish, Some(zone)) if zone.allows(Direction::Sell) => Some(Direction::Sell),
        _ => None,
    };
    if base.is_some() {
        return base;
    }

    if let Some(s) = sweep {
        let zone_ok = pd_zone.map_or(true, |z| z.allows(s.direction));
        if zone_ok {
            return Some(s.direction);
        }
    }

    for dir in [Direction::Buy, Direction::Sell] {
        if best_ifvg(dir) >= 70.0 {
            return Some(dir);
        }
    }

    None
}
