use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction};

use crate::swings::{SwingKind, SwingPoint};
use crate::DetectorParams;

/// Which side of the book the resting stops sit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityKind {
    /// Above price: shorts' stops, taken by a run on highs.
    BuySide,
    /// Below price: longs' stops, taken by a run on lows.
    SellSide,
}

impl LiquidityKind {
    /// The trade direction a sweep of this pool sets up (sell-side taken
    /// implies a buy reversal and vice versa).
    pub fn reversal_direction(self) -> Direction {
        match self {
            LiquidityKind::BuySide => Direction::Sell,
            LiquidityKind::SellSide => Direction::Buy,
        }
    }
}

/// A resting pool: an equal-high/low cluster or a confirmed swing extreme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityZone {
    pub kind: LiquidityKind,
    pub level: f64,
    pub index: usize,
    pub touch_count: u32,
    pub is_equal_level: bool,
    pub swept: bool,
}

/// A wick through a pool with the close reclaiming the level in one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySweep {
    pub kind: LiquidityKind,
    pub level: f64,
    pub index: usize,
    pub sweep_high: f64,
    pub sweep_low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LiquiditySet {
    pub zones: Vec<LiquidityZone>,
    pub sweeps: Vec<LiquiditySweep>,
}

impl LiquiditySet {
    /// Latest sweep whose reversal direction matches, if any.
    pub fn last_sweep_for(&self, direction: Direction) -> Option<&LiquiditySweep> {
        self.sweeps
            .iter()
            .rev()
            .find(|s| s.kind.reversal_direction() == direction)
    }

    /// Nearest untouched pool in the travel direction of a trade, used for
    /// take-profit targeting.
    pub fn nearest_target(&self, direction: Direction, from_price: f64) -> Option<f64> {
        let mut best: Option<f64> = None;
        for z in self.zones.iter().filter(|z| !z.swept) {
            let candidate = match direction {
                Direction::Buy if z.kind == LiquidityKind::BuySide && z.level > from_price => {
                    Some(z.level)
                }
                Direction::Sell if z.kind == LiquidityKind::SellSide && z.level < from_price => {
                    Some(z.level)
                }
                _ => None,
            };
            if let Some(level) = candidate {
                best = Some(match best {
                    None => level,
                    Some(b) => {
                        if (level - from_price).abs() < (b - from_price).abs() {
                            level
                        } else {
                            b
                        }
                    }
                });
            }
        }
        best
    }
}

/// Equal-high/low clustering over a rolling window plus swing-point pools,
/// then a forward sweep scan. A bar sweeps a pool when its wick trades
/// beyond the level and its close reclaims it; the pool is then retired.
pub fn detect_liquidity(
    frame: &[Candle],
    swings: &[SwingPoint],
    params: &DetectorParams,
) -> LiquiditySet {
    let mut set = LiquiditySet::default();
    let tolerance = params.price(params.equal_level_pips);

    detect_equal_levels(frame, LiquidityKind::BuySide, tolerance, params, &mut set);
    detect_equal_levels(frame, LiquidityKind::SellSide, tolerance, params, &mut set);

    for s in swings {
        let kind = match s.kind {
            SwingKind::High => LiquidityKind::BuySide,
            SwingKind::Low => LiquidityKind::SellSide,
        };
        // Swing extremes inside an existing equal-level cluster add nothing.
        let duplicate = set
            .zones
            .iter()
            .any(|z| z.kind == kind && (z.level - s.price).abs() <= tolerance);
        if !duplicate {
            set.zones.push(LiquidityZone {
                kind,
                level: s.price,
                index: s.index,
                touch_count: 1,
                is_equal_level: false,
                swept: false,
            });
        }
    }

    scan_sweeps(frame, &mut set);
    set
}

fn detect_equal_levels(
    frame: &[Candle],
    kind: LiquidityKind,
    tolerance: f64,
    params: &DetectorParams,
    set: &mut LiquiditySet,
) {
    let lookback = params.liquidity_lookback;
    if frame.len() <= lookback {
        return;
    }
    for i in lookback..frame.len() {
        let price = match kind {
            LiquidityKind::BuySide => frame[i].high,
            LiquidityKind::SellSide => frame[i].low,
        };
        let similar = frame[i - lookback..i]
            .iter()
            .filter(|c| {
                let p = match kind {
                    LiquidityKind::BuySide => c.high,
                    LiquidityKind::SellSide => c.low,
                };
                (p - price).abs() <= tolerance
            })
            .count();
        if similar < 2 {
            continue;
        }
        let duplicate = set
            .zones
            .iter()
            .any(|z| z.kind == kind && (z.level - price).abs() <= tolerance);
        if !duplicate {
            set.zones.push(LiquidityZone {
                kind,
                level: price,
                index: i,
                touch_count: similar as u32,
                is_equal_level: true,
                swept: false,
            });
        }
    }
}

fn scan_sweeps(frame: &[Candle], set: &mut LiquiditySet) {
    for zone in &mut set.zones {
        for (i, bar) in frame.iter().enumerate().skip(zone.index + 1) {
            let swept = match zone.kind {
                LiquidityKind::BuySide => bar.high > zone.level && bar.close < zone.level,
                LiquidityKind::SellSide => bar.low < zone.level && bar.close > zone.level,
            };
            if swept {
                zone.swept = true;
                set.sweeps.push(LiquiditySweep {
                    kind: zone.kind,
                    level: zone.level,
                    index: i,
                    sweep_high: bar.high,
                    sweep_low: bar.low,
                    close: bar.close,
                });
                break;
            }
        }
    }
    set.sweeps.sort_by_key(|s| s.index);
}
