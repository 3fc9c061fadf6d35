use smc_analysis::MarketSnapshot;
use smc_schemas::{Direction, InstrumentSpec};

use crate::policy::SignalPolicy;
use crate::types::Rejection;

/// Constructed protective levels plus the reasoning the journal records.
#[derive(Debug, Clone, PartialEq)]
pub struct StopPlan {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub sl_reason: String,
    pub tp_reason: String,
}

/// Structural SL and liquidity-targeted TP.
///
/// SL: the last swing strictly on the far side of entry, buffered by
/// max(5 pips, 10% of ATR), falling back to a fixed distance; the final
/// distance is widened by the per-symbol `sl_multiplier` and clamped to
/// both the configured minimum and the broker stops-level.
///
/// TP: nearest in-direction liquidity target (PDH/PDL first, then major
/// swings, then untouched equal-level pools), falling back to a fixed
/// distance; a reward under 1x risk re-projects to 2x risk.
pub fn build_stops(
    snapshot: &MarketSnapshot,
    direction: Direction,
    entry: f64,
    policy: &SignalPolicy,
    spec: &InstrumentSpec,
) -> Result<StopPlan, Rejection> {
    let atr = snapshot.atr.unwrap_or(0.0);
    let buffer = policy.price(policy.sl_buffer_pips).max(0.1 * atr);

    // Structural stop.
    let (mut stop_loss, mut sl_reason) = match direction {
        Direction::Buy => {
            let swing = snapshot
                .structure
                .swing_lows()
                .filter(|s| s.price < entry)
                .last();
            match swing {
                Some(s) => (s.price - buffer, "structure low".to_string()),
                None => (
                    entry - policy.price(policy.fallback_sl_pips),
                    "fixed fallback".to_string(),
                ),
            }
        }
        Direction::Sell => {
            let swing = snapshot
                .structure
                .swing_highs()
                .filter(|s| s.price > entry)
                .last();
            match swing {
                Some(s) => (s.price + buffer, "structure high".to_string()),
                None => (
                    entry + policy.price(policy.fallback_sl_pips),
                    "fixed fallback".to_string(),
                ),
            }
        }
    };

    // Symbol shield: widen the distance, keep the side.
    if policy.sl_multiplier > 1.0 {
        let distance = (entry - stop_loss).abs() * policy.sl_multiplier;
        stop_loss = match direction {
            Direction::Buy => entry - distance,
            Direction::Sell => entry + distance,
        };
        sl_reason = format!("{sl_reason} x{:.1}", policy.sl_multiplier);
    }

    // Clamp to the larger of the configured minimum and the broker
    // stops-level (plus two points of slack).
    let min_distance = policy
        .price(policy.min_sl_distance_pips)
        .max(spec.min_stop_distance() + 2.0 * spec.point);
    if (entry - stop_loss).abs() < min_distance {
        stop_loss = match direction {
            Direction::Buy => entry - min_distance,
            Direction::Sell => entry + min_distance,
        };
        sl_reason = format!("{sl_reason} (min distance)");
    }

    let risk = (entry - stop_loss).abs();

    // Liquidity-targeted TP.
    let (mut take_profit, mut tp_reason) = find_target(snapshot, direction, entry, policy);

    let reward = (take_profit - entry).abs();
    if reward < risk {
        take_profit = match direction {
            Direction::Buy => entry + risk * 2.0,
            Direction::Sell => entry - risk * 2.0,
        };
        tp_reason = "re-projected to 2R".to_string();
    }

    let stop_loss = spec.round_price(stop_loss);
    let take_profit = spec.round_price(take_profit);

    let sides_ok = match direction {
        Direction::Buy => stop_loss < entry && entry < take_profit,
        Direction::Sell => take_profit < entry && entry < stop_loss,
    };
    if !sides_ok {
        return Err(Rejection::InvalidStops);
    }

    Ok(StopPlan {
        stop_loss,
        take_profit,
        sl_reason,
        tp_reason,
    })
}

fn find_target(
    snapshot: &MarketSnapshot,
    direction: Direction,
    entry: f64,
    policy: &SignalPolicy,
) -> (f64, String) {
    let mut candidates: Vec<(f64, &'static str)> = Vec::new();

    if let Some(levels) = &snapshot.daily_levels {
        match direction {
            Direction::Buy if levels.high > entry => candidates.push((levels.high, "PDH")),
            Direction::Sell if levels.low < entry => candidates.push((levels.low, "PDL")),
            _ => {}
        }
    }

    match direction {
        Direction::Buy => {
            for s in snapshot.structure.swing_highs().filter(|s| s.price > entry) {
                candidates.push((s.price, "swing high"));
            }
        }
        Direction::Sell => {
            for s in snapshot.structure.swing_lows().filter(|s| s.price < entry) {
                candidates.push((s.price, "swing low"));
            }
        }
    }

    if let Some(level) = snapshot.liquidity.nearest_target(direction, entry) {
        candidates.push((level, "liquidity pool"));
    }

    match candidates
        .into_iter()
        .min_by(|a, b| {
            (a.0 - entry)
                .abs()
                .partial_cmp(&(b.0 - entry).abs())
                .unwrap()
        }) {
        Some((level, label)) => (level, label.to_string()),
        None => {
            let fallback = match direction {
                Direction::Buy => entry + policy.price(policy.fallback_tp_pips),
                Direction::Sell => entry - policy.price(policy.fallback_tp_pips),
            };
            (fallback, "fixed fallback".to_string())
        }
    }
}
