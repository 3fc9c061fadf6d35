use serde::{Deserialize, Serialize};
use smc_schemas::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

/// A confirmed fractal turning point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
    pub kind: SwingKind,
    /// Fractal width the point was confirmed with.
    pub strength: usize,
}

/// Fractal swing detection of width `strength`.
///
/// A bar at `i` is a swing high iff its high strictly exceeds the highs of
/// the `strength - 1` inner neighbours on each side and is at least equal to
/// the boundary neighbour (`j == strength`), so flat-topped fractals at the
/// window edge still confirm. Symmetric for lows. Bars closer than
/// `strength` to either frame edge can never confirm.
pub fn detect_swings(frame: &[Candle], strength: usize) -> Vec<SwingPoint> {
    let mut swings = Vec::new();
    if strength == 0 || frame.len() < 2 * strength + 1 {
        return swings;
    }

    for i in strength..frame.len() - strength {
        let mut is_high = true;
        let mut is_low = true;
        for j in 1..=strength {
            let strict = j < strength;
            let (left, right) = (&frame[i - j], &frame[i + j]);
            let c = &frame[i];
            if strict {
                is_high &= c.high > left.high && c.high > right.high;
                is_low &= c.low < left.low && c.low < right.low;
            } else {
                is_high &= c.high >= left.high && c.high >= right.high;
                is_low &= c.low <= left.low && c.low <= right.low;
            }
            if !is_high && !is_low {
                break;
            }
        }
        if is_high {
            swings.push(SwingPoint {
                index: i,
                price: frame[i].high,
                kind: SwingKind::High,
                strength,
            });
        }
        if is_low {
            swings.push(SwingPoint {
                index: i,
                price: frame[i].low,
                kind: SwingKind::Low,
                strength,
            });
        }
    }
    swings
}

/// Most recent swing of `kind` strictly before `before_index`, if any.
pub fn last_swing_before(
    swings: &[SwingPoint],
    kind: SwingKind,
    before_index: usize,
) -> Option<SwingPoint> {
    swings
        .iter()
        .rev()
        .find(|s| s.kind == kind && s.index < before_index)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn frame_from_highs_lows(points: &[(f64, f64)]) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap();
        points
            .iter()
            .enumerate()
            .map(|(i, (high, low))| Candle {
                ts: base + chrono::Duration::minutes(15 * i as i64),
                open: (high + low) / 2.0,
                high: *high,
                low: *low,
                close: (high + low) / 2.0,
                volume: 100.0,
            })
            .collect()
    }

    #[test]
    fn detects_isolated_peak_and_trough() {
        // Peak at index 3, trough at index 9, width 3.
        let frame = frame_from_highs_lows(&[
            (1.10, 1.09),
            (1.11, 1.10),
            (1.12, 1.11),
            (1.15, 1.12),
            (1.12, 1.11),
            (1.11, 1.10),
            (1.10, 1.09),
            (1.09, 1.08),
            (1.08, 1.07),
            (1.07, 1.04),
            (1.08, 1.06),
            (1.09, 1.07),
            (1.10, 1.08),
        ]);
        let swings = detect_swings(&frame, 3);
        assert!(swings
            .iter()
            .any(|s| s.kind == SwingKind::High && s.index == 3 && (s.price - 1.15).abs() < 1e-9));
        assert!(swings
            .iter()
            .any(|s| s.kind == SwingKind::Low && s.index == 9 && (s.price - 1.04).abs() < 1e-9));
    }

    #[test]
    fn inner_tie_is_not_a_swing() {
        // Equal high at distance 1 (inner neighbour) must block confirmation.
        let frame = frame_from_highs_lows(&[
            (1.10, 1.09),
            (1.11, 1.10),
            (1.15, 1.12),
            (1.15, 1.12),
            (1.11, 1.10),
            (1.10, 1.09),
            (1.09, 1.08),
        ]);
        let swings = detect_swings(&frame, 2);
        assert!(!swings.iter().any(|s| s.kind == SwingKind::High));
    }

    #[test]
    fn boundary_tie_still_confirms() {
        // Equal high exactly at distance `strength` is allowed.
        let frame = frame_from_highs_lows(&[
            (1.15, 1.09),
            (1.11, 1.10),
            (1.15, 1.12),
            (1.12, 1.10),
            (1.10, 1.09),
        ]);
        let swings = detect_swings(&frame, 2);
        assert!(swings
            .iter()
            .any(|s| s.kind == SwingKind::High && s.index == 2));
    }

    #[test]
    fn short_frame_yields_nothing() {
        let frame = frame_from_highs_lows(&[(1.1, 1.0), (1.2, 1.1)]);
        assert!(detect_swings(&frame, 5).is_empty());
    }
}
