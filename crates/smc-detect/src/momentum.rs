use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction};

use crate::indicators::MacdSnapshot;
use crate::swings::{SwingKind, SwingPoint};

/// Outcome of the extreme-zone momentum confirmation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumVerdict {
    pub ok: bool,
    pub reason: String,
}

impl MomentumVerdict {
    fn pass(reason: impl Into<String>) -> Self {
        Self {
            ok: true,
            reason: reason.into(),
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
        }
    }
}

/// Entry confirmation for signals taken deep in the range.
///
/// A BUY at P/D percentage <= 20 (SELL at >= 80) needs evidence the fall
/// (rise) has actually paused:
/// - a rejection candle: entry-side wick > 2x body and > 0.3 x ATR, or
/// - a momentum pause: 3-bar average range < ATR / 2, or
/// - two consecutive closes in the trade direction.
///
/// Relative volume below 0.7 blocks regardless of which path confirmed.
/// Outside the extreme bands the check passes untouched.
pub fn momentum_confirmation(
    frame: &[Candle],
    direction: Direction,
    pd_percentage: f64,
    atr_value: f64,
    rvol: Option<f64>,
) -> MomentumVerdict {
    let in_extreme = match direction {
        Direction::Buy => pd_percentage <= 20.0,
        Direction::Sell => pd_percentage >= 80.0,
    };
    if !in_extreme {
        return MomentumVerdict::pass("not in extreme zone");
    }

    if let Some(rv) = rvol {
        if rv < 0.7 {
            return MomentumVerdict::fail(format!("rvol {rv:.2} < 0.70 in extreme zone"));
        }
    }

    let Some(last) = frame.last() else {
        return MomentumVerdict::fail("empty frame");
    };

    // Path 1: rejection wick.
    let wick = match direction {
        Direction::Buy => last.lower_wick(),
        Direction::Sell => last.upper_wick(),
    };
    if wick > 2.0 * last.body() && wick > 0.3 * atr_value {
        return MomentumVerdict::pass("rejection candle");
    }

    // Path 2: momentum pause.
    if frame.len() >= 3 {
        let tail = &frame[frame.len() - 3..];
        let avg_range = tail.iter().map(Candle::range).sum::<f64>() / 3.0;
        if avg_range < atr_value / 2.0 {
            return MomentumVerdict::pass("momentum pause");
        }
    }

    // Path 3: two consecutive closes in-direction.
    if frame.len() >= 2 {
        let a = &frame[frame.len() - 2];
        let b = last;
        let confirmed = match direction {
            Direction::Buy => a.is_bullish() && b.is_bullish(),
            Direction::Sell => a.is_bearish() && b.is_bearish(),
        };
        if confirmed {
            return MomentumVerdict::pass("two consecutive in-direction closes");
        }
    }

    MomentumVerdict::fail("no bounce, pause or follow-through in extreme zone")
}

/// Price/MACD divergence over the last two swings of the relevant kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Divergence {
    /// Price lower low, MACD higher low.
    Bullish,
    /// Price higher high, MACD lower high.
    Bearish,
}

/// Compare the last two price swings against the MACD line at the same
/// indices. Checks lows first: a fresh bullish divergence outranks an older
/// bearish one for the reversal-hunting flows that consume this.
pub fn divergence(swings: &[SwingPoint], macd: &MacdSnapshot) -> Option<Divergence> {
    let at = |i: usize| macd.line.get(i).copied();

    let lows: Vec<&SwingPoint> = swings.iter().filter(|s| s.kind == SwingKind::Low).collect();
    if let [.., prev, last] = lows.as_slice() {
        if let (Some(m_prev), Some(m_last)) = (at(prev.index), at(last.index)) {
            if last.price < prev.price && m_last > m_prev {
                return Some(Divergence::Bullish);
            }
        }
    }

    let highs: Vec<&SwingPoint> = swings
        .iter()
        .filter(|s| s.kind == SwingKind::High)
        .collect();
    if let [.., prev, last] = highs.as_slice() {
        if let (Some(m_prev), Some(m_last)) = (at(prev.index), at(last.index)) {
            if last.price > prev.price && m_last < m_prev {
                return Some(Divergence::Bearish);
            }
        }
    }

    None
}
