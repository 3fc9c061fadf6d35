use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction, Trend};

use crate::swings::{detect_swings, SwingKind, SwingPoint};
use crate::DetectorParams;

/// BOS continues the standing trend; CHoCH breaks against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakKind {
    Bos,
    Choch,
}

/// A close beyond a prior swing extreme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureBreak {
    pub index: usize,
    pub ts: DateTime<Utc>,
    pub break_price: f64,
    pub swing_price: f64,
    pub direction: Direction,
    pub kind: BreakKind,
    /// Break bar body >= 1.5x the average body of the trailing 20 bars.
    pub displacement: bool,
}

/// Structure analysis output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureView {
    pub swings: Vec<SwingPoint>,
    pub breaks: Vec<StructureBreak>,
    pub trend: Trend,
}

impl StructureView {
    pub fn swing_highs(&self) -> impl Iterator<Item = &SwingPoint> {
        self.swings.iter().filter(|s| s.kind == SwingKind::High)
    }

    pub fn swing_lows(&self) -> impl Iterator<Item = &SwingPoint> {
        self.swings.iter().filter(|s| s.kind == SwingKind::Low)
    }

    pub fn last_choch(&self) -> Option<&StructureBreak> {
        self.breaks.iter().rev().find(|b| b.kind == BreakKind::Choch)
    }

    /// Most recent confirmed higher-high / lower-low pair for the
    /// premium/discount reference range, newest swings first.
    pub fn reference_range(&self) -> Option<(f64, f64)> {
        let high = self.swing_highs().last().map(|s| s.price)?;
        let low = self.swing_lows().last().map(|s| s.price)?;
        if high > low {
            Some((low, high))
        } else {
            None
        }
    }
}

/// Walk the frame confirming swings, then emit every close beyond the most
/// recent opposite swing as a structure break. The first break sets the
/// trend; afterwards a break with the trend is a BOS and a break against it
/// a CHoCH (which also flips the trend). A latest event older than
/// `max_structure_age` bars demotes the trend to RANGING.
pub fn analyze_structure(frame: &[Candle], params: &DetectorParams) -> StructureView {
    let swings = detect_swings(frame, params.swing_strength);
    let mut breaks = Vec::new();
    let mut trend = Trend::Ranging;

    let mut last_high: Option<SwingPoint> = None;
    let mut last_low: Option<SwingPoint> = None;
    let mut swing_iter = swings.iter().peekable();

    for (i, candle) in frame.iter().enumerate() {
        // Swings become tradable structure only once their right side has
        // fully printed.
        while let Some(s) = swing_iter.peek() {
            if s.index + params.swing_strength <= i {
                match s.kind {
                    SwingKind::High => last_high = Some(**s),
                    SwingKind::Low => last_low = Some(**s),
                }
                swing_iter.next();
            } else {
                break;
            }
        }

        if let Some(high) = last_high {
            if candle.close > high.price {
                let kind = match trend {
                    Trend::Bullish => BreakKind::Bos,
                    Trend::Bearish => BreakKind::Choch,
                    Trend::Ranging => BreakKind::Bos,
                };
                breaks.push(StructureBreak {
                    index: i,
                    ts: candle.ts,
                    break_price: candle.close,
                    swing_price: high.price,
                    direction: Direction::Buy,
                    kind,
                    displacement: is_displaced(frame, i),
                });
                trend = Trend::Bullish;
                last_high = None;
            }
        }
        if let Some(low) = last_low {
            if candle.close < low.price {
                let kind = match trend {
                    Trend::Bearish => BreakKind::Bos,
                    Trend::Bullish => BreakKind::Choch,
                    Trend::Ranging => BreakKind::Bos,
                };
                breaks.push(StructureBreak {
                    index: i,
                    ts: candle.ts,
                    break_price: candle.close,
                    swing_price: low.price,
                    direction: Direction::Sell,
                    kind,
                    displacement: is_displaced(frame, i),
                });
                trend = Trend::Bearish;
                last_low = None;
            }
        }
    }

    // Stale structure reads as ranging.
    if let Some(last) = breaks.last() {
        if frame.len().saturating_sub(1) - last.index > params.max_structure_age {
            trend = Trend::Ranging;
        }
    }

    StructureView {
        swings,
        breaks,
        trend,
    }
}

/// Displacement qualifier: bar body >= 1.5x the average body over the
/// trailing 20 bars (excluding the bar itself).
pub fn is_displaced(frame: &[Candle], index: usize) -> bool {
    if index == 0 || index >= frame.len() {
        return false;
    }
    let start = index.saturating_sub(20);
    let window = &frame[start..index];
    if window.is_empty() {
        return false;
    }
    let avg_body: f64 = window.iter().map(Candle::body).sum::<f64>() / window.len() as f64;
    avg_body > 0.0 && frame[index].body() >= 1.5 * avg_body
}
