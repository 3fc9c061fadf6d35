use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction};

/// Accumulation / Manipulation / Distribution cycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmdPhase {
    None,
    Accumulation,
    Manipulation,
    Distribution,
}

/// AMD read over the recent frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmdView {
    pub phase: AmdPhase,
    /// Expected direction after the manipulation (sweep high -> sell,
    /// sweep low -> buy). `None` until a manipulation prints.
    pub direction: Option<Direction>,
    pub range_high: f64,
    pub range_low: f64,
}

/// Detect the AMD cycle from raw bars:
/// 1. accumulation — a trailing window of at least `min_range_bars` whose
///    total range is under `max_range_percentage` of price;
/// 2. manipulation — a later bar wicking beyond that range and closing back
///    inside (the false breakout);
/// 3. distribution — after the manipulation, a close beyond the range
///    midpoint in the reversal direction.
pub fn detect_amd(frame: &[Candle], min_range_bars: usize, max_range_percentage: f64) -> AmdView {
    let none = AmdView {
        phase: AmdPhase::None,
        direction: None,
        range_high: 0.0,
        range_low: 0.0,
    };
    if frame.len() < min_range_bars + 2 {
        return none;
    }

    // Find the most recent tight window, widest-first so the accumulation
    // captures the full coil rather than its last few bars.
    let lookback = frame.len().min(50);
    let tail = &frame[frame.len() - lookback..];
    let mut accumulation: Option<(usize, f64, f64)> = None; // (end idx in tail, high, low)
    for window_len in (min_range_bars..lookback).rev() {
        for end in (min_range_bars..lookback).rev() {
            let start = end.saturating_sub(window_len);
            if end - start < min_range_bars {
                continue;
            }
            let window = &tail[start..end];
            let high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let mid = (high + low) / 2.0;
            if mid <= 0.0 {
                continue;
            }
            let pct = (high - low) / mid * 100.0;
            if pct <= max_range_percentage {
                accumulation = Some((end, high, low));
                break;
            }
        }
        if accumulation.is_some() {
            break;
        }
    }

    let Some((range_end, high, low)) = accumulation else {
        return none;
    };
    let midpoint = (high + low) / 2.0;

    // Manipulation: wick beyond the range, close back inside.
    let mut manipulation: Option<(usize, Direction)> = None;
    for (i, bar) in tail.iter().enumerate().skip(range_end) {
        if bar.high > high && bar.close < high {
            manipulation = Some((i, Direction::Sell));
            break;
        }
        if bar.low < low && bar.close > low {
            manipulation = Some((i, Direction::Buy));
            break;
        }
    }

    let Some((manip_idx, direction)) = manipulation else {
        return AmdView {
            phase: AmdPhase::Accumulation,
            direction: None,
            range_high: high,
            range_low: low,
        };
    };

    // Distribution: a later close past the midpoint in the reversal
    // direction confirms the real move.
    let distributed = tail.iter().skip(manip_idx + 1).any(|bar| match direction {
        Direction::Buy => bar.close > midpoint,
        Direction::Sell => bar.close < midpoint,
    });

    AmdView {
        phase: if distributed {
            AmdPhase::Distribution
        } else {
            AmdPhase::Manipulation
        },
        direction: Some(direction),
        range_high: high,
        range_low: low,
    }
}
