use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction};

use crate::daily_levels::{confirm_after_pierce, PierceSide, SweepLevel};

/// The accumulation range printed during the Asian session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AsianRange {
    pub session_date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub midpoint: f64,
    pub range_size: f64,
    pub candle_count: usize,
}

/// A sweep of one side of the Asian range by the London/NY session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AsianSweep {
    pub level_kind: SweepLevel,
    pub level: f64,
    pub pierce_index: usize,
    pub pierce_ts: DateTime<Utc>,
    pub confirmed: bool,
    pub direction: Direction,
}

/// Compute the Asian range for `session_date` from candles inside the
/// configured UTC window (default 00:00-07:00). Validity requires at least
/// five candles in the window.
pub fn detect_asian_range(
    frame: &[Candle],
    session_date: NaiveDate,
    start_hour: u32,
    end_hour: u32,
) -> Option<AsianRange> {
    let in_window: Vec<&Candle> = frame
        .iter()
        .filter(|c| {
            c.ts.date_naive() == session_date
                && c.ts.hour() >= start_hour
                && c.ts.hour() < end_hour
        })
        .collect();
    if in_window.len() < 5 {
        return None;
    }
    let high = in_window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = in_window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    Some(AsianRange {
        session_date,
        high,
        low,
        midpoint: (high + low) / 2.0,
        range_size: high - low,
        candle_count: in_window.len(),
    })
}

/// Stateless Asian-range sweep scan.
#[derive(Debug, Clone, Copy)]
pub struct AsianSweepDetector {
    /// Pierce buffer in price units.
    pub buffer: f64,
    /// Session window end, so only post-Asian bars can sweep the range.
    pub session_end_hour: u32,
    /// An unconfirmed pierce older than this is no longer a pending
    /// sweep; it was a breakout.
    pub pending_window_minutes: i64,
}

impl AsianSweepDetector {
    /// Latest sweep of either side of the range in the bars printed after
    /// the Asian window on the range's own session date, with the shared
    /// three-path confirmation predicate. Unconfirmed pierces expire
    /// after the pending window.
    pub fn detect(&self, frame: &[Candle], range: &AsianRange) -> Option<AsianSweep> {
        let mut latest: Option<AsianSweep> = None;
        for (i, bar) in frame.iter().enumerate() {
            let after_window = bar.ts.date_naive() == range.session_date
                && bar.ts.hour() >= self.session_end_hour;
            if !after_window {
                continue;
            }
            if bar.high > range.high + self.buffer {
                latest = Some(AsianSweep {
                    level_kind: SweepLevel::AsianHigh,
                    level: range.high,
                    pierce_index: i,
                    pierce_ts: bar.ts,
                    confirmed: confirm_after_pierce(frame, i, range.high, PierceSide::Above),
                    direction: Direction::Sell,
                });
            }
            if bar.low < range.low - self.buffer {
                latest = Some(AsianSweep {
                    level_kind: SweepLevel::AsianLow,
                    level: range.low,
                    pierce_index: i,
                    pierce_ts: bar.ts,
                    confirmed: confirm_after_pierce(frame, i, range.low, PierceSide::Below),
                    direction: Direction::Buy,
                });
            }
        }

        // Expire a stale pending pierce.
        if let (Some(sweep), Some(last)) = (latest, frame.last()) {
            if !sweep.confirmed
                && last.ts - sweep.pierce_ts
                    > chrono::Duration::minutes(self.pending_window_minutes)
            {
                return None;
            }
        }
        latest
    }
}
