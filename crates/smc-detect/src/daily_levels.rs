use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction};

/// Previous-day reference levels (weekend-adjusted).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviousDayLevels {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub close: f64,
    pub midpoint: f64,
    pub range_size: f64,
}

impl PreviousDayLevels {
    pub fn is_bullish_day(&self) -> bool {
        self.close > self.open
    }
}

/// Which reference level a sweep pierced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepLevel {
    Pdh,
    Pdl,
    AsianHigh,
    AsianLow,
}

impl SweepLevel {
    /// Reversal direction the sweep argues for.
    pub fn direction(self) -> Direction {
        match self {
            SweepLevel::Pdh | SweepLevel::AsianHigh => Direction::Sell,
            SweepLevel::Pdl | SweepLevel::AsianLow => Direction::Buy,
        }
    }
}

/// A pierced level with its confirmation state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepEvent {
    pub level_kind: SweepLevel,
    pub level: f64,
    pub pierce_index: usize,
    pub pierce_ts: DateTime<Utc>,
    pub confirmed: bool,
    pub direction: Direction,
}

/// Derive PDH/PDL/PDO/PDC from the candles of the previous session,
/// skipping weekend days back to Friday. Needs at least 5 previous-day
/// candles to be considered representative.
pub fn previous_day_levels(
    frame: &[Candle],
    reference: DateTime<Utc>,
) -> Option<PreviousDayLevels> {
    let mut day = reference.date_naive() - Duration::days(1);
    loop {
        match day.weekday() {
            Weekday::Sun => day -= Duration::days(2),
            Weekday::Sat => day -= Duration::days(1),
            _ => break,
        }
    }

    let day_candles: Vec<&Candle> = frame
        .iter()
        .filter(|c| c.ts.date_naive() == day)
        .collect();
    if day_candles.len() < 5 {
        return None;
    }

    let high = day_candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = day_candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let open = day_candles.first()?.open;
    let close = day_candles.last()?.close;

    Some(PreviousDayLevels {
        date: day,
        high,
        low,
        open,
        close,
        midpoint: (high + low) / 2.0,
        range_size: high - low,
    })
}

/// Stateless PDH/PDL sweep scan over the current session's bars.
#[derive(Debug, Clone, Copy)]
pub struct DailySweepDetector {
    /// Pierce buffer in price units.
    pub buffer: f64,
}

impl DailySweepDetector {
    /// Find the most recent PDH/PDL sweep in today's bars and evaluate the
    /// confirmation predicate against the rest of the frame. A pierce with
    /// no later evidence stays pending (`confirmed == false`).
    pub fn detect(
        &self,
        frame: &[Candle],
        levels: &PreviousDayLevels,
        today: NaiveDate,
    ) -> Option<SweepEvent> {
        let mut latest: Option<SweepEvent> = None;
        for (i, bar) in frame.iter().enumerate() {
            if bar.ts.date_naive() != today {
                continue;
            }
            if bar.high > levels.high + self.buffer {
                latest = Some(SweepEvent {
                    level_kind: SweepLevel::Pdh,
                    level: levels.high,
                    pierce_index: i,
                    pierce_ts: bar.ts,
                    confirmed: confirm_after_pierce(frame, i, levels.high, PierceSide::Above),
                    direction: Direction::Sell,
                });
            }
            if bar.low < levels.low - self.buffer {
                latest = Some(SweepEvent {
                    level_kind: SweepLevel::Pdl,
                    level: levels.low,
                    pierce_index: i,
                    pierce_ts: bar.ts,
                    confirmed: confirm_after_pierce(frame, i, levels.low, PierceSide::Below),
                    direction: Direction::Buy,
                });
            }
        }
        latest
    }
}

/// Which side of the level the pierce travelled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PierceSide {
    Above,
    Below,
}

/// Sweep confirmation, three paths in priority order:
/// 1. a bar at or after the pierce closes back across the level;
/// 2. price stabilises: a bar at least 5 minutes after the pierce closes
///    within 0.05 % of the level;
/// 3. fallback timeout: a bar at least 45 minutes after the pierce closes
///    within 0.1 % of the level.
pub(crate) fn confirm_after_pierce(
    frame: &[Candle],
    pierce_index: usize,
    level: f64,
    side: PierceSide,
) -> bool {
    let pierce_ts = frame[pierce_index].ts;
    for bar in frame.iter().skip(pierce_index) {
        let reclaimed = match side {
            PierceSide::Above => bar.close < level,
            PierceSide::Below => bar.close > level,
        };
        if reclaimed {
            return true;
        }

        let age = bar.ts - pierce_ts;
        let distance = (bar.close - level).abs() / level;
        if age >= Duration::minutes(5) && distance < 0.0005 {
            return true;
        }
        if age >= Duration::minutes(45) && distance < 0.001 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(ts: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            ts,
            open,
            high,
            low,
            close,
            volume: 100.0,
        }
    }

    fn day(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn yesterday_frame() -> Vec<Candle> {
        // Monday 2026-03-02 looking back to Friday 2026-02-27.
        let mut frame = Vec::new();
        for h in 8..16 {
            frame.push(candle(
                day(2026, 2, 27, h, 0),
                2005.0,
                2010.5 - (15 - h as i64) as f64 * 0.1,
                1998.0 + h as f64 * 0.1,
                2006.0,
            ));
        }
        frame
    }

    #[test]
    fn monday_reference_reaches_back_to_friday() {
        let mut frame = yesterday_frame();
        frame.push(candle(day(2026, 3, 2, 8, 0), 2006.0, 2008.0, 2004.0, 2007.0));
        let levels = previous_day_levels(&frame, day(2026, 3, 2, 9, 0)).unwrap();
        assert_eq!(levels.date, NaiveDate::from_ymd_opt(2026, 2, 27).unwrap());
        assert!(levels.high > levels.low);
        assert!((levels.midpoint - (levels.high + levels.low) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn too_few_previous_day_candles_yields_none() {
        let frame = vec![candle(day(2026, 2, 27, 8, 0), 2005.0, 2010.0, 2000.0, 2006.0)];
        assert!(previous_day_levels(&frame, day(2026, 3, 2, 9, 0)).is_none());
    }

    #[test]
    fn pdh_pierce_with_reclaim_close_confirms_sell_sweep() {
        let mut frame = yesterday_frame();
        let levels = previous_day_levels(
            &{
                let mut f = frame.clone();
                f.push(candle(day(2026, 3, 2, 8, 0), 2006.0, 2007.0, 2004.0, 2006.5));
                f
            },
            day(2026, 3, 2, 9, 0),
        )
        .unwrap();

        // Pierce above PDH, same bar closes back below it.
        frame.push(candle(
            day(2026, 3, 2, 9, 0),
            2008.0,
            levels.high + 0.7,
            2006.0,
            levels.high - 0.7,
        ));

        let detector = DailySweepDetector { buffer: 0.2 };
        let sweep = detector
            .detect(&frame, &levels, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap())
            .unwrap();
        assert_eq!(sweep.level_kind, SweepLevel::Pdh);
        assert_eq!(sweep.direction, Direction::Sell);
        assert!(sweep.confirmed);
    }

    #[test]
    fn pierce_without_reclaim_stays_pending() {
        let mut frame = yesterday_frame();
        let levels = previous_day_levels(
            &{
                let mut f = frame.clone();
                f.push(candle(day(2026, 3, 2, 8, 0), 2006.0, 2007.0, 2004.0, 2006.5));
                f
            },
            day(2026, 3, 2, 9, 0),
        )
        .unwrap();

        // Breaks above and keeps going: continuation, not a sweep.
        frame.push(candle(
            day(2026, 3, 2, 9, 0),
            2008.0,
            levels.high + 3.0,
            2007.0,
            levels.high + 2.5,
        ));

        let detector = DailySweepDetector { buffer: 0.2 };
        let sweep = detector
            .detect(&frame, &levels, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap())
            .unwrap();
        assert!(!sweep.confirmed);
    }

    #[test]
    fn stabilisation_path_confirms_after_five_minutes() {
        let level = 2010.5_f64;
        let pierce = candle(day(2026, 3, 2, 9, 0), 2010.0, 2011.4, 2009.8, 2010.9);
        // 6 minutes later, close within 0.05% of the level but not reclaimed.
        let settle = candle(
            day(2026, 3, 2, 9, 6),
            2010.9,
            2011.2,
            2010.4,
            level + level * 0.0003,
        );
        let frame = vec![pierce, settle];
        assert!(confirm_after_pierce(&frame, 0, level, PierceSide::Above));
    }

    #[test]
    fn timeout_path_needs_tighter_distance_than_nothing() {
        let level = 2010.5_f64;
        let pierce = candle(day(2026, 3, 2, 9, 0), 2010.0, 2011.4, 2009.8, 2010.9);
        // 50 minutes later, within 0.1% but outside 0.05%.
        let drift = candle(
            day(2026, 3, 2, 9, 50),
            2010.9,
            2012.6,
            2010.6,
            level + level * 0.0008,
        );
        let frame = vec![pierce, drift.clone()];
        assert!(confirm_after_pierce(&frame, 0, level, PierceSide::Above));

        // Same distance at only 10 minutes: not confirmed.
        let early = candle(
            day(2026, 3, 2, 9, 10),
            2010.9,
            2012.6,
            2010.6,
            level + level * 0.0008,
        );
        let frame = vec![frame[0], early];
        assert!(!confirm_after_pierce(&frame, 0, level, PierceSide::Above));
    }
}
