use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction};

use smc_detect::{Fvg, LiquiditySet};

/// ICT Silver Bullet staging inside the fixed one-hour windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilverBulletPhase {
    /// Outside the AM/PM windows.
    Waiting,
    /// Window open, no sweep yet.
    WindowOpen,
    /// Liquidity taken inside the window within the last 15 minutes.
    SweepDetected,
    /// Sweep plus an in-direction FVG to enter from.
    EntryReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilverBulletView {
    pub phase: SilverBulletPhase,
    pub direction: Option<Direction>,
}

/// The AM window is 15:00-16:00 UTC (10-11 NY); the optional PM window
/// 19:00-20:00 UTC (14-15 NY).
fn in_window(ts: DateTime<Utc>, offset_hours: i64, use_pm_window: bool) -> bool {
    let utc = ts - Duration::hours(offset_hours);
    let h = utc.hour();
    h == 15 || (use_pm_window && h == 19)
}

/// Stage the Silver Bullet setup from the already-computed liquidity set
/// and active FVGs. The sweep must have printed inside the window and be
/// at most 15 minutes old at frame close.
pub fn silver_bullet_view(
    frame: &[Candle],
    liquidity: &LiquiditySet,
    fvgs: &[Fvg],
    offset_hours: i64,
    use_pm_window: bool,
) -> SilverBulletView {
    let Some(last) = frame.last() else {
        return SilverBulletView {
            phase: SilverBulletPhase::Waiting,
            direction: None,
        };
    };
    if !in_window(last.ts, offset_hours, use_pm_window) {
        return SilverBulletView {
            phase: SilverBulletPhase::Waiting,
            direction: None,
        };
    }

    let recent_sweep = liquidity.sweeps.iter().rev().find(|s| {
        frame.get(s.index).is_some_and(|bar| {
            in_window(bar.ts, offset_hours, use_pm_window)
                && last.ts - bar.ts <= Duration::minutes(15)
        })
    });

    let Some(sweep) = recent_sweep else {
        return SilverBulletView {
            phase: SilverBulletPhase::WindowOpen,
            direction: None,
        };
    };

    let direction = sweep.kind.reversal_direction();
    let has_entry_fvg = fvgs
        .iter()
        .any(|f| f.is_active() && f.kind.direction() == direction);

    SilverBulletView {
        phase: if has_entry_fvg {
            SilverBulletPhase::EntryReady
        } else {
            SilverBulletPhase::SweepDetected
        },
        direction: Some(direction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use smc_detect::{FvgKind, FvgStatus, LiquidityKind, LiquiditySweep, LiquidityZone};

    fn candle(ts: DateTime<Utc>) -> Candle {
        Candle {
            ts,
            open: 1.0850,
            high: 1.0860,
            low: 1.0840,
            close: 1.0855,
            volume: 100.0,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 3, h, m, 0).unwrap()
    }

    fn sweep_at(index: usize) -> LiquiditySet {
        LiquiditySet {
            zones: vec![LiquidityZone {
                kind: LiquidityKind::SellSide,
                level: 1.0840,
                index: 0,
                touch_count: 2,
                is_equal_level: true,
                swept: true,
            }],
            sweeps: vec![LiquiditySweep {
                kind: LiquidityKind::SellSide,
                level: 1.0840,
                index,
                sweep_high: 1.0850,
                sweep_low: 1.0830,
                close: 1.0848,
            }],
        }
    }

    #[test]
    fn outside_window_is_waiting() {
        let frame = vec![candle(at(12, 30))];
        let view = silver_bullet_view(&frame, &LiquiditySet::default(), &[], 0, false);
        assert_eq!(view.phase, SilverBulletPhase::Waiting);
    }

    #[test]
    fn window_without_sweep_is_open() {
        let frame = vec![candle(at(15, 10))];
        let view = silver_bullet_view(&frame, &LiquiditySet::default(), &[], 0, false);
        assert_eq!(view.phase, SilverBulletPhase::WindowOpen);
    }

    #[test]
    fn fresh_window_sweep_detected_then_entry_ready_with_fvg() {
        let frame = vec![candle(at(15, 5)), candle(at(15, 15))];
        let liquidity = sweep_at(0);

        let view = silver_bullet_view(&frame, &liquidity, &[], 0, false);
        assert_eq!(view.phase, SilverBulletPhase::SweepDetected);
        assert_eq!(view.direction, Some(Direction::Buy));

        let fvg = Fvg {
            kind: FvgKind::Bullish,
            index: 1,
            top: 1.0850,
            bottom: 1.0846,
            age_bars: 0,
            mitigated_fraction: 0.0,
            status: FvgStatus::Open,
        };
        let view = silver_bullet_view(&frame, &liquidity, &[fvg], 0, false);
        assert_eq!(view.phase, SilverBulletPhase::EntryReady);
    }

    #[test]
    fn stale_sweep_does_not_stage() {
        // Sweep bar 40 minutes before frame close.
        let frame = vec![candle(at(15, 5)), candle(at(15, 45))];
        let mut liquidity = sweep_at(0);
        liquidity.sweeps[0].index = 0;
        let frame = vec![frame[0], candle(at(15, 45))];
        let view = silver_bullet_view(&frame, &liquidity, &[], 0, false);
        assert_eq!(view.phase, SilverBulletPhase::WindowOpen);
    }

    #[test]
    fn pm_window_only_when_enabled() {
        let frame = vec![candle(at(19, 10))];
        assert_eq!(
            silver_bullet_view(&frame, &LiquiditySet::default(), &[], 0, false).phase,
            SilverBulletPhase::Waiting
        );
        assert_eq!(
            silver_bullet_view(&frame, &LiquiditySet::default(), &[], 0, true).phase,
            SilverBulletPhase::WindowOpen
        );
    }
}
