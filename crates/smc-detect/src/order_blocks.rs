use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction};

use crate::DetectorParams;

/// Lifecycle of an order block on later candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObStatus {
    Fresh,
    Tested,
    Mitigated,
    Invalidated,
}

/// The last opposing-colour candle before an impulsive displacement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    /// Direction the block supports (bullish OB backs buys).
    pub direction: Direction,
    pub status: ObStatus,
    pub index: usize,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub close: f64,
    /// Impulse body / prior body ratio at detection time.
    pub impulse_strength: f64,
    pub tests_count: u32,
    pub volume: f64,
}

impl OrderBlock {
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn height(&self) -> f64 {
        self.high - self.low
    }

    /// Active means the block may still attract price.
    pub fn is_active(&self) -> bool {
        matches!(self.status, ObStatus::Fresh | ObStatus::Tested)
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

/// Detection output: the active lists plus the invalidated set that feeds
/// the breaker detector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBlockSet {
    pub bullish: Vec<OrderBlock>,
    pub bearish: Vec<OrderBlock>,
    pub invalidated: Vec<OrderBlock>,
}

impl OrderBlockSet {
    pub fn active(&self, direction: Direction) -> &[OrderBlock] {
        match direction {
            Direction::Buy => &self.bullish,
            Direction::Sell => &self.bearish,
        }
    }

    /// Active block of `direction` containing `price`, innermost match wins.
    pub fn containing(&self, direction: Direction, price: f64) -> Option<&OrderBlock> {
        self.active(direction)
            .iter()
            .filter(|ob| ob.contains(price))
            .min_by(|a, b| a.height().partial_cmp(&b.height()).unwrap())
    }
}

/// Scan `[3, n-1)` for the two-candle pattern: an opposing-colour candle
/// followed by an impulse whose body is at least `min_imbalance_ratio`
/// times the prior body and whose close penetrates the prior candle's
/// opposite extreme. Status is then swept forward to the frame end:
/// a wick entry marks TESTED, a close through the far edge INVALIDATED.
/// Blocks older than `ob_max_age_bars` are purged from the active lists.
pub fn detect_order_blocks(frame: &[Candle], params: &DetectorParams) -> OrderBlockSet {
    let mut all: Vec<OrderBlock> = Vec::new();
    if frame.len() < 5 {
        return OrderBlockSet::default();
    }

    for i in 3..frame.len() - 1 {
        let prev = &frame[i - 1];
        let cur = &frame[i];
        let prev_body = prev.body();
        if prev_body <= 0.0 {
            continue;
        }
        let ratio = cur.body() / prev_body;
        if ratio < params.min_imbalance_ratio {
            continue;
        }

        // Bullish OB: bearish candle swallowed by a bullish impulse that
        // closes above its high.
        if prev.is_bearish() && cur.is_bullish() && cur.close > prev.high {
            all.push(new_block(Direction::Buy, i - 1, prev, ratio));
        }
        // Bearish OB: bullish candle swallowed by a bearish impulse that
        // closes below its low.
        if prev.is_bullish() && cur.is_bearish() && cur.close < prev.low {
            all.push(new_block(Direction::Sell, i - 1, prev, ratio));
        }
    }

    for ob in &mut all {
        update_status(ob, frame);
    }

    let current = frame.len() - 1;
    let mut set = OrderBlockSet::default();
    for ob in all {
        if ob.status == ObStatus::Invalidated {
            set.invalidated.push(ob);
            continue;
        }
        if current - ob.index > params.ob_max_age_bars {
            continue;
        }
        match ob.direction {
            Direction::Buy => set.bullish.push(ob),
            Direction::Sell => set.bearish.push(ob),
        }
    }
    set
}

fn new_block(direction: Direction, index: usize, candle: &Candle, ratio: f64) -> OrderBlock {
    OrderBlock {
        direction,
        status: ObStatus::Fresh,
        index,
        high: candle.high,
        low: candle.low,
        open: candle.open,
        close: candle.close,
        impulse_strength: ratio,
        tests_count: 0,
        volume: candle.volume,
    }
}

fn update_status(ob: &mut OrderBlock, frame: &[Candle]) {
    // The impulse candle itself does not count as a test.
    for bar in frame.iter().skip(ob.index + 2) {
        match ob.direction {
            Direction::Buy => {
                if bar.close < ob.low {
                    ob.status = ObStatus::Invalidated;
                    return;
                }
                if bar.low <= ob.high && bar.low >= ob.low {
                    ob.status = ObStatus::Tested;
                    ob.tests_count += 1;
                }
            }
            Direction::Sell => {
                if bar.close > ob.high {
                    ob.status = ObStatus::Invalidated;
                    return;
                }
                if bar.high >= ob.low && bar.high <= ob.high {
                    ob.status = ObStatus::Tested;
                    ob.tests_count += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(i: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            ts: Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(15 * i),
            open,
            high,
            low,
            close,
            volume: 100.0,
        }
    }

    fn base_frame() -> Vec<Candle> {
        vec![
            candle(0, 1.0800, 1.0805, 1.0795, 1.0802),
            candle(1, 1.0802, 1.0807, 1.0797, 1.0804),
            candle(2, 1.0804, 1.0809, 1.0799, 1.0806),
            // Bearish candle: the block-to-be.
            candle(3, 1.0806, 1.0808, 1.0794, 1.0796),
            // Bullish impulse: body 3x, closes above prior high.
            candle(4, 1.0796, 1.0835, 1.0795, 1.0832),
            candle(5, 1.0832, 1.0840, 1.0825, 1.0836),
        ]
    }

    #[test]
    fn detects_bullish_block_from_impulse() {
        let set = detect_order_blocks(&base_frame(), &DetectorParams::forex_defaults(0.0001));
        assert_eq!(set.bullish.len(), 1);
        let ob = &set.bullish[0];
        assert_eq!(ob.index, 3);
        assert_eq!(ob.status, ObStatus::Fresh);
        assert!((ob.high - 1.0808).abs() < 1e-9);
        assert!((ob.low - 1.0794).abs() < 1e-9);
        assert!(ob.impulse_strength >= 1.5);
    }

    #[test]
    fn weak_impulse_is_ignored() {
        let mut frame = base_frame();
        // Shrink the impulse body below the ratio.
        frame[4] = candle(4, 1.0796, 1.0812, 1.0795, 1.0809);
        let set = detect_order_blocks(&frame, &DetectorParams::forex_defaults(0.0001));
        assert!(set.bullish.is_empty());
    }

    #[test]
    fn wick_entry_marks_tested_close_through_invalidates() {
        let mut frame = base_frame();
        // Wick back into the block without closing through.
        frame.push(candle(6, 1.0836, 1.0838, 1.0800, 1.0830));
        let set = detect_order_blocks(&frame, &DetectorParams::forex_defaults(0.0001));
        assert_eq!(set.bullish[0].status, ObStatus::Tested);
        assert_eq!(set.bullish[0].tests_count, 1);

        // Close below the block low invalidates it.
        frame.push(candle(7, 1.0830, 1.0831, 1.0780, 1.0785));
        let set = detect_order_blocks(&frame, &DetectorParams::forex_defaults(0.0001));
        assert!(set.bullish.is_empty());
        assert_eq!(set.invalidated.len(), 1);
        assert_eq!(set.invalidated[0].status, ObStatus::Invalidated);
    }

    #[test]
    fn old_blocks_are_purged() {
        let mut frame = base_frame();
        for i in 6..62 {
            frame.push(candle(i, 1.0832, 1.0836, 1.0830, 1.0834));
        }
        let mut params = DetectorParams::forex_defaults(0.0001);
        params.ob_max_age_bars = 30;
        let set = detect_order_blocks(&frame, &params);
        assert!(set.bullish.is_empty());
    }

    #[test]
    fn containing_picks_tightest_block() {
        let set = OrderBlockSet {
            bullish: vec![
                OrderBlock {
                    direction: Direction::Buy,
                    status: ObStatus::Fresh,
                    index: 1,
                    high: 1.0900,
                    low: 1.0800,
                    open: 1.0880,
                    close: 1.0820,
                    impulse_strength: 2.0,
                    tests_count: 0,
                    volume: 0.0,
                },
                OrderBlock {
                    direction: Direction::Buy,
                    status: ObStatus::Fresh,
                    index: 5,
                    high: 1.0860,
                    low: 1.0840,
                    open: 1.0858,
                    close: 1.0842,
                    impulse_strength: 2.0,
                    tests_count: 0,
                    volume: 0.0,
                },
            ],
            bearish: vec![],
            invalidated: vec![],
        };
        let hit = set.containing(Direction::Buy, 1.0850).unwrap();
        assert_eq!(hit.index, 5);
    }
}
