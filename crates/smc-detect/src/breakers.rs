use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction};

use crate::order_blocks::{ObStatus, OrderBlock};
use crate::DetectorParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    Active,
    Tested,
    Invalidated,
}

/// An invalidated order block, flipped to the opposite role.
///
/// A broken bullish OB becomes bearish resistance; a broken bearish OB
/// becomes bullish support. Geometry is the original block's.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakerBlock {
    pub direction: Direction,
    pub status: BreakerStatus,
    pub index: usize,
    pub high: f64,
    pub low: f64,
    pub origin_index: usize,
    pub tests_count: u32,
}

impl BreakerBlock {
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn is_active(&self) -> bool {
        self.status != BreakerStatus::Invalidated
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

/// Flip the invalidated set into breakers and run the same lifecycle
/// predicates against the new role. Breakers older than `ob_max_age_bars`
/// x2 are dropped (they outlive order blocks, matching how long invalidated
/// supply/demand keeps attracting price).
pub fn breakers_from_invalidated(
    frame: &[Candle],
    invalidated: &[OrderBlock],
    params: &DetectorParams,
) -> Vec<BreakerBlock> {
    let mut breakers: Vec<BreakerBlock> = invalidated
        .iter()
        .filter(|ob| ob.status == ObStatus::Invalidated)
        .map(|ob| BreakerBlock {
            direction: ob.direction.opposite(),
            status: BreakerStatus::Active,
            index: ob.index,
            high: ob.high,
            low: ob.low,
            origin_index: ob.index,
            tests_count: 0,
        })
        .collect();

    for bb in &mut breakers {
        update_status(bb, frame);
    }

    let current = frame.len().saturating_sub(1);
    let max_age = params.ob_max_age_bars * 2;
    breakers.retain(|bb| bb.is_active() && current - bb.index <= max_age);
    breakers
}

fn update_status(bb: &mut BreakerBlock, frame: &[Candle]) {
    for bar in frame.iter().skip(bb.index + 1) {
        match bb.direction {
            // Bullish breaker acts as support: a close below kills it.
            Direction::Buy => {
                if bar.close < bb.low {
                    bb.status = BreakerStatus::Invalidated;
                    return;
                }
                if bar.low <= bb.high && bar.low >= bb.low {
                    bb.status = BreakerStatus::Tested;
                    bb.tests_count += 1;
                }
            }
            // Bearish breaker acts as resistance: a close above kills it.
            Direction::Sell => {
                if bar.close > bb.high {
                    bb.status = BreakerStatus::Invalidated;
                    return;
                }
                if bar.high >= bb.low && bar.high <= bb.high {
                    bb.status = BreakerStatus::Tested;
                    bb.tests_count += 1;
                }
            }
        }
    }
}
