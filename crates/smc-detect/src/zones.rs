use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction};

use crate::structure::StructureView;
use crate::DetectorParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ZoneKind {
    Premium,
    Discount,
    Equilibrium,
}

/// Premium/discount read of price against a reference swing range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdZone {
    pub range_high: f64,
    pub range_low: f64,
    pub equilibrium: f64,
    pub premium_start: f64,
    pub discount_end: f64,
    pub current: ZoneKind,
    /// Price position inside the range, clamped to [0, 100].
    pub percentage: f64,
}

impl PdZone {
    pub fn classify(&self, price: f64) -> ZoneKind {
        if price > self.premium_start {
            ZoneKind::Premium
        } else if price < self.discount_end {
            ZoneKind::Discount
        } else {
            ZoneKind::Equilibrium
        }
    }

    /// Zone discipline: buys belong in discount, sells in premium,
    /// equilibrium tolerates both.
    pub fn allows(&self, direction: Direction) -> bool {
        match direction {
            Direction::Buy => matches!(self.current, ZoneKind::Discount | ZoneKind::Equilibrium),
            Direction::Sell => matches!(self.current, ZoneKind::Premium | ZoneKind::Equilibrium),
        }
    }
}

/// Compute the premium/discount zones from the most recent confirmed swing
/// range, falling back to the rolling `pd_lookback` window extremes when
/// structure has not printed a usable pair.
pub fn premium_discount(
    frame: &[Candle],
    structure: &StructureView,
    params: &DetectorParams,
) -> Option<PdZone> {
    let last = frame.last()?;
    let (range_low, range_high) = match structure.reference_range() {
        Some(r) => r,
        None => {
            let window_start = frame.len().saturating_sub(params.pd_lookback);
            let window = &frame[window_start..];
            let high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            (low, high)
        }
    };

    let range = range_high - range_low;
    if range <= 0.0 {
        return None;
    }

    let equilibrium = range_low + range / 2.0;
    let buffer = params.price(params.equilibrium_buffer_pips);
    let premium_start = equilibrium + buffer;
    let discount_end = equilibrium - buffer;

    let price = last.close;
    let percentage = ((price - range_low) / range * 100.0).clamp(0.0, 100.0);

    let mut zone = PdZone {
        range_high,
        range_low,
        equilibrium,
        premium_start,
        discount_end,
        current: ZoneKind::Equilibrium,
        percentage,
    };
    zone.current = zone.classify(price);
    Some(zone)
}

/// Optimal Trade Entry retracement band inside a swing range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OteZone {
    pub swing_high: f64,
    pub swing_low: f64,
    pub direction: Direction,
    pub start: f64,
    pub end: f64,
    /// The 0.705 sweet spot.
    pub midpoint: f64,
}

impl OteZone {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.start && price <= self.end
    }
}

/// Fibonacci band [`ote_fib_start`, `ote_fib_end`] measured from the swing
/// extreme against the trade direction: buys retrace down from the high,
/// sells retrace up from the low.
pub fn ote_zone(
    swing_high: f64,
    swing_low: f64,
    direction: Direction,
    params: &DetectorParams,
) -> Option<OteZone> {
    let range = swing_high - swing_low;
    if range <= 0.0 {
        return None;
    }
    let (a, b, mid) = match direction {
        Direction::Buy => (
            swing_high - range * params.ote_fib_start,
            swing_high - range * params.ote_fib_end,
            swing_high - range * 0.705,
        ),
        Direction::Sell => (
            swing_low + range * params.ote_fib_start,
            swing_low + range * params.ote_fib_end,
            swing_low + range * 0.705,
        ),
    };
    Some(OteZone {
        swing_high,
        swing_low,
        direction,
        start: a.min(b),
        end: a.max(b),
        midpoint: mid,
    })
}
