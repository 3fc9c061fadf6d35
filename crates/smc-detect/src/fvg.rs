use serde::{Deserialize, Serialize};
use smc_schemas::{Candle, Direction};

use crate::DetectorParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FvgKind {
    Bullish,
    Bearish,
}

impl FvgKind {
    pub fn direction(self) -> Direction {
        match self {
            FvgKind::Bullish => Direction::Buy,
            FvgKind::Bearish => Direction::Sell,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FvgStatus {
    Open,
    Mitigated,
    Invalidated,
    Inverted,
}

/// A three-candle imbalance: first and third bars do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fvg {
    pub kind: FvgKind,
    /// Index of the third (completing) bar.
    pub index: usize,
    pub top: f64,
    pub bottom: f64,
    pub age_bars: usize,
    /// Deepest later-bar penetration of the gap, as a fraction of its height.
    pub mitigated_fraction: f64,
    pub status: FvgStatus,
}

impl Fvg {
    pub fn midpoint(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.bottom && price <= self.top
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, FvgStatus::Open | FvgStatus::Mitigated)
    }
}

/// An FVG price closed fully through against its direction. The zone lives
/// on with flipped polarity: a filled bullish gap becomes resistance, a
/// filled bearish gap becomes support.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvertedFvg {
    /// New polarity (the direction the zone now supports).
    pub direction: Direction,
    pub top: f64,
    pub bottom: f64,
    pub origin_index: usize,
    /// Bar whose close flipped the gap.
    pub invert_index: usize,
    /// Deterministic quality estimate in [0, 100].
    pub confidence: f64,
}

impl InvertedFvg {
    pub fn midpoint(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.bottom && price <= self.top
    }
}

/// Forward scan for 3-bar imbalances, then sweep each gap forward tracking
/// mitigation. A gap is INVALIDATED once filled past
/// `fvg_invalidation_fraction`; a close fully beyond the far edge instead
/// emits an [`InvertedFvg`] and marks the origin INVERTED.
///
/// Returns (active FVGs, inverted FVGs). A boundary gap of exactly
/// `min_gap_pips` qualifies.
pub fn detect_fvgs(frame: &[Candle], params: &DetectorParams) -> (Vec<Fvg>, Vec<InvertedFvg>) {
    let mut fvgs = Vec::new();
    let mut ifvgs = Vec::new();
    if frame.len() < 3 {
        return (fvgs, ifvgs);
    }
    let min_gap = params.price(params.min_gap_pips);
    let current = frame.len() - 1;

    for i in 2..frame.len() {
        let first = &frame[i - 2];
        let third = &frame[i];

        let candidate = if third.low > first.high && third.low - first.high >= min_gap {
            Some(Fvg {
                kind: FvgKind::Bullish,
                index: i,
                top: third.low,
                bottom: first.high,
                age_bars: current - i,
                mitigated_fraction: 0.0,
                status: FvgStatus::Open,
            })
        } else if third.high < first.low && first.low - third.high >= min_gap {
            Some(Fvg {
                kind: FvgKind::Bearish,
                index: i,
                top: first.low,
                bottom: third.high,
                age_bars: current - i,
                mitigated_fraction: 0.0,
                status: FvgStatus::Open,
            })
        } else {
            None
        };

        let Some(mut fvg) = candidate else { continue };
        let inverted = sweep_lifecycle(&mut fvg, frame, params);
        if let Some(ifvg) = inverted {
            ifvgs.push(ifvg);
        } else if fvg.is_active() {
            fvgs.push(fvg);
        }
    }

    (fvgs, ifvgs)
}

/// Advance one gap through the rest of the frame. Returns the inversion,
/// if one happened.
fn sweep_lifecycle(fvg: &mut Fvg, frame: &[Candle], params: &DetectorParams) -> Option<InvertedFvg> {
    let height = fvg.height();
    if height <= 0.0 {
        fvg.status = FvgStatus::Invalidated;
        return None;
    }

    for (j, bar) in frame.iter().enumerate().skip(fvg.index + 1) {
        // Inversion first: a decisive close through the far edge flips the
        // zone before fill accounting can write it off.
        match fvg.kind {
            FvgKind::Bullish if bar.close < fvg.bottom => {
                fvg.status = FvgStatus::Inverted;
                return Some(make_inverted(fvg, frame, j, params));
            }
            FvgKind::Bearish if bar.close > fvg.top => {
                fvg.status = FvgStatus::Inverted;
                return Some(make_inverted(fvg, frame, j, params));
            }
            _ => {}
        }

        let penetration = match fvg.kind {
            // Price fills a bullish gap from the top down.
            FvgKind::Bullish => (fvg.top - bar.low.max(fvg.bottom)).max(0.0),
            // And a bearish gap from the bottom up.
            FvgKind::Bearish => (bar.high.min(fvg.top) - fvg.bottom).max(0.0),
        };
        let fraction = (penetration / height).clamp(0.0, 1.0);
        if fraction > fvg.mitigated_fraction {
            fvg.mitigated_fraction = fraction;
        }

        if fvg.mitigated_fraction >= params.fvg_invalidation_fraction {
            fvg.status = FvgStatus::Invalidated;
            return None;
        }
        if fvg.mitigated_fraction > 0.0 {
            fvg.status = FvgStatus::Mitigated;
        }
    }
    None
}

fn make_inverted(
    fvg: &Fvg,
    frame: &[Candle],
    invert_index: usize,
    params: &DetectorParams,
) -> InvertedFvg {
    let direction = fvg.kind.direction().opposite();
    let current = frame.len() - 1;
    let invert_bar = &frame[invert_index];

    // Deterministic quality estimate: wide gaps, decisive invert closes and
    // fresh zones score higher. Capped below the "certainty" band on
    // purpose; retest context is the analyzer's to add.
    let mut confidence: f64 = 55.0;
    if fvg.height() >= 2.0 * params.price(params.min_gap_pips) {
        confidence += 15.0;
    }
    let overshoot = match fvg.kind {
        FvgKind::Bullish => fvg.bottom - invert_bar.close,
        FvgKind::Bearish => invert_bar.close - fvg.top,
    };
    if overshoot >= 0.5 * fvg.height() {
        confidence += 15.0;
    }
    if current - invert_index <= 10 {
        confidence += 10.0;
    }

    InvertedFvg {
        direction,
        top: fvg.top,
        bottom: fvg.bottom,
        origin_index: fvg.index,
        invert_index,
        confidence: confidence.min(95.0),
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

    fn params() -> DetectorParams {
        DetectorParams::forex_defaults(0.0001)
    }

    #[test]
    fn detects_bullish_gap_at_exact_threshold() {
        // Gap of exactly 2.0 pips between high[0]=1.0802 and low[2]=1.0804.
        let frame = vec![
            candle(0, 1.0800, 1.0802, 1.0796, 1.0801),
            candle(1, 1.0801, 1.0810, 1.0800, 1.0809),
            candle(2, 1.0809, 1.0815, 1.0804, 1.0814),
            candle(3, 1.0814, 1.0818, 1.0810, 1.0816),
        ];
        let (fvgs, _) = detect_fvgs(&frame, &params());
        assert_eq!(fvgs.len(), 1);
        assert_eq!(fvgs[0].kind, FvgKind::Bullish);
        assert!((fvgs[0].bottom - 1.0802).abs() < 1e-9);
        assert!((fvgs[0].top - 1.0804).abs() < 1e-9);
    }

    #[test]
    fn sub_threshold_gap_does_not_qualify() {
        // 1.9-pip gap: below min_gap_pips = 2.0.
        let frame = vec![
            candle(0, 1.0800, 1.08020, 1.0796, 1.0801),
            candle(1, 1.0801, 1.0810, 1.0800, 1.0809),
            candle(2, 1.0809, 1.0815, 1.08039, 1.0814),
            candle(3, 1.0814, 1.0818, 1.0810, 1.0816),
        ];
        let (fvgs, _) = detect_fvgs(&frame, &params());
        assert!(fvgs.is_empty());
    }

    #[test]
    fn partial_fill_tracks_mitigated_fraction() {
        let frame = vec![
            candle(0, 1.0800, 1.0802, 1.0796, 1.0801),
            candle(1, 1.0801, 1.0812, 1.0800, 1.0811),
            candle(2, 1.0811, 1.0816, 1.0808, 1.0815), // gap 1.0802..1.0808
            // Wick half-way into the gap (low 1.0805 of a 6-pip gap).
            candle(3, 1.0815, 1.0816, 1.0805, 1.0812),
        ];
        let (fvgs, _) = detect_fvgs(&frame, &params());
        assert_eq!(fvgs.len(), 1);
        assert_eq!(fvgs[0].status, FvgStatus::Mitigated);
        assert!((fvgs[0].mitigated_fraction - 0.5).abs() < 1e-6);
    }

    #[test]
    fn full_fill_invalidates() {
        let frame = vec![
            candle(0, 1.0800, 1.0802, 1.0796, 1.0801),
            candle(1, 1.0801, 1.0812, 1.0800, 1.0811),
            candle(2, 1.0811, 1.0816, 1.0808, 1.0815),
            // Trades through the whole gap but closes back inside it.
            candle(3, 1.0815, 1.0816, 1.0802, 1.0806),
        ];
        let (fvgs, ifvgs) = detect_fvgs(&frame, &params());
        assert!(fvgs.is_empty());
        assert!(ifvgs.is_empty());
    }

    #[test]
    fn close_through_emits_inverted_with_flipped_polarity() {
        let frame = vec![
            candle(0, 1.0800, 1.0802, 1.0796, 1.0801),
            candle(1, 1.0801, 1.0812, 1.0800, 1.0811),
            candle(2, 1.0811, 1.0816, 1.0808, 1.0815), // bullish gap 1.0802..1.0808
            candle(3, 1.0815, 1.0816, 1.0790, 1.0794), // closes below the gap
        ];
        let (fvgs, ifvgs) = detect_fvgs(&frame, &params());
        assert!(fvgs.is_empty());
        assert_eq!(ifvgs.len(), 1);
        assert_eq!(ifvgs[0].direction, Direction::Sell);
        assert_eq!(ifvgs[0].origin_index, 2);
        assert_eq!(ifvgs[0].invert_index, 3);
        assert!(ifvgs[0].confidence >= 55.0);
    }

    #[test]
    fn decisive_wide_fresh_inversion_scores_high() {
        let frame = vec![
            candle(0, 1.0800, 1.0802, 1.0796, 1.0801),
            candle(1, 1.0801, 1.0820, 1.0800, 1.0819),
            candle(2, 1.0819, 1.0825, 1.0812, 1.0824), // 10-pip gap
            candle(3, 1.0824, 1.0825, 1.0780, 1.0785), // deep close-through
        ];
        let (_, ifvgs) = detect_fvgs(&frame, &params());
        assert_eq!(ifvgs.len(), 1);
        assert!((ifvgs[0].confidence - 95.0).abs() < 1e-9);
    }
}
