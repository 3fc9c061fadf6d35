use serde::{Deserialize, Serialize};
use smc_detect::{detect_swings, SwingKind};
use smc_schemas::{Candle, Direction};

/// Smart-Money-Technique divergence read between two correlated frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmtView {
    pub signal: Option<Direction>,
    /// The divergence that produced the signal, for journaling.
    pub symbol_made_new_extreme: bool,
}

/// Compare the last two swing extremes of the symbol against its correlated
/// instrument. For a positively correlated pair, the symbol printing a
/// lower low while the correlate holds a higher low is bullish SMT (the
/// new low is a liquidity grab, not agreement); the mirror case is bearish.
/// `inverted` flips the correlate's reading for negatively correlated
/// references (DXY against USD quote pairs).
pub fn smt_divergence(
    frame: &[Candle],
    correlated: &[Candle],
    swing_strength: usize,
    inverted: bool,
) -> SmtView {
    let own = detect_swings(frame, swing_strength);
    let other = detect_swings(correlated, swing_strength);

    let last_two = |swings: &[smc_detect::SwingPoint], kind: SwingKind| -> Option<(f64, f64)> {
        let mut it = swings.iter().rev().filter(|s| s.kind == kind);
        let last = it.next()?.price;
        let prev = it.next()?.price;
        Some((prev, last))
    };

    // Bullish: symbol LL vs correlate HL.
    if let (Some((own_prev, own_last)), Some((oth_prev, oth_last))) = (
        last_two(&own, SwingKind::Low),
        last_two(&other, if inverted { SwingKind::High } else { SwingKind::Low }),
    ) {
        let own_lower_low = own_last < own_prev;
        let other_holds = if inverted {
            // Inverted correlate: its highs failing to make a higher high
            // is the equivalent of a held low.
            oth_last < oth_prev
        } else {
            oth_last > oth_prev
        };
        if own_lower_low && other_holds {
            return SmtView {
                signal: Some(Direction::Buy),
                symbol_made_new_extreme: true,
            };
        }
    }

    // Bearish: symbol HH vs correlate LH.
    if let (Some((own_prev, own_last)), Some((oth_prev, oth_last))) = (
        last_two(&own, SwingKind::High),
        last_two(&other, if inverted { SwingKind::Low } else { SwingKind::High }),
    ) {
        let own_higher_high = own_last > own_prev;
        let other_fails = if inverted {
            oth_last > oth_prev
        } else {
            oth_last < oth_prev
        };
        if own_higher_high && other_fails {
            return SmtView {
                signal: Some(Direction::Sell),
                symbol_made_new_extreme: true,
            };
        }
    }

    SmtView {
        signal: None,
        symbol_made_new_extreme: false,
    }
}
