use smc_schemas::{AssetClass, InstrumentSpec};

/// Why a size could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SizingError {
    /// Stop distance collapsed to zero (upstream invariant failure).
    ZeroStopDistance,
    /// Result after clamping and multipliers fell under the executable
    /// minimum.
    LotTooSmall { computed: f64, minimum: f64 },
}

impl std::fmt::Display for SizingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizingError::ZeroStopDistance => f.write_str("zero stop distance"),
            SizingError::LotTooSmall { computed, minimum } => {
                write!(f, "lot {computed:.4} under minimum {minimum:.2}")
            }
        }
    }
}

impl std::error::Error for SizingError {}

/// Account-currency value of one pip for one lot. The broker-reported
/// figure wins whenever present; the class table is the fallback.
fn pip_value_per_lot(spec: &InstrumentSpec) -> f64 {
    if spec.pip_value_per_lot > 0.0 {
        return spec.pip_value_per_lot;
    }
    match spec.asset_class {
        AssetClass::ForexMajor => 10.0,
        AssetClass::Commodity => 1.0,
        AssetClass::Crypto | AssetClass::Indices => 1.0,
    }
}

/// Convert risk appetite into a lot size:
/// `lots = (balance x risk% / 100) / (sl_pips x pip_value_per_lot)`,
/// clamped to the instrument's volume limits (and the optional per-symbol
/// cap), rounded down to the volume step, then scaled by the signal's lot
/// multiplier. A result under `volume_min` is refused rather than bumped.
pub fn size_position(
    balance: f64,
    risk_percent: f64,
    entry: f64,
    stop: f64,
    lot_multiplier: f64,
    symbol_cap: Option<f64>,
    spec: &InstrumentSpec,
) -> Result<f64, SizingError> {
    let sl_distance = (entry - stop).abs();
    if sl_distance <= 0.0 || spec.pip_size <= 0.0 {
        return Err(SizingError::ZeroStopDistance);
    }

    let risk_amount = balance * risk_percent / 100.0;
    let sl_pips = sl_distance / spec.pip_size;
    let raw = risk_amount / (sl_pips * pip_value_per_lot(spec));

    let upper = symbol_cap.map_or(spec.volume_max, |cap| cap.min(spec.volume_max));
    let clamped = raw.clamp(spec.volume_min, upper);
    let stepped = round_to_step(clamped, spec.volume_step).max(spec.volume_min);

    let sized = round_to_step(stepped * lot_multiplier, spec.volume_step);
    if sized < spec.volume_min {
        return Err(SizingError::LotTooSmall {
            computed: sized,
            minimum: spec.volume_min,
        });
    }
    Ok(sized)
}

fn round_to_step(volume: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return volume;
    }
    (volume / step).floor() * step
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurusd() -> InstrumentSpec {
        InstrumentSpec {
            name: "EURUSD".to_string(),
            asset_class: AssetClass::ForexMajor,
            pip_size: 0.0001,
            point: 0.00001,
            digits: 5,
            contract_size: 100_000.0,
            pip_value_per_lot: 10.0,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
            stops_level_points: 30.0,
            bid: 1.0850,
            ask: 1.0851,
        }
    }

    #[test]
    fn textbook_half_percent_risk() {
        // $10_000 x 0.5% = $50 risk over 25 pips at $10/pip/lot = 0.20.
        let lots =
            size_position(10_000.0, 0.5, 1.0850, 1.0825, 1.0, None, &eurusd()).unwrap();
        assert!((lots - 0.20).abs() < 1e-9);
    }

    #[test]
    fn lot_multiplier_scales_after_clamping() {
        let lots =
            size_position(10_000.0, 0.5, 1.0850, 1.0825, 0.5, None, &eurusd()).unwrap();
        assert!((lots - 0.10).abs() < 1e-9);
    }

    #[test]
    fn symbol_cap_binds_before_multiplier() {
        let lots =
            size_position(1_000_000.0, 2.0, 1.0850, 1.0825, 1.0, Some(0.50), &eurusd()).unwrap();
        assert!((lots - 0.50).abs() < 1e-9);
    }

    #[test]
    fn result_rounds_down_to_step() {
        // $10_000 x 0.33% = $33 over 25 pips = 0.132 -> 0.13.
        let lots =
            size_position(10_000.0, 0.33, 1.0850, 1.0825, 1.0, None, &eurusd()).unwrap();
        assert!((lots - 0.13).abs() < 1e-9);
    }

    #[test]
    fn tiny_multiplier_is_lot_too_small() {
        let err = size_position(1_000.0, 0.1, 1.0850, 1.0825, 0.3, None, &eurusd()).unwrap_err();
        assert!(matches!(err, SizingError::LotTooSmall { .. }));
    }

    #[test]
    fn zero_stop_distance_is_rejected() {
        let err = size_position(10_000.0, 0.5, 1.0850, 1.0850, 1.0, None, &eurusd()).unwrap_err();
        assert_eq!(err, SizingError::ZeroStopDistance);
    }

    #[test]
    fn broker_pip_value_wins_over_class_table() {
        let mut spec = eurusd();
        spec.pip_value_per_lot = 20.0; // broker reports an exotic value
        let lots = size_position(10_000.0, 0.5, 1.0850, 1.0825, 1.0, None, &spec).unwrap();
        assert!((lots - 0.10).abs() < 1e-9);
    }
}
