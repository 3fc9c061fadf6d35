use serde::{Deserialize, Serialize};
use smc_schemas::Candle;

use crate::indicators::{cmf, relative_volume};
use crate::DetectorParams;

/// VSA-style read of the current bar's volume against its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VsaTag {
    /// High volume, compressed range: effort without result.
    Churning,
    /// Elevated volume with range expansion: genuine initiative.
    Ignition,
    /// Volume dried up.
    Absent,
    Normal,
}

/// Combined volume-pressure verdict consumed by the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumePressure {
    pub cmf: Option<f64>,
    pub rvol: Option<f64>,
    pub tag: VsaTag,
    /// False when the volume picture argues against taking the trade.
    pub is_safe: bool,
    /// Net accumulation/distribution read from CMF sign.
    pub pressure_bullish: Option<bool>,
    pub reason: String,
}

/// Classify the latest bar: relative volume vs the same hour of previous
/// sessions, CMF(20) for pressure direction, and the VSA tags
/// churning / ignition / absent on the rvol x range combination.
pub fn volume_pressure(frame: &[Candle], params: &DetectorParams) -> VolumePressure {
    let cmf_value = cmf(frame, params.cmf_period);
    let rvol = relative_volume(frame, 10);

    let avg_range = {
        let start = frame.len().saturating_sub(21);
        let window = &frame[start..frame.len().saturating_sub(1)];
        if window.is_empty() {
            None
        } else {
            Some(window.iter().map(Candle::range).sum::<f64>() / window.len() as f64)
        }
    };

    let (tag, is_safe, reason) = match (rvol, avg_range, frame.last()) {
        (Some(rv), Some(avg), Some(last)) if avg > 0.0 => {
            let range_ratio = last.range() / avg;
            if rv > 1.5 && range_ratio < 0.8 {
                (
                    VsaTag::Churning,
                    false,
                    format!("churning: rvol {rv:.2} with range {range_ratio:.2}x"),
                )
            } else if rv > 1.2 && range_ratio > 1.1 {
                (
                    VsaTag::Ignition,
                    true,
                    format!("ignition: rvol {rv:.2} with range {range_ratio:.2}x"),
                )
            } else if rv < 0.5 {
                (VsaTag::Absent, false, format!("volume absent: rvol {rv:.2}"))
            } else {
                (VsaTag::Normal, true, format!("normal volume: rvol {rv:.2}"))
            }
        }
        _ => (
            VsaTag::Normal,
            true,
            "insufficient volume history".to_string(),
        ),
    };

    VolumePressure {
        cmf: cmf_value,
        rvol,
        tag,
        is_safe,
        pressure_bullish: cmf_value.map(|v| v > 0.0),
        reason,
    }
}
