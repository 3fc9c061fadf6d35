//! Institutional sequencing state machine.
//!
//! Per symbol, tracks the four-stage setup sequence
//! NEUTRAL -> LIQUIDITY_SWEEP -> STRUCTURE_SHIFT -> ENTRY_READY over the
//! snapshots the analyzer emits. Stages only ever advance forward or reset
//! to NEUTRAL; there is no backward transition. A fully sequenced setup is
//! worth a large scoring bonus and may override a neutral combined bias.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smc_analysis::{MarketSnapshot, SweepSource};
use smc_schemas::{AssetClass, Direction};
use tracing::info;

// ---------------------------------------------------------------------------
// Stage / state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Neutral,
    LiquiditySweep,
    StructureShift,
    EntryReady,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Neutral => "NEUTRAL",
            Stage::LiquiditySweep => "LIQUIDITY_SWEEP",
            Stage::StructureShift => "STRUCTURE_SHIFT",
            Stage::EntryReady => "ENTRY_READY",
        };
        f.write_str(s)
    }
}

/// Per-symbol sequence state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceState {
    pub stage: Stage,
    pub sweep_source: Option<SweepSource>,
    pub sweep_direction: Option<Direction>,
    pub sweep_price: f64,
    pub sweep_time: Option<DateTime<Utc>>,
    pub choch_detected: bool,
    pub choch_price: f64,
    pub choch_time: Option<DateTime<Utc>>,
    pub valid_entry_zone: bool,
    pub bars_since_transition: usize,
}

impl Default for SequenceState {
    fn default() -> Self {
        Self {
            stage: Stage::Neutral,
            sweep_source: None,
            sweep_direction: None,
            sweep_price: 0.0,
            sweep_time: None,
            choch_detected: false,
            choch_price: 0.0,
            choch_time: None,
            valid_entry_zone: false,
            bars_since_transition: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Thresholds in price units, resolved per instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceConfig {
    /// Stage not advanced for this many bars resets to NEUTRAL.
    pub expiration_bars: usize,
    /// Minimum CHoCH break magnitude.
    pub min_break: f64,
    /// Continuation past the sweep price by this much invalidates the sweep.
    pub invalidation_buffer: f64,
}

impl SequenceConfig {
    /// Class defaults: 0.5-pip break / 15-pip buffer on forex; gold and
    /// indices break at 5x that with a flat $5 continuation buffer.
    pub fn for_instrument(asset_class: AssetClass, pip_size: f64) -> Self {
        match asset_class {
            AssetClass::ForexMajor => Self {
                expiration_bars: 60,
                min_break: 0.5 * pip_size,
                invalidation_buffer: 15.0 * pip_size,
            },
            AssetClass::Commodity | AssetClass::Indices => Self {
                expiration_bars: 60,
                min_break: 2.5 * pip_size,
                invalidation_buffer: 5.0,
            },
            AssetClass::Crypto => Self {
                expiration_bars: 60,
                min_break: 2.5 * pip_size,
                invalidation_buffer: 5.0,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// What `advance` did this cycle, for journaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    SweepDetected,
    StructureShift,
    EntryReady,
    Reset(ResetReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    Timeout,
    SweepInvalidated,
    EntryInvalidated,
}

/// Owns one [`SequenceState`] per symbol. Lives inside the symbol's
/// scheduler slot; no locking, no sharing.
#[derive(Debug, Default)]
pub struct SequenceMachine {
    states: HashMap<String, SequenceState>,
}

impl SequenceMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, symbol: &str) -> SequenceState {
        self.states.get(symbol).cloned().unwrap_or_default()
    }

    pub fn reset(&mut self, symbol: &str, reason: &str) {
        if let Some(state) = self.states.get_mut(symbol) {
            if state.stage != Stage::Neutral {
                info!(symbol, reason, "sequence reset");
            }
            *state = SequenceState::default();
        }
    }

    /// Advance the symbol's sequence with this cycle's snapshot. Returns
    /// the transition taken (if any) and leaves the updated state readable
    /// through [`SequenceMachine::state`].
    pub fn advance(
        &mut self,
        symbol: &str,
        snapshot: &MarketSnapshot,
        config: &SequenceConfig,
    ) -> Transition {
        let state = self.states.entry(symbol.to_string()).or_default();
        state.bars_since_transition += 1;

        // Timeout first: a stale sequence is torn down before any new
        // evidence is considered.
        if state.stage != Stage::Neutral && state.bars_since_transition > config.expiration_bars {
            info!(symbol, stage = %state.stage, "sequence timeout");
            *state = SequenceState::default();
            return Transition::Reset(ResetReason::Timeout);
        }

        let price = snapshot.price;
        match state.stage {
            Stage::Neutral => {
                if let Some((source, direction)) = sweep_trigger(snapshot) {
                    state.stage = Stage::LiquiditySweep;
                    state.sweep_source = Some(source);
                    state.sweep_direction = Some(direction);
                    state.sweep_price = price;
                    state.sweep_time = Some(snapshot.timestamp);
                    state.bars_since_transition = 0;
                    info!(symbol, source = %source, %direction, "sequence: liquidity sweep");
                    return Transition::SweepDetected;
                }
                Transition::None
            }

            Stage::LiquiditySweep => {
                let direction = state.sweep_direction.expect("sweep stage carries direction");

                // Continuation through the sweep level says it was no sweep.
                let invalidated = match direction {
                    Direction::Buy => price < state.sweep_price - config.invalidation_buffer,
                    Direction::Sell => price > state.sweep_price + config.invalidation_buffer,
                };
                if invalidated {
                    info!(symbol, "sequence: sweep invalidated by continuation");
                    *state = SequenceState::default();
                    return Transition::Reset(ResetReason::SweepInvalidated);
                }

                let sweep_time = state.sweep_time.expect("sweep stage carries time");
                let choch = snapshot.structure.breaks.iter().rev().find(|b| {
                    b.kind == smc_detect::BreakKind::Choch
                        && b.ts > sweep_time
                        && b.direction == direction
                        && (b.break_price - b.swing_price).abs() >= config.min_break
                });
                if let Some(b) = choch {
                    state.stage = Stage::StructureShift;
                    state.choch_detected = true;
                    state.choch_price = b.break_price;
                    state.choch_time = Some(b.ts);
                    state.bars_since_transition = 0;
                    info!(symbol, %direction, price = b.break_price, "sequence: structure shift");
                    return Transition::StructureShift;
                }
                Transition::None
            }

            Stage::StructureShift => {
                let direction = state.sweep_direction.expect("shift stage carries direction");
                let zone_ok = snapshot.pd_zone.as_ref().is_some_and(|z| z.allows(direction));
                if zone_ok {
                    state.stage = Stage::EntryReady;
                    state.valid_entry_zone = true;
                    state.bars_since_transition = 0;
                    info!(symbol, %direction, "sequence: entry ready");
                    return Transition::EntryReady;
                }
                Transition::None
            }

            Stage::EntryReady => {
                let direction = state.sweep_direction.expect("ready stage carries direction");
                let invalidated = match direction {
                    Direction::Buy => price < state.sweep_price,
                    Direction::Sell => price > state.sweep_price,
                };
                if invalidated {
                    info!(symbol, "sequence: entry invalidated through sweep price");
                    *state = SequenceState::default();
                    return Transition::Reset(ResetReason::EntryInvalidated);
                }
                Transition::None
            }
        }
    }
}

/// Stage-1 trigger: any sweep event, a generic killzone grab, or an RSI
/// climax.
fn sweep_trigger(snapshot: &MarketSnapshot) -> Option<(SweepSource, Direction)> {
    if let Some(s) = &snapshot.daily_sweep {
        return Some((SweepSource::PdhPdl, s.direction));
    }
    if let Some(s) = &snapshot.asian_sweep {
        return Some((SweepSource::AsianRange, s.direction));
    }
    if let Some(s) = &snapshot.sweep {
        return Some((s.source, s.direction));
    }
    if let Some(rsi) = snapshot.rsi {
        if rsi < 30.0 {
            return Some((SweepSource::MomentumClimax, Direction::Buy));
        }
        if rsi > 70.0 {
            return Some((SweepSource::MomentumClimax, Direction::Sell));
        }
    }
    None
}

#[cfg(test)]
mod tests;
