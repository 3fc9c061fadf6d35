//! Shared fixtures for the cross-crate scenario tests.
//!
//! Everything here is deterministic: fixed timestamps, hand-built candle
//! frames and a neutral snapshot that individual scenarios specialise.
//! Production crates never depend on this one.

use chrono::{DateTime, TimeZone, Utc};
use smc_analysis::{
    AmdPhase, AmdView, KillzoneInfo, MarketSnapshot, SessionType, SilverBulletPhase,
    SilverBulletView, SmtView,
};
use smc_detect::{
    LiquiditySet, MomentumVerdict, OrderBlockSet, PdZone, StructureView, VolumePressure, VsaTag,
    ZoneKind,
};
use smc_schemas::{AccountInfo, AssetClass, Candle, InstrumentSpec, Tick, Trend};

/// A Tuesday during the New York open, the engine's happiest hour.
pub fn ny_open_tuesday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, 13, 30, 0).unwrap()
}

pub fn eurusd_spec() -> InstrumentSpec {
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
        bid: 1.08500,
        ask: 1.08510,
    }
}

pub fn xauusd_spec() -> InstrumentSpec {
    InstrumentSpec {
        name: "XAUUSD".to_string(),
        asset_class: AssetClass::Commodity,
        pip_size: 0.01,
        point: 0.01,
        digits: 2,
        contract_size: 100.0,
        pip_value_per_lot: 1.0,
        volume_min: 0.01,
        volume_max: 50.0,
        volume_step: 0.01,
        stops_level_points: 30.0,
        bid: 2009.80,
        ask: 2010.10,
    }
}

pub fn paper_account() -> AccountInfo {
    AccountInfo {
        login: 1,
        balance: 10_000.0,
        equity: 10_000.0,
        free_margin: 10_000.0,
        leverage: 100,
        trade_allowed: true,
        trade_algo_allowed: true,
        currency: "USD".to_string(),
    }
}

/// Sequential candle frame builder with a fixed bar interval.
pub struct FrameBuilder {
    ts: DateTime<Utc>,
    step_minutes: i64,
    candles: Vec<Candle>,
}

impl FrameBuilder {
    pub fn new(start: DateTime<Utc>, step_minutes: i64) -> Self {
        Self {
            ts: start,
            step_minutes,
            candles: Vec::new(),
        }
    }

    pub fn push(mut self, open: f64, high: f64, low: f64, close: f64) -> Self {
        self.candles.push(Candle {
            ts: self.ts,
            open,
            high,
            low,
            close,
            volume: 100.0,
        });
        self.ts += chrono::Duration::minutes(self.step_minutes);
        self
    }

    /// `n` narrow bars oscillating around `price`.
    pub fn chop(mut self, n: usize, price: f64, half_range: f64) -> Self {
        for i in 0..n {
            let drift = if i % 2 == 0 { half_range / 2.0 } else { -half_range / 2.0 };
            self = self.push(
                price + drift,
                price + half_range,
                price - half_range,
                price - drift,
            );
        }
        self
    }

    pub fn build(self) -> Vec<Candle> {
        self.candles
    }
}

/// A neutral snapshot scenario tests specialise field by field.
pub fn neutral_snapshot(symbol: &str, price: f64, pip: f64) -> MarketSnapshot {
    MarketSnapshot {
        symbol: symbol.to_string(),
        timestamp: ny_open_tuesday(),
        price,
        tick: Tick {
            bid: price,
            ask: price + pip,
            spread_pips: 1.0,
            point: pip / 10.0,
        },
        ltf_trend: Trend::Ranging,
        mtf_trend: Trend::Ranging,
        htf_trend: Trend::Ranging,
        mtf_bias: None,
        htf_bias: None,
        mtf_last_choch: None,
        structure: StructureView {
            swings: vec![],
            breaks: vec![],
            trend: Trend::Ranging,
        },
        order_blocks: OrderBlockSet::default(),
        breakers: vec![],
        fvgs: vec![],
        ifvgs: vec![],
        liquidity: LiquiditySet::default(),
        ote: None,
        pd_zone: Some(PdZone {
            range_high: price + 500.0 * pip,
            range_low: price - 500.0 * pip,
            equilibrium: price,
            premium_start: price + 5.0 * pip,
            discount_end: price - 5.0 * pip,
            current: ZoneKind::Equilibrium,
            percentage: 50.0,
        }),
        asian_range: None,
        asian_sweep: None,
        daily_levels: None,
        daily_sweep: None,
        silver_bullet: SilverBulletView {
            phase: SilverBulletPhase::Waiting,
            direction: None,
        },
        amd: AmdView {
            phase: AmdPhase::None,
            direction: None,
            range_high: 0.0,
            range_low: 0.0,
        },
        smt: SmtView {
            signal: None,
            symbol_made_new_extreme: false,
        },
        rsi: Some(50.0),
        macd: None,
        divergence: None,
        volume: VolumePressure {
            cmf: None,
            rvol: Some(1.0),
            tag: VsaTag::Normal,
            is_safe: true,
            pressure_bullish: None,
            reason: "fixture".to_string(),
        },
        atr: Some(10.0 * pip),
        htf_adx: None,
        adr_percent: Some(50.0),
        momentum_buy: MomentumVerdict {
            ok: true,
            reason: "fixture".to_string(),
        },
        momentum_sell: MomentumVerdict {
            ok: true,
            reason: "fixture".to_string(),
        },
        killzone: KillzoneInfo {
            session: SessionType::NyOpen,
            is_killzone: true,
            can_trade: true,
        },
        sweep: None,
        bias: None,
        tta_aligned: false,
        regime_scrutiny: false,
        recent_displacement: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_builder_steps_timestamps() {
        let frame = FrameBuilder::new(ny_open_tuesday(), 15)
            .push(1.0, 1.1, 0.9, 1.05)
            .push(1.05, 1.15, 1.0, 1.1)
            .build();
        assert_eq!(frame.len(), 2);
        assert_eq!(
            frame[1].ts - frame[0].ts,
            chrono::Duration::minutes(15)
        );
    }

    #[test]
    fn neutral_snapshot_is_truly_neutral() {
        let snap = neutral_snapshot("EURUSD", 1.0850, 0.0001);
        assert!(snap.bias.is_none());
        assert!(snap.sweep.is_none());
        assert_eq!(snap.killzone.session, SessionType::NyOpen);
    }
}
