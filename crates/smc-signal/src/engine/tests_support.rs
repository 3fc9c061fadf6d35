//! Snapshot and instrument fixtures shared by the unit tests in this
//! crate. Everything starts neutral; individual tests flip exactly the
//! fields their scenario needs.

use chrono::{TimeZone, Utc};
use smc_analysis::{
    AmdPhase, AmdView, KillzoneInfo, MarketSnapshot, SessionType, SilverBulletPhase,
    SilverBulletView, SmtView,
};
use smc_detect::{
    LiquiditySet, MomentumVerdict, OrderBlockSet, PdZone, StructureView, VolumePressure, VsaTag,
    ZoneKind,
};
use smc_schemas::{AssetClass, InstrumentSpec, Tick, Trend};

pub(crate) fn bare_snapshot(price: f64) -> MarketSnapshot {
    MarketSnapshot {
        symbol: "EURUSD".to_string(),
        timestamp: Utc.with_ymd_and_hms(2026, 3, 3, 13, 30, 0).unwrap(),
        price,
        tick: Tick {
            bid: price,
            ask: price + 0.0001,
            spread_pips: 1.0,
            point: 0.00001,
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
            range_high: price + 0.0050,
            range_low: price - 0.0050,
            equilibrium: price,
            premium_start: price + 0.0005,
            discount_end: price - 0.0005,
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
        atr: Some(0.0010),
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

pub(crate) fn eurusd_spec() -> InstrumentSpec {
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
