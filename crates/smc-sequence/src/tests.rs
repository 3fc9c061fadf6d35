use super::*;
use chrono::TimeZone;
use smc_analysis::{
    AmdPhase, AmdView, ConfirmedSweep, KillzoneInfo, SessionType, SilverBulletPhase,
    SilverBulletView, SmtView,
};
use smc_detect::{
    BreakKind, LiquiditySet, MomentumVerdict, OrderBlockSet, PdZone, StructureBreak, StructureView,
    SweepEvent, SweepLevel, VolumePressure, VsaTag, ZoneKind,
};
use smc_schemas::{Tick, Trend};

fn ts(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, 13, 0, 0).unwrap() + chrono::Duration::minutes(minute)
}

fn base_snapshot(price: f64, minute: i64) -> MarketSnapshot {
    MarketSnapshot {
        symbol: "EURUSD".to_string(),
        timestamp: ts(minute),
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
            reason: "test".to_string(),
        },
        atr: Some(0.0010),
        htf_adx: None,
        adr_percent: Some(50.0),
        momentum_buy: MomentumVerdict {
            ok: true,
            reason: "test".to_string(),
        },
        momentum_sell: MomentumVerdict {
            ok: true,
            reason: "test".to_string(),
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

fn with_pdl_sweep(mut snap: MarketSnapshot) -> MarketSnapshot {
    snap.daily_sweep = Some(SweepEvent {
        level_kind: SweepLevel::Pdl,
        level: snap.price - 0.0010,
        pierce_index: 10,
        pierce_ts: snap.timestamp,
        confirmed: true,
        direction: Direction::Buy,
    });
    snap
}

fn with_choch(mut snap: MarketSnapshot, minute: i64, magnitude: f64) -> MarketSnapshot {
    snap.structure.breaks.push(StructureBreak {
        index: 50,
        ts: ts(minute),
        break_price: snap.price + magnitude,
        swing_price: snap.price,
        direction: Direction::Buy,
        kind: BreakKind::Choch,
        displacement: true,
    });
    snap
}

fn config() -> SequenceConfig {
    SequenceConfig::for_instrument(AssetClass::ForexMajor, 0.0001)
}

#[test]
fn full_sequence_progresses_to_entry_ready() {
    let mut machine = SequenceMachine::new();
    let cfg = config();

    let t1 = machine.advance("EURUSD", &with_pdl_sweep(base_snapshot(1.0850, 0)), &cfg);
    assert_eq!(t1, Transition::SweepDetected);
    assert_eq!(machine.state("EURUSD").stage, Stage::LiquiditySweep);

    // CHoCH after the sweep, magnitude well over 0.5 pip.
    let snap = with_choch(with_pdl_sweep(base_snapshot(1.0852, 15)), 15, 0.0010);
    let t2 = machine.advance("EURUSD", &snap, &cfg);
    assert_eq!(t2, Transition::StructureShift);
    assert!(machine.state("EURUSD").choch_detected);

    // Equilibrium zone allows the BUY: entry ready.
    let t3 = machine.advance("EURUSD", &base_snapshot(1.0853, 30), &cfg);
    assert_eq!(t3, Transition::EntryReady);
    let state = machine.state("EURUSD");
    assert_eq!(state.stage, Stage::EntryReady);
    assert!(state.valid_entry_zone);
}

#[test]
fn choch_below_min_break_does_not_advance() {
    let mut machine = SequenceMachine::new();
    let cfg = config();
    machine.advance("EURUSD", &with_pdl_sweep(base_snapshot(1.0850, 0)), &cfg);

    // 0.3 pips of break magnitude: under the 0.5-pip floor.
    let snap = with_choch(base_snapshot(1.0851, 15), 15, 0.00003);
    let t = machine.advance("EURUSD", &snap, &cfg);
    assert_eq!(t, Transition::None);
    assert_eq!(machine.state("EURUSD").stage, Stage::LiquiditySweep);
}

#[test]
fn choch_before_sweep_time_is_ignored() {
    let mut machine = SequenceMachine::new();
    let cfg = config();
    machine.advance("EURUSD", &with_pdl_sweep(base_snapshot(1.0850, 10)), &cfg);

    // CHoCH stamped before the sweep was recorded.
    let snap = with_choch(base_snapshot(1.0851, 11), 5, 0.0010);
    let t = machine.advance("EURUSD", &snap, &cfg);
    assert_eq!(t, Transition::None);
}

#[test]
fn continuation_past_buffer_invalidates_sweep() {
    let mut machine = SequenceMachine::new();
    let cfg = config();
    machine.advance("EURUSD", &with_pdl_sweep(base_snapshot(1.0850, 0)), &cfg);

    // 20 pips below the sweep price: beyond the 15-pip buffer.
    let t = machine.advance("EURUSD", &base_snapshot(1.0830, 15), &cfg);
    assert_eq!(t, Transition::Reset(ResetReason::SweepInvalidated));
    assert_eq!(machine.state("EURUSD").stage, Stage::Neutral);
}

#[test]
fn entry_ready_invalidates_on_close_through_sweep_price() {
    let mut machine = SequenceMachine::new();
    let cfg = config();
    machine.advance("EURUSD", &with_pdl_sweep(base_snapshot(1.0850, 0)), &cfg);
    machine.advance(
        "EURUSD",
        &with_choch(base_snapshot(1.0852, 15), 15, 0.0010),
        &cfg,
    );
    machine.advance("EURUSD", &base_snapshot(1.0853, 30), &cfg);
    assert_eq!(machine.state("EURUSD").stage, Stage::EntryReady);

    let t = machine.advance("EURUSD", &base_snapshot(1.0849, 45), &cfg);
    assert_eq!(t, Transition::Reset(ResetReason::EntryInvalidated));
    assert_eq!(machine.state("EURUSD").stage, Stage::Neutral);
}

#[test]
fn stage_times_out_after_expiration_bars() {
    let mut machine = SequenceMachine::new();
    let mut cfg = config();
    cfg.expiration_bars = 3;
    machine.advance("EURUSD", &with_pdl_sweep(base_snapshot(1.0850, 0)), &cfg);

    let mut last = Transition::None;
    for i in 1..=4 {
        last = machine.advance("EURUSD", &base_snapshot(1.0851, i * 15), &cfg);
    }
    assert_eq!(last, Transition::Reset(ResetReason::Timeout));
    assert_eq!(machine.state("EURUSD").stage, Stage::Neutral);
}

#[test]
fn stages_never_move_backward() {
    let mut machine = SequenceMachine::new();
    let cfg = config();
    machine.advance("EURUSD", &with_pdl_sweep(base_snapshot(1.0850, 0)), &cfg);
    machine.advance(
        "EURUSD",
        &with_choch(base_snapshot(1.0852, 15), 15, 0.0010),
        &cfg,
    );
    let before = machine.state("EURUSD").stage;

    // A fresh sweep while mid-sequence must not re-trigger stage 1.
    let t = machine.advance("EURUSD", &with_pdl_sweep(base_snapshot(1.0852, 30)), &cfg);
    let after = machine.state("EURUSD").stage;
    assert!(after >= before, "stage moved backward: {before:?} -> {after:?}");
    assert_ne!(t, Transition::SweepDetected);
}

#[test]
fn momentum_climax_triggers_stage_one() {
    let mut machine = SequenceMachine::new();
    let cfg = config();
    let mut snap = base_snapshot(1.0850, 0);
    snap.rsi = Some(25.0);
    let t = machine.advance("EURUSD", &snap, &cfg);
    assert_eq!(t, Transition::SweepDetected);
    let state = machine.state("EURUSD");
    assert_eq!(state.sweep_source, Some(SweepSource::MomentumClimax));
    assert_eq!(state.sweep_direction, Some(Direction::Buy));
}

#[test]
fn generic_killzone_sweep_triggers_stage_one() {
    let mut machine = SequenceMachine::new();
    let cfg = config();
    let mut snap = base_snapshot(1.0850, 0);
    snap.sweep = Some(ConfirmedSweep {
        source: SweepSource::GenericKillzone,
        direction: Direction::Sell,
        bonus: 15.0,
    });
    let t = machine.advance("EURUSD", &snap, &cfg);
    assert_eq!(t, Transition::SweepDetected);
    assert_eq!(
        machine.state("EURUSD").sweep_source,
        Some(SweepSource::GenericKillzone)
    );
}
