//! Asian-range sweep long on EURUSD M15: the range prints overnight, the
//! London open bar pierces the low and reclaims it, structure shifts up,
//! and the fully sequenced setup produces an A+ long with the stop under
//! the sweep and the target past the range high.

use chrono::{TimeZone, Utc};
use smc_analysis::{ConfirmedSweep, SweepSource};
use smc_detect::{detect_asian_range, AsianSweepDetector, BreakKind, StructureBreak, SwingKind, SwingPoint, ZoneKind};
use smc_schemas::{AssetClass, Direction, Trend};
use smc_sequence::{SequenceConfig, SequenceMachine, Stage, Transition};
use smc_signal::{Quality, SignalContext, SignalEngine, SignalPolicy};
use smc_testkit::{eurusd_spec, neutral_snapshot, FrameBuilder};

fn asian_day_frame() -> Vec<smc_schemas::Candle> {
    // 28 x M15 candles covering 00:00-07:00, range 1.08300..1.08500.
    let start = Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap();
    let mut builder = FrameBuilder::new(start, 15);
    for i in 0..28 {
        let wobble = (i % 5) as f64 * 0.00002;
        builder = builder.push(
            1.08400,
            1.08500 - wobble,
            1.08300 + wobble,
            1.08400,
        );
    }
    // 07:00-08:00 drift, then the London open sweep bar:
    // low 1.08250 pierces the Asian low, close 1.08360 reclaims it.
    builder
        .push(1.08400, 1.08420, 1.08360, 1.08380)
        .push(1.08380, 1.08400, 1.08340, 1.08360)
        .push(1.08360, 1.08390, 1.08330, 1.08350)
        .push(1.08350, 1.08380, 1.08320, 1.08340)
        .push(1.08340, 1.08380, 1.08250, 1.08360)
        .build()
}

fn snapshot_at(minute: i64, price: f64) -> smc_analysis::MarketSnapshot {
    let mut snap = neutral_snapshot("EURUSD", price, 0.0001);
    snap.timestamp = Utc.with_ymd_and_hms(2026, 3, 3, 8, 0, 0).unwrap()
        + chrono::Duration::minutes(minute);
    snap.killzone.session = smc_analysis::SessionType::LondonOpen;
    snap.ltf_trend = Trend::Bullish;
    snap.mtf_trend = Trend::Bullish;
    snap.htf_trend = Trend::Bullish;
    snap.mtf_bias = Some(Direction::Buy);
    snap.htf_bias = Some(Direction::Buy);
    snap.tta_aligned = true;
    snap.rsi = Some(45.0);
    snap.recent_displacement = true;
    if let Some(zone) = &mut snap.pd_zone {
        zone.current = ZoneKind::Discount;
        zone.percentage = 20.0;
    }
    snap.structure.swings = vec![
        SwingPoint {
            index: 30,
            price: 1.08250,
            kind: SwingKind::Low,
            strength: 5,
        },
        SwingPoint {
            index: 26,
            price: 1.08520,
            kind: SwingKind::High,
            strength: 5,
        },
    ];
    snap
}

#[test]
fn asian_sweep_long_full_sequence() {
    // The real Asian-range detectors see the sweep in the frame.
    let frame = asian_day_frame();
    let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
    let range = detect_asian_range(&frame, date, 0, 7).expect("asian range");
    assert!((range.high - 1.08500).abs() < 1e-9);
    assert!((range.low - 1.08300).abs() < 1e-9);

    let sweep = AsianSweepDetector {
        buffer: 0.0002,
        session_end_hour: 7,
        pending_window_minutes: 15,
    }
    .detect(&frame, &range)
    .expect("asian sweep");
    assert!(sweep.confirmed);
    assert_eq!(sweep.direction, Direction::Buy);

    // Sequence: sweep -> structure shift -> entry ready.
    let mut machine = SequenceMachine::new();
    let config = SequenceConfig::for_instrument(AssetClass::ForexMajor, 0.0001);

    let mut s1 = snapshot_at(0, 1.08360);
    s1.asian_range = Some(range);
    s1.asian_sweep = Some(sweep);
    s1.sweep = Some(ConfirmedSweep {
        source: SweepSource::AsianRange,
        direction: Direction::Buy,
        bonus: 25.0,
    });
    assert_eq!(machine.advance("EURUSD", &s1, &config), Transition::SweepDetected);

    let mut s2 = snapshot_at(15, 1.08380);
    s2.structure.breaks.push(StructureBreak {
        index: 33,
        ts: s2.timestamp,
        break_price: 1.08420,
        swing_price: 1.08340,
        direction: Direction::Buy,
        kind: BreakKind::Choch,
        displacement: true,
    });
    assert_eq!(machine.advance("EURUSD", &s2, &config), Transition::StructureShift);

    let s3 = snapshot_at(30, 1.08360);
    assert_eq!(machine.advance("EURUSD", &s3, &config), Transition::EntryReady);
    let state = machine.state("EURUSD");
    assert_eq!(state.stage, Stage::EntryReady);

    // Scoring: the sequenced long clears as A+.
    let mut s4 = snapshot_at(45, 1.08360);
    s4.asian_range = Some(range);
    s4.asian_sweep = Some(sweep);
    s4.sweep = s1.sweep;
    let policy = SignalPolicy::for_asset(AssetClass::ForexMajor, 0.0001);
    let spec = eurusd_spec();
    let (decision, signal) = SignalEngine::new().generate(&SignalContext {
        snapshot: &s4,
        state: &state,
        policy: &policy,
        spec: &spec,
        intermarket_score: None,
    });

    let signal = signal.expect("sequenced asian sweep should trade");
    assert!(decision.taken);
    assert_eq!(signal.direction, Direction::Buy);
    assert!(signal.confidence >= 85.0, "confidence {}", signal.confidence);
    assert_eq!(signal.quality, Quality::APlus);

    // Entry at the ask just over the reclaim close.
    assert!((signal.entry_price - 1.08370).abs() < 1e-6);
    // Stop buffered under the sweep low.
    assert!(signal.stop_loss < 1.08250);
    // Target at or past the Asian high.
    assert!(signal.take_profit >= 1.08500);
    assert!(signal.risk_reward() >= 2.0 - 1e-9);
}
