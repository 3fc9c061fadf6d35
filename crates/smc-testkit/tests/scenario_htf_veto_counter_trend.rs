//! HTF-conflict veto without exception: the -30 malus lands, and when the
//! trade survives on other confluence the lot is halved — never more than
//! 0.5 of base risk gets through a vetoed conflict.

use smc_analysis::{ConfirmedSweep, SweepSource};
use smc_detect::{AdxRegime, AdxSnapshot, ObStatus, OrderBlock, SwingKind, SwingPoint, ZoneKind};
use smc_schemas::{AssetClass, Direction, Trend};
use smc_sequence::SequenceState;
use smc_signal::{SignalContext, SignalEngine, SignalPolicy};
use smc_testkit::{eurusd_spec, neutral_snapshot};

fn counter_trend_buy_snapshot() -> smc_analysis::MarketSnapshot {
    let mut snap = neutral_snapshot("EURUSD", 1.08500, 0.0001);
    snap.bias = Some(Direction::Buy);
    snap.ltf_trend = Trend::Bullish;
    snap.mtf_bias = Some(Direction::Buy);
    snap.mtf_trend = Trend::Bullish;
    // The high timeframe says down, with a real trend behind it.
    snap.htf_trend = Trend::Bearish;
    snap.htf_bias = Some(Direction::Sell);
    snap.htf_adx = Some(AdxSnapshot {
        adx: 32.0,
        plus_di: 15.0,
        minus_di: 30.0,
        regime: AdxRegime::Strong,
    });
    snap.rsi = Some(45.0);
    snap.recent_displacement = true;
    if let Some(zone) = &mut snap.pd_zone {
        zone.current = ZoneKind::Discount;
        zone.percentage = 20.0;
    }
    snap.sweep = Some(ConfirmedSweep {
        source: SweepSource::AsianRange,
        direction: Direction::Buy,
        bonus: 25.0,
    });
    snap.order_blocks.bullish.push(OrderBlock {
        direction: Direction::Buy,
        status: ObStatus::Fresh,
        index: 30,
        high: 1.08600,
        low: 1.08400,
        open: 1.08580,
        close: 1.08420,
        impulse_strength: 2.0,
        tests_count: 0,
        volume: 100.0,
    });
    snap.structure.swings = vec![
        SwingPoint {
            index: 20,
            price: 1.08300,
            kind: SwingKind::Low,
            strength: 5,
        },
        SwingPoint {
            index: 25,
            price: 1.09200,
            kind: SwingKind::High,
            strength: 5,
        },
    ];
    snap
}

#[test]
fn unresolved_htf_conflict_halves_the_lot() {
    let snap = counter_trend_buy_snapshot();
    let policy = SignalPolicy::for_asset(AssetClass::ForexMajor, 0.0001);
    let spec = eurusd_spec();
    let (decision, signal) = SignalEngine::new().generate(&SignalContext {
        snapshot: &snap,
        state: &SequenceState::default(),
        policy: &policy,
        spec: &spec,
        intermarket_score: None,
    });

    // The malus is on the books.
    assert!(decision
        .components
        .iter()
        .any(|(name, pts)| name == "HTF Conflict (VETO)" && *pts == -30.0));

    // Property: veto with no exception means rejected OR lot <= 0.5.
    match signal {
        Some(signal) => {
            assert!(
                signal.lot_multiplier <= 0.5,
                "vetoed conflict leaked lot {}",
                signal.lot_multiplier
            );
        }
        None => assert!(decision.rejection.is_some()),
    }
}

#[test]
fn smt_exception_downgrades_instead_of_vetoing() {
    let mut snap = counter_trend_buy_snapshot();
    snap.smt.signal = Some(Direction::Buy);

    let policy = SignalPolicy::for_asset(AssetClass::ForexMajor, 0.0001);
    let spec = eurusd_spec();
    let (decision, signal) = SignalEngine::new().generate(&SignalContext {
        snapshot: &snap,
        state: &SequenceState::default(),
        policy: &policy,
        spec: &spec,
        intermarket_score: None,
    });

    assert!(decision
        .components
        .iter()
        .any(|(name, _)| name.contains("SMT exception")));
    let signal = signal.expect("SMT exception keeps the trade");
    assert!((signal.lot_multiplier - 0.7).abs() < 1e-9);
}
