use super::*;
use crate::executor::{ExecutorConfig, OrderExecutor};
use chrono::TimeZone;
use smc_broker::sim::SimBroker;
use smc_broker::{FillMode, OrderRequest};
use smc_risk::{AlwaysClear, BlackoutCalendar, BlackoutWindow};
use smc_schemas::InstrumentSpec;

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
        bid: 1.08500,
        ask: 1.08510,
    }
}

fn tuesday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, 14, 0, 0).unwrap()
}

fn executor() -> OrderExecutor {
    OrderExecutor::new(ExecutorConfig {
        retry_backoff: std::time::Duration::from_millis(1),
        ..ExecutorConfig::default()
    })
}

/// Open a 0.10-lot buy at 1.08510 with a 20-pip stop.
fn open_buy(broker: &SimBroker) -> u64 {
    broker.set_clock(tuesday());
    let ack = broker
        .open_market(&OrderRequest {
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            volume: 0.10,
            sl: 1.08310,
            tp: 1.09110,
            fill_mode: FillMode::Fok,
            comment: "smc".to_string(),
            magic: 990_017,
        })
        .unwrap();
    ack.ticket
}

fn be_only_config() -> ManagerConfig {
    ManagerConfig {
        partial_close_enabled: false,
        trailing_enabled: false,
        news_exit_enabled: false,
        ..ManagerConfig::default()
    }
}

#[test]
fn break_even_applies_at_trigger_and_is_idempotent() {
    let broker = SimBroker::new();
    broker.add_instrument(eurusd());
    let ticket = open_buy(&broker);
    let mut manager = PositionManager::new(be_only_config());

    // +30 pips on a 20-pip risk: 1.5R reached.
    broker.set_quote("EURUSD", 1.08810, 1.08820);
    let events = manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    assert!(matches!(
        events.as_slice(),
        [ManagementEvent::BreakEven { sl, .. }] if (*sl - 1.08530).abs() < 1e-9
    ));
    let sl_after = broker.positions(None).unwrap()[0].sl;

    // Second pass under the same market: nothing moves.
    let events = manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    assert!(events.is_empty());
    assert_eq!(broker.positions(None).unwrap()[0].sl, sl_after);
    let _ = ticket;
}

#[test]
fn below_trigger_nothing_happens() {
    let broker = SimBroker::new();
    broker.add_instrument(eurusd());
    open_buy(&broker);
    let mut manager = PositionManager::new(be_only_config());

    // +20 pips = 1.0R, under the 1.5 trigger.
    broker.set_quote("EURUSD", 1.08710, 1.08720);
    let events = manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    assert!(events.is_empty());
}

#[test]
fn partial_close_halves_once() {
    let broker = SimBroker::new();
    broker.add_instrument(eurusd());
    let ticket = open_buy(&broker);
    let mut manager = PositionManager::new(ManagerConfig {
        break_even_enabled: false,
        trailing_enabled: false,
        news_exit_enabled: false,
        ..ManagerConfig::default()
    });

    // +40 pips = 2.0R.
    broker.set_quote("EURUSD", 1.08910, 1.08920);
    let events = manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    assert!(matches!(
        events.as_slice(),
        [ManagementEvent::PartialClose { percent, .. }] if *percent == 50.0
    ));
    assert!((broker.positions(None).unwrap()[0].volume - 0.05).abs() < 1e-9);

    // Idempotent: no second partial.
    let events = manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    assert!(events.is_empty());
    let _ = ticket;
}

#[test]
fn fixed_trailing_is_monotone() {
    let broker = SimBroker::new();
    broker.add_instrument(eurusd());
    open_buy(&broker);
    let mut manager = PositionManager::new(ManagerConfig {
        break_even_enabled: false,
        partial_close_enabled: false,
        news_exit_enabled: false,
        trailing_mode: TrailingMode::Fixed,
        ..ManagerConfig::default()
    });

    broker.set_quote("EURUSD", 1.08910, 1.08920);
    let events = manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    // Trail at bid - 15 pips.
    assert!(matches!(
        events.as_slice(),
        [ManagementEvent::TrailUpdate { sl, .. }] if (*sl - 1.08760).abs() < 1e-9
    ));

    // Pullback: the stop must not retreat.
    broker.set_quote("EURUSD", 1.08850, 1.08860);
    let events = manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    assert!(events.is_empty());
    assert!((broker.positions(None).unwrap()[0].sl - 1.08760).abs() < 1e-9);

    // New high: it advances again.
    broker.set_quote("EURUSD", 1.09010, 1.09020);
    let events = manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    assert!(matches!(
        events.as_slice(),
        [ManagementEvent::TrailUpdate { sl, .. }] if (*sl - 1.08860).abs() < 1e-9
    ));
}

#[test]
fn structure_trailing_uses_last_fractal() {
    let broker = SimBroker::new();
    broker.add_instrument(eurusd());
    open_buy(&broker);

    // M15 frame with a clear 5-bar fractal low at 1.08600.
    let base = tuesday() - chrono::Duration::hours(6);
    let mut lows = vec![1.08700; 24];
    lows[15] = 1.08600;
    let frame: Vec<smc_schemas::Candle> = lows
        .iter()
        .enumerate()
        .map(|(i, low)| smc_schemas::Candle {
            ts: base + chrono::Duration::minutes(15 * i as i64),
            open: low + 0.0015,
            high: low + 0.0030 + (i as f64 % 3.0) * 0.0001,
            low: *low,
            close: low + 0.0020,
            volume: 100.0,
        })
        .collect();
    broker.load_frame("EURUSD", Timeframe::M15, frame);

    let mut manager = PositionManager::new(ManagerConfig {
        break_even_enabled: false,
        partial_close_enabled: false,
        news_exit_enabled: false,
        trailing_mode: TrailingMode::Structure,
        ..ManagerConfig::default()
    });

    broker.set_quote("EURUSD", 1.08910, 1.08920);
    let events = manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    // Swing low 1.08600 minus the 2-pip buffer.
    assert!(matches!(
        events.as_slice(),
        [ManagementEvent::TrailUpdate { sl, .. }] if (*sl - 1.08580).abs() < 1e-9
    ));
}

#[test]
fn news_exit_closes_the_position() {
    let broker = SimBroker::new();
    broker.add_instrument(eurusd());
    let ticket = open_buy(&broker);

    let calendar = BlackoutCalendar::new(vec![BlackoutWindow {
        label: "NFP".to_string(),
        date: tuesday().date_naive(),
        start_hour: 14,
        end_hour: 15,
        currencies: vec!["USD".to_string()],
    }]);

    let mut manager = PositionManager::new(ManagerConfig::default());
    let events = manager.tick(&broker, &executor(), &calendar, tuesday());
    assert!(events
        .iter()
        .any(|e| matches!(e, ManagementEvent::NewsExit { ticket: t } if *t == ticket)));
    assert!(broker.positions(None).unwrap().is_empty());

    // Next pass reports the close.
    let events = manager.tick(&broker, &executor(), &calendar, tuesday());
    assert!(events
        .iter()
        .any(|e| matches!(e, ManagementEvent::Closed(r) if r.ticket == ticket)));
}

#[test]
fn settled_ticket_produces_close_report() {
    let broker = SimBroker::new();
    broker.add_instrument(eurusd());
    let ticket = open_buy(&broker);
    let mut manager = PositionManager::new(be_only_config());

    // Register the position, then let the broker close it at TP.
    manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    broker.set_clock(tuesday() + chrono::Duration::minutes(90));
    broker.settle(ticket, 1.09110, ExitReason::TakeProfit);

    let events = manager.tick(
        &broker,
        &executor(),
        &AlwaysClear,
        tuesday() + chrono::Duration::minutes(90),
    );
    let report = events
        .iter()
        .find_map(|e| match e {
            ManagementEvent::Closed(r) => Some(r),
            _ => None,
        })
        .expect("close report expected");
    assert_eq!(report.exit_reason, ExitReason::TakeProfit);
    assert_eq!(report.duration_minutes, 90);
    // +60 pips on 0.10 lots at $10/pip/lot.
    assert!((report.net_pnl - 60.0).abs() < 1e-6);
    assert!((report.profit_pips - 60.0).abs() < 1e-6);
}

#[test]
fn foreign_magic_positions_are_ignored() {
    let broker = SimBroker::new();
    broker.add_instrument(eurusd());
    broker
        .open_market(&OrderRequest {
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            volume: 0.10,
            sl: 1.08310,
            tp: 1.09110,
            fill_mode: FillMode::Fok,
            comment: "manual".to_string(),
            magic: 12345,
        })
        .unwrap();

    let mut manager = PositionManager::new(be_only_config());
    broker.set_quote("EURUSD", 1.08910, 1.08920);
    let events = manager.tick(&broker, &executor(), &AlwaysClear, tuesday());
    assert!(events.is_empty());
    // The foreign position's stop is untouched.
    assert!((broker.positions(None).unwrap()[0].sl - 1.08310).abs() < 1e-9);
}
