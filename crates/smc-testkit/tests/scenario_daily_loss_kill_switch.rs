//! Daily-loss kill switch: once today's realised loss crosses the cap,
//! every new trade is refused — while the position manager keeps managing
//! what is already open.

use chrono::{TimeZone, Utc};
use smc_broker::sim::SimBroker;
use smc_broker::{BrokerPort, FillMode, OrderRequest};
use smc_execution::{ExecutorConfig, ManagementEvent, ManagerConfig, OrderExecutor, PositionManager};
use smc_risk::{AlwaysClear, CorrelationGuard, RiskConfig, RiskController, RiskRefusal, TradeRequest};
use smc_schemas::Direction;
use smc_testkit::eurusd_spec;

fn tuesday() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, 14, 0, 0).unwrap()
}

#[test]
fn kill_switch_halts_new_trades_but_not_management() {
    let dir = tempfile::tempdir().unwrap();
    let mut risk = RiskController::new(
        RiskConfig::default(),
        CorrelationGuard::default(),
        dir.path().join("last_trades.json"),
    )
    .unwrap();

    // Today's realised P&L is -2.1% of a 10k balance; the cap is 2.0%.
    let request = TradeRequest {
        symbol: "EURUSD",
        direction: Direction::Buy,
        entry_price: 1.08500,
        volume: 0.10,
        confidence: 95.0,
        pip_size: 0.0001,
        is_crypto: false,
    };
    let refusal = risk
        .evaluate(&request, tuesday(), 10_000.0, -210.0, &[], &AlwaysClear, 30)
        .unwrap_err();
    assert!(matches!(refusal, RiskRefusal::DailyLossHalt { .. }));

    // An open position is still managed: break-even fires as usual.
    let broker = SimBroker::new();
    broker.add_instrument(eurusd_spec());
    broker.set_clock(tuesday());
    broker
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
    broker.set_quote("EURUSD", 1.08810, 1.08820); // +1.5R

    let executor = OrderExecutor::new(ExecutorConfig {
        retry_backoff: std::time::Duration::from_millis(1),
        ..ExecutorConfig::default()
    });
    let mut manager = PositionManager::new(ManagerConfig {
        partial_close_enabled: false,
        trailing_enabled: false,
        news_exit_enabled: false,
        ..ManagerConfig::default()
    });
    let events = manager.tick(&broker, &executor, &AlwaysClear, tuesday());
    assert!(events
        .iter()
        .any(|e| matches!(e, ManagementEvent::BreakEven { .. })));
}

#[test]
fn loss_just_under_the_cap_still_trades() {
    let dir = tempfile::tempdir().unwrap();
    let mut risk = RiskController::new(
        RiskConfig::default(),
        CorrelationGuard::default(),
        dir.path().join("last_trades.json"),
    )
    .unwrap();

    let request = TradeRequest {
        symbol: "EURUSD",
        direction: Direction::Buy,
        entry_price: 1.08500,
        volume: 0.10,
        confidence: 95.0,
        pip_size: 0.0001,
        is_crypto: false,
    };
    assert!(risk
        .evaluate(&request, tuesday(), 10_000.0, -199.0, &[], &AlwaysClear, 30)
        .is_ok());
}
