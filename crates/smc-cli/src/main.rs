//! `smc` — single entry point for the engine.
//!
//! Exit codes: 0 normal stop, 1 fatal configuration or safety violation,
//! 2 kill-switch triggered.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use uuid::Uuid;

use smc_broker::{sim::SimBroker, BrokerPort};
use smc_config::{load_layered_yaml, Mode, SafetyGuard, Settings};
use smc_daemon::profile::{resolve_manager_config, resolve_symbol_profile};
use smc_daemon::state::{AppState, StatusSnapshot};
use smc_daemon::supervisor::Supervisor;
use smc_daemon::routes;
use smc_execution::{ExecutorConfig, OrderExecutor, PositionManager};
use smc_journal::Journal;
use smc_risk::{BlackoutCalendar, CorrelationGuard, RiskConfig, RiskController};

const EXIT_FATAL: i32 = 1;
const EXIT_KILL_SWITCH: i32 = 2;

#[derive(Parser)]
#[command(name = "smc")]
#[command(about = "SMC trading engine", long_about = None)]
struct Cli {
    /// Configuration layers in merge order (base -> overrides).
    #[arg(
        long = "config",
        global = true,
        default_values_t = vec![
            "config/base.yaml".to_string(),
            "config/asset_profiles.yaml".to_string(),
        ]
    )]
    config: Vec<String>,

    /// Mode override (live | paper | backtest | visual).
    #[arg(long, global = true)]
    mode: Option<String>,

    /// Restrict the run to one symbol.
    #[arg(long, global = true)]
    symbol: Option<String>,

    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine (default).
    Run,
    /// Load, merge and validate the configuration, then exit.
    CheckConfig,
    /// Print the canonical layered-config hash.
    ConfigHash,
}

fn main() {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("fatal: {e:#}");
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

fn dispatch(cli: Cli) -> Result<i32> {
    let paths: Vec<&str> = cli.config.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&paths)?;
    let mut settings = loaded.settings.clone();

    if let Some(mode) = &cli.mode {
        settings.general.mode = match mode.as_str() {
            "live" => Mode::Live,
            "paper" => Mode::Paper,
            "backtest" => Mode::Backtest,
            "visual" => Mode::Visual,
            other => bail!("unknown mode {other:?}"),
        };
    }
    if let Some(symbol) = &cli.symbol {
        settings.symbols.retain(|s| s.name == *symbol);
        if settings.symbols.is_empty() {
            bail!("symbol {symbol:?} is not configured");
        }
    }

    match cli.cmd.unwrap_or(Commands::Run) {
        Commands::CheckConfig => {
            settings.validate()?;
            println!("config_ok=true mode={}", settings.general.mode);
            println!("config_hash={}", loaded.config_hash);
            Ok(0)
        }
        Commands::ConfigHash => {
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(0)
        }
        Commands::Run => run(settings, &loaded.config_hash),
    }
}

fn run(settings: Settings, config_hash: &str) -> Result<i32> {
    let run_id = Uuid::new_v4();
    info!(%run_id, config_hash, mode = %settings.general.mode, "engine starting");

    let broker: Arc<dyn BrokerPort> = match settings.general.mode {
        Mode::Live => {
            // The MT5 bridge is an external adapter; this build only
            // links the deterministic sim.
            bail!("live mode requires an external broker adapter; none is linked in this build");
        }
        _ => Arc::new(seed_sim_broker(&settings)),
    };

    let account = broker
        .account_info()
        .context("broker account info at startup")?;
    let live_confirmed = std::env::var("CONFIRM_LIVE_MODE").as_deref() == Ok("true");
    SafetyGuard::default()
        .check(&settings, &account, live_confirmed)
        .map_err(|v| anyhow::anyhow!("safety violation: {v}"))?;

    // Resolve per-symbol profiles from broker metadata.
    let mut profiles = Vec::new();
    for symbol in settings.symbols.iter().filter(|s| s.enabled) {
        let spec = broker
            .symbol_info(&symbol.name)
            .with_context(|| format!("symbol {} not known to broker", symbol.name))?;
        profiles.push(resolve_symbol_profile(&settings, symbol, &spec)?);
    }
    if profiles.is_empty() {
        bail!("no enabled symbols configured");
    }

    let state_dir = PathBuf::from(&settings.general.state_dir);
    let risk = RiskController::new(
        RiskConfig {
            risk_per_trade_percent: settings.risk.risk_per_trade,
            use_fixed_lot: settings.risk.use_fixed_lot,
            fixed_lot_size: settings.risk.fixed_lot_size,
            max_daily_loss_percent: settings.risk.max_daily_loss,
            max_consecutive_losses: settings.risk.max_consecutive_losses,
            max_trades_per_day: settings.risk.max_trades_per_day,
            max_open_trades: settings.risk.max_open_trades,
            cooldown_same_symbol_seconds: settings.risk.cooldown_same_symbol_seconds,
            min_stacking_time_seconds: settings.risk.min_stacking_time_seconds,
            min_stacking_distance_pips: settings.risk.min_stacking_distance_pips,
            duplicate_distance_pips: 5.0,
            lunch_break_filter: settings.risk.lunch_break_filter,
            weekend_gate: true,
            friday_force_close: settings.management.weekend_force_close,
        },
        CorrelationGuard {
            max_exposure_per_currency: settings.risk.correlation_guard.max_exposure_per_currency,
            max_positions_per_group: settings.risk.correlation_guard.max_positions_per_group,
            ..CorrelationGuard::default()
        },
        state_dir.join("last_trades.json"),
    )?;

    let executor = OrderExecutor::new(ExecutorConfig {
        magic: settings.general.magic,
        ..ExecutorConfig::default()
    });
    let manager = PositionManager::new(resolve_manager_config(&settings, settings.general.magic));
    let journal = Journal::open(
        PathBuf::from(&settings.journal.dir),
        run_id,
        settings.journal.hash_chain,
    )?;

    let app = Arc::new(AppState::new(StatusSnapshot::idle(
        run_id,
        settings.general.mode.to_string(),
        profiles.iter().map(|p| p.name.clone()).collect(),
    )));

    let blackouts = settings
        .filters
        .news
        .manual_blackouts
        .iter()
        .filter_map(|b| {
            let date = chrono::NaiveDate::parse_from_str(&b.date, "%Y-%m-%d").ok()?;
            Some(smc_risk::BlackoutWindow {
                label: b.label.clone(),
                date,
                start_hour: b.start_hour,
                end_hour: b.end_hour,
                currencies: b.currencies.clone(),
            })
        })
        .collect();
    let news: Arc<dyn smc_risk::NewsFilter> = Arc::new(BlackoutCalendar::new(blackouts));
    let supervisor = Supervisor::new(
        Arc::clone(&broker),
        profiles,
        risk,
        executor,
        manager,
        journal,
        news,
        settings.filters.news.pause_before_minutes,
        Arc::clone(&app),
    );

    let cadence = Duration::from_secs(settings.general.cycle_seconds.max(1));
    let operator_shutdown = Arc::new(AtomicBool::new(false));

    // HTTP surface + ctrl-c on the async runtime; the supervisor loop on
    // its own thread (broker calls are blocking).
    let runtime = tokio::runtime::Runtime::new().context("tokio runtime")?;
    let app_for_http = Arc::clone(&app);
    let app_for_signal = Arc::clone(&app);
    let shutdown_for_signal = Arc::clone(&operator_shutdown);

    runtime.spawn(async move {
        let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8787)));
        let router = routes::build_router(app_for_http);
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                info!("control surface on http://{addr}");
                if let Err(e) = axum::serve(listener, router).await {
                    error!("control surface crashed: {e}");
                }
            }
            Err(e) => error!("control surface bind failed: {e}"),
        }
    });
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, stopping");
            shutdown_for_signal.store(true, Ordering::SeqCst);
            app_for_signal.request_halt();
        }
    });

    supervisor.run_blocking(cadence);

    // Halted by the operator's ctrl-c is a normal stop; anything else
    // that tripped the flag is the kill switch.
    if operator_shutdown.load(Ordering::SeqCst) {
        info!("normal stop");
        Ok(0)
    } else {
        info!("kill switch stop");
        Ok(EXIT_KILL_SWITCH)
    }
}

/// Seed the deterministic sim broker for paper/backtest runs: contract
/// metadata for the configured symbols and a paper account. Market data
/// arrives from whatever replay source the operator wires in; without
/// one, cycles skip on `DataUnavailable` and say so.
fn seed_sim_broker(settings: &Settings) -> SimBroker {
    use smc_schemas::{AccountInfo, AssetClass, InstrumentSpec};

    let sim = SimBroker::new();
    sim.set_account(AccountInfo {
        login: 1,
        balance: 10_000.0,
        equity: 10_000.0,
        free_margin: 10_000.0,
        leverage: 100,
        trade_allowed: true,
        trade_algo_allowed: true,
        currency: "USD".to_string(),
    });
    for symbol in settings.symbols.iter().filter(|s| s.enabled) {
        let class = AssetClass::classify(&symbol.name);
        let (pip_size, point, digits, pip_value, stops_level) = match class {
            AssetClass::ForexMajor => (0.0001, 0.00001, 5, 10.0, 30.0),
            AssetClass::Commodity => (0.01, 0.01, 2, 1.0, 30.0),
            AssetClass::Crypto => (0.01, 0.01, 2, 1.0, 0.0),
            AssetClass::Indices => (0.1, 0.1, 1, 1.0, 0.0),
        };
        sim.add_instrument(InstrumentSpec {
            name: symbol.name.clone(),
            asset_class: class,
            pip_size,
            point,
            digits,
            contract_size: 100_000.0,
            pip_value_per_lot: pip_value,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
            stops_level_points: stops_level,
            bid: 0.0,
            ask: 0.0,
        });
    }
    sim
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("SMC_DAEMON_ADDR").ok()?.parse().ok()
}
