//! The per-cycle orchestration: analyzer -> state machine -> scoring ->
//! risk gates -> sizing -> execution -> journal, plus the independent
//! position-manager pass. One supervisor iterates the configured symbols
//! serially; per-symbol state (sequence stages, cooldowns) is owned here
//! and never shared.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use smc_analysis::{Analyzer, FrameBundle, MarketSnapshot};
use smc_broker::BrokerPort;
use smc_execution::{ManagementEvent, OrderExecutor, OrderSpec, PositionManager};
use smc_journal::{CycleOutcome, DecisionRecord, Journal, TradeCloseRecord, TradeOpenRecord};
use smc_risk::{size_position, NewsFilter, RiskController, TradeRequest};
use smc_sequence::SequenceMachine;
use smc_signal::{Signal, SignalContext, SignalEngine, TradeDecision};

use crate::profile::SymbolProfile;
use crate::state::AppState;

const LTF_BARS: usize = 300;
const MTF_BARS: usize = 200;
const HTF_BARS: usize = 150;

pub struct Supervisor {
    broker: Arc<dyn BrokerPort>,
    profiles: Vec<SymbolProfile>,
    analyzer: Analyzer,
    sequences: SequenceMachine,
    engine: SignalEngine,
    risk: RiskController,
    executor: OrderExecutor,
    manager: PositionManager,
    journal: Journal,
    news: Arc<dyn NewsFilter>,
    news_horizon_minutes: i64,
    app: Arc<AppState>,
    daily_pnl: f64,
    pnl_day: Option<NaiveDate>,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: Arc<dyn BrokerPort>,
        profiles: Vec<SymbolProfile>,
        risk: RiskController,
        executor: OrderExecutor,
        manager: PositionManager,
        journal: Journal,
        news: Arc<dyn NewsFilter>,
        news_horizon_minutes: i64,
        app: Arc<AppState>,
    ) -> Self {
        Self {
            broker,
            profiles,
            analyzer: Analyzer::new(),
            sequences: SequenceMachine::new(),
            engine: SignalEngine::new(),
            risk,
            executor,
            manager,
            journal,
            news,
            news_horizon_minutes,
            app,
            daily_pnl: 0.0,
            pnl_day: None,
        }
    }

    /// Serial loop at the configured cadence until the halt flag trips.
    /// Blocking by design: broker I/O is the only suspension point and the
    /// caller runs this on a dedicated thread.
    pub fn run_blocking(mut self, cadence: Duration) {
        if let Ok(mut status) = self.app.status.write() {
            status.state = "running".to_string();
        }
        loop {
            if self.app.is_halted() {
                info!("halt flag set, supervisor stopping");
                break;
            }
            let now = Utc::now();
            for i in 0..self.profiles.len() {
                if self.app.is_halted() {
                    break;
                }
                if let Err(e) = self.run_cycle(i, now) {
                    warn!(symbol = %self.profiles[i].name, error = %e, "cycle skipped");
                }
            }
            self.manager_pass(Utc::now());
            std::thread::sleep(cadence);
        }
        if let Ok(mut status) = self.app.status.write() {
            status.state = "halted".to_string();
        }
    }

    /// One analysis-to-order cycle for one symbol.
    pub fn run_cycle(&mut self, profile_index: usize, now: DateTime<Utc>) -> Result<()> {
        self.roll_pnl_day(now.date_naive());
        let profile = self.profiles[profile_index].clone();
        let symbol = profile.name.as_str();

        let spec = self
            .broker
            .symbol_info(symbol)
            .with_context(|| format!("symbol info {symbol}"))?;
        let tick = self.broker.tick(symbol).context("tick")?;

        let (ltf_tf, mtf_tf, htf_tf) = profile.timeframes;
        let frames = FrameBundle {
            ltf: self.broker.ohlc(symbol, ltf_tf, LTF_BARS).context("ltf frame")?,
            mtf: self.broker.ohlc(symbol, mtf_tf, MTF_BARS).context("mtf frame")?,
            htf: self.broker.ohlc(symbol, htf_tf, HTF_BARS).context("htf frame")?,
            smt: match &profile.smt_correlated {
                Some(pair) => match self.broker.ohlc(pair, ltf_tf, LTF_BARS) {
                    Ok(frame) => Some(frame),
                    Err(e) => {
                        // SMT is confluence, not a prerequisite.
                        warn!(symbol, pair, error = %e, "SMT frame unavailable");
                        None
                    }
                },
            None => None,
            },
        };

        let snapshot = self
            .analyzer
            .analyze(symbol, &profile.analyzer, &frames, tick, now);
        self.sequences.advance(symbol, &snapshot, &profile.sequence);
        let state = self.sequences.state(symbol);

        let (decision, signal) = self.engine.generate(&SignalContext {
            snapshot: &snapshot,
            state: &state,
            policy: &profile.policy,
            spec: &spec,
            intermarket_score: None,
        });

        let mut outcome = if signal.is_some() {
            CycleOutcome::Taken
        } else if decision.rejection.is_some() {
            CycleOutcome::Rejected
        } else {
            CycleOutcome::None
        };
        let mut rejection_reason = decision.rejection.as_ref().map(|r| r.to_string());

        if let Some(signal) = signal {
            match self.try_execute(&profile, &spec, &snapshot, &signal, now) {
                Ok(()) => {
                    if let Ok(mut status) = self.app.status.write() {
                        status.signals_taken += 1;
                    }
                }
                Err(reason) => {
                    outcome = CycleOutcome::Rejected;
                    rejection_reason = Some(reason);
                }
            }
        }

        self.journal
            .record_decision(&decision_record(&decision, &snapshot, outcome, rejection_reason))
            .context("journal decision")?;

        if let Ok(mut status) = self.app.status.write() {
            status.cycles_completed += 1;
            status.last_cycle_at = Some(now);
            status.daily_realized_pnl = self.daily_pnl;
        }
        Ok(())
    }

    /// Risk gate -> sizing -> execution. Returns the refusal string when
    /// anything between the signal and the fill said no.
    fn try_execute(
        &mut self,
        profile: &SymbolProfile,
        spec: &smc_schemas::InstrumentSpec,
        snapshot: &MarketSnapshot,
        signal: &Signal,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), String> {
        let symbol = profile.name.as_str();
        let account = self
            .broker
            .account_info()
            .map_err(|e| format!("account info: {e}"))?;

        let volume = if self.risk.config().use_fixed_lot {
            let fixed = self.risk.config().fixed_lot_size;
            fixed.clamp(spec.volume_min, spec.volume_max)
        } else {
            size_position(
                account.balance,
                profile.risk_per_trade,
                signal.entry_price,
                signal.stop_loss,
                signal.lot_multiplier,
                profile.max_lot,
                spec,
            )
            .map_err(|e| format!("sizing: {e}"))?
        };

        let open_positions = self
            .broker
            .positions(None)
            .map_err(|e| format!("positions: {e}"))?;

        let request = TradeRequest {
            symbol,
            direction: signal.direction,
            entry_price: signal.entry_price,
            volume,
            confidence: signal.confidence,
            pip_size: spec.pip_size,
            is_crypto: profile.asset_class == smc_schemas::AssetClass::Crypto,
        };
        self.risk
            .evaluate(
                &request,
                now,
                account.balance,
                self.daily_pnl,
                &open_positions,
                self.news.as_ref(),
                self.news_horizon_minutes,
            )
            .map_err(|refusal| refusal.to_string())?;

        let placed = self
            .executor
            .place(
                self.broker.as_ref(),
                spec,
                &OrderSpec {
                    symbol: symbol.to_string(),
                    direction: signal.direction,
                    volume,
                    sl: signal.stop_loss,
                    tp: signal.take_profit,
                    signal_entry: signal.entry_price,
                    comment: format!("smc {}", signal.quality),
                },
            )
            .map_err(|e| format!("order: {e}"))?;

        self.risk.record_order(symbol, now);
        let record = open_record(signal, snapshot, spec, placed.ticket, placed.fill_price, volume);
        if let Err(e) = self.journal.record_open(&record) {
            warn!(symbol, error = %e, "journal open record failed");
        }
        info!(
            symbol,
            ticket = placed.ticket,
            fill = placed.fill_price,
            slippage = placed.slippage_pips,
            "position opened"
        );
        Ok(())
    }

    /// Independent position-manager pass; feeds closes back into the
    /// risk controller and the journal.
    pub fn manager_pass(&mut self, now: DateTime<Utc>) {
        let events =
            self.manager
                .tick(self.broker.as_ref(), &self.executor, self.news.as_ref(), now);
        for event in events {
            if let ManagementEvent::Closed(report) = event {
                self.daily_pnl += report.net_pnl;
                self.risk.record_close(&report.symbol, report.net_pnl);
                let balance = self
                    .broker
                    .account_info()
                    .map(|a| a.balance)
                    .unwrap_or(0.0);
                let record = TradeCloseRecord {
                    ticket: report.ticket,
                    symbol: report.symbol.clone(),
                    exit_price: report.exit_price,
                    exit_time: report.exit_time,
                    duration_minutes: report.duration_minutes,
                    profit_usd: report.net_pnl,
                    profit_pips: report.profit_pips,
                    profit_percent: if balance > 0.0 {
                        report.net_pnl / balance * 100.0
                    } else {
                        0.0
                    },
                    exit_reason: report.exit_reason.to_string(),
                };
                if let Err(e) = self.journal.record_close(&record) {
                    warn!(ticket = report.ticket, error = %e, "journal close record failed");
                }
            }
        }
        if let Ok(mut status) = self.app.status.write() {
            status.daily_realized_pnl = self.daily_pnl;
        }
    }

    fn roll_pnl_day(&mut self, today: NaiveDate) {
        if self.pnl_day != Some(today) {
            self.pnl_day = Some(today);
            self.daily_pnl = 0.0;
        }
    }
}

fn decision_record(
    decision: &TradeDecision,
    snapshot: &MarketSnapshot,
    outcome: CycleOutcome,
    rejection_reason: Option<String>,
) -> DecisionRecord {
    DecisionRecord {
        timestamp: decision.timestamp,
        symbol: decision.symbol.clone(),
        outcome,
        direction: decision.direction.map(|d| d.to_string()),
        score: decision.score,
        rejection_reason,
        rsi: snapshot.rsi,
        pd_zone: snapshot.pd_zone.map(|z| format!("{:?}", z.current)),
        htf_trend: snapshot.htf_trend.to_string(),
        ltf_trend: snapshot.ltf_trend.to_string(),
        sweep_detected: snapshot.sweep.is_some(),
        smt_signal: snapshot.smt.signal.map(|d| d.to_string()),
        session: snapshot.killzone.session.to_string(),
        confluences: decision
            .components
            .iter()
            .map(|(name, pts)| format!("{name}: {pts:.0}"))
            .collect(),
    }
}

fn open_record(
    signal: &Signal,
    snapshot: &MarketSnapshot,
    spec: &smc_schemas::InstrumentSpec,
    ticket: u64,
    fill_price: f64,
    volume: f64,
) -> TradeOpenRecord {
    TradeOpenRecord {
        timestamp: snapshot.timestamp,
        ticket,
        symbol: snapshot.symbol.clone(),
        direction: signal.direction.to_string(),
        entry: fill_price,
        sl: signal.stop_loss,
        tp: signal.take_profit,
        lots: volume,
        risk_usd: spec.pips((fill_price - signal.stop_loss).abs())
            * spec.pip_value_per_lot
            * volume,
        rr: signal.risk_reward(),
        rsi: snapshot.rsi,
        pd_zone: snapshot.pd_zone.map(|z| format!("{:?}", z.current)),
        pd_percent: snapshot.pd_zone.map(|z| z.percentage),
        htf_trend: snapshot.htf_trend.to_string(),
        ltf_trend: snapshot.ltf_trend.to_string(),
        mtf_bias: snapshot.mtf_bias.map(|d| d.to_string()),
        setup_type: snapshot
            .sweep
            .map(|s| s.source.to_string())
            .unwrap_or_else(|| "sequence".to_string()),
        confluences: signal.reasons.clone(),
        confidence: signal.confidence,
        session: snapshot.killzone.session.to_string(),
        is_killzone: snapshot.killzone.is_killzone,
    }
}
