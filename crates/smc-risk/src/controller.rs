use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use smc_broker::Position;
use smc_schemas::Direction;
use tracing::{info, warn};

use crate::cooldown::CooldownLedger;
use crate::correlation::CorrelationGuard;
use crate::news::NewsFilter;
use crate::types::{RiskConfig, RiskRefusal};

/// The order the supervisor wants to place, as the gates see it.
#[derive(Debug, Clone, Copy)]
pub struct TradeRequest<'a> {
    pub symbol: &'a str,
    pub direction: Direction,
    pub entry_price: f64,
    pub volume: f64,
    pub confidence: f64,
    pub pip_size: f64,
    pub is_crypto: bool,
}

/// Risk and exposure controller.
///
/// Owns the cooldown ledger, the per-symbol consecutive-loss counters and
/// the daily trade count; everything else is recomputed per call from the
/// inputs the supervisor hands in. Gate order follows the supervisor
/// contract: kill switches first, then session gates, then per-symbol
/// guards, then news, then correlation.
pub struct RiskController {
    config: RiskConfig,
    cooldown: CooldownLedger,
    correlation: CorrelationGuard,
    consecutive_losses: HashMap<String, u32>,
    trades_today: u32,
    current_day: Option<NaiveDate>,
}

impl RiskController {
    pub fn new(
        config: RiskConfig,
        correlation: CorrelationGuard,
        ledger_path: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            cooldown: CooldownLedger::load(ledger_path)?,
            correlation,
            consecutive_losses: HashMap::new(),
            trades_today: 0,
            current_day: None,
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Evaluate every gate for a proposed order. `Ok(())` clears the trade
    /// for sizing and execution.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &mut self,
        request: &TradeRequest<'_>,
        now: DateTime<Utc>,
        balance: f64,
        today_realized_pnl: f64,
        open_positions: &[Position],
        news: &dyn NewsFilter,
        news_horizon_minutes: i64,
    ) -> Result<(), RiskRefusal> {
        self.roll_day(now.date_naive());

        // 1. Daily loss kill switch. At exactly the cap the switch fires.
        if balance > 0.0 {
            let loss_percent = -today_realized_pnl / balance * 100.0;
            if today_realized_pnl < 0.0 && loss_percent >= self.config.max_daily_loss_percent {
                warn!(loss_percent, "daily loss kill switch engaged");
                return Err(RiskRefusal::DailyLossHalt { loss_percent });
            }
        }

        // 2. Consecutive-loss kill switch, per symbol, until next day.
        let losses = self
            .consecutive_losses
            .get(request.symbol)
            .copied()
            .unwrap_or(0);
        if losses >= self.config.max_consecutive_losses {
            return Err(RiskRefusal::ConsecutiveLossHalt {
                symbol: request.symbol.to_string(),
                losses,
            });
        }

        // 3. Weekend / session gates.
        if self.config.weekend_gate && !request.is_crypto && !in_tradable_window(now) {
            return Err(RiskRefusal::WeekendGate);
        }
        if self.config.lunch_break_filter && now.hour() == 12 {
            return Err(RiskRefusal::LunchBreak);
        }

        // 4. Per-symbol cooldown.
        if let Some(remaining) = self.cooldown.remaining(
            request.symbol,
            now.timestamp(),
            self.config.cooldown_same_symbol_seconds,
        ) {
            return Err(RiskRefusal::Cooldown {
                remaining_seconds: remaining,
            });
        }

        // 5. Duplicate and stacking guards against open positions.
        let same_symbol: Vec<&Position> = open_positions
            .iter()
            .filter(|p| p.symbol == request.symbol)
            .collect();
        for p in &same_symbol {
            let distance_pips = (p.open_price - request.entry_price).abs() / request.pip_size;
            if p.direction == request.direction
                && distance_pips <= self.config.duplicate_distance_pips
            {
                return Err(RiskRefusal::DuplicatePosition { ticket: p.ticket });
            }
            if distance_pips < self.config.min_stacking_distance_pips {
                return Err(RiskRefusal::Stacking {
                    reason: format!(
                        "position {} only {distance_pips:.1} pips away",
                        p.ticket
                    ),
                });
            }
            let age = now - p.open_time;
            if age.num_seconds() < self.config.min_stacking_time_seconds {
                return Err(RiskRefusal::Stacking {
                    reason: format!(
                        "position {} only {}s old",
                        p.ticket,
                        age.num_seconds()
                    ),
                });
            }
        }

        // 6. News blackout.
        let verdict = news.allowed(request.symbol, now, news_horizon_minutes);
        if !verdict.allowed {
            return Err(RiskRefusal::NewsBlackout {
                reason: verdict.reason,
            });
        }

        // 7. Correlation and exposure.
        if let Err(reasons) = self.correlation.can_open_trade(
            open_positions,
            request.symbol,
            request.direction,
            request.volume,
            request.confidence,
        ) {
            return Err(RiskRefusal::Correlation { reasons });
        }

        // 8. Volume caps.
        if self.trades_today >= self.config.max_trades_per_day {
            return Err(RiskRefusal::MaxTradesPerDay {
                count: self.trades_today,
            });
        }
        if open_positions.len() as u32 >= self.config.max_open_trades {
            return Err(RiskRefusal::MaxOpenTrades {
                count: open_positions.len() as u32,
            });
        }

        Ok(())
    }

    /// Record a filled order: stamps the cooldown ledger and the daily
    /// trade count.
    pub fn record_order(&mut self, symbol: &str, now: DateTime<Utc>) {
        self.roll_day(now.date_naive());
        self.cooldown.record(symbol, now.timestamp());
        self.trades_today += 1;
        info!(symbol, trades_today = self.trades_today, "order recorded");
    }

    /// Record a closed trade's result for the consecutive-loss switch.
    pub fn record_close(&mut self, symbol: &str, net_pnl: f64) {
        let counter = self.consecutive_losses.entry(symbol.to_string()).or_insert(0);
        if net_pnl < 0.0 {
            *counter += 1;
            if *counter >= self.config.max_consecutive_losses {
                warn!(symbol, losses = *counter, "symbol benched for the day");
            }
        } else {
            *counter = 0;
        }
    }

    fn roll_day(&mut self, today: NaiveDate) {
        if self.current_day != Some(today) {
            self.current_day = Some(today);
            self.trades_today = 0;
            self.consecutive_losses.clear();
        }
    }
}

/// Forex tradable window: Monday 00:00 through Friday 21:00 UTC.
fn in_tradable_window(now: DateTime<Utc>) -> bool {
    match now.weekday() {
        Weekday::Sat | Weekday::Sun => false,
        Weekday::Fri => now.hour() < 21,
        _ => true,
    }
}
