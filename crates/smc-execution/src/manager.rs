use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use smc_broker::{BrokerPort, Deal, ExitReason, Position};
use smc_detect::{detect_swings, SwingKind};
use smc_risk::NewsFilter;
use smc_schemas::{AssetClass, Direction, Timeframe};
use tracing::{info, warn};

use crate::executor::OrderExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingMode {
    Fixed,
    Structure,
}

/// Position-management thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    pub break_even_enabled: bool,
    /// R multiple that arms the break-even move.
    pub break_even_trigger_rr: f64,
    /// Crypto positions arm earlier: wider stops, faster protection.
    pub crypto_break_even_trigger_rr: f64,
    pub break_even_offset_pips: f64,
    pub partial_close_enabled: bool,
    pub partial_trigger_rr: f64,
    pub partial_close_percent: f64,
    pub trailing_enabled: bool,
    pub trailing_mode: TrailingMode,
    pub trailing_trigger_rr: f64,
    pub trailing_distance_pips: f64,
    /// Buffer past the trailing swing in structure mode.
    pub structure_buffer_pips: f64,
    pub structure_swing_strength: usize,
    pub structure_timeframe: Timeframe,
    pub news_exit_enabled: bool,
    pub news_exit_minutes: i64,
    pub weekend_force_close: bool,
    /// Only positions with this magic number are managed.
    pub magic: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            break_even_enabled: true,
            break_even_trigger_rr: 1.5,
            crypto_break_even_trigger_rr: 1.0,
            break_even_offset_pips: 2.0,
            partial_close_enabled: true,
            partial_trigger_rr: 2.0,
            partial_close_percent: 50.0,
            trailing_enabled: true,
            trailing_mode: TrailingMode::Fixed,
            trailing_trigger_rr: 1.5,
            trailing_distance_pips: 15.0,
            structure_buffer_pips: 2.0,
            structure_swing_strength: 5,
            structure_timeframe: Timeframe::M15,
            news_exit_enabled: true,
            news_exit_minutes: 30,
            weekend_force_close: false,
            magic: 990_017,
        }
    }
}

/// One management action taken this pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagementEvent {
    BreakEven { ticket: u64, sl: f64 },
    PartialClose { ticket: u64, percent: f64 },
    TrailUpdate { ticket: u64, sl: f64 },
    NewsExit { ticket: u64 },
    WeekendClose { ticket: u64 },
    Closed(CloseReport),
}

/// Synthesised from broker history when a managed ticket disappears from
/// the positions list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseReport {
    pub ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub duration_minutes: i64,
    /// profit + swap + commission.
    pub net_pnl: f64,
    pub profit_pips: f64,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone, Default)]
struct ManagedState {
    initial_risk: f64,
    open_price: f64,
    open_time: Option<DateTime<Utc>>,
    direction: Option<Direction>,
    symbol: String,
    break_even_applied: bool,
    partial_close_applied: bool,
    highest_profit_pips: f64,
}

/// Monitors this engine's open positions on an independent cadence.
///
/// All SL moves are monotone in the profit direction, which makes every
/// action idempotent: a second pass under the same market state changes
/// nothing.
pub struct PositionManager {
    config: ManagerConfig,
    managed: HashMap<u64, ManagedState>,
}

impl PositionManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            managed: HashMap::new(),
        }
    }

    /// One management pass. Broker errors on individual positions are
    /// logged and skipped; the position stays under management.
    pub fn tick(
        &mut self,
        broker: &dyn BrokerPort,
        executor: &OrderExecutor,
        news: &dyn NewsFilter,
        now: DateTime<Utc>,
    ) -> Vec<ManagementEvent> {
        let mut events = Vec::new();

        let open = match broker.positions(None) {
            Ok(open) => open,
            Err(e) => {
                warn!(error = %e, "positions poll failed, skipping pass");
                return events;
            }
        };
        let ours: Vec<&Position> = open
            .iter()
            .filter(|p| p.magic == self.config.magic)
            .collect();

        // Closed-ticket detection: managed but no longer listed.
        let open_tickets: Vec<u64> = ours.iter().map(|p| p.ticket).collect();
        let vanished: Vec<u64> = self
            .managed
            .keys()
            .copied()
            .filter(|t| !open_tickets.contains(t))
            .collect();
        for ticket in vanished {
            let state = self.managed.remove(&ticket).unwrap_or_default();
            match broker.history(ticket) {
                Ok(deals) => {
                    if let Some(report) = close_report(ticket, &state, &deals) {
                        info!(ticket, pnl = report.net_pnl, reason = %report.exit_reason, "position closed");
                        events.push(ManagementEvent::Closed(report));
                    }
                }
                Err(e) => warn!(ticket, error = %e, "history fetch failed for closed ticket"),
            }
        }

        for position in ours {
            if let Some(event_batch) = self.manage_one(broker, executor, news, position, now) {
                events.extend(event_batch);
            }
        }
        events
    }

    fn manage_one(
        &mut self,
        broker: &dyn BrokerPort,
        executor: &OrderExecutor,
        news: &dyn NewsFilter,
        position: &Position,
        now: DateTime<Utc>,
    ) -> Option<Vec<ManagementEvent>> {
        let mut events = Vec::new();
        let spec = match broker.symbol_info(&position.symbol) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(symbol = %position.symbol, error = %e, "symbol info failed");
                return None;
            }
        };
        let tick = match broker.tick(&position.symbol) {
            Ok(t) => t,
            Err(e) => {
                warn!(symbol = %position.symbol, error = %e, "tick failed");
                return None;
            }
        };

        let state = self
            .managed
            .entry(position.ticket)
            .or_insert_with(|| ManagedState {
                initial_risk: (position.open_price - position.sl).abs(),
                open_price: position.open_price,
                open_time: Some(position.open_time),
                direction: Some(position.direction),
                symbol: position.symbol.clone(),
                ..ManagedState::default()
            });

        let current = match position.direction {
            Direction::Buy => tick.bid,
            Direction::Sell => tick.ask,
        };
        let profit = (current - position.open_price) * position.direction.sign();
        let profit_pips = profit / spec.pip_size;
        if profit_pips > state.highest_profit_pips {
            state.highest_profit_pips = profit_pips;
        }
        let rr = if state.initial_risk > 0.0 {
            profit / state.initial_risk
        } else {
            0.0
        };

        // Emergency exits run before protective maintenance.
        if self.config.news_exit_enabled
            && news.emergency_exit(&position.symbol, now, self.config.news_exit_minutes)
        {
            match broker.close(position.ticket) {
                Ok(()) => {
                    info!(ticket = position.ticket, "news emergency exit");
                    events.push(ManagementEvent::NewsExit {
                        ticket: position.ticket,
                    });
                    return Some(events);
                }
                Err(e) => warn!(ticket = position.ticket, error = %e, "news exit close failed"),
            }
        }

        if self.config.weekend_force_close
            && spec.asset_class != AssetClass::Crypto
            && now.weekday() == Weekday::Fri
            && now.hour() >= 20
        {
            match broker.close(position.ticket) {
                Ok(()) => {
                    info!(ticket = position.ticket, "weekend force close");
                    events.push(ManagementEvent::WeekendClose {
                        ticket: position.ticket,
                    });
                    return Some(events);
                }
                Err(e) => warn!(ticket = position.ticket, error = %e, "weekend close failed"),
            }
        }

        let mut current_sl = position.sl;

        // Break-even.
        let be_trigger = if spec.asset_class == AssetClass::Crypto {
            self.config.crypto_break_even_trigger_rr
        } else {
            self.config.break_even_trigger_rr
        };
        if self.config.break_even_enabled && !state.break_even_applied && rr >= be_trigger {
            let offset = self.config.break_even_offset_pips * spec.pip_size;
            let target = match position.direction {
                Direction::Buy => position.open_price + offset,
                Direction::Sell => position.open_price - offset,
            };
            if improves(position.direction, current_sl, target) {
                match executor.modify(broker, position.ticket, target, position.tp) {
                    Ok(()) => {
                        info!(ticket = position.ticket, sl = target, "break-even applied");
                        state.break_even_applied = true;
                        current_sl = target;
                        events.push(ManagementEvent::BreakEven {
                            ticket: position.ticket,
                            sl: target,
                        });
                    }
                    Err(e) => warn!(ticket = position.ticket, error = %e, "break-even failed"),
                }
            } else {
                // SL already at or past break-even: nothing to do, ever.
                state.break_even_applied = true;
            }
        }

        // Partial close.
        if self.config.partial_close_enabled
            && !state.partial_close_applied
            && rr >= self.config.partial_trigger_rr
        {
            match broker.partial_close(position.ticket, self.config.partial_close_percent) {
                Ok(()) => {
                    info!(
                        ticket = position.ticket,
                        percent = self.config.partial_close_percent,
                        "partial close"
                    );
                    state.partial_close_applied = true;
                    events.push(ManagementEvent::PartialClose {
                        ticket: position.ticket,
                        percent: self.config.partial_close_percent,
                    });
                }
                Err(e) => warn!(ticket = position.ticket, error = %e, "partial close failed"),
            }
        }

        // Trailing stop, monotone in the profit direction.
        if self.config.trailing_enabled && rr >= self.config.trailing_trigger_rr {
            let desired = match self.config.trailing_mode {
                TrailingMode::Fixed => {
                    let distance = self.config.trailing_distance_pips * spec.pip_size;
                    match position.direction {
                        Direction::Buy => current - distance,
                        Direction::Sell => current + distance,
                    }
                }
                TrailingMode::Structure => {
                    match self.structure_trail(broker, position, &spec, current) {
                        Some(level) => level,
                        None => return Some(events),
                    }
                }
            };
            if improves(position.direction, current_sl, desired) {
                match executor.modify(broker, position.ticket, desired, position.tp) {
                    Ok(()) => {
                        info!(ticket = position.ticket, sl = desired, "trailing stop moved");
                        events.push(ManagementEvent::TrailUpdate {
                            ticket: position.ticket,
                            sl: desired,
                        });
                    }
                    Err(e) => warn!(ticket = position.ticket, error = %e, "trailing modify failed"),
                }
            }
        }

        Some(events)
    }

    /// Most recent confirmed fractal swing on the primary timeframe,
    /// buffered, and never past the current price.
    fn structure_trail(
        &self,
        broker: &dyn BrokerPort,
        position: &Position,
        spec: &smc_schemas::InstrumentSpec,
        current: f64,
    ) -> Option<f64> {
        let frame = broker
            .ohlc(&position.symbol, self.config.structure_timeframe, 100)
            .ok()?;
        let swings = detect_swings(&frame, self.config.structure_swing_strength);
        let buffer = self.config.structure_buffer_pips * spec.pip_size;
        match position.direction {
            Direction::Buy => swings
                .iter()
                .rev()
                .find(|s| s.kind == SwingKind::Low && s.price < current)
                .map(|s| s.price - buffer),
            Direction::Sell => swings
                .iter()
                .rev()
                .find(|s| s.kind == SwingKind::High && s.price > current)
                .map(|s| s.price + buffer),
        }
    }
}

/// SL moves only ever tighten toward profit.
fn improves(direction: Direction, current_sl: f64, candidate: f64) -> bool {
    match direction {
        Direction::Buy => candidate > current_sl,
        Direction::Sell => candidate < current_sl || current_sl == 0.0,
    }
}

fn close_report(ticket: u64, state: &ManagedState, deals: &[Deal]) -> Option<CloseReport> {
    let last = deals.last()?;
    let pip = guess_pip(&state.symbol);
    let profit_pips = state
        .direction
        .map(|d| (last.price - state.open_price) * d.sign() / pip)
        .unwrap_or(0.0);
    let duration_minutes = state
        .open_time
        .map(|t| (last.time - t).num_minutes())
        .unwrap_or(0);
    Some(CloseReport {
        ticket,
        symbol: state.symbol.clone(),
        direction: state.direction.unwrap_or(Direction::Buy),
        exit_price: last.price,
        exit_time: last.time,
        duration_minutes,
        net_pnl: deals.iter().map(Deal::net_pnl).sum(),
        profit_pips,
        exit_reason: last.reason,
    })
}

/// Pip size for close reporting when the instrument is no longer
/// queryable (symbol hidden after close). Heuristic only.
fn guess_pip(symbol: &str) -> f64 {
    let s = smc_schemas::normalize_symbol(symbol);
    if s.contains("JPY") || s.contains("XAU") || s.contains("BTC") || s.contains("ETH") {
        0.01
    } else {
        0.0001
    }
}

#[cfg(test)]
mod tests;
