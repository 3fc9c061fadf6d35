//! Deterministic in-memory broker adapter.
//!
//! Design decisions (kept intentionally simple and deterministic):
//! - Tickets are sequential integers starting at 1.
//! - Market orders fill at the instrument's current ask (buy) / bid (sell)
//!   unless a scripted failure is queued for the call.
//! - No randomness, no background fills. Tests drive every state change
//!   explicitly: load frames, set quotes, open/close, settle.
//! - Scripted failures let scenario tests exercise the executor's retry
//!   and fallback paths: each queued error is consumed by exactly one call.
//!
//! This adapter backs paper mode and the scenario tests. It is not a
//! market simulator — it never decides that an SL or TP was hit; tests
//! settle positions with [`SimBroker::settle`] and the reason they choose.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use smc_schemas::{AccountInfo, Candle, InstrumentSpec, Tick, Timeframe};

use crate::{
    BrokerError, BrokerPort, Deal, ExitReason, FillMode, OrderAck, OrderRequest, Position,
};

/// Which port call a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SimOp {
    Ohlc,
    Tick,
    OpenMarket,
    ModifySltp,
    Close,
    PartialClose,
    Positions,
}

#[derive(Debug, Default)]
struct SimState {
    frames: BTreeMap<(String, &'static str), Vec<Candle>>,
    instruments: BTreeMap<String, InstrumentSpec>,
    account: Option<AccountInfo>,
    positions: BTreeMap<u64, Position>,
    deals: Vec<Deal>,
    next_ticket: u64,
    rejected_fill_modes: Vec<FillMode>,
    scripted: BTreeMap<SimOp, VecDeque<BrokerError>>,
    clock: Option<DateTime<Utc>>,
}

/// In-memory [`BrokerPort`] implementation.
pub struct SimBroker {
    state: Mutex<SimState>,
}

impl Default for SimBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                next_ticket: 1,
                ..SimState::default()
            }),
        }
    }

    /// Register an instrument (required before any call touching the symbol).
    pub fn add_instrument(&self, spec: InstrumentSpec) {
        let mut st = self.state.lock().unwrap();
        st.instruments.insert(spec.name.clone(), spec);
    }

    /// Replace the candle frame for (symbol, timeframe).
    pub fn load_frame(&self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) {
        let mut st = self.state.lock().unwrap();
        st.frames
            .insert((symbol.to_string(), timeframe.label()), candles);
    }

    /// Update the instrument's quote.
    pub fn set_quote(&self, symbol: &str, bid: f64, ask: f64) {
        let mut st = self.state.lock().unwrap();
        if let Some(spec) = st.instruments.get_mut(symbol) {
            spec.bid = bid;
            spec.ask = ask;
        }
    }

    pub fn set_account(&self, account: AccountInfo) {
        self.state.lock().unwrap().account = Some(account);
    }

    /// Pin the clock used for position open times and deal timestamps.
    pub fn set_clock(&self, now: DateTime<Utc>) {
        self.state.lock().unwrap().clock = Some(now);
    }

    /// Make the venue reject this filling mode with `UnsupportedFilling`.
    pub fn reject_fill_mode(&self, mode: FillMode) {
        let mut st = self.state.lock().unwrap();
        if !st.rejected_fill_modes.contains(&mode) {
            st.rejected_fill_modes.push(mode);
        }
    }

    /// Queue an error for the next call of `op`. FIFO per op.
    pub fn script_failure(&self, op: SimOp, error: BrokerError) {
        let mut st = self.state.lock().unwrap();
        st.scripted.entry(op).or_default().push_back(error);
    }

    /// Settle (fully close) an open position at `exit_price` with the given
    /// reason, producing the deal the manager will later read back through
    /// `history`. Returns the realised net profit.
    pub fn settle(&self, ticket: u64, exit_price: f64, reason: ExitReason) -> Option<f64> {
        let mut st = self.state.lock().unwrap();
        let pos = st.positions.remove(&ticket)?;
        let spec = st.instruments.get(&pos.symbol)?.clone();
        let now = sim_now(&st);
        let deal = make_deal(&pos, &spec, pos.volume, exit_price, now, reason);
        let pnl = deal.net_pnl();
        st.deals.push(deal);
        Some(pnl)
    }

    /// All deals recorded so far (test inspection).
    pub fn deals(&self) -> Vec<Deal> {
        self.state.lock().unwrap().deals.clone()
    }

    fn take_scripted(&self, op: SimOp) -> Option<BrokerError> {
        let mut st = self.state.lock().unwrap();
        st.scripted.get_mut(&op).and_then(VecDeque::pop_front)
    }
}

fn sim_now(st: &SimState) -> DateTime<Utc> {
    st.clock
        .unwrap_or_else(|| Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap())
}

fn make_deal(
    pos: &Position,
    spec: &InstrumentSpec,
    volume: f64,
    exit_price: f64,
    time: DateTime<Utc>,
    reason: ExitReason,
) -> Deal {
    let signed_move = (exit_price - pos.open_price) * pos.direction.sign();
    let profit = if spec.pip_size > 0.0 {
        signed_move / spec.pip_size * spec.pip_value_per_lot * volume
    } else {
        0.0
    };
    Deal {
        ticket: pos.ticket + 1_000_000, // deal ids live in their own range
        position_ticket: pos.ticket,
        symbol: pos.symbol.clone(),
        direction: pos.direction.opposite(),
        volume,
        price: exit_price,
        time,
        profit,
        swap: 0.0,
        commission: 0.0,
        reason,
    }
}

impl BrokerPort for SimBroker {
    fn ohlc(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>, BrokerError> {
        if let Some(err) = self.take_scripted(SimOp::Ohlc) {
            return Err(err);
        }
        let st = self.state.lock().unwrap();
        let frame = st
            .frames
            .get(&(symbol.to_string(), timeframe.label()))
            .ok_or_else(|| BrokerError::DataUnavailable {
                symbol: symbol.to_string(),
                timeframe: timeframe.label().to_string(),
            })?;
        if frame.is_empty() {
            return Err(BrokerError::DataUnavailable {
                symbol: symbol.to_string(),
                timeframe: timeframe.label().to_string(),
            });
        }
        let start = frame.len().saturating_sub(count);
        Ok(frame[start..].to_vec())
    }

    fn tick(&self, symbol: &str) -> Result<Tick, BrokerError> {
        if let Some(err) = self.take_scripted(SimOp::Tick) {
            return Err(err);
        }
        let st = self.state.lock().unwrap();
        let spec = st
            .instruments
            .get(symbol)
            .ok_or_else(|| BrokerError::SymbolUnknown(symbol.to_string()))?;
        Ok(Tick {
            bid: spec.bid,
            ask: spec.ask,
            spread_pips: spec.spread_pips(),
            point: spec.point,
        })
    }

    fn symbol_info(&self, symbol: &str) -> Result<InstrumentSpec, BrokerError> {
        let st = self.state.lock().unwrap();
        st.instruments
            .get(symbol)
            .cloned()
            .ok_or_else(|| BrokerError::SymbolUnknown(symbol.to_string()))
    }

    fn account_info(&self) -> Result<AccountInfo, BrokerError> {
        let st = self.state.lock().unwrap();
        st.account
            .clone()
            .ok_or(BrokerError::Transient(crate::TransientKind::Connection))
    }

    fn open_market(&self, request: &OrderRequest) -> Result<OrderAck, BrokerError> {
        if let Some(err) = self.take_scripted(SimOp::OpenMarket) {
            return Err(err);
        }
        let mut st = self.state.lock().unwrap();
        if st.rejected_fill_modes.contains(&request.fill_mode) {
            return Err(BrokerError::UnsupportedFilling);
        }
        let spec = st
            .instruments
            .get(&request.symbol)
            .ok_or_else(|| BrokerError::SymbolUnknown(request.symbol.clone()))?
            .clone();
        let fill_price = match request.direction {
            smc_schemas::Direction::Buy => spec.ask,
            smc_schemas::Direction::Sell => spec.bid,
        };
        let ticket = st.next_ticket;
        st.next_ticket += 1;
        let now = sim_now(&st);
        st.positions.insert(
            ticket,
            Position {
                ticket,
                symbol: request.symbol.clone(),
                direction: request.direction,
                open_price: fill_price,
                volume: request.volume,
                sl: request.sl,
                tp: request.tp,
                open_time: now,
                magic: request.magic,
                comment: request.comment.clone(),
            },
        );
        Ok(OrderAck { ticket, fill_price })
    }

    fn modify_sltp(&self, ticket: u64, sl: f64, tp: f64) -> Result<(), BrokerError> {
        if let Some(err) = self.take_scripted(SimOp::ModifySltp) {
            return Err(err);
        }
        let mut st = self.state.lock().unwrap();
        let pos = st
            .positions
            .get_mut(&ticket)
            .ok_or_else(|| BrokerError::SymbolUnknown(format!("ticket {ticket}")))?;
        pos.sl = sl;
        pos.tp = tp;
        Ok(())
    }

    fn close(&self, ticket: u64) -> Result<(), BrokerError> {
        if let Some(err) = self.take_scripted(SimOp::Close) {
            return Err(err);
        }
        let exit = {
            let st = self.state.lock().unwrap();
            let pos = st
                .positions
                .get(&ticket)
                .ok_or_else(|| BrokerError::SymbolUnknown(format!("ticket {ticket}")))?;
            let spec = st
                .instruments
                .get(&pos.symbol)
                .ok_or_else(|| BrokerError::SymbolUnknown(pos.symbol.clone()))?;
            match pos.direction {
                smc_schemas::Direction::Buy => spec.bid,
                smc_schemas::Direction::Sell => spec.ask,
            }
        };
        self.settle(ticket, exit, ExitReason::Expert);
        Ok(())
    }

    fn partial_close(&self, ticket: u64, percent: f64) -> Result<(), BrokerError> {
        if let Some(err) = self.take_scripted(SimOp::PartialClose) {
            return Err(err);
        }
        let mut st = self.state.lock().unwrap();
        let pos = st
            .positions
            .get(&ticket)
            .cloned()
            .ok_or_else(|| BrokerError::SymbolUnknown(format!("ticket {ticket}")))?;
        let spec = st
            .instruments
            .get(&pos.symbol)
            .ok_or_else(|| BrokerError::SymbolUnknown(pos.symbol.clone()))?
            .clone();
        let closed_volume = pos.volume * (percent / 100.0).clamp(0.0, 1.0);
        let exit = match pos.direction {
            smc_schemas::Direction::Buy => spec.bid,
            smc_schemas::Direction::Sell => spec.ask,
        };
        let now = sim_now(&st);
        let deal = make_deal(&pos, &spec, closed_volume, exit, now, ExitReason::Expert);
        st.deals.push(deal);
        let remaining = pos.volume - closed_volume;
        if remaining <= f64::EPSILON {
            st.positions.remove(&ticket);
        } else if let Some(p) = st.positions.get_mut(&ticket) {
            p.volume = remaining;
        }
        Ok(())
    }

    fn positions(&self, symbol: Option<&str>) -> Result<Vec<Position>, BrokerError> {
        if let Some(err) = self.take_scripted(SimOp::Positions) {
            return Err(err);
        }
        let st = self.state.lock().unwrap();
        Ok(st
            .positions
            .values()
            .filter(|p| symbol.map_or(true, |s| p.symbol == s))
            .cloned()
            .collect())
    }

    fn history(&self, position_ticket: u64) -> Result<Vec<Deal>, BrokerError> {
        let st = self.state.lock().unwrap();
        Ok(st
            .deals
            .iter()
            .filter(|d| d.position_ticket == position_ticket)
            .cloned()
            .collect())
    }
}
