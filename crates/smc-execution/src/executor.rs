use std::time::Duration;

use smc_broker::{BrokerError, BrokerPort, FillMode, OrderRequest};
use smc_schemas::{Direction, InstrumentSpec, Tick};
use tracing::{info, warn};

/// Executor tuning. Slippage budget is resolved per symbol by the caller
/// (5 pips forex, 10 gold, 1000 BTC by default).
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub max_slippage_pips: f64,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub magic: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_slippage_pips: 5.0,
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            magic: 990_017,
        }
    }
}

/// What the signal path asks the executor to do.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub sl: f64,
    pub tp: f64,
    /// The price the signal was generated against, for the slippage budget.
    pub signal_entry: f64,
    pub comment: String,
}

/// Successful placement, with the realised slippage for telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedOrder {
    pub ticket: u64,
    pub fill_price: f64,
    pub requested_price: f64,
    pub slippage_pips: f64,
}

/// The single choke-point for broker order operations.
pub struct OrderExecutor {
    config: ExecutorConfig,
}

impl OrderExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn magic(&self) -> u64 {
        self.config.magic
    }

    /// Place a market order:
    /// 1. fresh tick, entry recomputed as ask (buy) / bid (sell);
    /// 2. slippage vs the signal price, one re-quote retry allowed;
    /// 3. SL/TP side + distance sanitation against the fresh tick with
    ///    small violations auto-corrected (stops-level + 2 points);
    /// 4. volume re-clamped to the instrument step;
    /// 5. submit FOK, falling back IOC then RETURN on unsupported
    ///    filling, retrying transient retcodes with backoff and a fresh
    ///    quote per attempt.
    pub fn place(
        &self,
        broker: &dyn BrokerPort,
        spec: &InstrumentSpec,
        order: &OrderSpec,
    ) -> Result<PlacedOrder, BrokerError> {
        let mut tick = broker.tick(&order.symbol)?;
        let mut entry = entry_for(order.direction, &tick);

        // Slippage budget, with exactly one re-quote retry.
        let mut slippage = (entry - order.signal_entry).abs() / spec.pip_size;
        if slippage > self.config.max_slippage_pips {
            warn!(
                symbol = %order.symbol,
                slippage,
                budget = self.config.max_slippage_pips,
                "slippage over budget, re-quoting once"
            );
            tick = broker.tick(&order.symbol)?;
            entry = entry_for(order.direction, &tick);
            slippage = (entry - order.signal_entry).abs() / spec.pip_size;
            if slippage > self.config.max_slippage_pips {
                return Err(BrokerError::Slippage);
            }
        }

        let (sl, tp) = sanitize_stops(order.direction, &tick, spec, order.sl, order.tp)?;
        let volume = clamp_volume(order.volume, spec);

        let mut request = OrderRequest {
            symbol: order.symbol.clone(),
            direction: order.direction,
            volume,
            sl,
            tp,
            fill_mode: FillMode::Fok,
            comment: order.comment.clone(),
            magic: self.config.magic,
        };

        let mut attempts = 0u32;
        loop {
            match broker.open_market(&request) {
                Ok(ack) => {
                    let realised = (ack.fill_price - order.signal_entry).abs() / spec.pip_size;
                    info!(
                        symbol = %order.symbol,
                        ticket = ack.ticket,
                        fill = ack.fill_price,
                        slippage_pips = realised,
                        "order filled"
                    );
                    return Ok(PlacedOrder {
                        ticket: ack.ticket,
                        fill_price: ack.fill_price,
                        requested_price: entry,
                        slippage_pips: realised,
                    });
                }
                Err(BrokerError::UnsupportedFilling) => match request.fill_mode.fallback() {
                    Some(next) => {
                        info!(symbol = %order.symbol, ?next, "filling mode fallback");
                        request.fill_mode = next;
                    }
                    None => return Err(BrokerError::UnsupportedFilling),
                },
                Err(e) if e.is_transient() => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        warn!(symbol = %order.symbol, error = %e, "retry budget exhausted");
                        return Err(e);
                    }
                    warn!(symbol = %order.symbol, error = %e, attempts, "transient, retrying");
                    std::thread::sleep(self.config.retry_backoff);
                    // Fresh quote for the next attempt.
                    tick = broker.tick(&order.symbol)?;
                    entry = entry_for(order.direction, &tick);
                    let (sl, tp) =
                        sanitize_stops(order.direction, &tick, spec, order.sl, order.tp)?;
                    request.sl = sl;
                    request.tp = tp;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Modify a position's protective levels with the same transient-retry
    /// policy. A no-op modification counts as success.
    pub fn modify(
        &self,
        broker: &dyn BrokerPort,
        ticket: u64,
        sl: f64,
        tp: f64,
    ) -> Result<(), BrokerError> {
        let mut attempts = 0u32;
        loop {
            match broker.modify_sltp(ticket, sl, tp) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        return Err(e);
                    }
                    std::thread::sleep(self.config.retry_backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn entry_for(direction: Direction, tick: &Tick) -> f64 {
    match direction {
        Direction::Buy => tick.ask,
        Direction::Sell => tick.bid,
    }
}

/// Enforce side validity and broker minimum stop distances against the
/// fresh tick. Small violations are shifted out to stops-level plus two
/// points and re-rounded; a stop on the wrong side outright is an error.
fn sanitize_stops(
    direction: Direction,
    tick: &Tick,
    spec: &InstrumentSpec,
    sl: f64,
    tp: f64,
) -> Result<(f64, f64), BrokerError> {
    let min_distance = spec.min_stop_distance() + 2.0 * spec.point;
    let (mut sl, mut tp) = (sl, tp);

    match direction {
        Direction::Buy => {
            if sl >= tick.ask || tp <= tick.ask {
                return Err(BrokerError::InvalidStops);
            }
            if tick.bid - sl < min_distance {
                sl = tick.bid - min_distance;
            }
            if tp - tick.ask < min_distance {
                tp = tick.ask + min_distance;
            }
        }
        Direction::Sell => {
            if sl <= tick.bid || tp >= tick.bid {
                return Err(BrokerError::InvalidStops);
            }
            if sl - tick.ask < min_distance {
                sl = tick.ask + min_distance;
            }
            if tick.bid - tp < min_distance {
                tp = tick.bid + min_distance;
                // Shifting the TP across the bid would invert the order's
                // economics; refuse instead.
                if tp >= tick.bid {
                    return Err(BrokerError::InvalidStops);
                }
            }
        }
    }

    sl = spec.round_price(sl);
    tp = spec.round_price(tp);

    let valid = match direction {
        Direction::Buy => sl < tick.ask && tp > tick.ask,
        Direction::Sell => sl > tick.bid && tp < tick.bid,
    };
    if !valid {
        return Err(BrokerError::InvalidStops);
    }
    Ok((sl, tp))
}

fn clamp_volume(volume: f64, spec: &InstrumentSpec) -> f64 {
    let clamped = volume.clamp(spec.volume_min, spec.volume_max);
    if spec.volume_step <= 0.0 {
        return clamped;
    }
    ((clamped / spec.volume_step).floor() * spec.volume_step).max(spec.volume_min)
}
