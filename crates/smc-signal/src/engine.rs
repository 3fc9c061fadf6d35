use chrono::Timelike;
use smc_analysis::{ConfirmedSweep, MarketSnapshot, SweepSource};
use smc_schemas::{Direction, InstrumentSpec, Trend};
use smc_sequence::{SequenceState, Stage};
use tracing::{debug, info, warn};

use crate::policy::SignalPolicy;
use crate::stops::build_stops;
use crate::types::{Quality, Rejection, Signal, TradeDecision};

/// Everything one scoring run needs. All references: the engine owns
/// nothing and mutates nothing.
pub struct SignalContext<'a> {
    pub snapshot: &'a MarketSnapshot,
    pub state: &'a SequenceState,
    pub policy: &'a SignalPolicy,
    pub spec: &'a InstrumentSpec,
    /// Intermarket confluence score in [-100, 100] from the external
    /// fundamental collaborator; `None` disables the component.
    pub intermarket_score: Option<f64>,
}

/// Scoring and veto engine.
///
/// Consumes a snapshot plus the symbol's sequence state and produces the
/// cycle's [`TradeDecision`] (always) and a [`Signal`] (when everything
/// clears). Hard vetoes run strictly before the additive score; the
/// decision records which one fired.
#[derive(Debug, Default)]
pub struct SignalEngine;

impl SignalEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, ctx: &SignalContext<'_>) -> (TradeDecision, Option<Signal>) {
        let snapshot = ctx.snapshot;
        let policy = ctx.policy;
        let mut decision = TradeDecision::new(&snapshot.symbol, snapshot.timestamp);
        let mut reasons: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        // -------------------------------------------------------------
        // Session and environment gates (direction-independent).
        // -------------------------------------------------------------
        if policy.adx_filter_enabled {
            if let Some(adx) = &snapshot.htf_adx {
                // Exactly at the threshold passes.
                if adx.adx < policy.min_adx {
                    return (decision.reject(Rejection::TrendStrength), None);
                }
            }
        }

        if snapshot.tick.spread_pips > policy.max_spread_pips {
            warn!(
                symbol = %snapshot.symbol,
                spread = snapshot.tick.spread_pips,
                cap = policy.max_spread_pips,
                "spread sentinel"
            );
            return (decision.reject(Rejection::SpreadAbsolute), None);
        }

        if !policy.is_crypto() {
            let hour = snapshot.timestamp.hour();
            if hour < 8 {
                return (decision.reject(Rejection::AsianSession), None);
            }
            if policy.killzones_enabled && !snapshot.killzone.can_trade {
                return (decision.reject(Rejection::Killzone), None);
            }
        }

        // -------------------------------------------------------------
        // Bias resolution: snapshot bias, sweep overrides, sequenced
        // setup override.
        // -------------------------------------------------------------
        let mut sweep: Option<ConfirmedSweep> = snapshot.sweep;
        if sweep.is_none() && ctx.state.stage >= Stage::LiquiditySweep {
            if let (Some(source), Some(direction)) =
                (ctx.state.sweep_source, ctx.state.sweep_direction)
            {
                if source != SweepSource::MomentumClimax {
                    sweep = Some(ConfirmedSweep {
                        source,
                        direction,
                        bonus: if source == SweepSource::GenericKillzone {
                            15.0
                        } else {
                            25.0
                        },
                    });
                }
            }
        }

        let mut bias = snapshot.bias;
        let mut sequence_complete = false;
        if ctx.state.stage == Stage::EntryReady && ctx.state.valid_entry_zone {
            bias = ctx.state.sweep_direction;
            sequence_complete = true;
        }
        if bias.is_none() {
            if let Some(s) = sweep {
                bias = Some(s.direction);
                reasons.push(format!("sweep override: neutral -> {}", s.direction));
            }
        }
        if bias.is_none() {
            if let Some(dir) = snapshot.smt.signal {
                bias = Some(dir);
                reasons.push(format!("SMT override: neutral -> {dir}"));
            }
        }
        let Some(direction) = bias else {
            return (decision.reject(Rejection::NoBias), None);
        };
        decision.direction = Some(direction);

        let ifvg_conf = snapshot.ifvg_confidence(direction);
        let has_ifvg_80 = ifvg_conf >= 80.0;
        let sweep_confirmed = sweep.is_some();

        let htf_direction = snapshot.htf_bias.or(snapshot.htf_trend.direction());
        let is_counter_htf = htf_direction.is_some_and(|h| h == direction.opposite());

        // -------------------------------------------------------------
        // Direction-dependent hard vetoes.
        // -------------------------------------------------------------
        if let Some(rsi) = snapshot.rsi {
            // Late-entry guard: do not buy strength or sell weakness.
            let late = match direction {
                Direction::Buy => rsi > 55.0,
                Direction::Sell => rsi < 45.0,
            };
            if late {
                return (decision.reject(Rejection::RsiContrarian), None);
            }
        }

        if !policy.allow_counter_trend && is_counter_htf {
            warn!(symbol = %snapshot.symbol, %direction, "strict trend safety");
            return (decision.reject(Rejection::StrictTrendSafety), None);
        }

        if policy.impulsive_filter_enabled {
            if let Some(rejection) = self.impulsive_regime_veto(
                snapshot,
                policy,
                direction,
                sweep_confirmed,
                ifvg_conf,
                htf_direction,
                is_counter_htf,
                &mut reasons,
            ) {
                return (decision.reject(rejection), None);
            }
        }

        if policy.block_mtf_conflict {
            if let Some(mtf) = snapshot.mtf_bias {
                let conflict = mtf == direction.opposite();
                if conflict && !(sweep_confirmed || has_ifvg_80) {
                    return (decision.reject(Rejection::MtfConflict), None);
                }
            }
        }

        if let Some(zone) = &snapshot.pd_zone {
            if !zone.allows(direction) {
                let has_exception = sweep_confirmed || ifvg_conf >= 70.0;
                if !has_exception {
                    return (decision.reject(Rejection::ZoneConflict), None);
                }
                decision.add("Counter-Zone Warning", -10.0);
                warnings.push("entry against the premium/discount zone".to_string());
            }
        }

        match direction {
            Direction::Sell if policy.force_long_only => {
                return (decision.reject(Rejection::ForceLongOnly), None);
            }
            Direction::Buy if policy.force_short_only => {
                return (decision.reject(Rejection::ForceShortOnly), None);
            }
            _ => {}
        }

        let momentum = match direction {
            Direction::Buy => &snapshot.momentum_buy,
            Direction::Sell => &snapshot.momentum_sell,
        };
        if !momentum.ok {
            return (
                decision.reject(Rejection::MomentumVeto(momentum.reason.clone())),
                None,
            );
        }

        // -------------------------------------------------------------
        // Additive score.
        // -------------------------------------------------------------
        if sequence_complete {
            decision.add("Institutional Sequence Complete", 40.0);
            reasons.push("full sweep -> CHoCH -> entry-zone sequence".to_string());
        }

        if let Some(zone) = &snapshot.pd_zone {
            use smc_detect::ZoneKind;
            let pts = match (direction, zone.current) {
                (Direction::Buy, ZoneKind::Discount) => 25.0,
                (Direction::Sell, ZoneKind::Premium) => 25.0,
                (_, ZoneKind::Equilibrium) => 15.0,
                _ => 0.0,
            };
            if pts > 0.0 {
                decision.add("Zone Alignment", pts);
            }
        }

        if snapshot.ltf_trend.direction() == Some(direction) {
            decision.add("LTF Trend Alignment", policy.ltf_alignment_weight);
        }

        // Entry-zone evidence: order block, or the sweep / iFVG bypasses.
        let price = snapshot.price;
        let matched_ob = snapshot.order_blocks.containing(direction, price);
        if let Some(ob) = matched_ob {
            decision.add("In Order Block", 40.0);
            reasons.push(format!(
                "price inside {} order block [{:.5}..{:.5}]",
                direction, ob.low, ob.high
            ));
        } else if sweep_confirmed {
            decision.add("Sweep Bonus (OB Bypass)", 20.0);
        } else if has_ifvg_80 {
            decision.add("iFVG Bonus (OB Bypass)", 15.0);
        } else if policy.require_order_block && !policy.use_breakers_only {
            return (decision.reject(Rejection::NotInOrderBlock), None);
        }

        // Imbalance confluence: an in-direction iFVG is worth points on
        // its own, more when it continues the higher timeframe.
        if ifvg_conf > 0.0 {
            let mut pts = 10.0;
            if ifvg_conf >= 85.0 && htf_direction == Some(direction) {
                pts += 5.0;
            }
            decision.add("iFVG In-Direction", pts);
        }

        let in_fvg = snapshot
            .fvgs
            .iter()
            .any(|f| f.is_active() && f.kind.direction() == direction && f.contains(price));
        if in_fvg {
            decision.add("In FVG", 20.0);
        }

        if snapshot.ote.as_ref().is_some_and(|o| {
            o.direction == direction && o.contains(price)
        }) {
            decision.add("OTE Retracement", 10.0);
            reasons.push("price inside the optimal trade entry band".to_string());
        }

        let in_breaker = snapshot
            .breakers
            .iter()
            .any(|b| b.is_active() && b.direction == direction && b.contains(price));
        if in_breaker {
            decision.add("In Breaker Block", 30.0);
        }
        if policy.use_breakers_only && !in_breaker {
            let strong_continuation =
                has_ifvg_80 && htf_direction == Some(direction) && ifvg_conf >= 80.0;
            if !strong_continuation {
                return (decision.reject(Rejection::BreakerRequired), None);
            }
            warnings.push("breaker-only mode bypassed by iFVG continuation".to_string());
        }

        if snapshot
            .liquidity
            .last_sweep_for(direction)
            .is_some()
        {
            decision.add("Recent Liq Sweep", 15.0);
        }

        // HTF alignment block, the single heaviest component.
        let htf_lot_factor = self.score_htf(
            &mut decision,
            snapshot,
            policy,
            direction,
            htf_direction,
            sweep_confirmed,
            ifvg_conf,
            &mut reasons,
        );

        // MTF alignment.
        match snapshot.mtf_bias {
            Some(mtf) if mtf == direction => decision.add("MTF Alignment", policy.mtf_alignment_weight),
            Some(_) => decision.add("MTF Conflict", -10.0),
            None => decision.add("MTF Neutral", 15.0),
        }

        if let Some(s) = sweep {
            decision.add(
                match s.source {
                    SweepSource::GenericKillzone => "Killzone Sweep",
                    _ => "Confirmed Sweep",
                },
                s.bonus,
            );
            if snapshot.recent_displacement {
                decision.add("Post-Sweep Displacement", 10.0);
                reasons.push("displacement printed after the sweep".to_string());
            } else {
                warnings.push("no displacement after the sweep".to_string());
            }
        }

        if snapshot.smt.signal == Some(direction) {
            decision.add("SMT Divergence", 30.0);
            reasons.push("correlated instrument failed to confirm the extreme".to_string());
        }

        if snapshot.tta_aligned {
            decision.add("Triple Timeframe Alignment", 20.0);
        }

        if let Some(score) = ctx.intermarket_score {
            let in_favor = match direction {
                Direction::Buy => score > 30.0,
                Direction::Sell => score < -30.0,
            };
            let against = match direction {
                Direction::Buy => score < -30.0,
                Direction::Sell => score > 30.0,
            };
            if in_favor {
                decision.add(
                    "Intermarket Confluence",
                    if score.abs() > 60.0 { 15.0 } else { 10.0 },
                );
            } else if against {
                decision.add("Intermarket Conflict", -15.0);
            }
        }

        if let Some(adr) = snapshot.adr_percent {
            if adr < 30.0 {
                decision.add("ADR Freshness", 5.0);
            } else if adr > 85.0 {
                decision.add("ADR Exhaustion", -15.0);
            }
        }

        if near_round_number(price, policy.pip_size) {
            decision.add("Round Number Confluence", 5.0);
        }

        if snapshot.volume.is_safe {
            decision.add("Volume OK", 15.0);
        } else {
            decision.add("Volume Suspect", -10.0);
            warnings.push(snapshot.volume.reason.clone());
        }

        decision.add("Momentum", momentum_points(snapshot, direction));

        decision.score = decision.score.clamp(0.0, 100.0);
        let confidence = decision.score;

        // -------------------------------------------------------------
        // Post-score philosophy rules and floors.
        // -------------------------------------------------------------
        let is_counter_trend = match direction {
            Direction::Buy => {
                snapshot.htf_trend == Trend::Bearish || snapshot.mtf_bias == Some(Direction::Sell)
            }
            Direction::Sell => {
                snapshot.htf_trend == Trend::Bullish || snapshot.mtf_bias == Some(Direction::Buy)
            }
        };
        if is_counter_trend {
            let pct = snapshot.pd_zone.as_ref().map_or(50.0, |z| z.percentage);
            let out_of_zone = match direction {
                Direction::Buy => pct > 30.0,
                Direction::Sell => pct < 70.0,
            };
            if out_of_zone {
                return (decision.reject(Rejection::CounterTrendZone), None);
            }
            if !sweep_confirmed {
                return (decision.reject(Rejection::CounterTrendNeedsSweep), None);
            }
        }

        let mut floor = policy.min_confidence_score;
        if policy.is_crypto() && !snapshot.killzone.can_trade {
            // Off-killzone crypto requires elite conviction.
            floor = floor.max(80.0);
        }
        if confidence < floor {
            info!(symbol = %snapshot.symbol, confidence, floor, "score floor");
            return (
                decision.reject(Rejection::ScoreFloor {
                    score: confidence,
                    floor,
                }),
                None,
            );
        }

        if policy.min_confluences > 0 {
            let positives = decision
                .components
                .iter()
                .filter(|(_, pts)| *pts > 0.0)
                .count();
            if positives < policy.min_confluences {
                return (
                    decision.reject(Rejection::InsufficientConfluence {
                        count: positives,
                        required: policy.min_confluences,
                    }),
                    None,
                );
            }
        }

        if policy.golden_setup_only && !sweep_confirmed {
            return (decision.reject(Rejection::NoSweepGoldenSetup), None);
        }

        // -------------------------------------------------------------
        // Stop construction and execution-cost sanity.
        // -------------------------------------------------------------
        let entry = match direction {
            Direction::Buy => snapshot.tick.ask,
            Direction::Sell => snapshot.tick.bid,
        };
        let plan = match build_stops(snapshot, direction, entry, policy, ctx.spec) {
            Ok(plan) => plan,
            Err(rejection) => return (decision.reject(rejection), None),
        };
        reasons.push(format!("SL: {}", plan.sl_reason));
        reasons.push(format!("TP: {}", plan.tp_reason));

        let spread_pips = snapshot.tick.spread_pips;
        if let Some(ob) = matched_ob {
            let ob_height_pips = ob.height() / policy.pip_size;
            if ob_height_pips > 0.0 && spread_pips > 0.5 * ob_height_pips {
                return (decision.reject(Rejection::SpreadVsOrderBlock), None);
            }
        }
        let sl_distance_pips = (entry - plan.stop_loss).abs() / policy.pip_size;
        if sl_distance_pips > 0.0 && spread_pips > 0.3 * sl_distance_pips {
            return (decision.reject(Rejection::SpreadVsStopDistance), None);
        }

        let mut take_profit = plan.take_profit;
        let risk = (entry - plan.stop_loss).abs();
        let mut rr = (take_profit - entry).abs() / risk;
        if rr < policy.rr_floor {
            return (
                decision.reject(Rejection::RiskReward {
                    rr,
                    floor: policy.rr_floor,
                }),
                None,
            );
        }
        if rr < policy.min_rr {
            if rr >= 0.8 * policy.min_rr {
                // Close enough: nudge the target out to the configured RR.
                take_profit = match direction {
                    Direction::Buy => entry + risk * policy.min_rr,
                    Direction::Sell => entry - risk * policy.min_rr,
                };
                take_profit = ctx.spec.round_price(take_profit);
                rr = policy.min_rr;
                reasons.push(format!("TP stretched to {:.1}R", policy.min_rr));
            } else {
                return (
                    decision.reject(Rejection::RiskReward {
                        rr,
                        floor: policy.min_rr,
                    }),
                    None,
                );
            }
        }

        // -------------------------------------------------------------
        // Quality banding, promotion, elite-or-nothing.
        // -------------------------------------------------------------
        let quality = Quality::from_confidence(confidence);
        let mut lot = quality.base_lot_multiplier() * htf_lot_factor;

        if confidence >= 75.0 && lot < 1.0 && htf_lot_factor >= 1.0 {
            lot = 1.0;
            reasons.push("promoted to full risk (score >= 75)".to_string());
        }
        lot = lot.clamp(0.0, 1.5);

        if lot < 0.9 && confidence < 75.0 {
            return (
                decision.reject(Rejection::EliteOrNothing {
                    lot,
                    score: confidence,
                }),
                None,
            );
        }

        decision.taken = true;
        let signal = Signal {
            direction,
            entry_price: entry,
            stop_loss: plan.stop_loss,
            take_profit,
            confidence,
            quality,
            lot_multiplier: lot,
            reasons,
            warnings,
            is_secondary: !snapshot.has_strategy_sweep(),
        };
        info!(
            symbol = %snapshot.symbol,
            %direction,
            confidence,
            quality = %quality,
            rr,
            lot,
            "signal generated"
        );
        debug!(components = ?decision.components, "score breakdown");
        (decision, Some(signal))
    }

    /// Impulsive-regime veto: an RSI extreme against the trade blocks it
    /// unless one of the institutional exceptions holds.
    #[allow(clippy::too_many_arguments)]
    fn impulsive_regime_veto(
        &self,
        snapshot: &MarketSnapshot,
        policy: &SignalPolicy,
        direction: Direction,
        sweep_confirmed: bool,
        ifvg_conf: f64,
        htf_direction: Option<Direction>,
        is_counter_htf: bool,
        reasons: &mut Vec<String>,
    ) -> Option<Rejection> {
        let rsi = snapshot.rsi?;
        let blocked = match direction {
            Direction::Buy => rsi < policy.rsi_extreme_low,
            Direction::Sell => rsi > policy.rsi_extreme_high,
        };
        if !blocked {
            return None;
        }

        // Exception 1: confirmed SMT divergence in-direction.
        if snapshot.smt.signal == Some(direction) {
            reasons.push("impulsive filter bypassed by SMT divergence".to_string());
            return None;
        }

        // Exception 2: confirmed sweep with an imbalance to enter from,
        // unless the profile forbids the counter-trend play.
        let has_imbalance = !snapshot.fvgs.is_empty() || !snapshot.ifvgs.is_empty();
        if sweep_confirmed && has_imbalance && (policy.allow_counter_trend || !is_counter_htf) {
            reasons.push("impulsive filter bypassed by sweep + imbalance".to_string());
            return None;
        }

        // Exception 3: golden iFVG continuation with the HTF.
        if ifvg_conf >= 80.0 && htf_direction == Some(direction) {
            reasons.push("impulsive filter bypassed by golden iFVG".to_string());
            return None;
        }

        Some(Rejection::ImpulsiveRegime)
    }

    /// HTF alignment score and the lot factor a conflict leaves behind.
    #[allow(clippy::too_many_arguments)]
    fn score_htf(
        &self,
        decision: &mut TradeDecision,
        snapshot: &MarketSnapshot,
        policy: &SignalPolicy,
        direction: Direction,
        htf_direction: Option<Direction>,
        sweep_confirmed: bool,
        ifvg_conf: f64,
        reasons: &mut Vec<String>,
    ) -> f64 {
        let w = policy.htf_alignment_weight;
        match htf_direction {
            Some(h) if h == direction => {
                decision.add("HTF Alignment", w);
                1.0
            }
            None => {
                // Ranging higher timeframe: workable, not ideal.
                decision.add("HTF Neutral", w / 2.0);
                1.0
            }
            Some(_) => {
                // Conflict. Three exceptions downgrade instead of the
                // full malus; each leaves a reduced lot factor.
                if snapshot.smt.signal == Some(direction) {
                    decision.add("HTF Conflict (SMT exception)", 10.0);
                    reasons.push("HTF conflict resolved by SMT divergence".to_string());
                    return 0.7;
                }
                if sweep_confirmed && snapshot.mtf_last_choch == Some(direction) {
                    decision.add("HTF Conflict (CHoCH+sweep exception)", 5.0);
                    reasons.push("HTF conflict resolved by MTF reversal".to_string());
                    return 0.6;
                }
                let htf_ranging_by_adx = snapshot
                    .htf_adx
                    .is_some_and(|a| a.regime == smc_detect::AdxRegime::NoTrend);
                if ifvg_conf >= 85.0 && htf_ranging_by_adx {
                    decision.add("HTF Conflict (iFVG exception)", 15.0);
                    reasons.push("HTF conflict resolved by high-confidence iFVG".to_string());
                    return 0.8;
                }

                decision.add("HTF Conflict (VETO)", -(w * 0.75));
                reasons.push("unresolved HTF conflict".to_string());
                0.5
            }
        }
    }
}

/// Institutional round-number proximity: within 5 pips of a 50-pip grid
/// level.
fn near_round_number(price: f64, pip_size: f64) -> bool {
    if pip_size <= 0.0 {
        return false;
    }
    let grid = 50.0 * pip_size;
    let offset = (price / grid).fract().abs();
    let distance = offset.min(1.0 - offset) * grid;
    distance <= 5.0 * pip_size
}

/// RSI/MACD momentum component, capped at 25.
fn momentum_points(snapshot: &MarketSnapshot, direction: Direction) -> f64 {
    if let Some(div) = snapshot.divergence {
        let aligned = matches!(
            (div, direction),
            (smc_detect::Divergence::Bullish, Direction::Buy)
                | (smc_detect::Divergence::Bearish, Direction::Sell)
        );
        if aligned {
            return 25.0;
        }
    }
    if let Some(rsi) = snapshot.rsi {
        let reversal_zone = match direction {
            Direction::Buy => rsi <= 35.0,
            Direction::Sell => rsi >= 65.0,
        };
        if reversal_zone {
            return 15.0;
        }
    }
    if let Some(macd) = &snapshot.macd {
        if let Some(hist) = macd.histogram() {
            let agrees = match direction {
                Direction::Buy => hist > 0.0,
                Direction::Sell => hist < 0.0,
            };
            if agrees {
                return 10.0;
            }
        }
    }
    0.0
}

#[cfg(test)]
pub(crate) mod tests_support;
