use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smc_broker::Position;
use smc_schemas::{normalize_symbol, split_currencies, Direction};

/// A basket of instruments that move together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationGroup {
    pub name: String,
    pub symbols: Vec<String>,
    /// Positively correlated groups additionally require directional
    /// coherence among open positions.
    pub positive: bool,
}

/// Per-currency net/gross exposure computed from open positions.
#[derive(Debug, Clone, Default, PartialEq)]
struct CurrencyExposure {
    net_lots: f64,
    long_count: u32,
    short_count: u32,
}

/// Exposure and correlation gate.
///
/// Stateless between calls: every `can_open_trade` recomputes exposure
/// from the positions list the caller just fetched, so there is no
/// aggregate to drift out of sync with the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationGuard {
    pub max_exposure_per_currency: f64,
    pub max_positions_per_group: usize,
    pub groups: Vec<CorrelationGroup>,
}

impl Default for CorrelationGuard {
    fn default() -> Self {
        Self {
            max_exposure_per_currency: 0.15,
            max_positions_per_group: 2,
            groups: default_groups(),
        }
    }
}

/// The static group table, overridable by configuration.
pub fn default_groups() -> Vec<CorrelationGroup> {
    let g = |name: &str, symbols: &[&str], positive: bool| CorrelationGroup {
        name: name.to_string(),
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        positive,
    };
    vec![
        g(
            "USD_MAJORS",
            &["EURUSD", "GBPUSD", "AUDUSD", "NZDUSD"],
            true,
        ),
        g("JPY_PAIRS", &["USDJPY", "EURJPY", "GBPJPY", "AUDJPY"], true),
        g(
            "EUR_CROSSES",
            &["EURUSD", "EURGBP", "EURJPY", "EURCHF"],
            true,
        ),
        g(
            "GBP_CROSSES",
            &["GBPUSD", "GBPJPY", "EURGBP", "GBPAUD"],
            false,
        ),
        g("GOLD_RELATED", &["XAUUSD", "XAGUSD"], true),
        g("CRYPTO", &["BTCUSD", "ETHUSD"], true),
    ]
}

impl CorrelationGuard {
    /// Evaluate whether a new trade fits inside the exposure rules.
    ///
    /// Rules, in order:
    /// 1. per-currency net exposure cap (exactly at the cap is allowed,
    ///    any increment beyond is refused);
    /// 2. directional congestion: a third same-direction position on a
    ///    currency needs confidence >= 85;
    /// 3. per-group position cap, and directional coherence in positive
    ///    groups unless confidence >= 90;
    /// 4. no same-symbol opposite-direction open (no internal hedging).
    ///
    /// Returns every violated rule so the journal records the full story.
    pub fn can_open_trade(
        &self,
        open_positions: &[Position],
        symbol: &str,
        direction: Direction,
        volume: f64,
        confidence: f64,
    ) -> Result<(), Vec<String>> {
        let mut reasons = Vec::new();
        let exposures = aggregate(open_positions);
        let (base, quote) = split_currencies(symbol);

        // 1. Net exposure caps. A buy adds to base, subtracts from quote.
        for (currency, delta) in [
            (&base, volume * direction.sign()),
            (&quote, -volume * direction.sign()),
        ] {
            if currency.is_empty() {
                continue;
            }
            let current = exposures
                .get(currency.as_str())
                .map_or(0.0, |e| e.net_lots);
            let new_net = (current + delta).abs();
            if new_net > self.max_exposure_per_currency + 1e-9 {
                reasons.push(format!(
                    "{currency} net exposure {new_net:.2} lots over cap {:.2}",
                    self.max_exposure_per_currency
                ));
            }
        }

        // 2. Directional congestion.
        for currency in [&base, &quote] {
            if currency.is_empty() {
                continue;
            }
            let exposure = exposures.get(currency.as_str()).cloned().unwrap_or_default();
            // The trade direction seen from this currency's side.
            let goes_long = match (currency == &base, direction) {
                (true, Direction::Buy) | (false, Direction::Sell) => true,
                _ => false,
            };
            let existing = if goes_long {
                exposure.long_count
            } else {
                exposure.short_count
            };
            if existing >= 2 && confidence < 85.0 {
                reasons.push(format!(
                    "{currency} already has {existing} positions that way (needs confidence >= 85)"
                ));
            }
        }

        // 3. Correlation groups.
        let symbol_norm = normalize_symbol(symbol);
        for group in &self.groups {
            if !group.symbols.iter().any(|s| normalize_symbol(s) == symbol_norm) {
                continue;
            }
            let members: Vec<&Position> = open_positions
                .iter()
                .filter(|p| {
                    group
                        .symbols
                        .iter()
                        .any(|s| normalize_symbol(s) == normalize_symbol(&p.symbol))
                })
                .collect();
            if members.len() >= self.max_positions_per_group {
                reasons.push(format!(
                    "group {} at its {} position cap",
                    group.name, self.max_positions_per_group
                ));
            }
            if group.positive {
                if let Some(first) = members.first() {
                    if first.direction != direction && confidence < 90.0 {
                        reasons.push(format!(
                            "group {} holds {} positions (opposed entry needs confidence >= 90)",
                            group.name, first.direction
                        ));
                    }
                }
            }
        }

        // 4. No internal hedging.
        for p in open_positions {
            if normalize_symbol(&p.symbol) == symbol_norm && p.direction != direction {
                reasons.push(format!(
                    "opposite-direction position {} already open on {symbol}",
                    p.ticket
                ));
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(reasons)
        }
    }
}

fn aggregate(positions: &[Position]) -> BTreeMap<String, CurrencyExposure> {
    let mut map: BTreeMap<String, CurrencyExposure> = BTreeMap::new();
    for p in positions {
        let (base, quote) = split_currencies(&p.symbol);
        let signed = p.volume * p.direction.sign();
        if !base.is_empty() {
            let e = map.entry(base).or_default();
            e.net_lots += signed;
            if signed > 0.0 {
                e.long_count += 1;
            } else {
                e.short_count += 1;
            }
        }
        if !quote.is_empty() {
            let e = map.entry(quote).or_default();
            e.net_lots -= signed;
            if signed > 0.0 {
                e.short_count += 1;
            } else {
                e.long_count += 1;
            }
        }
    }
    map
}
