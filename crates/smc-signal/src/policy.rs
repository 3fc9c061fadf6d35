use smc_schemas::AssetClass;

/// Per-symbol scoring policy, resolved from configuration and the asset
/// profile before each cycle. The engine never reads global config.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPolicy {
    pub asset_class: AssetClass,
    pub pip_size: f64,

    // Gates.
    pub killzones_enabled: bool,
    pub adx_filter_enabled: bool,
    pub min_adx: f64,
    pub impulsive_filter_enabled: bool,
    pub rsi_extreme_low: f64,
    pub rsi_extreme_high: f64,
    pub allow_counter_trend: bool,
    pub block_mtf_conflict: bool,
    pub force_long_only: bool,
    pub force_short_only: bool,
    pub require_order_block: bool,
    pub use_breakers_only: bool,
    /// Reject any setup that never swept liquidity.
    pub golden_setup_only: bool,

    // Spread sentinel.
    /// Absolute cap in pips.
    pub max_spread_pips: f64,

    // Score shape.
    pub min_confidence_score: f64,
    /// Minimum count of positive scoring components for a tradable setup.
    pub min_confluences: usize,
    /// HTF alignment weight; the single source for both the bonus and the
    /// conflict malus magnitude derives from it.
    pub htf_alignment_weight: f64,
    pub mtf_alignment_weight: f64,
    pub ltf_alignment_weight: f64,

    // Stops.
    /// Structural SL buffer in pips (ATR-scaled floor also applies).
    pub sl_buffer_pips: f64,
    /// Minimum stop distance in pips for this symbol.
    pub min_sl_distance_pips: f64,
    /// Widens the final SL distance (crypto shield).
    pub sl_multiplier: f64,
    /// Fallback SL distance when no structural swing exists, pips.
    pub fallback_sl_pips: f64,
    /// Fallback TP distance, pips.
    pub fallback_tp_pips: f64,
    /// Hard floor under which the setup is discarded.
    pub rr_floor: f64,
    /// Configured minimum reward/risk for an accepted signal.
    pub min_rr: f64,
}

impl SignalPolicy {
    /// Class defaults matching the asset profiles: spread caps of 5 pips
    /// forex / 3 JPY (caller overrides) / 80c gold / $5000 BTC / $500 ETH /
    /// $100 indices, gold and crypto with widened stops.
    pub fn for_asset(asset_class: AssetClass, pip_size: f64) -> Self {
        let (max_spread_pips, min_sl_distance_pips, sl_multiplier) = match asset_class {
            AssetClass::ForexMajor => (5.0, 3.0, 1.0),
            AssetClass::Commodity => (80.0, 100.0, 1.0),
            AssetClass::Crypto => (500_000.0, 1000.0, 1.5),
            AssetClass::Indices => (10_000.0, 300.0, 1.0),
        };
        Self {
            asset_class,
            pip_size,
            killzones_enabled: true,
            adx_filter_enabled: false,
            min_adx: 25.0,
            impulsive_filter_enabled: true,
            rsi_extreme_low: 25.0,
            rsi_extreme_high: 75.0,
            allow_counter_trend: true,
            block_mtf_conflict: false,
            force_long_only: false,
            force_short_only: false,
            require_order_block: true,
            use_breakers_only: false,
            golden_setup_only: true,
            max_spread_pips,
            min_confidence_score: 70.0,
            min_confluences: 0,
            htf_alignment_weight: 40.0,
            mtf_alignment_weight: 30.0,
            ltf_alignment_weight: 15.0,
            sl_buffer_pips: 5.0,
            min_sl_distance_pips,
            sl_multiplier,
            fallback_sl_pips: 40.0,
            fallback_tp_pips: 50.0,
            rr_floor: 1.5,
            min_rr: 2.0,
        }
    }

    pub fn is_crypto(&self) -> bool {
        self.asset_class == AssetClass::Crypto
    }

    pub fn price(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forex_defaults_are_conservative() {
        let p = SignalPolicy::for_asset(AssetClass::ForexMajor, 0.0001);
        assert_eq!(p.max_spread_pips, 5.0);
        assert_eq!(p.min_rr, 2.0);
        assert_eq!(p.htf_alignment_weight, 40.0);
        assert!(p.golden_setup_only);
    }

    #[test]
    fn crypto_widens_stops() {
        let p = SignalPolicy::for_asset(AssetClass::Crypto, 0.01);
        assert!(p.sl_multiplier > 1.0);
    }
}
