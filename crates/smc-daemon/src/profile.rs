//! Config -> engine-knob resolution.
//!
//! One [`SymbolProfile`] is built per enabled symbol at startup: asset
//! profile overrides are merged into the detector parameters and signal
//! policy once, so each cycle just borrows the resolved values and no
//! detector instance is ever mutated mid-run.

use smc_analysis::{AnalyzerConfig, StrategyToggles};
use smc_config::Settings;
use smc_execution::{ManagerConfig, TrailingMode};
use smc_schemas::{AssetClass, InstrumentSpec, Timeframe};
use smc_sequence::SequenceConfig;
use smc_signal::SignalPolicy;

/// Everything cycle code needs to know about one symbol, pre-resolved.
#[derive(Debug, Clone)]
pub struct SymbolProfile {
    pub name: String,
    pub asset_class: AssetClass,
    pub analyzer: AnalyzerConfig,
    pub policy: SignalPolicy,
    pub sequence: SequenceConfig,
    pub risk_per_trade: f64,
    pub max_lot: Option<f64>,
    pub smt_correlated: Option<String>,
    pub timeframes: (Timeframe, Timeframe, Timeframe),
}

/// Resolve a symbol's profile from the settings tree and the instrument
/// metadata the broker reported.
pub fn resolve_symbol_profile(
    settings: &Settings,
    symbol: &smc_config::SymbolSettings,
    spec: &InstrumentSpec,
) -> anyhow::Result<SymbolProfile> {
    let asset_class = spec.asset_class;
    let profile = settings.profile(asset_class);
    let timeframes = settings.timeframes.resolve()?;

    // Detector parameters: global smc.* settings, then class overrides.
    let mut analyzer = AnalyzerConfig::forex_defaults(spec.pip_size);
    analyzer.params.swing_strength = settings.smc.swing_strength;
    analyzer.params.max_structure_age = settings.smc.max_structure_age;
    analyzer.params.min_imbalance_ratio = settings.smc.min_imbalance_ratio;
    analyzer.params.ob_max_age_bars = settings.smc.max_age_bars;
    analyzer.params.min_gap_pips = settings.smc.min_gap_pips;
    analyzer.params.equal_level_pips = settings.smc.equal_level_pips;
    analyzer.params.equilibrium_buffer_pips = settings.smc.equilibrium_buffer;
    analyzer.params.ote_fib_start = settings.smc.ote_fib_start;
    analyzer.params.ote_fib_end = settings.smc.ote_fib_end;
    if let Some(p) = profile {
        if let Some(gap) = p.min_gap_pips {
            analyzer.params.min_gap_pips = gap;
        }
        if let Some(lookback) = p.lookback {
            analyzer.params.pd_lookback = lookback;
        }
    }
    analyzer.strategies = StrategyToggles {
        pdh_pdl_sweep: symbol.strategies.pdh_pdl_sweep,
        asian_range_sweep: symbol.strategies.asian_range_sweep,
        fvg_entry: symbol.strategies.fvg_entry,
        silver_bullet: symbol.strategies.silver_bullet,
        amd: symbol.strategies.amd,
        smt: symbol.strategies.smt && symbol.smt_correlated.is_some(),
    };
    analyzer.killzones_enabled = settings.filters.killzones_enabled;
    analyzer.timezone_offset_hours = settings.filters.timezone_offset_hours;
    analyzer.asian_start_hour = settings.smc.asian_start_hour;
    analyzer.asian_end_hour = settings.smc.asian_end_hour;
    analyzer.asian_buffer_pips = settings.smc.asian_buffer_pips;
    analyzer.asian_pending_window_minutes = settings.smc.asian_pending_window_minutes;
    analyzer.daily_buffer_pips = settings.smc.previous_day_buffer_pips;
    analyzer.sb_use_pm_window = settings.smc.silver_bullet_pm_window;
    analyzer.amd_min_range_bars = settings.smc.amd_min_range_bars;
    analyzer.amd_max_range_percentage = settings.smc.amd_max_range_percentage;
    analyzer.smt_inverted = symbol.smt_inverted;

    // Signal policy: class defaults, then global filters, then symbol
    // overrides.
    let mut policy = SignalPolicy::for_asset(asset_class, spec.pip_size);
    policy.killzones_enabled = settings.filters.killzones_enabled;
    policy.adx_filter_enabled = settings.advanced_filters.adx_enabled;
    policy.min_adx = settings.advanced_filters.min_adx;
    policy.impulsive_filter_enabled = settings.risk.impulsive_regime_filter;
    policy.rsi_extreme_low = settings.risk.rsi_extreme_low;
    policy.rsi_extreme_high = settings.risk.rsi_extreme_high;
    policy.allow_counter_trend = settings.advanced_filters.allow_counter_trend;
    policy.htf_alignment_weight = settings.advanced_filters.htf_alignment_weight;
    policy.ltf_alignment_weight = settings.advanced_filters.ltf_alignment_weight;
    policy.min_rr = settings.risk.min_risk_reward;
    policy.min_confluences = symbol.confluence_required.unwrap_or(0);
    if let Some(p) = profile {
        if let Some(floor) = p.min_confidence_score {
            policy.min_confidence_score = floor;
        }
        if let Some(allow) = p.allow_counter_trend {
            policy.allow_counter_trend = allow;
        }
        if let Some(mult) = p.sl_multiplier {
            policy.sl_multiplier = mult;
        }
        if let Some(cap) = p.max_spread_pips {
            policy.max_spread_pips = cap;
        }
    }
    if let Some(floor) = symbol.min_confidence {
        policy.min_confidence_score = floor;
    }
    if let Some(allow) = symbol.allow_counter_trend {
        policy.allow_counter_trend = allow;
    }
    if let Some(mult) = symbol.sl_multiplier {
        policy.sl_multiplier = mult;
    }
    policy.block_mtf_conflict = symbol.block_mtf_conflict;
    policy.force_long_only = symbol.force_long_only;
    policy.force_short_only = symbol.force_short_only;
    policy.use_breakers_only = symbol.use_breakers_only;

    let sequence = SequenceConfig::for_instrument(asset_class, spec.pip_size);

    Ok(SymbolProfile {
        name: symbol.name.clone(),
        asset_class,
        analyzer,
        policy,
        sequence,
        risk_per_trade: symbol.risk_per_trade.unwrap_or(settings.risk.risk_per_trade),
        max_lot: symbol.max_lot,
        smt_correlated: symbol.smt_correlated.clone(),
        timeframes,
    })
}

/// Position-manager config resolved from settings (crypto profiles arm
/// break-even earlier via the asset profile).
pub fn resolve_manager_config(settings: &Settings, magic: u64) -> ManagerConfig {
    let m = &settings.management;
    ManagerConfig {
        break_even_enabled: m.break_even_enabled,
        break_even_trigger_rr: m.break_even_trigger_rr,
        crypto_break_even_trigger_rr: settings
            .profile(smc_schemas::AssetClass::Crypto)
            .and_then(|p| p.break_even_trigger_rr)
            .unwrap_or(1.0),
        break_even_offset_pips: m.break_even_offset_pips,
        partial_close_enabled: m.partial_close_enabled,
        partial_trigger_rr: m.partial_trigger_rr,
        partial_close_percent: m.partial_close_percent,
        trailing_enabled: m.trailing_enabled,
        trailing_mode: if m.trailing_mode == "fixed" {
            TrailingMode::Fixed
        } else {
            TrailingMode::Structure
        },
        trailing_trigger_rr: m.trailing_trigger_rr,
        trailing_distance_pips: m.trailing_distance_pips,
        structure_buffer_pips: m.structure_buffer_pips,
        structure_swing_strength: settings.smc.swing_strength,
        structure_timeframe: settings
            .timeframes
            .resolve()
            .map(|(ltf, _, _)| ltf)
            .unwrap_or(Timeframe::M15),
        news_exit_enabled: settings.filters.news.emergency_exit,
        news_exit_minutes: settings.filters.news.exit_minutes_before,
        weekend_force_close: m.weekend_force_close,
        magic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smc_config::{AssetProfile, SymbolSettings};

    fn spec(name: &str, class: AssetClass, pip: f64) -> InstrumentSpec {
        InstrumentSpec {
            name: name.to_string(),
            asset_class: class,
            pip_size: pip,
            point: pip / 10.0,
            digits: 5,
            contract_size: 100_000.0,
            pip_value_per_lot: 10.0,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
            stops_level_points: 30.0,
            bid: 1.0,
            ask: 1.0,
        }
    }

    #[test]
    fn symbol_overrides_beat_profile_and_globals() {
        let mut settings = Settings::default();
        settings.asset_profiles.insert(
            "forex_major".to_string(),
            AssetProfile {
                min_confidence_score: Some(65.0),
                ..AssetProfile::default()
            },
        );
        let symbol = SymbolSettings {
            name: "EURUSD".to_string(),
            min_confidence: Some(80.0),
            block_mtf_conflict: true,
            ..SymbolSettings::default()
        };
        let profile = resolve_symbol_profile(
            &settings,
            &symbol,
            &spec("EURUSD", AssetClass::ForexMajor, 0.0001),
        )
        .unwrap();
        assert_eq!(profile.policy.min_confidence_score, 80.0);
        assert!(profile.policy.block_mtf_conflict);
    }

    #[test]
    fn crypto_profile_widens_stops_via_class_defaults() {
        let settings = Settings::default();
        let symbol = SymbolSettings {
            name: "BTCUSD".to_string(),
            ..SymbolSettings::default()
        };
        let profile = resolve_symbol_profile(
            &settings,
            &symbol,
            &spec("BTCUSD", AssetClass::Crypto, 0.01),
        )
        .unwrap();
        assert!(profile.policy.sl_multiplier > 1.0);
    }

    #[test]
    fn smt_toggle_requires_a_correlated_symbol() {
        let settings = Settings::default();
        let symbol = SymbolSettings {
            name: "EURUSD".to_string(),
            ..SymbolSettings::default()
        };
        let profile = resolve_symbol_profile(
            &settings,
            &symbol,
            &spec("EURUSD", AssetClass::ForexMajor, 0.0001),
        )
        .unwrap();
        assert!(!profile.analyzer.strategies.smt);

        let with_pair = SymbolSettings {
            smt_correlated: Some("GBPUSD".to_string()),
            ..symbol
        };
        let profile = resolve_symbol_profile(
            &settings,
            &with_pair,
            &spec("EURUSD", AssetClass::ForexMajor, 0.0001),
        )
        .unwrap();
        assert!(profile.analyzer.strategies.smt);
    }
}
