use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use smc_schemas::Timeframe;

/// Run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    Paper,
    Backtest,
    Visual,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Live => "live",
            Mode::Paper => "paper",
            Mode::Backtest => "backtest",
            Mode::Visual => "visual",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub mode: Mode,
    /// Engine state directory (cooldown ledger, journal streams).
    pub state_dir: String,
    /// Magic number stamped on every order this engine opens.
    pub magic: u64,
    /// Supervisor cadence per symbol, seconds.
    pub cycle_seconds: u64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            mode: Mode::Paper,
            state_dir: "state".to_string(),
            magic: 990_017,
            cycle_seconds: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeSettings {
    pub ltf: String,
    pub mtf: String,
    pub htf: String,
}

impl Default for TimeframeSettings {
    fn default() -> Self {
        Self {
            ltf: "M15".to_string(),
            mtf: "H4".to_string(),
            htf: "D1".to_string(),
        }
    }
}

impl TimeframeSettings {
    pub fn resolve(&self) -> Result<(Timeframe, Timeframe, Timeframe)> {
        let parse = |label: &str| {
            Timeframe::from_label(label)
                .ok_or_else(|| anyhow::anyhow!("unknown timeframe label {label:?}"))
        };
        Ok((parse(&self.ltf)?, parse(&self.mtf)?, parse(&self.htf)?))
    }
}

/// Per-symbol strategy toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyFlags {
    pub pdh_pdl_sweep: bool,
    pub asian_range_sweep: bool,
    pub fvg_entry: bool,
    pub silver_bullet: bool,
    pub amd: bool,
    pub smt: bool,
}

impl Default for StrategyFlags {
    fn default() -> Self {
        Self {
            pdh_pdl_sweep: true,
            asian_range_sweep: true,
            fvg_entry: true,
            silver_bullet: true,
            amd: true,
            smt: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolSettings {
    pub name: String,
    pub enabled: bool,
    pub strategies: StrategyFlags,
    /// Minimum positive scoring components for a tradable setup.
    pub confluence_required: Option<usize>,
    /// Profile floor override for this symbol.
    pub min_confidence: Option<f64>,
    pub risk_per_trade: Option<f64>,
    /// Hard per-symbol lot cap.
    pub max_lot: Option<f64>,
    pub sl_multiplier: Option<f64>,
    pub allow_counter_trend: Option<bool>,
    pub block_mtf_conflict: bool,
    pub force_long_only: bool,
    pub force_short_only: bool,
    pub use_breakers_only: bool,
    /// Correlated instrument for SMT divergence.
    pub smt_correlated: Option<String>,
    /// The correlate trades inversely (index-style reference).
    pub smt_inverted: bool,
}

impl Default for SymbolSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            strategies: StrategyFlags::default(),
            confluence_required: None,
            min_confidence: None,
            risk_per_trade: None,
            max_lot: None,
            sl_multiplier: None,
            allow_counter_trend: None,
            block_mtf_conflict: false,
            force_long_only: false,
            force_short_only: false,
            use_breakers_only: false,
            smt_correlated: None,
            smt_inverted: false,
        }
    }
}

/// Detector parameters (`smc.*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmcSettings {
    pub swing_strength: usize,
    pub max_structure_age: usize,
    pub min_imbalance_ratio: f64,
    pub min_gap_pips: f64,
    pub max_age_bars: usize,
    pub equal_level_pips: f64,
    pub equilibrium_buffer: f64,
    pub ote_fib_start: f64,
    pub ote_fib_end: f64,
    pub asian_start_hour: u32,
    pub asian_end_hour: u32,
    pub asian_buffer_pips: f64,
    /// Pending-sweep window before an unconfirmed Asian sweep expires.
    pub asian_pending_window_minutes: i64,
    pub previous_day_buffer_pips: f64,
    pub silver_bullet_pm_window: bool,
    pub amd_min_range_bars: usize,
    pub amd_max_range_percentage: f64,
}

impl Default for SmcSettings {
    fn default() -> Self {
        Self {
            swing_strength: 5,
            max_structure_age: 50,
            min_imbalance_ratio: 1.5,
            min_gap_pips: 2.0,
            max_age_bars: 50,
            equal_level_pips: 3.0,
            equilibrium_buffer: 5.0,
            ote_fib_start: 0.618,
            ote_fib_end: 0.786,
            asian_start_hour: 0,
            asian_end_hour: 7,
            asian_buffer_pips: 2.0,
            asian_pending_window_minutes: 15,
            previous_day_buffer_pips: 2.0,
            silver_bullet_pm_window: false,
            amd_min_range_bars: 10,
            amd_max_range_percentage: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    pub max_exposure_per_currency: f64,
    pub max_positions_per_group: usize,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            max_exposure_per_currency: 0.15,
            max_positions_per_group: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    pub risk_per_trade: f64,
    pub use_fixed_lot: bool,
    pub fixed_lot_size: f64,
    pub max_daily_loss: f64,
    pub max_consecutive_losses: u32,
    pub max_trades_per_day: u32,
    pub max_open_trades: u32,
    pub min_risk_reward: f64,
    pub cooldown_same_symbol_seconds: i64,
    pub min_stacking_time_seconds: i64,
    pub min_stacking_distance_pips: f64,
    pub lunch_break_filter: bool,
    pub impulsive_regime_filter: bool,
    pub rsi_extreme_low: f64,
    pub rsi_extreme_high: f64,
    pub correlation_guard: CorrelationSettings,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            risk_per_trade: 0.5,
            use_fixed_lot: false,
            fixed_lot_size: 0.01,
            max_daily_loss: 2.0,
            max_consecutive_losses: 3,
            max_trades_per_day: 10,
            max_open_trades: 5,
            min_risk_reward: 2.0,
            cooldown_same_symbol_seconds: 60,
            min_stacking_time_seconds: 300,
            min_stacking_distance_pips: 15.0,
            lunch_break_filter: false,
            impulsive_regime_filter: true,
            rsi_extreme_low: 25.0,
            rsi_extreme_high: 75.0,
            correlation_guard: CorrelationSettings::default(),
        }
    }
}

/// One manual blackout entry: a date, an inclusive UTC hour range, and the
/// currencies or symbols it suspends.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlackoutSettings {
    pub label: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub start_hour: u32,
    pub end_hour: u32,
    pub currencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    pub enabled: bool,
    pub pause_before_minutes: i64,
    pub emergency_exit: bool,
    pub exit_minutes_before: i64,
    /// Hard-coded blackout calendar (BoJ decision days and the like).
    pub manual_blackouts: Vec<BlackoutSettings>,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            pause_before_minutes: 30,
            emergency_exit: true,
            exit_minutes_before: 30,
            manual_blackouts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub killzones_enabled: bool,
    pub timezone_offset_hours: i64,
    pub news: NewsSettings,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            killzones_enabled: true,
            timezone_offset_hours: 0,
            news: NewsSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedFilterSettings {
    pub adx_enabled: bool,
    pub min_adx: f64,
    pub allow_counter_trend: bool,
    pub htf_alignment_weight: f64,
    pub ltf_alignment_weight: f64,
}

impl Default for AdvancedFilterSettings {
    fn default() -> Self {
        Self {
            adx_enabled: false,
            min_adx: 25.0,
            allow_counter_trend: true,
            htf_alignment_weight: 40.0,
            ltf_alignment_weight: 15.0,
        }
    }
}

/// Per-asset-class overrides merged into detectors and the signal policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetProfile {
    pub min_gap_pips: Option<f64>,
    pub min_confidence_score: Option<f64>,
    pub allow_counter_trend: Option<bool>,
    pub lookback: Option<usize>,
    pub sl_multiplier: Option<f64>,
    pub max_spread_pips: Option<f64>,
    pub break_even_trigger_rr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementSettings {
    pub break_even_enabled: bool,
    pub break_even_trigger_rr: f64,
    pub break_even_offset_pips: f64,
    pub partial_close_enabled: bool,
    pub partial_trigger_rr: f64,
    pub partial_close_percent: f64,
    pub trailing_enabled: bool,
    /// "fixed" or "structure".
    pub trailing_mode: String,
    pub trailing_trigger_rr: f64,
    pub trailing_distance_pips: f64,
    pub structure_buffer_pips: f64,
    pub weekend_force_close: bool,
}

impl Default for ManagementSettings {
    fn default() -> Self {
        Self {
            break_even_enabled: true,
            break_even_trigger_rr: 1.5,
            break_even_offset_pips: 2.0,
            partial_close_enabled: true,
            partial_trigger_rr: 2.0,
            partial_close_percent: 50.0,
            trailing_enabled: true,
            trailing_mode: "structure".to_string(),
            trailing_trigger_rr: 1.5,
            trailing_distance_pips: 15.0,
            structure_buffer_pips: 2.0,
            weekend_force_close: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalSettings {
    pub dir: String,
    pub hash_chain: bool,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            dir: "journal".to_string(),
            hash_chain: true,
        }
    }
}

/// The full typed configuration tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub timeframes: TimeframeSettings,
    pub symbols: Vec<SymbolSettings>,
    pub smc: SmcSettings,
    pub risk: RiskSettings,
    pub filters: FilterSettings,
    pub advanced_filters: AdvancedFilterSettings,
    pub management: ManagementSettings,
    pub journal: JournalSettings,
    pub asset_profiles: BTreeMap<String, AssetProfile>,
}

impl Settings {
    /// Structural validation beyond what serde enforces. Violations are
    /// fatal at startup (ConfigurationError).
    pub fn validate(&self) -> Result<()> {
        self.timeframes.resolve()?;
        if self.risk.risk_per_trade <= 0.0 || self.risk.risk_per_trade > 10.0 {
            bail!(
                "risk_per_trade {} out of the sane range (0, 10]",
                self.risk.risk_per_trade
            );
        }
        if self.risk.min_risk_reward < 1.0 {
            bail!("min_risk_reward {} under 1.0", self.risk.min_risk_reward);
        }
        if self.smc.swing_strength == 0 {
            bail!("swing_strength must be at least 1");
        }
        if self.smc.asian_end_hour <= self.smc.asian_start_hour {
            bail!("asian session window is empty");
        }
        for symbol in &self.symbols {
            if symbol.name.is_empty() {
                bail!("symbol entry with empty name");
            }
            if symbol.force_long_only && symbol.force_short_only {
                bail!("{}: force_long_only and force_short_only together", symbol.name);
            }
        }
        for blackout in &self.filters.news.manual_blackouts {
            if chrono_date_is_invalid(&blackout.date) {
                bail!("manual blackout {:?} has a bad date", blackout.label);
            }
        }
        Ok(())
    }

    /// Profile for an asset class, if configured.
    pub fn profile(&self, asset_class: smc_schemas::AssetClass) -> Option<&AssetProfile> {
        self.asset_profiles.get(&asset_class.to_string())
    }
}

fn chrono_date_is_invalid(date: &str) -> bool {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err()
}
