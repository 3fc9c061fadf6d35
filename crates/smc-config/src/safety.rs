use smc_schemas::AccountInfo;

use crate::settings::{Mode, Settings};

/// A startup safety violation. Fatal: the process must exit with the
/// safety exit code rather than trade.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyViolation {
    AccountNotWhitelisted { login: u64 },
    TradingDisabled,
    AlgoTradingDisabled,
    RiskAboveHardCap { configured: f64, cap: f64 },
    LiveNotConfirmed,
}

impl std::fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyViolation::AccountNotWhitelisted { login } => {
                write!(f, "account {login} is not whitelisted for this engine")
            }
            SafetyViolation::TradingDisabled => f.write_str("account has trading disabled"),
            SafetyViolation::AlgoTradingDisabled => {
                f.write_str("account has algorithmic trading disabled")
            }
            SafetyViolation::RiskAboveHardCap { configured, cap } => {
                write!(f, "risk_per_trade {configured}% over the hard cap {cap}%")
            }
            SafetyViolation::LiveNotConfirmed => {
                f.write_str("live mode requires CONFIRM_LIVE_MODE=true")
            }
        }
    }
}

impl std::error::Error for SafetyViolation {}

/// Pre-flight checks before the first cycle. All of them must pass in
/// live mode; paper and backtest skip the account-level checks.
#[derive(Debug, Clone)]
pub struct SafetyGuard {
    /// Accounts allowed to run live. Empty disables the whitelist.
    pub whitelisted_accounts: Vec<u64>,
    /// Absolute per-trade risk ceiling, percent.
    pub risk_hard_cap_percent: f64,
}

impl Default for SafetyGuard {
    fn default() -> Self {
        Self {
            whitelisted_accounts: Vec::new(),
            risk_hard_cap_percent: 2.0,
        }
    }
}

impl SafetyGuard {
    /// `live_confirmed` is the presence of `CONFIRM_LIVE_MODE=true` in the
    /// environment; the caller reads it so this stays testable.
    pub fn check(
        &self,
        settings: &Settings,
        account: &AccountInfo,
        live_confirmed: bool,
    ) -> Result<(), SafetyViolation> {
        if settings.risk.risk_per_trade > self.risk_hard_cap_percent {
            return Err(SafetyViolation::RiskAboveHardCap {
                configured: settings.risk.risk_per_trade,
                cap: self.risk_hard_cap_percent,
            });
        }

        if settings.general.mode != Mode::Live {
            return Ok(());
        }

        if !live_confirmed {
            return Err(SafetyViolation::LiveNotConfirmed);
        }
        if !self.whitelisted_accounts.is_empty()
            && !self.whitelisted_accounts.contains(&account.login)
        {
            return Err(SafetyViolation::AccountNotWhitelisted {
                login: account.login,
            });
        }
        if !account.trade_allowed {
            return Err(SafetyViolation::TradingDisabled);
        }
        if !account.trade_algo_allowed {
            return Err(SafetyViolation::AlgoTradingDisabled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(login: u64) -> AccountInfo {
        AccountInfo {
            login,
            balance: 10_000.0,
            equity: 10_000.0,
            free_margin: 9_000.0,
            leverage: 100,
            trade_allowed: true,
            trade_algo_allowed: true,
            currency: "USD".to_string(),
        }
    }

    fn live_settings() -> Settings {
        let mut s = Settings::default();
        s.general.mode = Mode::Live;
        s
    }

    #[test]
    fn paper_mode_skips_account_checks() {
        let guard = SafetyGuard::default();
        let mut acct = account(1);
        acct.trade_allowed = false;
        assert!(guard.check(&Settings::default(), &acct, false).is_ok());
    }

    #[test]
    fn live_requires_confirmation() {
        let guard = SafetyGuard::default();
        let err = guard.check(&live_settings(), &account(1), false).unwrap_err();
        assert_eq!(err, SafetyViolation::LiveNotConfirmed);
        assert!(guard.check(&live_settings(), &account(1), true).is_ok());
    }

    #[test]
    fn whitelist_blocks_unknown_accounts() {
        let guard = SafetyGuard {
            whitelisted_accounts: vec![42],
            ..SafetyGuard::default()
        };
        let err = guard.check(&live_settings(), &account(7), true).unwrap_err();
        assert!(matches!(err, SafetyViolation::AccountNotWhitelisted { login: 7 }));
        assert!(guard.check(&live_settings(), &account(42), true).is_ok());
    }

    #[test]
    fn broker_side_flags_are_enforced() {
        let guard = SafetyGuard::default();
        let mut acct = account(1);
        acct.trade_algo_allowed = false;
        let err = guard.check(&live_settings(), &acct, true).unwrap_err();
        assert_eq!(err, SafetyViolation::AlgoTradingDisabled);
    }

    #[test]
    fn risk_hard_cap_applies_in_every_mode() {
        let guard = SafetyGuard::default();
        let mut s = Settings::default();
        s.risk.risk_per_trade = 5.0;
        let err = guard.check(&s, &account(1), false).unwrap_err();
        assert!(matches!(err, SafetyViolation::RiskAboveHardCap { .. }));
    }
}
