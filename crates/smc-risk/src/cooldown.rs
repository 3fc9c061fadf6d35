use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// Per-symbol last-order timestamps, persisted across restarts.
///
/// The on-disk format is one JSON object `{symbol: unix_seconds}`. Writes
/// go through a temp file and an atomic rename so a crash mid-write can
/// never leave a torn ledger behind.
#[derive(Debug)]
pub struct CooldownLedger {
    path: PathBuf,
    last_order: BTreeMap<String, i64>,
}

impl CooldownLedger {
    /// Load the ledger, tolerating a missing file (fresh start) but not a
    /// corrupt one.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let last_order = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parse cooldown ledger {path:?}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e).with_context(|| format!("read cooldown ledger {path:?}")),
        };
        Ok(Self { path, last_order })
    }

    /// Seconds remaining before `symbol` may trade again; `None` when the
    /// cooldown has elapsed. A cooldown of exactly `cooldown_seconds`
    /// elapsed unblocks.
    pub fn remaining(&self, symbol: &str, now_unix: i64, cooldown_seconds: i64) -> Option<i64> {
        let last = *self.last_order.get(symbol)?;
        let elapsed = now_unix - last;
        if elapsed >= cooldown_seconds {
            None
        } else {
            Some(cooldown_seconds - elapsed)
        }
    }

    /// Record an order and persist. Persistence failure is logged, not
    /// fatal: losing a cooldown stamp fails open for one restart, which
    /// the per-cycle duplicate guard still covers.
    pub fn record(&mut self, symbol: &str, now_unix: i64) {
        self.last_order.insert(symbol.to_string(), now_unix);
        if let Err(e) = self.persist() {
            warn!(symbol, error = %e, "cooldown ledger persist failed");
        }
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {parent:?}"))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(&self.last_order)?;
        fs::write(&tmp, raw).with_context(|| format!("write {tmp:?}"))?;
        fs::rename(&tmp, &self.path).with_context(|| format!("rename {tmp:?}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ledger_has_no_cooldowns() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CooldownLedger::load(dir.path().join("last_trades.json")).unwrap();
        assert_eq!(ledger.remaining("EURUSD", 1_000_000, 60), None);
    }

    #[test]
    fn cooldown_blocks_then_unblocks_at_exact_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = CooldownLedger::load(dir.path().join("last_trades.json")).unwrap();
        ledger.record("EURUSD", 1_000_000);

        assert_eq!(ledger.remaining("EURUSD", 1_000_030, 60), Some(30));
        // Exactly at the cooldown boundary the next order unblocks.
        assert_eq!(ledger.remaining("EURUSD", 1_000_060, 60), None);
    }

    #[test]
    fn ledger_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_trades.json");
        {
            let mut ledger = CooldownLedger::load(&path).unwrap();
            ledger.record("XAUUSD", 1_700_000_000);
        }
        let ledger = CooldownLedger::load(&path).unwrap();
        assert_eq!(ledger.remaining("XAUUSD", 1_700_000_010, 60), Some(50));
        assert_eq!(ledger.remaining("EURUSD", 1_700_000_010, 60), None);
    }

    #[test]
    fn corrupt_ledger_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_trades.json");
        fs::write(&path, "not json").unwrap();
        assert!(CooldownLedger::load(&path).is_err());
    }
}
