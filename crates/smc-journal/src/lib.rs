//! Journal and telemetry sink.
//!
//! Two append-only structured streams: one decision record per analysis
//! cycle per symbol, and one trade record per order open and per close.
//! Events are JSON Lines with canonical (sorted-key) compact encoding and
//! an optional SHA-256 hash chain for tamper evidence; trade events are
//! additionally mirrored to CSV for spreadsheet-side analysis.
//!
//! The sink is side-effect-only: the engine never reads these files back.

mod records;
mod writer;

use std::path::Path;

use anyhow::Result;
use uuid::Uuid;

pub use records::{CycleOutcome, DecisionRecord, TradeCloseRecord, TradeOpenRecord};
pub use writer::{verify_hash_chain, JsonlWriter, VerifyResult};

/// The engine's journal: decisions and trades, each on its own stream.
pub struct Journal {
    run_id: Uuid,
    decisions: JsonlWriter,
    trades: JsonlWriter,
    trades_csv: csv::Writer<std::fs::File>,
}

impl Journal {
    /// Open (or create) the journal streams under `dir`.
    pub fn open(dir: impl AsRef<Path>, run_id: Uuid, hash_chain: bool) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let decisions = JsonlWriter::new(dir.join("decisions.jsonl"), hash_chain)?;
        let trades = JsonlWriter::new(dir.join("trades.jsonl"), hash_chain)?;

        let csv_path = dir.join("trades.csv");
        let write_header = !csv_path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)?;
        let mut trades_csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if write_header {
            trades_csv.write_record(TradeOpenRecord::CSV_HEADER)?;
            trades_csv.flush()?;
        }

        Ok(Self {
            run_id,
            decisions,
            trades,
            trades_csv,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// One record per analysis cycle per symbol, taken or not.
    pub fn record_decision(&mut self, record: &DecisionRecord) -> Result<()> {
        self.decisions
            .append(self.run_id, "decisions", "cycle_decision", record)?;
        Ok(())
    }

    pub fn record_open(&mut self, record: &TradeOpenRecord) -> Result<()> {
        self.trades.append(self.run_id, "trades", "open", record)?;
        self.trades_csv.write_record(record.csv_row())?;
        self.trades_csv.flush()?;
        Ok(())
    }

    pub fn record_close(&mut self, record: &TradeCloseRecord) -> Result<()> {
        self.trades.append(self.run_id, "trades", "close", record)?;
        self.trades_csv.write_record(record.csv_row())?;
        self.trades_csv.flush()?;
        Ok(())
    }
}
