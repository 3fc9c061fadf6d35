//! Multi-timeframe analysis layer.
//!
//! Composes the pure detectors from `smc-detect` over the three configured
//! timeframes into one [`MarketSnapshot`] per symbol per cycle, including
//! the session/killzone read, SMT divergence, AMD and Silver Bullet phases,
//! and the combined directional bias the state machine and scoring engine
//! consume.

mod amd;
mod analyzer;
mod killzones;
mod silver_bullet;
mod smt;
mod snapshot;

pub use amd::{detect_amd, AmdPhase, AmdView};
pub use analyzer::{Analyzer, AnalyzerConfig, FrameBundle, StrategyToggles};
pub use killzones::{killzone_info, KillzoneInfo, SessionType};
pub use silver_bullet::{silver_bullet_view, SilverBulletPhase, SilverBulletView};
pub use smt::{smt_divergence, SmtView};
pub use snapshot::{ConfirmedSweep, MarketSnapshot, SweepSource};
