//! Shared runtime state between the supervisor thread and the HTTP
//! handlers. Everything here is `Clone`-able via `Arc`; critical sections
//! are short enough for plain std locks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time snapshot of the engine, returned by `GET /v1/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub run_id: Uuid,
    pub mode: String,
    /// "idle" | "running" | "halted"
    pub state: String,
    pub symbols: Vec<String>,
    pub cycles_completed: u64,
    pub signals_taken: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub daily_realized_pnl: f64,
}

impl StatusSnapshot {
    pub fn idle(run_id: Uuid, mode: String, symbols: Vec<String>) -> Self {
        Self {
            run_id,
            mode,
            state: "idle".to_string(),
            symbols,
            cycles_completed: 0,
            signals_taken: 0,
            last_cycle_at: None,
            daily_realized_pnl: 0.0,
        }
    }
}

/// Handle shared across the supervisor and all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Process-wide kill switch, checked at the top of every cycle.
    halt: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(status: StatusSnapshot) -> Self {
        Self {
            status: Arc::new(RwLock::new(status)),
            halt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn halt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.halt)
    }

    pub fn is_halted(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    pub fn request_halt(&self) {
        self.halt.store(true, Ordering::SeqCst);
        if let Ok(mut status) = self.status.write() {
            status.state = "halted".to_string();
        }
    }
}
