use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use smc_schemas::{normalize_symbol, split_currencies};

/// Verdict from the news boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsVerdict {
    pub allowed: bool,
    pub reason: String,
}

impl NewsVerdict {
    pub fn clear() -> Self {
        Self {
            allowed: true,
            reason: "no blocking event".to_string(),
        }
    }
}

/// Narrow boundary to the external news-calendar collaborator. The core
/// never fetches calendars; it only asks these two questions.
pub trait NewsFilter: Send + Sync {
    /// May `symbol` open a new position within the next `horizon_minutes`?
    fn allowed(&self, symbol: &str, now: DateTime<Utc>, horizon_minutes: i64) -> NewsVerdict;

    /// Should open positions on `symbol` be closed because a high-impact
    /// event lands within `exit_minutes`?
    fn emergency_exit(&self, symbol: &str, now: DateTime<Utc>, exit_minutes: i64) -> bool;
}

/// Default implementation when no calendar provider is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysClear;

impl NewsFilter for AlwaysClear {
    fn allowed(&self, _symbol: &str, _now: DateTime<Utc>, _horizon: i64) -> NewsVerdict {
        NewsVerdict::clear()
    }

    fn emergency_exit(&self, _symbol: &str, _now: DateTime<Utc>, _exit_minutes: i64) -> bool {
        false
    }
}

/// One hard-coded blackout: a date, an inclusive UTC hour range, and the
/// currencies it suspends (BoJ decision days suspending JPY pairs, etc.).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutWindow {
    pub label: String,
    pub date: NaiveDate,
    pub start_hour: u32,
    pub end_hour: u32,
    /// Currency codes or full symbol names.
    pub currencies: Vec<String>,
}

impl BlackoutWindow {
    fn matches(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        if now.date_naive() != self.date {
            return false;
        }
        let hour = now.hour();
        if hour < self.start_hour || hour > self.end_hour {
            return false;
        }
        let norm = normalize_symbol(symbol);
        let (base, quote) = split_currencies(symbol);
        self.currencies.iter().any(|c| {
            let c = c.to_ascii_uppercase();
            c == norm || c == base || c == quote
        })
    }
}

/// Manual blackout calendar: suspends specific symbols over hard-coded
/// date+hour ranges. Doubles as the offline stand-in for the real news
/// provider in paper mode and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlackoutCalendar {
    pub windows: Vec<BlackoutWindow>,
}

impl BlackoutCalendar {
    pub fn new(windows: Vec<BlackoutWindow>) -> Self {
        Self { windows }
    }

    /// The window suspending `symbol` right now, if any.
    pub fn active_window(&self, symbol: &str, now: DateTime<Utc>) -> Option<&BlackoutWindow> {
        self.windows.iter().find(|w| w.matches(symbol, now))
    }
}

impl NewsFilter for BlackoutCalendar {
    fn allowed(&self, symbol: &str, now: DateTime<Utc>, _horizon: i64) -> NewsVerdict {
        match self.active_window(symbol, now) {
            Some(w) => NewsVerdict {
                allowed: false,
                reason: w.label.clone(),
            },
            None => NewsVerdict::clear(),
        }
    }

    fn emergency_exit(&self, symbol: &str, now: DateTime<Utc>, exit_minutes: i64) -> bool {
        // A window starting within the exit horizon counts as imminent.
        let horizon_end = now + chrono::Duration::minutes(exit_minutes);
        self.active_window(symbol, now).is_some() || self.active_window(symbol, horizon_end).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn boj_window() -> BlackoutCalendar {
        BlackoutCalendar::new(vec![BlackoutWindow {
            label: "BoJ rate decision".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 19).unwrap(),
            start_hour: 0,
            end_hour: 14,
            currencies: vec!["JPY".to_string()],
        }])
    }

    #[test]
    fn jpy_pairs_suspended_during_window() {
        let cal = boj_window();
        let during = Utc.with_ymd_and_hms(2026, 3, 19, 9, 0, 0).unwrap();
        let verdict = cal.allowed("USDJPYm", during, 30);
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, "BoJ rate decision");
        assert!(cal.allowed("GBPJPY", during, 30).allowed == false);
    }

    #[test]
    fn unrelated_symbols_and_hours_pass() {
        let cal = boj_window();
        let during = Utc.with_ymd_and_hms(2026, 3, 19, 9, 0, 0).unwrap();
        assert!(cal.allowed("EURUSD", during, 30).allowed);

        let after = Utc.with_ymd_and_hms(2026, 3, 19, 15, 0, 0).unwrap();
        assert!(cal.allowed("USDJPY", after, 30).allowed);

        let other_day = Utc.with_ymd_and_hms(2026, 3, 20, 9, 0, 0).unwrap();
        assert!(cal.allowed("USDJPY", other_day, 30).allowed);
    }

    #[test]
    fn emergency_exit_fires_ahead_of_the_window() {
        let cal = boj_window();
        // 23:40 the evening before, window opens at 00:00.
        let before = Utc.with_ymd_and_hms(2026, 3, 18, 23, 40, 0).unwrap();
        assert!(cal.emergency_exit("USDJPY", before, 30));
        assert!(!cal.emergency_exit("EURUSD", before, 30));
    }

    #[test]
    fn always_clear_never_blocks() {
        let f = AlwaysClear;
        let now = Utc::now();
        assert!(f.allowed("EURUSD", now, 60).allowed);
        assert!(!f.emergency_exit("EURUSD", now, 30));
    }
}
