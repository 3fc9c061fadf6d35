use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Trading session buckets, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Asian,
    LondonOpen,
    London,
    NyOpen,
    NewYork,
    LondonClose,
    OffHours,
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionType::Asian => "asian",
            SessionType::LondonOpen => "london_open",
            SessionType::London => "london",
            SessionType::NyOpen => "ny_open",
            SessionType::NewYork => "new_york",
            SessionType::LondonClose => "london_close",
            SessionType::OffHours => "off_hours",
        };
        f.write_str(s)
    }
}

/// Session context for one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillzoneInfo {
    pub session: SessionType,
    /// Inside a window with institutional participation.
    pub is_killzone: bool,
    /// Killzone discipline verdict for a non-crypto symbol (crypto is the
    /// caller's exception, not this module's).
    pub can_trade: bool,
}

/// Classify `now` (UTC, minus the broker's offset) against the killzone
/// table: London Open 07-10, London 10-16, NY Open 12-15, NY 15-21,
/// London Close 15-17. Overlaps resolve to the more specific open/close
/// windows. With killzones disabled, everything is tradable.
pub fn killzone_info(now: DateTime<Utc>, timezone_offset_hours: i64, enabled: bool) -> KillzoneInfo {
    let utc = now - Duration::hours(timezone_offset_hours);
    let h = utc.hour();

    let session = if h < 7 {
        SessionType::Asian
    } else if h < 10 {
        SessionType::LondonOpen
    } else if h < 12 {
        SessionType::London
    } else if h < 15 {
        SessionType::NyOpen
    } else if h < 17 {
        SessionType::LondonClose
    } else if h < 21 {
        SessionType::NewYork
    } else {
        SessionType::OffHours
    };

    let is_killzone = !matches!(session, SessionType::Asian | SessionType::OffHours);
    KillzoneInfo {
        session,
        is_killzone,
        can_trade: !enabled || is_killzone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 3, h, 30, 0).unwrap()
    }

    #[test]
    fn session_table_matches_windows() {
        assert_eq!(killzone_info(at(3), 0, true).session, SessionType::Asian);
        assert_eq!(killzone_info(at(8), 0, true).session, SessionType::LondonOpen);
        assert_eq!(killzone_info(at(11), 0, true).session, SessionType::London);
        assert_eq!(killzone_info(at(13), 0, true).session, SessionType::NyOpen);
        assert_eq!(
            killzone_info(at(16), 0, true).session,
            SessionType::LondonClose
        );
        assert_eq!(killzone_info(at(19), 0, true).session, SessionType::NewYork);
        assert_eq!(killzone_info(at(22), 0, true).session, SessionType::OffHours);
    }

    #[test]
    fn asian_and_off_hours_are_not_killzones() {
        assert!(!killzone_info(at(3), 0, true).can_trade);
        assert!(!killzone_info(at(22), 0, true).can_trade);
        assert!(killzone_info(at(13), 0, true).can_trade);
    }

    #[test]
    fn disabled_filter_always_trades() {
        assert!(killzone_info(at(3), 0, false).can_trade);
    }

    #[test]
    fn broker_offset_shifts_the_clock() {
        // Broker runs 2 hours ahead of UTC: broker 09:30 is UTC 07:30.
        let info = killzone_info(at(9), 2, true);
        assert_eq!(info.session, SessionType::LondonOpen);
    }
}
