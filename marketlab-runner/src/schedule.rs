//! Daily scheduling helpers (local wall clock).

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDateTime, NaiveTime};

pub const DEFAULT_RUN_TIME: &str = "17:30";

/// Parse `HH:MM` (24h).
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| anyhow!("invalid time {s:?} (expected HH:MM): {e}"))
}

/// Next occurrence of `at` strictly after `now`.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// How long to sleep from `now` until the next run.
pub fn wait_until_next(now: NaiveDateTime, at: NaiveTime) -> std::time::Duration {
    (next_run_after(now, at) - now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn later_today() {
        let t = parse_hhmm("17:30").unwrap();
        assert_eq!(next_run_after(at("2024-05-17 09:00"), t), at("2024-05-17 17:30"));
    }

    #[test]
    fn exact_time_rolls_to_tomorrow() {
        let t = parse_hhmm("17:30").unwrap();
        assert_eq!(next_run_after(at("2024-05-17 17:30"), t), at("2024-05-18 17:30"));
        assert_eq!(next_run_after(at("2024-12-31 23:00"), t), at("2025-01-01 17:30"));
    }

    #[test]
    fn wait_is_positive() {
        let t = parse_hhmm("00:00").unwrap();
        assert_eq!(
            wait_until_next(at("2024-05-17 23:00"), t),
            std::time::Duration::from_secs(3600)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_hhmm("25:00").is_err());
        assert!(parse_hhmm("5pm").is_err());
    }
}
