use crate::error::EconomyError;
use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};

pub const DAY_MS: i64 = 86_400_000;

/// The engine's notion of "now" together with the device's UTC offset.
///
/// Local days are `[midnight, midnight + 24h)` in that offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    now: DateTime<FixedOffset>,
}

impl Clock {
    pub fn fixed(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    pub fn system() -> Self {
        let now = Local::now();
        Self {
            now: now.with_timezone(now.offset()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now.with_timezone(&Utc)
    }

    pub fn offset(&self) -> FixedOffset {
        *self.now.offset()
    }

    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset())
    }

    pub fn day_window(&self, at: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), EconomyError> {
        let midnight = self.local(at).date_naive().and_time(NaiveTime::MIN);
        let start = self
            .offset()
            .from_local_datetime(&midnight)
            .single()
            .ok_or_else(|| EconomyError::usage(format!("Invalid local midnight for {}", at)))?
            .with_timezone(&Utc);
        Ok((start, start + Duration::hours(24)))
    }

    pub fn today(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), EconomyError> {
        self.day_window(self.now())
    }
}

pub fn parse_timestamp(ts: &str, label: &str) -> Result<DateTime<FixedOffset>, EconomyError> {
    let t = ts.trim();
    if t.is_empty() {
        return Err(EconomyError::usage(format!("Invalid {}: (empty)", label)));
    }
    DateTime::parse_from_rfc3339(t)
        .map_err(|_| EconomyError::usage(format!("Invalid {}: {}", label, ts)))
}

/// Accepts `YYYY-MM-DD` (local midnight in the clock's offset) or an RFC3339 timestamp.
pub fn parse_boundary(clock: &Clock, s: &str, label: &str) -> Result<DateTime<Utc>, EconomyError> {
    let t = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        let midnight = date.and_time(NaiveTime::MIN);
        return clock
            .offset()
            .from_local_datetime(&midnight)
            .single()
            .map(|d| d.with_timezone(&Utc))
            .ok_or_else(|| EconomyError::usage(format!("Invalid {}: {}", label, s)));
    }
    Ok(parse_timestamp(t, label)?.with_timezone(&Utc))
}

pub fn format_local(clock: &Clock, at: DateTime<Utc>) -> String {
    clock.local(at).format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(s: &str) -> Clock {
        Clock::fixed(parse_timestamp(s, "now").unwrap())
    }

    #[test]
    fn today_starts_at_local_midnight() {
        let c = clock("2026-03-10T01:30:00+09:00");
        let (start, end) = c.today().unwrap();
        assert_eq!(start.to_rfc3339(), "2026-03-09T15:00:00+00:00");
        assert_eq!(end - start, Duration::hours(24));
    }

    #[test]
    fn window_uses_clock_offset_not_utc_day() {
        let c = clock("2026-03-10T23:30:00-05:00");
        let (start, _) = c.today().unwrap();
        assert_eq!(c.local(start).format("%Y-%m-%d %H:%M").to_string(), "2026-03-10 00:00");
    }

    #[test]
    fn timestamp_parse_validation() {
        assert!(parse_timestamp("2026-01-31T09:00:00Z", "at").is_ok());
        assert!(parse_timestamp("2026-01-31", "at").is_err());
        assert!(parse_timestamp("  ", "at").is_err());
    }

    #[test]
    fn boundaries_accept_dates_in_clock_offset() {
        let c = clock("2026-03-10T12:00:00+02:00");
        let from = parse_boundary(&c, "2026-03-01", "from").unwrap();
        assert_eq!(from.to_rfc3339(), "2026-02-28T22:00:00+00:00");
        let ts = parse_boundary(&c, "2026-03-01T08:00:00Z", "from").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-03-01T08:00:00+00:00");
        assert!(parse_boundary(&c, "March", "from").is_err());
    }
}
