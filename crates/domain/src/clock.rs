use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::RwLock;

/// Source of current time and "today" truncation, swappable for tests.
///
/// All time comparisons and window math in the engine go through this trait
/// rather than calling `Utc::now()` directly.
pub trait Clock: Send + Sync {
    /// Wall-clock time in the configured zone, millisecond truncated.
    fn now(&self) -> DateTime<Utc>;

    /// `now()` truncated to the 24h boundary of the configured zone.
    fn today(&self) -> DateTime<Utc>;
}

/// Real clock, backed by a configured IANA time zone used only for the
/// `today()` truncation boundary; `now()` is always returned in UTC.
pub struct SystemClock {
    zone: Tz,
}

impl SystemClock {
    pub fn new(zone_name: &str) -> Result<Self, chrono_tz::ParseError> {
        let zone: Tz = zone_name.parse()?;
        Ok(Self { zone })
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        truncate_millis(Utc::now())
    }

    fn today(&self) -> DateTime<Utc> {
        let local = Utc::now().with_timezone(&self.zone);
        let midnight = local.date_naive().and_hms_opt(0, 0, 0).unwrap();
        midnight
            .and_local_timezone(self.zone)
            .single()
            .unwrap_or_else(|| local)
            .with_timezone(&Utc)
    }
}

/// Fixed-time test double. `now()`/`today()` both return the configured
/// instant until `set_fixed_time` is called again.
pub struct FixedClock {
    fixed: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(fixed: DateTime<Utc>) -> Self {
        Self {
            fixed: RwLock::new(truncate_millis(fixed)),
        }
    }

    pub fn set_fixed_time(&self, t: DateTime<Utc>) {
        *self.fixed.write().unwrap() = truncate_millis(t);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.fixed.read().unwrap()
    }

    fn today(&self) -> DateTime<Utc> {
        self.now().date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc()
    }
}

fn truncate_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::nanoseconds(t.timestamp_subsec_nanos() as i64 % 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_returns_set_time() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        let clock = FixedClock::new(t);
        assert_eq!(clock.now(), t);
        clock.set_fixed_time(t + Duration::days(1));
        assert_eq!(clock.now(), t + Duration::days(1));
    }

    #[test]
    fn fixed_clock_today_truncates_to_midnight() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        let clock = FixedClock::new(t);
        assert_eq!(clock.today(), Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn system_clock_rejects_unknown_zone() {
        assert!(SystemClock::new("Not/AZone").is_err());
    }
}
