//! Tick filters applied by the text loader before a row reaches the in-memory feed.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};

/// External collaborator seam: deciding whether a loaded tick should be kept.
pub trait TickFilter {
    fn include(&self, datetime: DateTime<Utc>) -> bool;
}

/// Keeps ticks whose datetime falls within `[from, to]` inclusive.
#[derive(Debug, Copy, Clone)]
pub struct DateRangeFilter {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl DateRangeFilter {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }
}

impl TickFilter for DateRangeFilter {
    fn include(&self, datetime: DateTime<Utc>) -> bool {
        if let Some(from) = self.from {
            if datetime < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if datetime > to {
                return false;
            }
        }
        true
    }
}

/// US-equities regular trading hours: Monday-Friday, 09:30-16:00, compared against the
/// tick's naive wall-clock time. Like the reference system this performs no timezone
/// conversion of its own; callers are expected to feed it datetimes already expressed in
/// US/Eastern wall-clock time.
#[derive(Debug, Copy, Clone)]
pub struct UsEquitiesRegularTradingHours;

impl TickFilter for UsEquitiesRegularTradingHours {
    fn include(&self, datetime: DateTime<Utc>) -> bool {
        if matches!(datetime.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let time = datetime.time();
        let open = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let close = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        time >= open && time <= close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_range_filter_excludes_outside_bounds() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let filter = DateRangeFilter::new(Some(from), Some(to));

        assert!(filter.include(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()));
        assert!(!filter.include(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn rth_filter_excludes_weekends_and_after_hours() {
        let filter = UsEquitiesRegularTradingHours;

        // Monday 10:00 - inside RTH.
        assert!(filter.include(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()));
        // Saturday.
        assert!(!filter.include(Utc.with_ymd_and_hms(2024, 1, 6, 10, 0, 0).unwrap()));
        // Monday 17:00 - after close.
        assert!(!filter.include(Utc.with_ymd_and_hms(2024, 1, 1, 17, 0, 0).unwrap()));
    }
}
