//! Today/tomorrow window in a fixed local time zone.
//!
//! All day membership checks compare local calendar dates rather than
//! elapsed time, so a window built for an arbitrary backfill date behaves
//! exactly like one built from the wall clock.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Display format for local start times, e.g. "7:05 PM".
const LOCAL_TIME_FORMAT: &str = "%-I:%M %p";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("tomorrow ({tomorrow}) is not the calendar day after today ({today})")]
    NotConsecutive { today: NaiveDate, tomorrow: NaiveDate },
    #[error("date {0} is outside the supported calendar range")]
    OutOfRange(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Day {
    Today,
    Tomorrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    tz: Tz,
    today: NaiveDate,
    tomorrow: NaiveDate,
}

impl TimeWindow {
    /// Window containing `reference`, as seen from `tz`.
    pub fn resolve(reference: DateTime<Utc>, tz: Tz) -> Result<Self, WindowError> {
        Self::for_date(reference.with_timezone(&tz).date_naive(), tz)
    }

    /// Window starting on an explicit local date (backfill).
    pub fn for_date(today: NaiveDate, tz: Tz) -> Result<Self, WindowError> {
        let tomorrow = today.succ_opt().ok_or(WindowError::OutOfRange(today))?;
        Self::from_days(today, tomorrow, tz)
    }

    /// Window from two caller-resolved days. `tomorrow` must follow `today`.
    pub fn from_days(today: NaiveDate, tomorrow: NaiveDate, tz: Tz) -> Result<Self, WindowError> {
        if today.succ_opt() != Some(tomorrow) {
            return Err(WindowError::NotConsecutive { today, tomorrow });
        }
        Ok(Self { tz, today, tomorrow })
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn tomorrow(&self) -> NaiveDate {
        self.tomorrow
    }

    /// Local midnight starting today.
    pub fn today_start(&self) -> DateTime<Tz> {
        self.midnight(self.today)
    }

    /// Local midnight starting tomorrow.
    pub fn tomorrow_start(&self) -> DateTime<Tz> {
        self.midnight(self.tomorrow)
    }

    /// `[start of today, start of the day after tomorrow)`.
    pub fn query_range(&self) -> (DateTime<Tz>, DateTime<Tz>) {
        let end = self
            .today
            .checked_add_days(Days::new(2))
            .unwrap_or(self.tomorrow);
        (self.today_start(), self.midnight(end))
    }

    /// Which day of the window `instant` falls on locally, if either.
    pub fn classify(&self, instant: DateTime<Utc>) -> Option<Day> {
        let local = instant.with_timezone(&self.tz);
        if same_day(self.today, local.date_naive()) {
            Some(Day::Today)
        } else if same_day(self.tomorrow, local.date_naive()) {
            Some(Day::Tomorrow)
        } else {
            None
        }
    }

    pub fn format_local_time(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.tz)
            .format(LOCAL_TIME_FORMAT)
            .to_string()
    }

    /// Noon on `date` in the window's zone. Used to pin events whose time
    /// has not been announced.
    pub fn local_noon(&self, date: NaiveDate) -> DateTime<Utc> {
        let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
        self.tz
            .from_local_datetime(&noon)
            .earliest()
            .unwrap_or_else(|| self.tz.from_utc_datetime(&noon))
            .with_timezone(&Utc)
    }

    fn midnight(&self, date: NaiveDate) -> DateTime<Tz> {
        let naive = date.and_time(NaiveTime::MIN);
        // Zones that skip midnight fall back to treating the wall time as UTC.
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| self.tz.from_utc_datetime(&naive))
    }
}

fn same_day(target: NaiveDate, specimen: NaiveDate) -> bool {
    target.year() == specimen.year() && target.ordinal() == specimen.ordinal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Los_Angeles;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_resolve_uses_local_date() {
        // 03:00 UTC on the 15th is still the evening of the 14th in Seattle.
        let window = TimeWindow::resolve(utc("2026-02-15T03:00:00Z"), Los_Angeles).unwrap();
        assert_eq!(window.today(), date(2026, 2, 14));
        assert_eq!(window.tomorrow(), date(2026, 2, 15));
    }

    #[test]
    fn test_today_start_is_local_midnight() {
        let window = TimeWindow::for_date(date(2026, 2, 14), Los_Angeles).unwrap();
        assert_eq!(
            window.today_start().with_timezone(&Utc),
            utc("2026-02-14T08:00:00Z")
        );
    }

    #[test]
    fn test_tomorrow_is_one_calendar_day_across_spring_forward() {
        let window = TimeWindow::resolve(utc("2026-03-08T10:00:00Z"), Los_Angeles).unwrap();
        assert_eq!(window.today(), date(2026, 3, 8));
        assert_eq!(window.tomorrow(), date(2026, 3, 9));
        let gap = window.tomorrow_start() - window.today_start();
        assert_eq!(gap.num_hours(), 23);
        assert_eq!(window.tomorrow_start().format("%H:%M").to_string(), "00:00");
    }

    #[test]
    fn test_tomorrow_is_one_calendar_day_across_fall_back() {
        let window = TimeWindow::for_date(date(2026, 11, 1), Los_Angeles).unwrap();
        let gap = window.tomorrow_start() - window.today_start();
        assert_eq!(gap.num_hours(), 25);
        assert_eq!(window.tomorrow(), date(2026, 11, 2));
    }

    #[test]
    fn test_year_boundary() {
        let window = TimeWindow::for_date(date(2025, 12, 31), Los_Angeles).unwrap();
        assert_eq!(window.tomorrow(), date(2026, 1, 1));
        assert_eq!(
            window.classify(utc("2026-01-01T20:00:00Z")),
            Some(Day::Tomorrow)
        );
    }

    #[test]
    fn test_classify_boundaries() {
        let window = TimeWindow::for_date(date(2026, 2, 14), Los_Angeles).unwrap();
        // 11:59 PM PST on the 14th
        assert_eq!(window.classify(utc("2026-02-15T07:59:00Z")), Some(Day::Today));
        // 12:00 AM PST on the 15th
        assert_eq!(
            window.classify(utc("2026-02-15T08:00:00Z")),
            Some(Day::Tomorrow)
        );
        // 12:00 AM PST on the 16th
        assert_eq!(window.classify(utc("2026-02-16T08:00:00Z")), None);
        // 11:59 PM PST on the 13th
        assert_eq!(window.classify(utc("2026-02-14T07:59:00Z")), None);
    }

    #[test]
    fn test_from_days_rejects_gap() {
        let err = TimeWindow::from_days(date(2026, 2, 14), date(2026, 2, 16), Los_Angeles)
            .unwrap_err();
        assert_eq!(
            err,
            WindowError::NotConsecutive {
                today: date(2026, 2, 14),
                tomorrow: date(2026, 2, 16),
            }
        );
        assert!(TimeWindow::from_days(date(2026, 2, 14), date(2026, 2, 15), Los_Angeles).is_ok());
    }

    #[test]
    fn test_query_range_spans_two_local_days() {
        let window = TimeWindow::for_date(date(2026, 3, 7), Los_Angeles).unwrap();
        let (start, end) = window.query_range();
        assert_eq!(start.with_timezone(&Utc), utc("2026-03-07T08:00:00Z"));
        // DST begins on the 8th, so the 9th starts at 07:00 UTC.
        assert_eq!(end.with_timezone(&Utc), utc("2026-03-09T07:00:00Z"));
    }

    #[test]
    fn test_format_local_time() {
        let window = TimeWindow::for_date(date(2026, 2, 14), Los_Angeles).unwrap();
        assert_eq!(window.format_local_time(utc("2026-02-15T04:00:00Z")), "8:00 PM");
        assert_eq!(window.format_local_time(utc("2026-02-14T17:05:00Z")), "9:05 AM");
    }

    #[test]
    fn test_local_noon() {
        let window = TimeWindow::for_date(date(2026, 2, 14), Los_Angeles).unwrap();
        assert_eq!(window.local_noon(date(2026, 2, 14)), utc("2026-02-14T20:00:00Z"));
    }
}
