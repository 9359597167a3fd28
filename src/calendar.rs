//! Building-local civil time.
//!
//! Bookings are made in the building's wall-clock time, which is modelled as a
//! fixed offset from UTC. Everything that turns a calendar date into an
//! instant (or back) goes through [`Calendar`].

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveDateTime, Offset};

use crate::model::{HOUR_MS, KitchenSlot, Ms};

/// Current wall-clock instant.
pub fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

/// Whole hours from `now` until `instant`, truncated toward zero.
pub fn hours_until(instant: Ms, now: Ms) -> i64 {
    (instant - now) / HOUR_MS
}

/// Inclusive `[monday 00:00:00, sunday 23:59:59]` window of one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub monday: NaiveDate,
    pub sunday: NaiveDate,
    pub start: Ms,
    pub end: Ms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar {
    pub fn utc() -> Self {
        Self {
            offset: chrono::Utc.fix(),
        }
    }

    /// `None` when the offset is a day or more away from UTC.
    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Instant of `date` at `hour:00:00` local time.
    pub fn instant_at(&self, date: NaiveDate, hour: u32) -> Ms {
        self.local_instant(date, hour.min(23), 0, 0)
    }

    /// Instant the given kitchen slot starts on `date`.
    pub fn slot_start(&self, date: NaiveDate, slot: KitchenSlot) -> Ms {
        self.instant_at(date, slot.start_hour())
    }

    fn local_instant(&self, date: NaiveDate, hour: u32, min: u32, sec: u32) -> Ms {
        // A fixed offset has no gaps or folds: local = utc + offset.
        let local: NaiveDateTime = date
            .and_hms_opt(hour, min, sec)
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::default()));
        local.and_utc().timestamp_millis() - i64::from(self.offset.local_minus_utc()) * 1000
    }

    pub fn to_local(&self, instant: Ms) -> Option<DateTime<FixedOffset>> {
        DateTime::from_timestamp_millis(instant).map(|dt| dt.with_timezone(&self.offset))
    }

    /// Local calendar date containing `instant`.
    pub fn date_of(&self, instant: Ms) -> NaiveDate {
        self.to_local(instant)
            .map(|dt| dt.date_naive())
            .unwrap_or(NaiveDate::MIN)
    }

    /// Monday of the week containing `date`.
    pub fn monday_of(date: NaiveDate) -> NaiveDate {
        let back = u64::from(date.weekday().num_days_from_monday());
        date.checked_sub_days(Days::new(back)).unwrap_or(date)
    }

    /// Monday-to-Sunday window of the week containing `date`.
    pub fn week_of(&self, date: NaiveDate) -> WeekWindow {
        let monday = Self::monday_of(date);
        let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(monday);
        WeekWindow {
            monday,
            sunday,
            start: self.local_instant(monday, 0, 0, 0),
            end: self.local_instant(sunday, 23, 59, 59),
        }
    }

    /// Week window containing `instant`.
    pub fn week_containing(&self, instant: Ms) -> WeekWindow {
        self.week_of(self.date_of(instant))
    }

    /// Local midnight at the start of `date`.
    pub fn start_of_day(&self, date: NaiveDate) -> Ms {
        self.local_instant(date, 0, 0, 0)
    }
}
