use super::catalog::SlotCatalog;
use crate::clock::TimeWindow;
use crate::config::SchedulingConfig;
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

/// Why a catalog slot cannot be booked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unavailable {
    /// Overlaps a blocking session
    Booked,
    /// Same day, inside the scheduling buffer
    TooSoon,
    /// Already started
    Past,
}

/// Availability of one catalog slot on one day
#[derive(Debug, Clone, Serialize)]
pub struct SlotAvailability {
    pub time: String,
    pub display_time: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Unavailable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub slots: Vec<SlotAvailability>,
    pub booked_count: usize,
    pub available_count: usize,
}

impl DayAvailability {
    pub fn slot(&self, time: &str) -> Option<&SlotAvailability> {
        self.slots.iter().find(|s| s.time == time)
    }
}

/// Computes free/booked slots against the single-capacity interviewer
pub struct AvailabilityEngine {
    catalog: SlotCatalog,
    same_day_buffer: Duration,
    skip_weekends: bool,
}

impl AvailabilityEngine {
    pub fn new(catalog: SlotCatalog, same_day_buffer: Duration, skip_weekends: bool) -> Self {
        Self {
            catalog,
            same_day_buffer,
            skip_weekends,
        }
    }

    pub fn from_config(config: &SchedulingConfig) -> EngineResult<Self> {
        Ok(Self::new(
            SlotCatalog::from_config(config)?,
            Duration::minutes(i64::from(config.same_day_buffer_minutes)),
            config.skip_weekends,
        ))
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    /// The whole wall-clock day `date` as an absolute window
    pub fn day_window(&self, date: NaiveDate) -> TimeWindow {
        let start = self.catalog.slot_start(date, NaiveTime::default());
        TimeWindow::new(start, days_after(start, 1))
    }

    /// `days` consecutive wall-clock days starting at `first`
    pub fn range_window(&self, first: NaiveDate, days: u32) -> TimeWindow {
        let start = self.catalog.slot_start(first, NaiveTime::default());
        TimeWindow::new(start, days_after(start, i64::from(days.max(1))))
    }

    /// Availability flag for every catalog time on `date`
    pub fn day(&self, date: NaiveDate, booked: &[TimeWindow], now: DateTime<Utc>) -> DayAvailability {
        let today = self.catalog.local_date(now);
        let earliest_same_day = now + self.same_day_buffer;
        let day_window = self.day_window(date);

        let slots: Vec<SlotAvailability> = self
            .catalog
            .times()
            .iter()
            .map(|time| {
                let window = self.catalog.slot_window(date, time.time());

                let reason = if booked.iter().any(|b| window.overlaps(b)) {
                    Some(Unavailable::Booked)
                } else if date < today || window.start <= now {
                    Some(Unavailable::Past)
                } else if date == today && window.start < earliest_same_day {
                    Some(Unavailable::TooSoon)
                } else {
                    None
                };

                SlotAvailability {
                    time: time.value(),
                    display_time: time.display(),
                    starts_at: window.start,
                    duration_minutes: self.catalog.duration_minutes(),
                    available: reason.is_none(),
                    reason,
                }
            })
            .collect();

        let booked_count = booked.iter().filter(|b| b.overlaps(&day_window)).count();
        let available_count = slots.iter().filter(|s| s.available).count();

        DayAvailability {
            date,
            slots,
            booked_count,
            available_count,
        }
    }

    /// Availability for `days` consecutive days from `first`, grouped by date
    pub fn days(
        &self,
        first: NaiveDate,
        days: u32,
        booked: &[TimeWindow],
        now: DateTime<Utc>,
    ) -> BTreeMap<NaiveDate, DayAvailability> {
        first
            .iter_days()
            .take(days as usize)
            .filter(|date| !(self.skip_weekends && is_weekend(*date)))
            .map(|date| (date, self.day(date, booked, now)))
            .collect()
    }

    /// Booked windows overlapping `window`
    pub fn conflicts(window: &TimeWindow, booked: &[TimeWindow]) -> Vec<TimeWindow> {
        booked.iter().filter(|b| window.overlaps(b)).copied().collect()
    }

    /// Resolve a requested (date, time) into a bookable window.
    ///
    /// Checks catalog membership and the time-based rules only; booking
    /// conflicts are decided by the store's reserve-if-free.
    pub fn requested_window(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        now: DateTime<Utc>,
    ) -> EngineResult<TimeWindow> {
        if !self.catalog.contains(time) {
            return Err(EngineError::Validation(format!(
                "{} is not a bookable time",
                time.format("%H:%M")
            )));
        }

        let window = self.catalog.slot_window(date, time);
        if window.start <= now {
            return Err(EngineError::Validation(
                "Cannot schedule interviews in the past".to_string(),
            ));
        }

        if date == self.catalog.local_date(now) && window.start < now + self.same_day_buffer {
            return Err(EngineError::Validation(format!(
                "Same-day interviews must start at least {} minutes from now",
                self.same_day_buffer.num_minutes()
            )));
        }

        Ok(window)
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `start` plus whole days, pinned to the last representable instant
fn days_after(start: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    start
        .checked_add_signed(Duration::days(days))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
