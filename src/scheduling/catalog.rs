use crate::clock::TimeWindow;
use crate::config::SchedulingConfig;
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::ops::RangeInclusive;

/// Calendar years accepted from callers
const BOOKABLE_YEARS: RangeInclusive<i32> = 1970..=9999;

/// One canonical start time in the daily catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CatalogTime(NaiveTime);

impl CatalogTime {
    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// "HH:MM", the wire value
    pub fn value(&self) -> String {
        self.0.format("%H:%M").to_string()
    }

    /// "hh:MM AM", the display value
    pub fn display(&self) -> String {
        self.0.format("%I:%M %p").to_string()
    }
}

/// Fixed daily catalog of bookable start times
#[derive(Debug, Clone)]
pub struct SlotCatalog {
    times: Vec<CatalogTime>,
    duration_minutes: u32,
    offset: FixedOffset,
}

impl SlotCatalog {
    pub fn new(times: Vec<NaiveTime>, duration_minutes: u32, offset: FixedOffset) -> Self {
        let mut times: Vec<CatalogTime> = times.into_iter().map(CatalogTime).collect();
        times.sort();
        times.dedup();

        Self {
            times,
            duration_minutes,
            offset,
        }
    }

    pub fn from_config(config: &SchedulingConfig) -> EngineResult<Self> {
        let times = config
            .times
            .iter()
            .map(|t| Self::parse_time(t))
            .collect::<EngineResult<Vec<_>>>()?;

        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            EngineError::Validation(format!(
                "UTC offset out of range: {} minutes",
                config.utc_offset_minutes
            ))
        })?;

        if config.duration_minutes == 0 {
            return Err(EngineError::Validation(
                "Slot duration must be positive".to_string(),
            ));
        }

        Ok(Self::new(times, config.duration_minutes, offset))
    }

    /// Parse an "HH:MM" catalog value
    pub fn parse_time(value: &str) -> EngineResult<NaiveTime> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map_err(|_| EngineError::Validation(format!("Invalid time of day: {}", value)))
    }

    /// Parse a "YYYY-MM-DD" calendar day within the bookable year range
    pub fn parse_date(value: &str) -> EngineResult<NaiveDate> {
        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|_| EngineError::Validation(format!("Invalid date: {}", value)))?;

        if !BOOKABLE_YEARS.contains(&date.year()) {
            return Err(EngineError::Validation(format!(
                "Date out of range: {}",
                value
            )));
        }
        Ok(date)
    }

    pub fn times(&self) -> &[CatalogTime] {
        &self.times
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.times.iter().any(|t| t.0 == time)
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Absolute start of the slot at wall-clock `time` on `date`
    pub fn slot_start(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }

    pub fn slot_window(&self, date: NaiveDate, time: NaiveTime) -> TimeWindow {
        TimeWindow::starting_at(self.slot_start(date, time), self.duration_minutes)
    }

    /// Calendar day of `instant` on the catalog's wall clock
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}
