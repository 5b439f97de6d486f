use crate::error::EngineError;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeDelta, Utc, Weekday};
use shared::fleet::WorkerId;

/// Fractional hours in a time span, at millisecond precision.
pub fn hours(span: TimeDelta) -> f64 {
    span.num_milliseconds() as f64 / 3_600_000.0
}

/// Decides which calendar day an instant falls on for date filters.
#[derive(Debug, Clone, Copy)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Returns `None` when the offset is not strictly within a day.
    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

/// Worker and inclusive start-date constraints applied to shifts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftFilter {
    pub worker_id: Option<WorkerId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ShiftFilter {
    pub fn for_worker(worker_id: WorkerId) -> Self {
        Self {
            worker_id: Some(worker_id),
            ..Self::default()
        }
    }

    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            worker_id: None,
            start_date: Some(start_date),
            end_date: Some(end_date),
        }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self::between(date, date)
    }

    /// Monday through Sunday of the given ISO week.
    pub fn iso_week(year: i32, week: u32) -> Option<Self> {
        let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
        let sunday = NaiveDate::from_isoywd_opt(year, week, Weekday::Sun)?;
        Some(Self::between(monday, sunday))
    }

    pub fn month(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self::between(first, next_first.pred_opt()?))
    }

    pub fn with_worker(mut self, worker_id: Option<WorkerId>) -> Self {
        self.worker_id = worker_id;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if start > end => {
                Err(EngineError::InvalidRange { start, end })
            }
            _ => Ok(()),
        }
    }

    pub fn matches(&self, worker_id: WorkerId, start_day: NaiveDate) -> bool {
        self.worker_id.is_none_or(|id| id == worker_id)
            && self.start_date.is_none_or(|date| start_day >= date)
            && self.end_date.is_none_or(|date| start_day <= date)
    }
}
