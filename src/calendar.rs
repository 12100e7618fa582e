use chrono::{Datelike, Duration, NaiveDateTime};

use crate::config::CalendarConfig;

pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Maps raw working durations onto the configured shift windows.
///
/// Working minutes per weekday are precomputed at construction. `advance`
/// consumes a duration window by window, jumping to the next working day's
/// start whenever the current window is exhausted. The day-start hour opens
/// every working day regardless of when the previous window closed; unused
/// late-night minutes never carry over.
#[derive(Debug, Clone)]
pub struct WorkingCalendar {
    /// Working minutes per weekday, Monday first.
    working_minutes: [f64; 7],
    day_start_hour: u32,
}

impl WorkingCalendar {
    pub fn new(config: &CalendarConfig) -> Self {
        let weekday = f64::from(config.weekday_shifts * config.hours_per_weekday_shift * 60);
        let saturday = f64::from(config.saturday_shifts * config.hours_per_saturday_shift * 60);

        let mut working_minutes = [0.0; 7];
        for day in 0..7u32 {
            if !config.working_days.contains(&day) {
                continue;
            }
            working_minutes[day as usize] = if day == 5 { saturday } else { weekday };
        }

        Self {
            working_minutes,
            day_start_hour: config.day_start_hour,
        }
    }

    /// Timestamp reached after consuming `minutes` of working time from
    /// `start`. A non-positive duration returns `start` unchanged.
    pub fn advance(&self, start: NaiveDateTime, minutes: f64) -> NaiveDateTime {
        if minutes <= 0.0 {
            return start;
        }
        // A round-the-clock configuration has nothing to skip.
        if self
            .working_minutes
            .iter()
            .all(|&available| available >= MINUTES_PER_DAY)
        {
            return start + duration_from_minutes(minutes);
        }

        let mut current = start;
        let mut remaining = minutes;
        loop {
            let weekday = current.weekday().num_days_from_monday() as usize;
            let minutes_today = self.working_minutes[weekday];
            if minutes_today <= 0.0 {
                current = self.next_day_start(current);
                continue;
            }

            let day_start = self.day_start(current);
            if current < day_start {
                current = day_start;
            }

            let window_end = day_start + duration_from_minutes(minutes_today);
            let available = minutes_between(current, window_end).max(0.0);
            if remaining <= available {
                return current + duration_from_minutes(remaining);
            }
            remaining -= available;
            current = self.next_day_start(current);
        }
    }

    fn day_start(&self, at: NaiveDateTime) -> NaiveDateTime {
        at.date()
            .and_hms_opt(self.day_start_hour, 0, 0)
            .expect("day start hour must lie within a day")
    }

    /// Start of the first working day strictly after `at`'s date.
    fn next_day_start(&self, at: NaiveDateTime) -> NaiveDateTime {
        let mut date = at.date() + Duration::days(1);
        while self.working_minutes[date.weekday().num_days_from_monday() as usize] <= 0.0 {
            date += Duration::days(1);
        }
        date.and_hms_opt(self.day_start_hour, 0, 0)
            .expect("day start hour must lie within a day")
    }
}

pub(crate) fn duration_from_minutes(minutes: f64) -> Duration {
    Duration::microseconds((minutes * 60_000_000.0).round() as i64)
}

fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_microseconds().unwrap_or(i64::MAX) as f64 / 60_000_000.0
}
