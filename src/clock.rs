//! Simulated calendar: maps the day counter and wall-clock time onto the
//! date/time strings carried in outbound payloads.

use chrono::{Days, NaiveDate, Utc};

use crate::state::SimulationState;

const MS_PER_DAY_24H: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct SimCalendar {
    pub start_date: NaiveDate,
    /// Real milliseconds that make up one simulated day.
    pub day_length_ms: u64,
}

impl Default for SimCalendar {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2050, 1, 1).unwrap_or(NaiveDate::MIN),
            day_length_ms: 120_000,
        }
    }
}

impl SimCalendar {
    pub fn new(start_date: NaiveDate, day_length_ms: u64) -> Self {
        Self {
            start_date,
            day_length_ms: day_length_ms.max(1),
        }
    }

    pub fn date_string(&self, state: &SimulationState) -> String {
        self.start_date
            .checked_add_days(Days::new(state.current_day))
            .unwrap_or(NaiveDate::MAX)
            .format("%Y-%m-%d")
            .to_string()
    }

    pub fn time_string(&self, state: &SimulationState, now_ms: i64) -> String {
        let elapsed = now_ms.saturating_sub(state.unix_epoch_start_time).max(0) as u64;
        let into_day = elapsed % self.day_length_ms.max(1);
        // Scale the real offset within the simulated day onto a 24h clock.
        let sim_ms = (into_day as u128 * MS_PER_DAY_24H as u128 / self.day_length_ms.max(1) as u128) as u64;
        let secs = sim_ms / 1000;
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }

    pub fn current_time_string(&self, state: &SimulationState) -> String {
        self.time_string(state, Utc::now().timestamp_millis())
    }

    pub fn epoch_start(&self, state: &SimulationState) -> i64 {
        state.unix_epoch_start_time
    }
}
