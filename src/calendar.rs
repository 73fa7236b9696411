// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// UTC timestamp rendering with a cached day anchor
//
// A full calendar conversion runs once per UTC day; every other timestamp of
// that day is derived from the elapsed seconds since the anchor.

use chrono::{DateTime, Datelike, Timelike};
use std::fmt;

use crate::error::{Error, Result};

const SECS_PER_DAY: u64 = 86_400;

/// Broken-down UTC time with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millis: u32,
}

/// Renders as `YYYY-MM-DD HH:MM:SS,mmm`.
impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02},{:03}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millis
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct DayAnchor {
    secs: u64,
    next_midnight: u64,
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

impl DayAnchor {
    fn convert(secs: u64, ts_ms: u64) -> Result<Self> {
        let utc = i64::try_from(secs)
            .ok()
            .and_then(|s| DateTime::from_timestamp(s, 0))
            .ok_or(Error::Calendar(ts_ms))?;

        let (hour, minute, second) = (utc.hour(), utc.minute(), utc.second());
        let since_midnight = u64::from(hour * 3600 + minute * 60 + second);

        Ok(Self {
            secs,
            next_midnight: secs + SECS_PER_DAY - since_midnight,
            year: utc.year(),
            month: utc.month(),
            day: utc.day(),
            hour,
            minute,
            second,
        })
    }

    fn covers(&self, secs: u64) -> bool {
        secs >= self.secs && secs < self.next_midnight
    }
}

/// Converts millisecond timestamps to [`CalendarTime`], reusing the last
/// full conversion while timestamps stay within the same UTC day.
#[derive(Debug, Default)]
pub struct CalendarClock {
    anchor: Option<DayAnchor>,
    conversions: u64,
}

impl CalendarClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `ts_ms` (milliseconds since the Unix epoch).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Calendar`] for timestamps beyond the representable
    /// date range.
    pub fn resolve(&mut self, ts_ms: u64) -> Result<CalendarTime> {
        let secs = ts_ms / 1000;
        let millis = (ts_ms % 1000) as u32;

        let anchor = match self.anchor {
            Some(anchor) if anchor.covers(secs) => anchor,
            // first record, next day, or a step back before the anchor
            _ => {
                let anchor = DayAnchor::convert(secs, ts_ms)?;
                self.conversions += 1;
                self.anchor = Some(anchor);
                anchor
            }
        };

        // delta < one day, so these fit comfortably in u32
        let mut delta = (secs - anchor.secs) as u32;
        let mut hour = anchor.hour + delta / 3600;
        delta %= 3600;
        let mut minute = anchor.minute + delta / 60;
        let mut second = anchor.second + delta % 60;

        minute += second / 60;
        second %= 60;
        hour += minute / 60;
        minute %= 60;

        Ok(CalendarTime {
            year: anchor.year,
            month: anchor.month,
            day: anchor.day,
            hour,
            minute,
            second,
            millis,
        })
    }

    /// Number of full calendar conversions performed so far.
    pub fn full_conversions(&self) -> u64 {
        self.conversions
    }

    /// Cached next UTC midnight in epoch seconds, if anchored.
    pub fn next_midnight(&self) -> Option<u64> {
        self.anchor.map(|a| a.next_midnight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2019-05-23 10:15:30.250 UTC
    const MORNING: u64 = 1_558_606_530_250;

    #[test]
    fn test_format() {
        let mut clock = CalendarClock::new();
        let t = clock.resolve(MORNING).unwrap();
        assert_eq!(t.to_string(), "2019-05-23 10:15:30,250");
        assert_eq!(clock.next_midnight(), Some(1_558_656_000));
    }

    #[test]
    fn test_same_day_reuses_anchor() {
        let mut clock = CalendarClock::new();
        clock.resolve(MORNING).unwrap();
        let t = clock.resolve(MORNING + 900_000).unwrap();
        assert_eq!(t.to_string(), "2019-05-23 10:30:30,250");
        let t = clock.resolve(MORNING + 49_469_000).unwrap();
        assert_eq!(t.to_string(), "2019-05-23 23:59:59,250");
        assert_eq!(clock.full_conversions(), 1);
    }

    #[test]
    fn test_carries() {
        let mut clock = CalendarClock::new();
        // 2019-05-23 10:59:59.000
        clock.resolve(1_558_609_199_000).unwrap();
        let t = clock.resolve(1_558_609_200_001).unwrap();
        assert_eq!(t.to_string(), "2019-05-23 11:00:00,001");
        assert_eq!(clock.full_conversions(), 1);
    }

    #[test]
    fn test_midnight_reconverts() {
        let mut clock = CalendarClock::new();
        clock.resolve(MORNING).unwrap();
        let t = clock.resolve(1_558_656_000_000).unwrap();
        assert_eq!(t.to_string(), "2019-05-24 00:00:00,000");
        assert_eq!(clock.full_conversions(), 2);
    }

    #[test]
    fn test_step_back_reconverts() {
        let mut clock = CalendarClock::new();
        clock.resolve(MORNING).unwrap();
        let t = clock.resolve(MORNING - 60_000).unwrap();
        assert_eq!(t.to_string(), "2019-05-23 10:14:30,250");
        assert_eq!(clock.full_conversions(), 2);
    }

    #[test]
    fn test_out_of_range() {
        let mut clock = CalendarClock::new();
        assert!(matches!(clock.resolve(u64::MAX), Err(Error::Calendar(_))));
    }
}
