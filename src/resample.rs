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

//! Time alignment.
//!
//! Splits one variable-length epoch into sub-records on a fixed grid of
//! `interval` milliseconds:
//!
//! 1. The first sub-record starts at the smallest multiple of `interval`
//!    that is `>= start_tm`.
//! 2. Sub-records follow every `interval` ms while strictly before
//!    `start_tm + epoch_len`, at most [`MAX_SUB_RECORDS`] of them.
//! 3. Each field is scaled according to its [`Scaling`] policy in
//!    [`FIELDS`]; `epoch_len` becomes `interval`.
//!
//! A record with `epoch_len == 0` covers no time and yields no sub-records.

use crate::record::{Record, Scaling, FIELDS};

/// Upper bound on sub-records produced from one source record.
pub const MAX_SUB_RECORDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resampler {
    interval: u16,
}

impl Resampler {
    /// `None` when `interval_ms` is zero, which disables alignment.
    pub fn new(interval_ms: u16) -> Option<Self> {
        (interval_ms > 0).then_some(Self {
            interval: interval_ms,
        })
    }

    pub fn interval(&self) -> u16 {
        self.interval
    }

    /// First grid point at or after `start_tm`.
    pub fn first_boundary(&self, start_tm: u64) -> Option<u64> {
        let interval = u64::from(self.interval);
        match start_tm % interval {
            0 => Some(start_tm),
            _ => (start_tm / interval + 1).checked_mul(interval),
        }
    }

    /// Expand `record` into its aligned sub-records.
    pub fn resample(&self, record: &Record) -> Vec<Record> {
        let mut out = Vec::new();
        if record.epoch_len == 0 {
            return out;
        }

        let template = self.scale(record);
        let end_tm = record.end_tm();
        let mut next = self.first_boundary(record.start_tm);

        while let Some(start_tm) = next {
            if start_tm >= end_tm || out.len() == MAX_SUB_RECORDS {
                break;
            }
            out.push(Record {
                start_tm,
                ..template
            });
            next = start_tm.checked_add(self.interval.into());
        }
        out
    }

    // epoch_len must be non-zero.
    fn scale(&self, record: &Record) -> Record {
        let interval = u64::from(self.interval);
        let epoch_len = u64::from(record.epoch_len);

        let mut sample = Record {
            epoch_len: self.interval,
            ..Record::default()
        };

        for spec in FIELDS.iter() {
            let value = record.get(spec.field);
            let scaled = match spec.scaling {
                Scaling::Truncate => value * interval / epoch_len,
                Scaling::Round => {
                    (value as f64 * interval as f64 / epoch_len as f64).round() as u64
                }
                Scaling::Copy => value,
                Scaling::Assigned => continue,
            };
            sample.set(spec.field, scaled);
        }
        sample
    }
}
