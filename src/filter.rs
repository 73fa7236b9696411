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

// Timestamp window and duplicate filter
//
// State lives for the whole run, not per input stream, so several rotated
// log files form one continuous timeline.

use crate::record::Record;

/// Inclusive `[start, start + duration]` window over record start times.
///
/// An unset start is taken from the first record offered; an unset duration
/// leaves the window open-ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    start: Option<u64>,
    duration: Option<u64>,
}

impl TimeWindow {
    pub fn new(start: Option<u64>, duration: Option<u64>) -> Self {
        Self { start, duration }
    }

    pub fn start(&self) -> Option<u64> {
        self.start
    }

    /// Inclusive upper bound, `None` when unbounded.
    pub fn end(&self) -> Option<u64> {
        self.start
            .zip(self.duration)
            .map(|(start, duration)| start.saturating_add(duration))
    }

    fn anchor(&mut self, ts: u64) {
        self.start.get_or_insert(ts);
    }

    pub fn contains(&self, ts: u64) -> bool {
        let after_start = self.start.map_or(true, |start| ts >= start);
        let before_end = self.end().map_or(true, |end| ts <= end);
        after_start && before_end
    }
}

/// Outcome of offering a record to the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    OutsideWindow,
    Duplicate,
}

/// Stateful window + dedup pass.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    window: TimeWindow,
    dedup: bool,
    last_accepted: Option<u64>,
}

impl RecordFilter {
    pub fn new(window: TimeWindow, dedup: bool) -> Self {
        Self {
            window,
            dedup,
            last_accepted: None,
        }
    }

    /// Decide whether `record` continues down the pipeline.
    ///
    /// Records outside the window are rejected without touching the dedup
    /// timestamp. With dedup on, a record not newer than the last accepted
    /// one is rejected.
    pub fn check(&mut self, record: &Record) -> Verdict {
        let ts = record.start_tm;
        self.window.anchor(ts);

        if !self.window.contains(ts) {
            return Verdict::OutsideWindow;
        }

        if self.dedup && self.last_accepted.is_some_and(|last| ts <= last) {
            return Verdict::Duplicate;
        }

        self.last_accepted = Some(ts);
        Verdict::Accept
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }
}
