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

//! Sequential conversion driver.
//!
//! A [`Pipeline`] owns every piece of session state (filter window, dedup
//! timestamp, calendar anchor inside the table encoder) so that several input
//! streams processed one after another form one continuous timeline.
//!
//! ```text
//! bytes -> RecordReader -> RecordFilter -> [Resampler] -> SinkMux
//! ```

use std::io::{self, Read, Write};
use tracing::{debug, info};

use crate::config::DeclogConfig;
use crate::encoder::EncoderFactory;
use crate::error::{Error, Result};
use crate::filter::{RecordFilter, Verdict};
use crate::reader::RecordReader;
use crate::record::{Record, RecordLayout};
use crate::resample::Resampler;
use crate::sink::SinkMux;

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub streams: u64,
    pub records_read: u64,
    pub dropped_window: u64,
    pub dropped_duplicate: u64,
    /// Sub-records produced by time alignment
    pub resampled: u64,
    pub emitted: u64,
    /// Bytes of incomplete trailing records discarded at end of stream
    pub partial_bytes: u64,
}

/// What a finished run hands back.
pub struct Finished<P, S> {
    pub stats: PipelineStats,
    pub primary: P,
    pub secondary: Option<S>,
}

pub struct Pipeline<P, S = io::Sink> {
    layout: RecordLayout,
    filter: RecordFilter,
    resampler: Option<Resampler>,
    /// Last emitted sub-record start, tracked only when dedup is on
    last_sample: Option<u64>,
    dedup_samples: bool,
    sinks: SinkMux<P, S>,
    stats: PipelineStats,
}

impl<P: Write> Pipeline<P> {
    /// Pipeline without a secondary sink.
    pub fn new(config: &DeclogConfig, primary: P) -> Result<Self> {
        Self::build(config, primary, None)
    }
}

impl<P: Write, S: Write> Pipeline<P, S> {
    /// Build the stages from `config`.
    ///
    /// `secondary` is the writer for `output.secondary`; passing one without
    /// the config entry (or the reverse) is a configuration error.
    pub fn build(config: &DeclogConfig, primary: P, secondary: Option<S>) -> Result<Self> {
        config.validate()?;

        let output = &config.output;
        let encoder = EncoderFactory::create(output.format, output)?;
        let secondary = match (&output.secondary, secondary) {
            (Some(target), Some(writer)) => {
                Some((EncoderFactory::create(target.format.into(), output)?, writer))
            }
            (None, None) => None,
            (Some(target), None) => {
                return Err(Error::InvalidConfig(format!(
                    "no writer for secondary output {}",
                    target.path.display()
                )));
            }
            (None, Some(_)) => {
                return Err(Error::InvalidConfig(
                    "secondary writer given without output.secondary".to_string(),
                ));
            }
        };

        let filter = RecordFilter::new(config.filter.window(), config.filter.dedup);
        let resampler = config.filter.resampler();

        debug!(
            format = %output.format,
            layout = ?config.input.layout,
            dedup = config.filter.dedup,
            window = ?filter.window(),
            interval = ?resampler.map(|r| r.interval()),
            "Pipeline configured"
        );

        Ok(Self {
            layout: config.input.layout,
            filter,
            resampler,
            last_sample: None,
            dedup_samples: config.filter.dedup,
            sinks: SinkMux::new(encoder, primary, secondary)?,
            stats: PipelineStats::default(),
        })
    }

    /// Drain one input stream to the sinks.
    ///
    /// Filter and calendar state carry over to the next call. A trailing
    /// partial record is counted and discarded.
    pub fn process_stream<R: Read>(&mut self, source: R) -> Result<()> {
        self.stats.streams += 1;
        self.sinks.begin_stream()?;

        let mut reader = RecordReader::new(source, self.layout);
        while let Some(record) = reader.next_record()? {
            self.process_record(&record)?;
        }

        let pending = reader.pending_bytes();
        if pending > 0 {
            debug!(
                stream = self.stats.streams,
                bytes = pending,
                "Discarding incomplete trailing record"
            );
            self.stats.partial_bytes += pending as u64;
        }
        Ok(())
    }

    /// Push one decoded record through filter, resampler and sinks.
    pub fn process_record(&mut self, record: &Record) -> Result<()> {
        self.stats.records_read += 1;

        match self.filter.check(record) {
            Verdict::Accept => {}
            Verdict::OutsideWindow => {
                debug!(start_tm = record.start_tm, "Record outside time window");
                self.stats.dropped_window += 1;
                return Ok(());
            }
            Verdict::Duplicate => {
                debug!(
                    start_tm = record.start_tm,
                    last = ?self.filter.last_accepted(),
                    "Duplicate record"
                );
                self.stats.dropped_duplicate += 1;
                return Ok(());
            }
        }

        match &self.resampler {
            Some(resampler) => {
                let samples = resampler.resample(record);
                self.stats.resampled += samples.len() as u64;
                for sample in &samples {
                    // overlapping source epochs can land on the same grid point
                    if self.dedup_samples && self.last_sample >= Some(sample.start_tm) {
                        debug!(start_tm = sample.start_tm, "Duplicate sub-record");
                        self.stats.dropped_duplicate += 1;
                        continue;
                    }
                    self.last_sample = Some(sample.start_tm);
                    self.sinks.emit(sample)?;
                    self.stats.emitted += 1;
                }
            }
            None => {
                self.sinks.emit(record)?;
                self.stats.emitted += 1;
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Flush the sinks and return the run statistics with the writers.
    pub fn finish(mut self) -> Result<Finished<P, S>> {
        self.sinks.flush()?;
        let stats = self.stats;
        info!(
            streams = stats.streams,
            read = stats.records_read,
            emitted = stats.emitted,
            "Conversion finished"
        );

        let (primary, secondary) = self.sinks.into_inner();
        Ok(Finished {
            stats,
            primary,
            secondary,
        })
    }
}
