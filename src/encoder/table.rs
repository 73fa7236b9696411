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

// Fixed-width text table encoder

use bytes::BytesMut;
use std::fmt::Write;

use super::RecordEncoder;
use crate::calendar::CalendarClock;
use crate::error::Result;
use crate::format::OutputFormat;
use crate::record::{Field, Record};

/// Header cell (padded to the column width) and its description.
struct Column {
    cell: &'static str,
    description: &'static str,
}

const fn col(cell: &'static str, description: &'static str) -> Column {
    Column { cell, description }
}

const COLUMNS: [Column; 26] = [
    col("Start Time              ", "The statime of the epoch (HH:MM:SS,sss)"),
    col("Epoch  ", "Epoch length in milliseconds"),
    col("v_l_pts    ", "The most recent video PTS in source buffer"),
    col("v_dts      ", "The latet video DTS read from source buffer"),
    col("a_dts      ", "The latet audio DTS read from source buffer"),
    col("v_kbps ", "Ingress video bitrate during epoch in kbps"),
    col("a_kbps ", "Ingress audio bitrate during epoch in kbps"),
    col("Sleep  ", "Total sleep time in epoch in milliseconds"),
    // audio
    col("a_drop ", "The amount of audio samples that were dropped in epoch exprssed in milliseconds"),
    col("a_inj  ", "The amount of silence injected in epoch exprssed in milliseconds"),
    col("a_rd_c ", "The number of calls to read audio packet from shared memory in epoch"),
    col("a_rd   ", "The number of read audio packet from shared memory in epoch"),
    col("a_wr   ", "The number of calls to write audio frame to shared memory in epoch"),
    col("a_err  ", "Total number of audio decoding errors in epoch"),
    // video
    col("v_mi_p ", "The min number of pending video frames in jitter buffer in epoch"),
    col("v_ma_p ", "The max number of pending video frames in jitter buffer in epoch"),
    col("v_drop ", "The number of video frames that were dropped in epoch"),
    col("v_inj  ", "The number of video frames that were duplicated in epoch"),
    col("v_rd_c ", "The number of calls to read video packet from shared memory in epoch"),
    col("v_rd   ", "The number of read video packet from shared memory in epoch"),
    col("v_wr   ", "The number of calls to write video frame to shared memory in epoch"),
    col("v_err  ", "Total number of video decoding errors in epoch"),
    col("v_init ", "Total number of video re-init decoder context in epoch"),
    col("v_w  ", "Source video width in pixels"),
    col("v_h  ", "Source video height in pixels"),
    col("acc_p", "Opaque data which determines if the stream is in public or private mode"),
];

const DESCRIPTION_CELL_WIDTH: usize = 28;

/// PTS / DTS columns, 11 wide.
const MARKER_FIELDS: [Field; 3] = [Field::VLatestPts, Field::VLastDts, Field::ALastDts];

/// Counter columns after sleep time, 7 wide.
const COUNTER_FIELDS: [Field; 15] = [
    Field::ANumDiscMillisec,
    Field::ANumInjectMillisec,
    Field::ANumRdCalls,
    Field::ANumRd,
    Field::ANumWr,
    Field::ANumErr,
    Field::VMinPending,
    Field::VMaxPending,
    Field::VNumDiscFrame,
    Field::VNumDupFrame,
    Field::VNumRdCalls,
    Field::VNumRd,
    Field::VNumWr,
    Field::VNumErr,
    Field::VNumReinitCtx,
];

/// Trailing columns, 5 wide.
const FRAME_FIELDS: [Field; 3] = [Field::VWidth, Field::VHeight, Field::AccParam];

/// Human-readable table with UTC timestamps.
///
/// The column description block (verbose) and header line are written at the
/// start of the first stream only, so several input files render as one
/// table.
pub struct TableEncoder {
    label: Option<String>,
    verbose: bool,
    header: bool,
    preamble_done: bool,
    clock: CalendarClock,
}

impl TableEncoder {
    pub fn new(label: Option<String>, verbose: bool, header: bool) -> Self {
        Self {
            label,
            verbose,
            header,
            preamble_done: false,
            clock: CalendarClock::new(),
        }
    }

    fn write_descriptions(buf: &mut BytesMut) -> Result<()> {
        for column in COLUMNS.iter() {
            writeln!(
                buf,
                "{:<width$}{}",
                column.cell,
                column.description,
                width = DESCRIPTION_CELL_WIDTH
            )?;
        }
        writeln!(buf)?;
        Ok(())
    }

    fn write_header(&self, buf: &mut BytesMut) -> Result<()> {
        let first = COLUMNS[0].cell;
        match &self.label {
            // right-align the first cell past the label column
            Some(label) => write!(buf, "{:>width$}", first, width = label.len() + 1 + first.len())?,
            None => buf.extend_from_slice(first.as_bytes()),
        }
        for column in COLUMNS.iter().skip(1) {
            buf.extend_from_slice(column.cell.as_bytes());
        }
        writeln!(buf)?;
        Ok(())
    }
}

impl RecordEncoder for TableEncoder {
    fn begin_stream(&mut self, buf: &mut BytesMut) -> Result<()> {
        if self.preamble_done {
            return Ok(());
        }
        self.preamble_done = true;

        if self.verbose {
            Self::write_descriptions(buf)?;
        }
        if self.header {
            self.write_header(buf)?;
        }
        Ok(())
    }

    fn encode(&mut self, record: &Record, buf: &mut BytesMut) -> Result<()> {
        let time = self.clock.resolve(record.start_tm)?;

        if let Some(label) = &self.label {
            write!(buf, "{} ", label)?;
        }
        write!(buf, "{} {:<7}", time, record.epoch_len)?;
        for field in MARKER_FIELDS {
            write!(buf, "{:<11}", record.get(field))?;
        }
        write!(
            buf,
            "{:<7}{:<7}{:<7}",
            record.video_kbps(),
            record.audio_kbps(),
            record.dec_sleep_tm
        )?;
        for field in COUNTER_FIELDS {
            write!(buf, "{:<7}", record.get(field))?;
        }
        for field in FRAME_FIELDS {
            write!(buf, "{:<5}", record.get(field))?;
        }
        writeln!(buf)?;
        Ok(())
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Table
    }
}
