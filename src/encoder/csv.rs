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

use bytes::BytesMut;
use std::fmt::Write;

use super::RecordEncoder;
use crate::error::Result;
use crate::format::OutputFormat;
use crate::record::{Field, Record};

/// Value columns following the sleep time.
const TAIL_FIELDS: [Field; 18] = [
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
    Field::VWidth,
    Field::VHeight,
    Field::AccParam,
];

/// Comma separated rows with raw millisecond timestamps. No header.
pub struct CsvEncoder {
    label: Option<String>,
}

impl CsvEncoder {
    pub fn new(label: Option<String>) -> Self {
        Self { label }
    }
}

impl RecordEncoder for CsvEncoder {
    fn encode(&mut self, record: &Record, buf: &mut BytesMut) -> Result<()> {
        if let Some(label) = &self.label {
            write!(buf, "{},", label)?;
        }
        write!(
            buf,
            "{},{},{},{},{},{},{},{}",
            record.start_tm,
            record.epoch_len,
            record.v_latest_pts,
            record.v_last_dts,
            record.a_last_dts,
            record.video_kbps(),
            record.audio_kbps(),
            record.dec_sleep_tm
        )?;
        for field in TAIL_FIELDS {
            write!(buf, ",{}", record.get(field))?;
        }
        writeln!(buf)?;
        Ok(())
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(encoder: &mut CsvEncoder, record: &Record) -> String {
        let mut buf = BytesMut::new();
        encoder.encode(record, &mut buf).unwrap();
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn test_row_columns() {
        let record = Record {
            start_tm: 1_558_606_530_250,
            epoch_len: 1000,
            v_ingress_bytes: 125_000,
            a_ingress_bytes: 4000,
            v_min_pending: 1,
            v_max_pending: 6,
            v_width: 640,
            v_height: 480,
            acc_param: 2,
            ..Default::default()
        };
        let row = render(&mut CsvEncoder::new(None), &record);
        assert_eq!(
            row,
            "1558606530250,1000,0,0,0,1000,32,0,0,0,0,0,0,0,1,6,0,0,0,0,0,0,0,640,480,2\n"
        );
    }

    #[test]
    fn test_label_prefix() {
        let row = render(&mut CsvEncoder::new(Some("room7".into())), &Record::default());
        assert!(row.starts_with("room7,0,0,"));
        assert_eq!(row.trim_end().split(',').count(), 27);
    }

    #[test]
    fn test_zero_epoch_kbps() {
        let record = Record {
            v_ingress_bytes: 999,
            a_ingress_bytes: 999,
            ..Default::default()
        };
        let row = render(&mut CsvEncoder::new(None), &record);
        let cols: Vec<&str> = row.trim_end().split(',').collect();
        assert_eq!(cols[5], "0");
        assert_eq!(cols[6], "0");
    }
}
