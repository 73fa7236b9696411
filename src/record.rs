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

//! Decoder statistics record and its field table.
//!
//! The decoder periodically dumps one fixed-layout record per measurement
//! epoch. Every stage of the converter is driven by [`FIELDS`]: the byte
//! codec walks it for offsets and widths, the protobuf encoder for wire types,
//! and the resampler for per-field scaling policies.
//!
//! # Layouts
//!
//! - [`RecordLayout::Legacy`]: the on-disk layout written by the decoder,
//!   naturally aligned, 56 bytes, including 3 trailing padding bytes.
//! - [`RecordLayout::Packed`]: the same fields back-to-back, 53 bytes.
//!
//! Both layouts are little-endian. Field offsets are identical in both; only
//! the trailing padding differs.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One measurement epoch of decoder statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Record {
    /// Epoch start in milliseconds since the Unix epoch.
    pub start_tm: u64,
    pub v_latest_pts: u32,
    pub v_last_dts: u32,
    pub a_last_dts: u32,
    pub v_ingress_bytes: u32,
    pub a_ingress_bytes: u16,
    /// Epoch duration in milliseconds.
    pub epoch_len: u16,
    pub dec_sleep_tm: u16,
    pub a_num_disc_millisec: u16,
    pub a_num_inject_millisec: u16,
    pub a_num_rd_calls: u8,
    pub a_num_rd: u8,
    pub a_num_wr: u8,
    pub a_num_err: u8,
    pub v_max_pending: u8,
    pub v_min_pending: u8,
    pub v_num_wr: u16,
    pub v_num_rd_calls: u8,
    pub v_num_rd: u8,
    pub v_num_disc_frame: u8,
    pub v_num_dup_frame: u8,
    pub v_num_err: u8,
    pub v_num_reinit_ctx: u8,
    pub v_width: u16,
    pub v_height: u16,
    /// Opaque room state (public / paid).
    pub acc_param: u8,
}

/// Identifies one record field, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    StartTm,
    VLatestPts,
    VLastDts,
    ALastDts,
    VIngressBytes,
    AIngressBytes,
    EpochLen,
    DecSleepTm,
    ANumDiscMillisec,
    ANumInjectMillisec,
    ANumRdCalls,
    ANumRd,
    ANumWr,
    ANumErr,
    VMaxPending,
    VMinPending,
    VNumWr,
    VNumRdCalls,
    VNumRd,
    VNumDiscFrame,
    VNumDupFrame,
    VNumErr,
    VNumReinitCtx,
    VWidth,
    VHeight,
    AccParam,
}

/// How a field is scaled when one epoch is split into fixed intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    /// `floor(value * interval / epoch_len)`
    Truncate,
    /// `round(value * interval / epoch_len)` in floating point.
    Round,
    /// Gauge value, copied unscaled.
    Copy,
    /// Assigned by the resampler itself (start time, epoch length).
    Assigned,
}

/// Protobuf wire encoding of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoWire {
    Fixed64,
    Fixed32,
    Varint,
}

/// Static description of one record field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: Field,
    pub name: &'static str,
    /// Width in bytes.
    pub width: usize,
    /// Byte offset inside a serialized record.
    pub offset: usize,
    pub wire: ProtoWire,
    pub scaling: Scaling,
}

impl FieldSpec {
    /// Protobuf field number (1-based position in the table).
    pub fn index(&self) -> u32 {
        self.field as u32 + 1
    }

    /// Largest value the field can hold.
    pub fn max_value(&self) -> u64 {
        if self.width >= 8 {
            u64::MAX
        } else {
            (1u64 << (self.width * 8)) - 1
        }
    }
}

const fn spec(
    field: Field,
    name: &'static str,
    width: usize,
    offset: usize,
    wire: ProtoWire,
    scaling: Scaling,
) -> FieldSpec {
    FieldSpec {
        field,
        name,
        width,
        offset,
        wire,
        scaling,
    }
}

use self::ProtoWire::{Fixed32, Fixed64, Varint};
use self::Scaling::{Assigned, Copy as Gauge, Round, Truncate};

/// The record field table. Order and widths are fixed for wire compatibility.
pub static FIELDS: [FieldSpec; 26] = [
    spec(Field::StartTm, "start_tm", 8, 0, Fixed64, Assigned),
    spec(Field::VLatestPts, "v_latest_pts", 4, 8, Fixed32, Gauge),
    spec(Field::VLastDts, "v_last_dts", 4, 12, Fixed32, Gauge),
    spec(Field::ALastDts, "a_last_dts", 4, 16, Fixed32, Gauge),
    spec(Field::VIngressBytes, "v_ingress_bytes", 4, 20, Fixed32, Truncate),
    spec(Field::AIngressBytes, "a_ingress_bytes", 2, 24, Varint, Truncate),
    spec(Field::EpochLen, "epoch_len", 2, 26, Varint, Assigned),
    spec(Field::DecSleepTm, "dec_sleep_tm", 2, 28, Varint, Truncate),
    spec(Field::ANumDiscMillisec, "a_num_disc_millisec", 2, 30, Varint, Round),
    spec(Field::ANumInjectMillisec, "a_num_inject_millisec", 2, 32, Varint, Round),
    spec(Field::ANumRdCalls, "a_num_rd_calls", 1, 34, Varint, Truncate),
    spec(Field::ANumRd, "a_num_rd", 1, 35, Varint, Truncate),
    spec(Field::ANumWr, "a_num_wr", 1, 36, Varint, Truncate),
    spec(Field::ANumErr, "a_num_err", 1, 37, Varint, Round),
    spec(Field::VMaxPending, "v_max_pending", 1, 38, Varint, Gauge),
    spec(Field::VMinPending, "v_min_pending", 1, 39, Varint, Gauge),
    spec(Field::VNumWr, "v_num_wr", 2, 40, Varint, Truncate),
    spec(Field::VNumRdCalls, "v_num_rd_calls", 1, 42, Varint, Truncate),
    spec(Field::VNumRd, "v_num_rd", 1, 43, Varint, Truncate),
    spec(Field::VNumDiscFrame, "v_num_disc_frame", 1, 44, Varint, Round),
    spec(Field::VNumDupFrame, "v_num_dup_frame", 1, 45, Varint, Round),
    spec(Field::VNumErr, "v_num_err", 1, 46, Varint, Round),
    spec(Field::VNumReinitCtx, "v_num_reinit_ctx", 1, 47, Varint, Round),
    spec(Field::VWidth, "v_width", 2, 48, Varint, Gauge),
    spec(Field::VHeight, "v_height", 2, 50, Varint, Gauge),
    spec(Field::AccParam, "acc_param", 1, 52, Varint, Gauge),
];

/// Sum of all field widths.
pub const PACKED_RECORD_SIZE: usize = 53;

/// Size of the naturally aligned record as the decoder writes it.
pub const LEGACY_RECORD_SIZE: usize = 56;

impl Field {
    pub fn spec(self) -> &'static FieldSpec {
        &FIELDS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }
}

/// Byte layout of a serialized record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLayout {
    #[default]
    Legacy,
    Packed,
}

impl RecordLayout {
    pub const fn size(self) -> usize {
        match self {
            RecordLayout::Legacy => LEGACY_RECORD_SIZE,
            RecordLayout::Packed => PACKED_RECORD_SIZE,
        }
    }

    fn padding(self) -> usize {
        self.size() - PACKED_RECORD_SIZE
    }
}

// Saturates instead of wrapping when a value exceeds the field width.
fn narrow<T: TryFrom<u64>>(value: u64, max: T) -> T {
    T::try_from(value).unwrap_or(max)
}

impl Record {
    /// Read a field, widened to 64 bits.
    pub fn get(&self, field: Field) -> u64 {
        match field {
            Field::StartTm => self.start_tm,
            Field::VLatestPts => self.v_latest_pts.into(),
            Field::VLastDts => self.v_last_dts.into(),
            Field::ALastDts => self.a_last_dts.into(),
            Field::VIngressBytes => self.v_ingress_bytes.into(),
            Field::AIngressBytes => self.a_ingress_bytes.into(),
            Field::EpochLen => self.epoch_len.into(),
            Field::DecSleepTm => self.dec_sleep_tm.into(),
            Field::ANumDiscMillisec => self.a_num_disc_millisec.into(),
            Field::ANumInjectMillisec => self.a_num_inject_millisec.into(),
            Field::ANumRdCalls => self.a_num_rd_calls.into(),
            Field::ANumRd => self.a_num_rd.into(),
            Field::ANumWr => self.a_num_wr.into(),
            Field::ANumErr => self.a_num_err.into(),
            Field::VMaxPending => self.v_max_pending.into(),
            Field::VMinPending => self.v_min_pending.into(),
            Field::VNumWr => self.v_num_wr.into(),
            Field::VNumRdCalls => self.v_num_rd_calls.into(),
            Field::VNumRd => self.v_num_rd.into(),
            Field::VNumDiscFrame => self.v_num_disc_frame.into(),
            Field::VNumDupFrame => self.v_num_dup_frame.into(),
            Field::VNumErr => self.v_num_err.into(),
            Field::VNumReinitCtx => self.v_num_reinit_ctx.into(),
            Field::VWidth => self.v_width.into(),
            Field::VHeight => self.v_height.into(),
            Field::AccParam => self.acc_param.into(),
        }
    }

    /// Write a field. Values wider than the field saturate at its maximum.
    pub fn set(&mut self, field: Field, value: u64) {
        match field {
            Field::StartTm => self.start_tm = value,
            Field::VLatestPts => self.v_latest_pts = narrow(value, u32::MAX),
            Field::VLastDts => self.v_last_dts = narrow(value, u32::MAX),
            Field::ALastDts => self.a_last_dts = narrow(value, u32::MAX),
            Field::VIngressBytes => self.v_ingress_bytes = narrow(value, u32::MAX),
            Field::AIngressBytes => self.a_ingress_bytes = narrow(value, u16::MAX),
            Field::EpochLen => self.epoch_len = narrow(value, u16::MAX),
            Field::DecSleepTm => self.dec_sleep_tm = narrow(value, u16::MAX),
            Field::ANumDiscMillisec => self.a_num_disc_millisec = narrow(value, u16::MAX),
            Field::ANumInjectMillisec => self.a_num_inject_millisec = narrow(value, u16::MAX),
            Field::ANumRdCalls => self.a_num_rd_calls = narrow(value, u8::MAX),
            Field::ANumRd => self.a_num_rd = narrow(value, u8::MAX),
            Field::ANumWr => self.a_num_wr = narrow(value, u8::MAX),
            Field::ANumErr => self.a_num_err = narrow(value, u8::MAX),
            Field::VMaxPending => self.v_max_pending = narrow(value, u8::MAX),
            Field::VMinPending => self.v_min_pending = narrow(value, u8::MAX),
            Field::VNumWr => self.v_num_wr = narrow(value, u16::MAX),
            Field::VNumRdCalls => self.v_num_rd_calls = narrow(value, u8::MAX),
            Field::VNumRd => self.v_num_rd = narrow(value, u8::MAX),
            Field::VNumDiscFrame => self.v_num_disc_frame = narrow(value, u8::MAX),
            Field::VNumDupFrame => self.v_num_dup_frame = narrow(value, u8::MAX),
            Field::VNumErr => self.v_num_err = narrow(value, u8::MAX),
            Field::VNumReinitCtx => self.v_num_reinit_ctx = narrow(value, u8::MAX),
            Field::VWidth => self.v_width = narrow(value, u16::MAX),
            Field::VHeight => self.v_height = narrow(value, u16::MAX),
            Field::AccParam => self.acc_param = narrow(value, u8::MAX),
        }
    }

    /// Write a field, rejecting values that do not fit its width.
    pub fn try_set(&mut self, field: Field, value: u64) -> Result<()> {
        let spec = field.spec();
        if value > spec.max_value() {
            return Err(Error::ValueOutOfRange {
                field: field.name(),
                value,
            });
        }
        self.set(field, value);
        Ok(())
    }

    /// Decode one record from the front of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if fewer than `layout.size()` bytes remain.
    pub fn decode<B: Buf>(buf: &mut B, layout: RecordLayout) -> Result<Record> {
        if buf.remaining() < layout.size() {
            return Err(Error::Decode(format!(
                "record needs {} bytes, {} available",
                layout.size(),
                buf.remaining()
            )));
        }

        let mut record = Record::default();
        for spec in FIELDS.iter() {
            record.set(spec.field, buf.get_uint_le(spec.width));
        }
        buf.advance(layout.padding());
        Ok(record)
    }

    /// Append the record to `buf` in the given layout. Padding is zeroed.
    pub fn encode<B: BufMut>(&self, buf: &mut B, layout: RecordLayout) {
        for spec in FIELDS.iter() {
            buf.put_uint_le(self.get(spec.field), spec.width);
        }
        buf.put_bytes(0, layout.padding());
    }

    pub fn to_bytes(&self, layout: RecordLayout) -> Vec<u8> {
        let mut buf = Vec::with_capacity(layout.size());
        self.encode(&mut buf, layout);
        buf
    }

    /// Epoch end (exclusive) in milliseconds.
    pub fn end_tm(&self) -> u64 {
        self.start_tm.saturating_add(self.epoch_len.into())
    }

    /// Ingress bitrate in kbps for a byte counter over this epoch, 0 when the
    /// epoch length is zero.
    pub fn kbps(&self, bytes: u64) -> u64 {
        match self.epoch_len {
            0 => 0,
            len => bytes * 8 / u64::from(len),
        }
    }

    pub fn video_kbps(&self) -> u64 {
        self.kbps(self.v_ingress_bytes.into())
    }

    pub fn audio_kbps(&self) -> u64 {
        self.kbps(self.a_ingress_bytes.into())
    }
}
