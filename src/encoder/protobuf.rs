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

/// Length-framed protobuf envelope
///
/// # Format Structure
///
/// Each record is written as two frames:
/// - `[u32 BE length][label message]` where the label message holds the label
///   as field 1 (length delimited). The label field is always present.
/// - `[u32 BE length][record message]` with every record field tagged by its
///   position in the field table, zero values included.
///
/// Field wire types come from [`FIELDS`]: `start_tm` is fixed64, the PTS/DTS
/// markers and video ingress bytes are fixed32, everything else is a varint.
///
/// The encoder writes the frames by hand so zero values are never elided;
/// [`RecordMessage`] is the equivalent prost message used for decoding.
use bytes::{Buf, BufMut, BytesMut};
use prost::encoding::{encode_key, encode_varint, WireType};
use prost::Message;

use super::{Envelope, RecordEncoder};
use crate::error::{Error, Result};
use crate::format::OutputFormat;
use crate::record::{Field, ProtoWire, Record, FIELDS};

const LABEL_TAG: u32 = 1;
const FRAME_PREFIX_LEN: usize = 4;

/// Label frame payload.
#[derive(Clone, PartialEq, Message)]
pub struct LabelMessage {
    #[prost(string, tag = "1")]
    pub label: String,
}

/// Record frame payload.
#[derive(Clone, PartialEq, Message)]
pub struct RecordMessage {
    #[prost(fixed64, tag = "1")]
    pub start_tm: u64,
    #[prost(fixed32, tag = "2")]
    pub v_latest_pts: u32,
    #[prost(fixed32, tag = "3")]
    pub v_last_dts: u32,
    #[prost(fixed32, tag = "4")]
    pub a_last_dts: u32,
    #[prost(fixed32, tag = "5")]
    pub v_ingress_bytes: u32,
    #[prost(uint32, tag = "6")]
    pub a_ingress_bytes: u32,
    #[prost(uint32, tag = "7")]
    pub epoch_len: u32,
    #[prost(uint32, tag = "8")]
    pub dec_sleep_tm: u32,
    #[prost(uint32, tag = "9")]
    pub a_num_disc_millisec: u32,
    #[prost(uint32, tag = "10")]
    pub a_num_inject_millisec: u32,
    #[prost(uint32, tag = "11")]
    pub a_num_rd_calls: u32,
    #[prost(uint32, tag = "12")]
    pub a_num_rd: u32,
    #[prost(uint32, tag = "13")]
    pub a_num_wr: u32,
    #[prost(uint32, tag = "14")]
    pub a_num_err: u32,
    #[prost(uint32, tag = "15")]
    pub v_max_pending: u32,
    #[prost(uint32, tag = "16")]
    pub v_min_pending: u32,
    #[prost(uint32, tag = "17")]
    pub v_num_wr: u32,
    #[prost(uint32, tag = "18")]
    pub v_num_rd_calls: u32,
    #[prost(uint32, tag = "19")]
    pub v_num_rd: u32,
    #[prost(uint32, tag = "20")]
    pub v_num_disc_frame: u32,
    #[prost(uint32, tag = "21")]
    pub v_num_dup_frame: u32,
    #[prost(uint32, tag = "22")]
    pub v_num_err: u32,
    #[prost(uint32, tag = "23")]
    pub v_num_reinit_ctx: u32,
    #[prost(uint32, tag = "24")]
    pub v_width: u32,
    #[prost(uint32, tag = "25")]
    pub v_height: u32,
    #[prost(uint32, tag = "26")]
    pub acc_param: u32,
}

impl From<&Record> for RecordMessage {
    fn from(r: &Record) -> Self {
        Self {
            start_tm: r.start_tm,
            v_latest_pts: r.v_latest_pts,
            v_last_dts: r.v_last_dts,
            a_last_dts: r.a_last_dts,
            v_ingress_bytes: r.v_ingress_bytes,
            a_ingress_bytes: r.a_ingress_bytes.into(),
            epoch_len: r.epoch_len.into(),
            dec_sleep_tm: r.dec_sleep_tm.into(),
            a_num_disc_millisec: r.a_num_disc_millisec.into(),
            a_num_inject_millisec: r.a_num_inject_millisec.into(),
            a_num_rd_calls: r.a_num_rd_calls.into(),
            a_num_rd: r.a_num_rd.into(),
            a_num_wr: r.a_num_wr.into(),
            a_num_err: r.a_num_err.into(),
            v_max_pending: r.v_max_pending.into(),
            v_min_pending: r.v_min_pending.into(),
            v_num_wr: r.v_num_wr.into(),
            v_num_rd_calls: r.v_num_rd_calls.into(),
            v_num_rd: r.v_num_rd.into(),
            v_num_disc_frame: r.v_num_disc_frame.into(),
            v_num_dup_frame: r.v_num_dup_frame.into(),
            v_num_err: r.v_num_err.into(),
            v_num_reinit_ctx: r.v_num_reinit_ctx.into(),
            v_width: r.v_width.into(),
            v_height: r.v_height.into(),
            acc_param: r.acc_param.into(),
        }
    }
}

/// Fails with [`Error::ValueOutOfRange`] when a varint does not fit the
/// width of its record field.
impl TryFrom<RecordMessage> for Record {
    type Error = Error;

    fn try_from(m: RecordMessage) -> Result<Self> {
        let mut r = Record {
            start_tm: m.start_tm,
            v_latest_pts: m.v_latest_pts,
            v_last_dts: m.v_last_dts,
            a_last_dts: m.a_last_dts,
            v_ingress_bytes: m.v_ingress_bytes,
            ..Record::default()
        };
        r.try_set(Field::AIngressBytes, m.a_ingress_bytes.into())?;
        r.try_set(Field::EpochLen, m.epoch_len.into())?;
        r.try_set(Field::DecSleepTm, m.dec_sleep_tm.into())?;
        r.try_set(Field::ANumDiscMillisec, m.a_num_disc_millisec.into())?;
        r.try_set(Field::ANumInjectMillisec, m.a_num_inject_millisec.into())?;
        r.try_set(Field::ANumRdCalls, m.a_num_rd_calls.into())?;
        r.try_set(Field::ANumRd, m.a_num_rd.into())?;
        r.try_set(Field::ANumWr, m.a_num_wr.into())?;
        r.try_set(Field::ANumErr, m.a_num_err.into())?;
        r.try_set(Field::VMaxPending, m.v_max_pending.into())?;
        r.try_set(Field::VMinPending, m.v_min_pending.into())?;
        r.try_set(Field::VNumWr, m.v_num_wr.into())?;
        r.try_set(Field::VNumRdCalls, m.v_num_rd_calls.into())?;
        r.try_set(Field::VNumRd, m.v_num_rd.into())?;
        r.try_set(Field::VNumDiscFrame, m.v_num_disc_frame.into())?;
        r.try_set(Field::VNumDupFrame, m.v_num_dup_frame.into())?;
        r.try_set(Field::VNumErr, m.v_num_err.into())?;
        r.try_set(Field::VNumReinitCtx, m.v_num_reinit_ctx.into())?;
        r.try_set(Field::VWidth, m.v_width.into())?;
        r.try_set(Field::VHeight, m.v_height.into())?;
        r.try_set(Field::AccParam, m.acc_param.into())?;
        Ok(r)
    }
}

/// Reserve a length prefix and return its position.
fn begin_frame(buf: &mut BytesMut) -> usize {
    let at = buf.len();
    buf.put_u32(0);
    at
}

fn end_frame(buf: &mut BytesMut, at: usize) {
    let len = (buf.len() - at - FRAME_PREFIX_LEN) as u32;
    buf[at..at + FRAME_PREFIX_LEN].copy_from_slice(&len.to_be_bytes());
}

/// Append the tagged record fields, without framing.
pub fn encode_record_fields(record: &Record, buf: &mut BytesMut) {
    for spec in FIELDS.iter() {
        let value = record.get(spec.field);
        match spec.wire {
            ProtoWire::Fixed64 => {
                encode_key(spec.index(), WireType::SixtyFourBit, buf);
                buf.put_u64_le(value);
            }
            ProtoWire::Fixed32 => {
                encode_key(spec.index(), WireType::ThirtyTwoBit, buf);
                // fixed32 fields are 4 bytes wide in the record
                buf.put_u32_le(value as u32);
            }
            ProtoWire::Varint => {
                encode_key(spec.index(), WireType::Varint, buf);
                encode_varint(value, buf);
            }
        }
    }
}

/// Append one framed envelope. An empty `label` still emits the label field.
pub fn encode_protobuf_envelope(label: &str, record: &Record, buf: &mut BytesMut) {
    let at = begin_frame(buf);
    encode_key(LABEL_TAG, WireType::LengthDelimited, buf);
    encode_varint(label.len() as u64, buf);
    buf.put_slice(label.as_bytes());
    end_frame(buf, at);

    let at = begin_frame(buf);
    encode_record_fields(record, buf);
    end_frame(buf, at);
}

fn take_frame<B: Buf>(buf: &mut B, what: &str) -> Result<bytes::Bytes> {
    if buf.remaining() < FRAME_PREFIX_LEN {
        return Err(Error::Decode(format!("truncated {} length prefix", what)));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(Error::Decode(format!(
            "{} frame needs {} bytes, {} available",
            what,
            len,
            buf.remaining()
        )));
    }
    Ok(buf.copy_to_bytes(len))
}

/// Decode the next envelope from `buf`, `None` once `buf` is exhausted.
pub fn decode_protobuf_envelope<B: Buf>(buf: &mut B) -> Result<Option<Envelope>> {
    if !buf.has_remaining() {
        return Ok(None);
    }

    let label = LabelMessage::decode(take_frame(buf, "label")?)?.label;
    let message = RecordMessage::decode(take_frame(buf, "record")?)?;

    Ok(Some(Envelope {
        label: (!label.is_empty()).then_some(label),
        record: Record::try_from(message)?,
    }))
}

pub struct ProtobufEncoder {
    label: String,
}

impl ProtobufEncoder {
    pub fn new(label: Option<String>) -> Self {
        Self {
            label: label.unwrap_or_default(),
        }
    }
}

impl RecordEncoder for ProtobufEncoder {
    fn encode(&mut self, record: &Record, buf: &mut BytesMut) -> Result<()> {
        encode_protobuf_envelope(&self.label, record, buf);
        Ok(())
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Protobuf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // every field non-zero so prost does not elide anything
    fn busy_record() -> Record {
        let mut record = Record::default();
        for (i, spec) in FIELDS.iter().enumerate() {
            record.set(spec.field, (i as u64 + 1) * 97);
        }
        record.start_tm = 1_558_606_530_250;
        record
    }

    #[test]
    fn test_label_frame_bytes() {
        let mut buf = BytesMut::new();
        encode_protobuf_envelope("ab", &Record::default(), &mut buf);
        assert_eq!(&buf[..8], &[0, 0, 0, 4, 0x0A, 2, b'a', b'b']);
    }

    #[test]
    fn test_empty_label_still_present() {
        let mut buf = BytesMut::new();
        encode_protobuf_envelope("", &Record::default(), &mut buf);
        assert_eq!(&buf[..6], &[0, 0, 0, 2, 0x0A, 0x00]);
    }

    #[test]
    fn test_zero_record_emits_all_fields() {
        let mut buf = BytesMut::new();
        encode_protobuf_envelope("", &Record::default(), &mut buf);
        let record_frame = &buf[6..];
        // 9 (fixed64) + 4 * 5 (fixed32) + 10 * 2 (tags 6..15) + 11 * 3 (tags 16..26)
        assert_eq!(&record_frame[..4], &82u32.to_be_bytes());
        assert_eq!(record_frame.len(), 4 + 82);
        assert_eq!(record_frame[4], 0x09);
        assert_eq!(record_frame[13], 0x15);
        // tag 16 needs a two-byte key
        let tail = &record_frame[record_frame.len() - 3..];
        assert_eq!(tail, &[0xD0, 0x01, 0x00]);
    }

    #[test]
    fn test_matches_prost_encoding() {
        let record = busy_record();
        let mut buf = BytesMut::new();
        encode_record_fields(&record, &mut buf);
        assert_eq!(buf.to_vec(), RecordMessage::from(&record).encode_to_vec());

        let mut framed = BytesMut::new();
        encode_protobuf_envelope("cam-1", &record, &mut framed);
        let label = LabelMessage {
            label: "cam-1".to_string(),
        }
        .encode_to_vec();
        assert_eq!(&framed[4..4 + label.len()], &label[..]);
    }

    #[test]
    fn test_decode_envelope() {
        let record = busy_record();
        let mut buf = BytesMut::new();
        encode_protobuf_envelope("cam-1", &record, &mut buf);
        encode_protobuf_envelope("", &Record::default(), &mut buf);

        let mut bytes = buf.freeze();
        let first = decode_protobuf_envelope(&mut bytes).unwrap().unwrap();
        assert_eq!(first.label.as_deref(), Some("cam-1"));
        assert_eq!(first.record, record);
        let second = decode_protobuf_envelope(&mut bytes).unwrap().unwrap();
        assert_eq!(second.label, None);
        assert_eq!(second.record, Record::default());
        assert!(decode_protobuf_envelope(&mut bytes).unwrap().is_none());
    }

    #[test]
    fn test_decode_truncated() {
        let mut buf = BytesMut::new();
        encode_protobuf_envelope("x", &busy_record(), &mut buf);
        let mut short = &buf[..buf.len() - 1];
        assert!(matches!(
            decode_protobuf_envelope(&mut short),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wide_varint() {
        let message = RecordMessage {
            acc_param: 300,
            ..RecordMessage::from(&Record::default())
        };
        assert!(matches!(
            Record::try_from(message),
            Err(Error::ValueOutOfRange {
                field: "acc_param",
                value: 300
            })
        ));
    }
}
