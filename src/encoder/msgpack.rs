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

// MessagePack envelope: an optional str8 label followed by a bin8 blob
// holding the record in a fixed byte layout.

use bytes::{Buf, BufMut, BytesMut};

use super::{Envelope, RecordEncoder};
use crate::error::{Error, Result};
use crate::format::OutputFormat;
use crate::record::{Record, RecordLayout};

/// str 8 marker
pub const STR8: u8 = 0xD9;
/// bin 8 marker
pub const BIN8: u8 = 0xC4;

/// Append one envelope. The str8 header is skipped for an empty label.
///
/// # Errors
///
/// Returns [`Error::LabelTooLong`] if `label` does not fit a str8 length.
pub fn encode_msgpack_envelope(
    label: &str,
    record: &Record,
    layout: RecordLayout,
    buf: &mut BytesMut,
) -> Result<()> {
    if !label.is_empty() {
        let len = u8::try_from(label.len()).map_err(|_| Error::LabelTooLong {
            len: label.len(),
            max: usize::from(u8::MAX),
        })?;
        buf.put_u8(STR8);
        buf.put_u8(len);
        buf.put_slice(label.as_bytes());
    }
    buf.put_u8(BIN8);
    buf.put_u8(layout.size() as u8);
    record.encode(buf, layout);
    Ok(())
}

fn take_header<B: Buf>(buf: &mut B) -> Result<(u8, usize)> {
    if buf.remaining() < 2 {
        return Err(Error::Decode("truncated msgpack header".to_string()));
    }
    let marker = buf.get_u8();
    let len = usize::from(buf.get_u8());
    if buf.remaining() < len {
        return Err(Error::Decode(format!(
            "msgpack value needs {} bytes, {} available",
            len,
            buf.remaining()
        )));
    }
    Ok((marker, len))
}

/// Decode the next envelope from `buf`, `None` once `buf` is exhausted.
pub fn decode_msgpack_envelope<B: Buf>(
    buf: &mut B,
    layout: RecordLayout,
) -> Result<Option<Envelope>> {
    if !buf.has_remaining() {
        return Ok(None);
    }

    let mut label = None;
    let (mut marker, mut len) = take_header(buf)?;
    if marker == STR8 {
        let bytes = buf.copy_to_bytes(len);
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Decode(format!("label is not UTF-8: {}", e)))?;
        label = Some(text);
        (marker, len) = take_header(buf)?;
    }

    if marker != BIN8 {
        return Err(Error::Decode(format!(
            "expected bin8 marker 0x{:02X}, found 0x{:02X}",
            BIN8, marker
        )));
    }
    if len != layout.size() {
        return Err(Error::Decode(format!(
            "record blob is {} bytes, layout expects {}",
            len,
            layout.size()
        )));
    }

    let record = Record::decode(buf, layout)?;
    Ok(Some(Envelope { label, record }))
}

pub struct MsgpackEncoder {
    label: String,
    layout: RecordLayout,
}

impl MsgpackEncoder {
    pub fn new(label: Option<String>, layout: RecordLayout) -> Self {
        Self {
            label: label.unwrap_or_default(),
            layout,
        }
    }
}

impl RecordEncoder for MsgpackEncoder {
    fn encode(&mut self, record: &Record, buf: &mut BytesMut) -> Result<()> {
        encode_msgpack_envelope(&self.label, record, self.layout, buf)
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Msgpack
    }
}
