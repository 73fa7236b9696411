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

// Output encoders
//
// Provides a trait-based abstraction over the four output encodings so the
// sink multiplexer can drive any of them, plus a factory that builds one
// from configuration.

pub mod csv;
pub mod msgpack;
pub mod protobuf;
pub mod table;

pub use csv::CsvEncoder;
pub use msgpack::{decode_msgpack_envelope, encode_msgpack_envelope, MsgpackEncoder};
pub use protobuf::{decode_protobuf_envelope, encode_protobuf_envelope, ProtobufEncoder};
pub use table::TableEncoder;

use bytes::BytesMut;

use crate::config::OutputConfig;
use crate::error::{Error, Result};
use crate::format::OutputFormat;
use crate::record::Record;

/// Longest label accepted, in bytes.
pub const MAX_LABEL_LEN: usize = 198;

/// One decoded binary envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub label: Option<String>,
    pub record: Record,
}

/// Record encoder trait
///
/// Encoders render into a caller-owned buffer; the sink that owns the
/// encoder writes the buffer out. Encoders never touch I/O themselves.
pub trait RecordEncoder: Send {
    /// Called before the first record of every input stream.
    fn begin_stream(&mut self, _buf: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    /// Append the encoding of `record` to `buf`.
    fn encode(&mut self, record: &Record, buf: &mut BytesMut) -> Result<()>;

    fn format(&self) -> OutputFormat;
}

/// Check the configured label. An empty label counts as no label.
pub fn validate_label(label: Option<&str>) -> Result<Option<&str>> {
    match label {
        Some(label) if label.len() > MAX_LABEL_LEN => Err(Error::LabelTooLong {
            len: label.len(),
            max: MAX_LABEL_LEN,
        }),
        Some("") | None => Ok(None),
        Some(label) => Ok(Some(label)),
    }
}

pub struct EncoderFactory;

impl EncoderFactory {
    /// Create an encoder for `format` from the output configuration
    pub fn create(format: OutputFormat, config: &OutputConfig) -> Result<Box<dyn RecordEncoder>> {
        let label = validate_label(config.label.as_deref())?.map(str::to_string);

        let encoder: Box<dyn RecordEncoder> = match format {
            OutputFormat::Table => Box::new(TableEncoder::new(label, config.verbose, config.header)),
            OutputFormat::Csv => Box::new(CsvEncoder::new(label)),
            OutputFormat::Protobuf => Box::new(ProtobufEncoder::new(label)),
            OutputFormat::Msgpack => Box::new(MsgpackEncoder::new(label, config.msgpack_layout)),
        };
        Ok(encoder)
    }
}
