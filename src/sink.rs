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

// Sink multiplexer
//
// Routes every emitted record through the primary encoder and, when
// configured, a secondary binary envelope encoder. Each sink owns its
// encoder, its writer, and a scratch buffer that is drained after every
// record so output is never held back across records.

use bytes::BytesMut;
use std::io::{self, Write};
use tracing::debug;

use crate::encoder::RecordEncoder;
use crate::error::{Error, Result};
use crate::record::Record;

const SCRATCH_CAPACITY: usize = 4096;

struct Sink<W> {
    name: &'static str,
    encoder: Box<dyn RecordEncoder>,
    writer: W,
    scratch: BytesMut,
    bytes_written: u64,
}

impl<W: Write> Sink<W> {
    fn new(name: &'static str, encoder: Box<dyn RecordEncoder>, writer: W) -> Self {
        Self {
            name,
            encoder,
            writer,
            scratch: BytesMut::with_capacity(SCRATCH_CAPACITY),
            bytes_written: 0,
        }
    }

    fn begin_stream(&mut self) -> Result<()> {
        self.encoder.begin_stream(&mut self.scratch)?;
        self.drain()
    }

    fn emit(&mut self, record: &Record) -> Result<()> {
        self.encoder.encode(record, &mut self.scratch)?;
        self.drain()
    }

    fn drain(&mut self) -> Result<()> {
        if self.scratch.is_empty() {
            return Ok(());
        }
        self.writer
            .write_all(&self.scratch)
            .map_err(|source| self.write_error(source))?;
        self.bytes_written += self.scratch.len() as u64;
        self.scratch.clear();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|source| self.write_error(source))
    }

    fn write_error(&self, source: io::Error) -> Error {
        Error::Write {
            sink: self.name,
            source,
        }
    }
}

/// Primary sink plus an optional secondary envelope sink.
pub struct SinkMux<P, S = io::Sink> {
    primary: Sink<P>,
    secondary: Option<Sink<S>>,
}

impl<P: Write> SinkMux<P> {
    pub fn primary_only(encoder: Box<dyn RecordEncoder>, writer: P) -> Self {
        Self {
            primary: Sink::new("primary", encoder, writer),
            secondary: None,
        }
    }
}

impl<P: Write, S: Write> SinkMux<P, S> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the secondary encoder is not a
    /// binary envelope encoder.
    pub fn new(
        encoder: Box<dyn RecordEncoder>,
        writer: P,
        secondary: Option<(Box<dyn RecordEncoder>, S)>,
    ) -> Result<Self> {
        let secondary = match secondary {
            Some((other, _)) if other.format().envelope().is_none() => {
                return Err(Error::InvalidConfig(format!(
                    "secondary output must be protobuf or msgpack, not {}",
                    other.format()
                )));
            }
            Some((envelope, sink)) => Some(Sink::new("secondary", envelope, sink)),
            None => None,
        };

        debug!(
            primary = %encoder.format(),
            secondary = ?secondary.as_ref().map(|s| s.encoder.format()),
            "Sink multiplexer ready"
        );

        Ok(Self {
            primary: Sink::new("primary", encoder, writer),
            secondary,
        })
    }

    /// Let the encoders emit their per-stream preamble.
    pub fn begin_stream(&mut self) -> Result<()> {
        self.primary.begin_stream()?;
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.begin_stream()?;
        }
        Ok(())
    }

    /// Write `record` to every sink, primary first.
    pub fn emit(&mut self, record: &Record) -> Result<()> {
        self.primary.emit(record)?;
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.emit(record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.primary.flush()?;
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.flush()?;
        }
        Ok(())
    }

    /// Bytes written to the primary and secondary sinks.
    pub fn bytes_written(&self) -> (u64, Option<u64>) {
        (
            self.primary.bytes_written,
            self.secondary.as_ref().map(|s| s.bytes_written),
        )
    }

    pub fn into_inner(self) -> (P, Option<S>) {
        (self.primary.writer, self.secondary.map(|s| s.writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{CsvEncoder, MsgpackEncoder, ProtobufEncoder, TableEncoder};
    use crate::record::RecordLayout;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record() -> Record {
        Record {
            start_tm: 5000,
            epoch_len: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn test_fan_out() {
        let mut mux = SinkMux::new(
            Box::new(CsvEncoder::new(None)),
            Vec::new(),
            Some((
                Box::new(MsgpackEncoder::new(None, RecordLayout::Packed)) as Box<dyn RecordEncoder>,
                Vec::new(),
            )),
        )
        .unwrap();

        mux.begin_stream().unwrap();
        mux.emit(&record()).unwrap();
        mux.flush().unwrap();
        assert_eq!(mux.bytes_written().1, Some(55));

        let (primary, secondary) = mux.into_inner();
        assert!(String::from_utf8(primary).unwrap().starts_with("5000,1000,"));
        assert_eq!(secondary.unwrap().len(), 2 + 53);
    }

    #[test]
    fn test_text_secondary_rejected() {
        let result = SinkMux::new(
            Box::new(CsvEncoder::new(None)),
            Vec::new(),
            Some((
                Box::new(TableEncoder::new(None, false, true)) as Box<dyn RecordEncoder>,
                Vec::new(),
            )),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_primary_write_failure() {
        let mut mux = SinkMux::primary_only(Box::new(CsvEncoder::new(None)), FailingWriter);
        let err = mux.emit(&record()).unwrap_err();
        assert!(matches!(err, Error::Write { sink: "primary", .. }));
    }

    #[test]
    fn test_secondary_write_failure() {
        let mut mux = SinkMux::new(
            Box::new(CsvEncoder::new(None)),
            Vec::new(),
            Some((
                Box::new(ProtobufEncoder::new(None)) as Box<dyn RecordEncoder>,
                FailingWriter,
            )),
        )
        .unwrap();
        let err = mux.emit(&record()).unwrap_err();
        assert!(matches!(err, Error::Write { sink: "secondary", .. }));
    }
}
