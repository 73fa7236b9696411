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

// Record stream framing
//
// Turns raw byte chunks into whole records. Trailing bytes shorter than one
// record are kept and completed by the next chunk; a partial record is never
// handed downstream.

use bytes::BytesMut;
use std::io::{ErrorKind, Read};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::record::{Record, RecordLayout};

/// Number of records requested per read call.
pub const READ_CHUNK_RECORDS: usize = 1000;

/// Push-style decoder: feed it chunks, pull complete records out.
pub struct RecordDecoder {
    layout: RecordLayout,
    buffer: BytesMut,
}

impl RecordDecoder {
    pub fn new(layout: RecordLayout) -> Self {
        Self {
            layout,
            buffer: BytesMut::with_capacity(layout.size() * READ_CHUNK_RECORDS),
        }
    }

    /// Append a chunk after any carried-over bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete record, or `None` until more bytes arrive.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let size = self.layout.size();
        if self.buffer.len() < size {
            return Ok(None);
        }
        let mut frame = self.buffer.split_to(size);
        Record::decode(&mut frame, self.layout).map(Some)
    }

    /// Bytes buffered that do not yet form a whole record.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any carried-over partial record.
    pub fn reset(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }
}

/// Pull-style reader over any byte source.
///
/// Each call to [`RecordReader::next_record`] returns a buffered record or
/// issues another read. A read of zero bytes ends the current pass and
/// returns `None`; calling again later retries the source, so a reader over a
/// growing file picks up where it stopped.
///
/// # Examples
///
/// ```
/// use declog::reader::RecordReader;
/// use declog::record::{Record, RecordLayout};
///
/// let record = Record { start_tm: 1000, epoch_len: 2000, ..Default::default() };
/// let bytes = record.to_bytes(RecordLayout::Legacy);
///
/// let mut reader = RecordReader::new(&bytes[..], RecordLayout::Legacy);
/// assert_eq!(reader.next_record().unwrap(), Some(record));
/// assert_eq!(reader.next_record().unwrap(), None);
/// ```
pub struct RecordReader<R> {
    source: R,
    decoder: RecordDecoder,
    chunk: Vec<u8>,
    bytes_read: u64,
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: R, layout: RecordLayout) -> Self {
        Self::with_chunk_size(source, layout, layout.size() * READ_CHUNK_RECORDS)
    }

    /// Reader issuing reads of at most `chunk_size` bytes.
    pub fn with_chunk_size(source: R, layout: RecordLayout, chunk_size: usize) -> Self {
        Self {
            source,
            decoder: RecordDecoder::new(layout),
            chunk: vec![0; chunk_size.max(1)],
            bytes_read: 0,
        }
    }

    /// Next whole record from the source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] when the source reports a failure. Reads
    /// interrupted by a signal are reissued; nothing else is retried.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(record) = self.decoder.next_record()? {
                return Ok(Some(record));
            }

            let n = match self.source.read(&mut self.chunk) {
                Ok(0) => {
                    debug!(
                        bytes_read = self.bytes_read,
                        pending = self.decoder.pending_bytes(),
                        "End of record stream"
                    );
                    return Ok(None);
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Read(e)),
            };

            trace!("Read {} bytes", n);
            self.bytes_read += n as u64;
            self.decoder.extend(&self.chunk[..n]);
        }
    }

    /// Bytes of an incomplete trailing record currently held back.
    pub fn pending_bytes(&self) -> usize {
        self.decoder.pending_bytes()
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
