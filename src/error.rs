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

// Error and Result types for the conversion core

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` type for declog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for declog operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading from an input stream failed.
    #[error("failed to read record stream: {0}")]
    Read(#[source] io::Error),

    /// Writing to an output sink failed. Always fatal for the run.
    #[error("failed to write to {sink} output: {source}")]
    Write {
        sink: &'static str,
        #[source]
        source: io::Error,
    },

    /// An input file could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("label is {len} bytes long, at most {max} bytes are allowed")]
    LabelTooLong { len: usize, max: usize },

    #[error("unsupported output format '{0}'")]
    UnsupportedFormat(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The timestamp (milliseconds) has no UTC calendar representation.
    #[error("failed to convert timestamp {0} to GMT time")]
    Calendar(u64),

    /// A text row could not be rendered.
    #[error("failed to render row: {0}")]
    Render(#[from] std::fmt::Error),

    /// A binary envelope or record could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A decoded value does not fit the width of its record field.
    #[error("value {value} does not fit field {field}")]
    ValueOutOfRange { field: &'static str, value: u64 },
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::Decode(err.to_string())
    }
}
