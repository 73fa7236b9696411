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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Primary output encoding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Fixed-width columns with UTC date conversion
    #[default]
    Table,
    /// Comma separated, raw millisecond timestamps
    Csv,
    Protobuf,
    Msgpack,
}

impl OutputFormat {
    /// Binary envelope formats, the ones allowed on the secondary sink.
    pub fn envelope(self) -> Option<EnvelopeFormat> {
        match self {
            OutputFormat::Protobuf => Some(EnvelopeFormat::Protobuf),
            OutputFormat::Msgpack => Some(EnvelopeFormat::Msgpack),
            OutputFormat::Table | OutputFormat::Csv => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Csv => "csv",
            OutputFormat::Protobuf => "protobuf",
            OutputFormat::Msgpack => "msgpack",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the format names and the legacy numeric codes 1-4.
impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" | "1" => Ok(OutputFormat::Table),
            "csv" | "2" => Ok(OutputFormat::Csv),
            "protobuf" | "3" => Ok(OutputFormat::Protobuf),
            "msgpack" | "4" => Ok(OutputFormat::Msgpack),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Secondary sink encoding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeFormat {
    Protobuf,
    Msgpack,
}

impl From<EnvelopeFormat> for OutputFormat {
    fn from(format: EnvelopeFormat) -> Self {
        match format {
            EnvelopeFormat::Protobuf => OutputFormat::Protobuf,
            EnvelopeFormat::Msgpack => OutputFormat::Msgpack,
        }
    }
}
