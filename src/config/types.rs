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

// Configuration types for declog

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::encoder::MAX_LABEL_LEN;
use crate::error::{Error, Result};
use crate::filter::TimeWindow;
use crate::format::{EnvelopeFormat, OutputFormat};
use crate::record::RecordLayout;
use crate::resample::Resampler;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeclogConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DeclogConfig {
    /// Check cross-field constraints. Every violation is fatal for a run.
    pub fn validate(&self) -> Result<()> {
        if let Some(label) = &self.output.label {
            if label.len() > MAX_LABEL_LEN {
                return Err(Error::LabelTooLong {
                    len: label.len(),
                    max: MAX_LABEL_LEN,
                });
            }
        }

        if let Some(interval) = self.filter.align_interval_ms {
            if interval > u64::from(u16::MAX) {
                return Err(Error::InvalidConfig(format!(
                    "filter.align_interval_ms must be at most {}, got {}",
                    u16::MAX,
                    interval
                )));
            }
        }

        if self.input.max_files == 0 {
            return Err(Error::InvalidConfig(
                "input.max_files must be > 0".to_string(),
            ));
        }

        if let Some(secondary) = &self.output.secondary {
            if secondary.path.as_os_str().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "output.secondary.path is required for {} output",
                    OutputFormat::from(secondary.format)
                )));
            }
        }

        Ok(())
    }
}

/// Where records come from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    /// A log file, or a file name wildcard when `directories` is non-empty.
    #[serde(default)]
    pub path: Option<String>,

    /// Directories scanned for files matching `path`
    #[serde(default)]
    pub directories: Vec<PathBuf>,

    /// How many of the most recent matches are processed
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default)]
    pub layout: RecordLayout,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: None,
            directories: Vec::new(),
            max_files: default_max_files(),
            layout: RecordLayout::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Print column descriptions before the table header
    #[serde(default)]
    pub verbose: bool,

    #[serde(default = "default_header")]
    pub header: bool,

    #[serde(default)]
    pub label: Option<String>,

    /// Blob layout inside msgpack envelopes
    #[serde(default)]
    pub msgpack_layout: RecordLayout,

    #[serde(default)]
    pub secondary: Option<SecondaryConfig>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            verbose: false,
            header: default_header(),
            label: None,
            msgpack_layout: RecordLayout::default(),
            secondary: None,
        }
    }
}

/// Secondary binary sink, written alongside the primary output.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecondaryConfig {
    pub path: PathBuf,
    pub format: EnvelopeFormat,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Drop records whose start time does not advance
    #[serde(default)]
    pub dedup: bool,

    /// Window start in ms since the epoch; 0 or unset means the first record
    #[serde(default)]
    pub start_ts: Option<u64>,

    /// Window length in ms; 0 or unset means unbounded
    #[serde(default)]
    pub duration_ms: Option<u64>,

    /// Resampling interval in ms; 0 or unset disables alignment
    #[serde(default)]
    pub align_interval_ms: Option<u64>,
}

impl FilterConfig {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(
            self.start_ts.filter(|&ts| ts > 0),
            self.duration_ms.filter(|&d| d > 0),
        )
    }

    /// The configured resampler. Intervals too wide for a record are
    /// rejected by [`DeclogConfig::validate`].
    pub fn resampler(&self) -> Option<Resampler> {
        self.align_interval_ms
            .and_then(|interval| u16::try_from(interval).ok())
            .and_then(Resampler::new)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_max_files() -> usize { 3 }
fn default_header() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
