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

// Decoder binary stats log converter
//
// Reads the fixed-layout statistics records a video decoder dumps once per
// measurement epoch and re-emits them:
// - as a fixed-width table with UTC timestamps, or as CSV
// - as length-framed protobuf or msgpack envelopes, to stdout and/or a
//   secondary file
// - optionally deduplicated, restricted to a time window, and split onto a
//   fixed millisecond grid

pub mod calendar;
pub mod config;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod format;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod resample;
pub mod sink;
pub mod sources;

// Re-export main types
pub use config::{load_config, load_config_with_env, DeclogConfig};
pub use encoder::{
    decode_msgpack_envelope, decode_protobuf_envelope, EncoderFactory, Envelope, RecordEncoder,
    MAX_LABEL_LEN,
};
pub use error::{Error, Result};
pub use filter::{RecordFilter, TimeWindow, Verdict};
pub use format::{EnvelopeFormat, OutputFormat};
pub use pipeline::{Finished, Pipeline, PipelineStats};
pub use reader::{RecordDecoder, RecordReader};
pub use record::{Field, Record, RecordLayout, FIELDS};
pub use resample::{Resampler, MAX_SUB_RECORDS};
pub use sink::SinkMux;
