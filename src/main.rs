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

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Level};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::FmtSubscriber;

use declog::config::{apply_env_overrides, load_config_with_env, LoggingConfig, SecondaryConfig};
use declog::sources::{open_source, select_recent};
use declog::{DeclogConfig, EnvelopeFormat, OutputFormat, Pipeline};

/// Decoder stats log converter - render binary decoder statistics as a
/// table, CSV, or protobuf / msgpack envelopes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log file to parse, or a file name wildcard when -a is used
    log_name: Option<String>,

    /// Output format: table|csv|protobuf|msgpack (or 1-4)
    #[arg(short = 'f', long)]
    format: Option<OutputFormat>,

    /// Add the column description block
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Omit the header line
    #[arg(short = 'H', long = "no-header")]
    no_header: bool,

    /// Remove duplicate records
    #[arg(short = 'D', long)]
    dedup: bool,

    /// Label added to every row as first field
    #[arg(short = 'l', long)]
    label: Option<String>,

    /// Start timestamp in ms since the epoch
    #[arg(short = 's', long = "start", value_parser = parse_number)]
    start_ts: Option<u64>,

    /// Duration in ms, from the start timestamp or the start of the stream
    #[arg(short = 'd', long = "duration", value_parser = parse_number)]
    duration_ms: Option<u64>,

    /// Align timestamps to fixed intervals of this many ms
    #[arg(short = 't', long = "interval", value_parser = parse_number)]
    interval_ms: Option<u64>,

    /// Also store records as protobuf envelopes in this file
    #[arg(short = 'p', long, conflicts_with = "msgpack")]
    protobuf: Option<PathBuf>,

    /// Also store records as msgpack envelopes in this file
    #[arg(short = 'm', long)]
    msgpack: Option<PathBuf>,

    /// Directory to search for files matching log_name (repeatable)
    #[arg(short = 'a', long = "dir")]
    directories: Vec<PathBuf>,

    /// Number of most recent matching files to process
    #[arg(long)]
    max_files: Option<usize>,

    /// Path to configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

/// Decimal, or hexadecimal with a `0x` prefix.
fn parse_number(s: &str) -> std::result::Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn build_config(args: &Args) -> Result<DeclogConfig> {
    let mut config = match &args.config {
        Some(path) => load_config_with_env(path)?,
        None => {
            let mut config = DeclogConfig::default();
            apply_env_overrides(&mut config)?;
            config
        }
    };

    // Apply CLI overrides
    if let Some(log_name) = &args.log_name {
        config.input.path = Some(log_name.clone());
    }
    if !args.directories.is_empty() {
        config.input.directories = args.directories.clone();
    }
    if let Some(max_files) = args.max_files {
        config.input.max_files = max_files;
    }

    let output = &mut config.output;
    if let Some(format) = args.format {
        output.format = format;
    }
    output.verbose |= args.verbose;
    if args.no_header {
        output.header = false;
    }
    if let Some(label) = &args.label {
        output.label = Some(label.clone());
    }
    if let Some(path) = &args.protobuf {
        output.secondary = Some(SecondaryConfig {
            path: path.clone(),
            format: EnvelopeFormat::Protobuf,
        });
    }
    if let Some(path) = &args.msgpack {
        output.secondary = Some(SecondaryConfig {
            path: path.clone(),
            format: EnvelopeFormat::Msgpack,
        });
    }

    let filter = &mut config.filter;
    filter.dedup |= args.dedup;
    if args.start_ts.is_some() {
        filter.start_ts = args.start_ts;
    }
    if args.duration_ms.is_some() {
        filter.duration_ms = args.duration_ms;
    }
    if args.interval_ms.is_some() {
        filter.align_interval_ms = args.interval_ms;
    }

    config.validate().context("Invalid command line")?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let log_level = match logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG, when set, takes precedence over the configured level
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();

    // stdout carries the converted records, so logs go to stderr
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if logging.format.eq_ignore_ascii_case("json") {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn create_secondary(secondary: &SecondaryConfig) -> Result<BufWriter<File>> {
    let file = File::create(&secondary.path)
        .with_context(|| format!("Failed to create {}", secondary.path.display()))?;
    info!(
        "Writing {} envelopes to {}",
        OutputFormat::from(secondary.format),
        secondary.path.display()
    );
    Ok(BufWriter::new(file))
}

fn run(config: &DeclogConfig) -> Result<()> {
    let Some(log_name) = config.input.path.as_deref() else {
        bail!("please specify file name");
    };

    let stdout = BufWriter::new(io::stdout().lock());

    let finished = if config.input.directories.is_empty() {
        // a single named file that cannot be opened is fatal
        let source = open_source(Path::new(log_name))?;
        let secondary = config.output.secondary.as_ref().map(create_secondary).transpose()?;

        let mut pipeline = Pipeline::build(config, stdout, secondary)?;
        info!("Processing {}", log_name);
        pipeline.process_stream(source)?;
        pipeline.finish()?
    } else {
        let files = select_recent(
            &config.input.directories,
            log_name,
            config.input.max_files,
        )?;
        if files.is_empty() {
            warn!("No files matching '{}' found", log_name);
        }

        let secondary = config.output.secondary.as_ref().map(create_secondary).transpose()?;
        let mut pipeline = Pipeline::build(config, stdout, secondary)?;
        for file in &files {
            match open_source(&file.path) {
                Ok(source) => {
                    info!("Processing {}", file.path.display());
                    pipeline.process_stream(source)?;
                }
                Err(e) => warn!("{}", e),
            }
        }
        pipeline.finish()?
    };

    let stats = finished.stats;
    info!(
        streams = stats.streams,
        read = stats.records_read,
        outside_window = stats.dropped_window,
        duplicates = stats.dropped_duplicate,
        resampled = stats.resampled,
        emitted = stats.emitted,
        partial_bytes = stats.partial_bytes,
        "Run statistics"
    );
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    let config = build_config(&args)?;

    init_tracing(&config.logging)?;

    if let Some(path) = &args.config {
        info!("Loaded configuration from: {:?}", path);
    }

    if let Err(e) = run(&config) {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
