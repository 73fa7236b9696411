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

// Configuration module for declog
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution and overrides
// - Configuration validation
// - Default values

mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DeclogConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<DeclogConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Apply `DECLOG_LABEL`, `DECLOG_FORMAT` and `DECLOG_LOG_LEVEL`, then
/// re-validate.
pub fn apply_env_overrides(config: &mut DeclogConfig) -> Result<()> {
    if let Ok(label) = std::env::var("DECLOG_LABEL") {
        config.output.label = Some(label);
    }

    if let Ok(format) = std::env::var("DECLOG_FORMAT") {
        config.output.format = format
            .parse()
            .context("Invalid DECLOG_FORMAT")?;
    }

    if let Ok(level) = std::env::var("DECLOG_LOG_LEVEL") {
        config.logging.level = level;
    }

    config.validate().context("Invalid configuration after environment overrides")?;
    Ok(())
}
