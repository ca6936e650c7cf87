// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the adcodegen project (compiled derivative kernels).

//! Explicit compile configuration.
//!
//! Replaces global default flags and paths: every compile call receives a
//! [`CompileConfig`], which can be built in code or loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Optimization flags used when none are configured.
pub const DEFAULT_OPTIMIZATION_FLAGS: &[&str] =
    &["-O3", "-march=native", "-mtune=native", "-ffast-math"];

/// Environment variable naming the C compiler, checked before `CC`.
pub const COMPILER_ENV: &str = "ADCG_CC";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Settings for one compile call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileConfig {
    /// Flags passed to the compiler before the mandatory shared-library flags.
    pub optimization_flags: Vec<String>,
    /// Directory the artifact is written to; created if missing.
    pub artifact_directory: PathBuf,
    /// Explicit compiler; otherwise resolved from the environment and `PATH`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<PathBuf>,
    /// Persist the generated C source next to the library.
    pub keep_sources: bool,
    /// Log the compiler command and output path at `info` level.
    pub verbose: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            optimization_flags: DEFAULT_OPTIMIZATION_FLAGS
                .iter()
                .map(|flag| flag.to_string())
                .collect(),
            artifact_directory: std::env::temp_dir().join("adcodegen"),
            compiler: None,
            keep_sources: false,
            verbose: false,
        }
    }
}

impl CompileConfig {
    /// Default settings writing artifacts into `directory`.
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            artifact_directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optimization_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_compiler(mut self, compiler: impl Into<PathBuf>) -> Self {
        self.compiler = Some(compiler.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn keep_sources(mut self, keep: bool) -> Self {
        self.keep_sources = keep;
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
