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

//! Native C compiler resolution and invocation.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use log::{debug, info, warn};

use crate::config::{CompileConfig, COMPILER_ENV};
use crate::paths::dynamic_library_extension;

#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("no C compiler found; set ADCG_CC or CC, or install cc, gcc or clang")]
    CompilerNotFound,
    #[error("configured compiler '{0}' was not found")]
    CompilerMissing(String),
    #[error("failed to run {compiler}: {source}")]
    Spawn {
        compiler: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{compiler} exited with {status}: {stderr}")]
    Failed {
        compiler: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to move compiled library into place: {0}")]
    Persist(#[from] tempfile::PathPersistError),
}

/// A resolved C compiler plus the flags to build with.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub compiler: PathBuf,
    pub flags: Vec<String>,
    pub verbose: bool,
}

impl Toolchain {
    /// Resolve the compiler: `config.compiler`, then `ADCG_CC`, then `CC`,
    /// then the first of `cc`, `gcc`, `clang` on `PATH`.
    pub fn resolve(config: &CompileConfig) -> Result<Self, ToolchainError> {
        let compiler = match &config.compiler {
            Some(path) => which::which(path)
                .map_err(|_| ToolchainError::CompilerMissing(path.display().to_string()))?,
            None => resolve_from_env()?,
        };
        debug!("using C compiler {}", compiler.display());
        Ok(Self {
            compiler,
            flags: config.optimization_flags.clone(),
            verbose: config.verbose,
        })
    }

    /// Compile `source` into the shared library `output`.
    ///
    /// The library is built under a temporary name in the same directory and
    /// renamed over `output` only when the compiler succeeds, so a failed
    /// build never leaves a file at `output`.
    pub fn compile_shared(&self, source: &str, output: &Path) -> Result<(), ToolchainError> {
        let directory = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut source_file = tempfile::Builder::new()
            .prefix("adcg-")
            .suffix(".c")
            .tempfile()?;
        source_file.write_all(source.as_bytes())?;
        source_file.flush()?;

        let staged = tempfile::Builder::new()
            .prefix(".adcg-")
            .suffix(&dynamic_library_extension())
            .tempfile_in(directory)?
            .into_temp_path();

        let args = self.arguments(source_file.path(), &staged);
        let rendered = render_command(&self.compiler, &args);
        if self.verbose {
            info!("{rendered}");
        } else {
            debug!("{rendered}");
        }

        let compiler = self.compiler.display().to_string();
        let result = Command::new(&self.compiler)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ToolchainError::Spawn {
                compiler: compiler.clone(),
                source,
            })?;

        let stderr = decode_to_string(&result.stderr);
        if !result.status.success() {
            return Err(ToolchainError::Failed {
                compiler,
                status: result.status,
                stderr,
            });
        }
        if !stderr.is_empty() {
            warn!("{compiler}: {stderr}");
        }

        staged.persist(output)?;
        Ok(())
    }

    /// User flags, then the mandatory shared-library flags, the output and
    /// the source. Libraries come last so the linker sees them after the
    /// objects that need them.
    fn arguments(&self, source: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.flags.iter().map(OsString::from).collect();
        args.push("-shared".into());
        if cfg!(unix) {
            args.push("-fPIC".into());
            args.push("-rdynamic".into());
        }
        args.push("-o".into());
        args.push(output.as_os_str().to_owned());
        args.push(source.as_os_str().to_owned());
        if cfg!(target_os = "linux") {
            args.push("-lm".into());
        }
        args
    }
}

fn resolve_from_env() -> Result<PathBuf, ToolchainError> {
    for var in [COMPILER_ENV, "CC"] {
        if let Ok(value) = std::env::var(var) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return which::which(trimmed)
                    .map_err(|_| ToolchainError::CompilerMissing(trimmed.to_string()));
            }
        }
    }
    ["cc", "gcc", "clang"]
        .into_iter()
        .find_map(|candidate| which::which(candidate).ok())
        .ok_or(ToolchainError::CompilerNotFound)
}

fn render_command(program: &Path, args: &[OsString]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

fn decode_to_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        String::new()
    } else {
        String::from_utf8_lossy(bytes).trim().to_string()
    }
}
