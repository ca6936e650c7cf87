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

//! Artifact backends.
//!
//! A [`Backend`] turns [`DerivativeKernels`] into a file next to the generic
//! path and loads that file back as an [`Artifact`]. Both backends write
//! under a temporary name and rename into place, so an artifact that exists
//! is always complete.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

use crate::artifact::{Artifact, InterpretedArtifact, LoadError, NativeLibrary};
use crate::codegen::emit_c_source;
use crate::config::CompileConfig;
use crate::kernels::DerivativeKernels;
use crate::paths::{dynamic_library_extension, kernels_path, library_generic_path, with_extension_suffix};
use crate::pipeline::CompileError;
use crate::toolchain::Toolchain;

pub trait Backend {
    /// On-disk location of the artifact for `generic_path`.
    fn artifact_path(&self, generic_path: &Path) -> PathBuf;

    /// Write the artifact for `kernels`; returns [`Backend::artifact_path`].
    fn generate_and_compile(
        &self,
        model_name: &str,
        kernels: &DerivativeKernels,
        generic_path: &Path,
        config: &CompileConfig,
    ) -> Result<PathBuf, CompileError>;

    fn load(&self, model_name: &str, generic_path: &Path) -> Result<Box<dyn Artifact>, LoadError>;

    fn artifact_exists(&self, model_name: &str, directory: &Path) -> bool {
        self.artifact_path(&library_generic_path(model_name, directory))
            .is_file()
    }
}

/// C source compiled into a shared library by the system toolchain.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl Backend for NativeBackend {
    fn artifact_path(&self, generic_path: &Path) -> PathBuf {
        with_extension_suffix(generic_path, &dynamic_library_extension())
    }

    fn generate_and_compile(
        &self,
        model_name: &str,
        kernels: &DerivativeKernels,
        generic_path: &Path,
        config: &CompileConfig,
    ) -> Result<PathBuf, CompileError> {
        let toolchain = Toolchain::resolve(config)?;
        let source = emit_c_source(model_name, kernels);

        if config.keep_sources {
            let source_path = with_extension_suffix(generic_path, ".c");
            std::fs::write(&source_path, &source).map_err(|source| CompileError::Write {
                path: source_path.clone(),
                source,
            })?;
            debug!("wrote generated source to {}", source_path.display());
        }

        let output = self.artifact_path(generic_path);
        toolchain.compile_shared(&source, &output)?;
        Ok(output)
    }

    fn load(&self, model_name: &str, generic_path: &Path) -> Result<Box<dyn Artifact>, LoadError> {
        Ok(Box::new(NativeLibrary::open(model_name, generic_path)?))
    }
}

/// Kernels serialized as JSON and evaluated by the trace interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpretedBackend;

impl Backend for InterpretedBackend {
    fn artifact_path(&self, generic_path: &Path) -> PathBuf {
        kernels_path(generic_path)
    }

    fn generate_and_compile(
        &self,
        _model_name: &str,
        kernels: &DerivativeKernels,
        generic_path: &Path,
        _config: &CompileConfig,
    ) -> Result<PathBuf, CompileError> {
        let path = self.artifact_path(generic_path);
        let json = serde_json::to_string_pretty(kernels)?;
        let write_error = |source| CompileError::Write {
            path: path.clone(),
            source,
        };

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = tempfile::Builder::new()
            .prefix(".adcg-")
            .suffix(".json")
            .tempfile_in(directory)
            .map_err(write_error)?;
        staged.write_all(json.as_bytes()).map_err(write_error)?;
        staged
            .persist(&path)
            .map_err(|err| write_error(err.error))?;
        Ok(path)
    }

    fn load(&self, model_name: &str, generic_path: &Path) -> Result<Box<dyn Artifact>, LoadError> {
        Ok(Box::new(InterpretedArtifact::open(model_name, generic_path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::DerivativeOrder;
    use crate::trace::{Node, Trace};

    fn identity_kernels() -> DerivativeKernels {
        let mut forward = Trace::new(1, 0);
        let x = forward.push(Node::Input(0));
        forward.outputs = vec![x];
        DerivativeKernels {
            input_size: 1,
            parameter_size: 0,
            output_size: 1,
            order: DerivativeOrder::Zero,
            forward,
            jacobian: None,
            hessian: None,
        }
    }

    #[test]
    fn interpreted_artifact_is_written_and_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generic = library_generic_path("Identity", dir.path());
        let backend = InterpretedBackend;
        assert!(!backend.artifact_exists("Identity", dir.path()));

        let path = backend
            .generate_and_compile(
                "Identity",
                &identity_kernels(),
                &generic,
                &CompileConfig::in_directory(dir.path()),
            )
            .expect("write");
        assert_eq!(path, dir.path().join("libIdentity.kernels.json"));
        assert!(backend.artifact_exists("Identity", dir.path()));

        let artifact = backend.load("Identity", &generic).expect("load");
        let mut y = [0.0];
        artifact.forward_zero(&[4.5], &mut y).expect("forward");
        assert_eq!(y, [4.5]);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".adcg-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn native_artifact_path_uses_platform_extension() {
        let path = NativeBackend.artifact_path(Path::new("dir/libm"));
        assert_eq!(
            path,
            with_extension_suffix(Path::new("dir/libm"), &dynamic_library_extension())
        );
    }
}
