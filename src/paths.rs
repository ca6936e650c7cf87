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

//! Canonical on-disk naming for compiled artifacts.
//!
//! The compiler writes and the loader opens the same path, so both sides go
//! through these helpers. A *generic* path has no platform extension; the
//! *real* path is what exists on disk.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Extension of dynamic libraries on this platform, including the dot.
pub fn dynamic_library_extension() -> String {
    format!(".{}", std::env::consts::DLL_EXTENSION)
}

/// `directory/lib<model_name>`, without extension.
pub fn library_generic_path(model_name: &str, directory: impl AsRef<Path>) -> PathBuf {
    directory.as_ref().join(format!("lib{model_name}"))
}

/// `directory/lib<model_name>.<ext>` for the current platform.
pub fn library_real_path(model_name: &str, directory: impl AsRef<Path>) -> PathBuf {
    with_extension_suffix(
        &library_generic_path(model_name, directory),
        &dynamic_library_extension(),
    )
}

/// Whether a compiled library for `model_name` exists in `directory`.
pub fn library_exists(model_name: &str, directory: impl AsRef<Path>) -> bool {
    library_real_path(model_name, directory).is_file()
}

/// Append `suffix` verbatim to the final path component.
///
/// `Path::with_extension` would replace anything after a dot already present
/// in the model name, which is not what a generic path means.
pub fn with_extension_suffix(generic: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = generic.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Path of the serialized kernels written by the interpreted backend.
pub fn kernels_path(generic: &Path) -> PathBuf {
    with_extension_suffix(generic, ".kernels.json")
}

/// Model names become C symbol prefixes, so they must be C identifiers.
pub fn is_valid_model_name(model_name: &str) -> bool {
    let mut chars = model_name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}
