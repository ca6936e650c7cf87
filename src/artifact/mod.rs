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

//! Loaded artifacts.
//!
//! An [`Artifact`] is the in-process view of a compiled model: its declared
//! dimensions, its derivative order and raw kernel entry points operating on
//! flat buffers. Buffer lengths are checked before any kernel runs.

mod interpreted;
mod native;

use std::path::PathBuf;

pub use interpreted::InterpretedArtifact;
pub use native::NativeLibrary;

use crate::evaluator::EvalError;
use crate::order::{Capability, DerivativeOrder};
use crate::trace::TraceError;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid model name '{0}': expected a C identifier")]
    InvalidModelName(String),
    #[error("compiled model not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to load {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("symbol {symbol} is missing from {}", .path.display())]
    MissingSymbol {
        path: PathBuf,
        symbol: String,
        #[source]
        source: libloading::Error,
    },
    #[error("invalid artifact metadata: {0}")]
    InvalidMetadata(String),
    #[error("invalid kernels: {0}")]
    Kernels(#[from] TraceError),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse kernels: {0}")]
    Json(#[from] serde_json::Error),
}

/// A loaded, read-only compiled model.
///
/// `D = input_size()` and `O = output_size()`. Buffers are flat and
/// row-major.
pub trait Artifact: Send + Sync {
    fn input_size(&self) -> usize;

    fn output_size(&self) -> usize;

    /// Highest derivative order the artifact was compiled for.
    fn order(&self) -> DerivativeOrder;

    fn capability(&self) -> Capability {
        Capability::from(self.order())
    }

    /// `y = f(x)` with `x` of length `D` and `y` of length `O`.
    fn forward_zero(&self, x: &[f64], y: &mut [f64]) -> Result<(), EvalError>;

    /// Row-major `O x D` Jacobian into `jac`.
    fn jacobian(&self, x: &[f64], jac: &mut [f64]) -> Result<(), EvalError>;

    /// Row-major `D x D` Hessian of `sum_k w[k] * y[k]` into `hess`.
    fn hessian(&self, x: &[f64], w: &[f64], hess: &mut [f64]) -> Result<(), EvalError>;
}

pub(crate) fn check_buffer(
    buffer: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), EvalError> {
    if expected == found {
        Ok(())
    } else {
        Err(EvalError::BufferLength {
            buffer,
            expected,
            found,
        })
    }
}

pub(crate) fn unavailable(
    operation: &'static str,
    required: DerivativeOrder,
    compiled: DerivativeOrder,
) -> EvalError {
    EvalError::DerivativeUnavailable {
        operation,
        required,
        compiled,
    }
}
