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

use std::path::{Path, PathBuf};

use log::debug;

use super::{check_buffer, unavailable, Artifact, LoadError};
use crate::evaluator::EvalError;
use crate::kernels::DerivativeKernels;
use crate::order::DerivativeOrder;
use crate::paths::{is_valid_model_name, kernels_path};

/// Kernels evaluated in-process by the trace interpreter.
#[derive(Debug, Clone)]
pub struct InterpretedArtifact {
    kernels: DerivativeKernels,
    path: Option<PathBuf>,
}

impl InterpretedArtifact {
    pub fn from_kernels(kernels: DerivativeKernels) -> Result<Self, LoadError> {
        kernels.validate()?;
        Ok(Self {
            kernels,
            path: None,
        })
    }

    /// Load `<generic_path>.kernels.json` as written by the interpreted backend.
    pub fn open(model_name: &str, generic_path: &Path) -> Result<Self, LoadError> {
        if !is_valid_model_name(model_name) {
            return Err(LoadError::InvalidModelName(model_name.to_string()));
        }
        let path = kernels_path(generic_path);
        if !path.is_file() {
            return Err(LoadError::NotFound(path));
        }
        let text = std::fs::read_to_string(&path).map_err(|source| LoadError::Read {
            path: path.clone(),
            source,
        })?;
        let kernels: DerivativeKernels = serde_json::from_str(&text)?;
        let mut artifact = Self::from_kernels(kernels)?;
        debug!(
            "loaded {} ({} inputs, {} outputs, order {})",
            path.display(),
            artifact.kernels.input_size,
            artifact.kernels.output_size,
            artifact.kernels.order
        );
        artifact.path = Some(path);
        Ok(artifact)
    }

    pub fn kernels(&self) -> &DerivativeKernels {
        &self.kernels
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Artifact for InterpretedArtifact {
    fn input_size(&self) -> usize {
        self.kernels.input_size
    }

    fn output_size(&self) -> usize {
        self.kernels.output_size
    }

    fn order(&self) -> DerivativeOrder {
        self.kernels.order
    }

    fn forward_zero(&self, x: &[f64], y: &mut [f64]) -> Result<(), EvalError> {
        check_buffer("input", self.input_size(), x.len())?;
        check_buffer("output", self.output_size(), y.len())?;
        self.kernels.forward.evaluate_into(x, &[], y)?;
        Ok(())
    }

    fn jacobian(&self, x: &[f64], jac: &mut [f64]) -> Result<(), EvalError> {
        let kernel = self
            .kernels
            .jacobian
            .as_ref()
            .ok_or_else(|| unavailable("jacobian", DerivativeOrder::First, self.order()))?;
        check_buffer("input", self.input_size(), x.len())?;
        check_buffer(
            "jacobian",
            self.output_size() * self.input_size(),
            jac.len(),
        )?;
        kernel.evaluate_into(x, &[], jac)?;
        Ok(())
    }

    fn hessian(&self, x: &[f64], w: &[f64], hess: &mut [f64]) -> Result<(), EvalError> {
        let kernel = self
            .kernels
            .hessian
            .as_ref()
            .ok_or_else(|| unavailable("hessian", DerivativeOrder::Second, self.order()))?;
        check_buffer("input", self.input_size(), x.len())?;
        check_buffer("weight", self.output_size(), w.len())?;
        check_buffer(
            "hessian",
            self.input_size() * self.input_size(),
            hess.len(),
        )?;
        kernel.evaluate_into(x, w, hess)?;
        Ok(())
    }
}
