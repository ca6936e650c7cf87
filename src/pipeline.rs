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

//! Model compilation pipeline.
//!
//! Recording, derivative synthesis and optimization happen in
//! [`record_and_optimize`]; a [`Backend`] turns the resulting kernels into
//! an artifact on disk and loads it back. [`compile`] wires the native
//! backend in.

use log::{debug, info};

use crate::artifact::LoadError;
use crate::backend::{Backend, NativeBackend};
use crate::config::CompileConfig;
use crate::evaluator::CompiledModel;
use crate::kernels::DerivativeKernels;
use crate::model::AdModel;
use crate::order::DerivativeOrder;
use crate::paths::{is_valid_model_name, library_generic_path};
use crate::toolchain::ToolchainError;
use crate::trace::{
    hessian_trace, jacobian_trace, optimize, verify_trace, NodeId, Tape, TraceError, Var,
};

/// Errors surfaced while compiling a model.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("invalid model name '{0}': expected a C identifier")]
    InvalidModelName(String),
    #[error("failed to create artifact directory {}: {source}", .path.display())]
    CreateDirectory {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tracing failed: {0}")]
    Trace(#[from] TraceError),
    #[error("compilation failed: {0}")]
    Toolchain(#[from] ToolchainError),
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize kernels: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to load the compiled model: {0}")]
    Load(#[from] LoadError),
}

/// Record `model` at its example point and synthesize the kernels `order`
/// asks for.
///
/// The combined independent vector is `[input; parameters]`; parameters
/// occupy its trailing slots.
pub fn record_and_optimize<M: AdModel + ?Sized>(
    model: &M,
    order: DerivativeOrder,
) -> Result<DerivativeKernels, TraceError> {
    let x0 = model.input();
    let p0 = model.parameters();
    if x0.is_empty() {
        return Err(TraceError::EmptyInput);
    }
    let xp0: Vec<f64> = x0.iter().chain(p0.iter()).copied().collect();
    let function = model.function();

    let tape = Tape::new();
    let outputs: Vec<NodeId> = {
        let xp = tape.independent(&xp0);
        let (x, p) = xp.split_at(x0.len());
        function.apply(x, p).iter().map(Var::id).collect()
    };
    if outputs.is_empty() {
        return Err(TraceError::EmptyOutput);
    }

    let recorded = tape.into_trace(outputs);
    verify_trace(&recorded)?;
    debug!(
        "recorded {} nodes over {} inputs ({} parameters)",
        recorded.len(),
        recorded.num_inputs,
        p0.len()
    );

    let forward = optimize(&recorded);
    let jacobian = order
        .includes_jacobian()
        .then(|| optimize(&jacobian_trace(&forward)));
    let hessian = order
        .includes_hessian()
        .then(|| optimize(&hessian_trace(&forward)));

    let kernels = DerivativeKernels {
        input_size: xp0.len(),
        parameter_size: p0.len(),
        output_size: forward.outputs.len(),
        order,
        forward,
        jacobian,
        hessian,
    };
    kernels.validate()?;
    debug!(
        "kernels: forward {} nodes, jacobian {:?}, hessian {:?}",
        kernels.forward.len(),
        kernels.jacobian.as_ref().map(|t| t.len()),
        kernels.hessian.as_ref().map(|t| t.len())
    );
    Ok(kernels)
}

/// Compile `model` to a native shared library and load it.
pub fn compile<M: AdModel + ?Sized>(
    model: &M,
    model_name: &str,
    order: DerivativeOrder,
    config: &CompileConfig,
) -> Result<CompiledModel, CompileError> {
    compile_with(&NativeBackend, model, model_name, order, config)
}

/// Compile `model` with an explicit backend.
///
/// The artifact lands at `config.artifact_directory/lib<model_name>` plus the
/// backend's suffix. Creating the directory is part of the call; failing to
/// do so aborts compilation.
pub fn compile_with<B: Backend + ?Sized, M: AdModel + ?Sized>(
    backend: &B,
    model: &M,
    model_name: &str,
    order: DerivativeOrder,
    config: &CompileConfig,
) -> Result<CompiledModel, CompileError> {
    if !is_valid_model_name(model_name) {
        return Err(CompileError::InvalidModelName(model_name.to_string()));
    }

    let directory = &config.artifact_directory;
    std::fs::create_dir_all(directory).map_err(|source| CompileError::CreateDirectory {
        path: directory.clone(),
        source,
    })?;

    let kernels = record_and_optimize(model, order)?;
    let generic_path = library_generic_path(model_name, directory);
    let artifact_path = backend.generate_and_compile(model_name, &kernels, &generic_path, config)?;
    if config.verbose {
        info!("Compiled library to {}", artifact_path.display());
    } else {
        debug!("Compiled library to {}", artifact_path.display());
    }

    let artifact = backend.load(model_name, &generic_path)?;
    Ok(CompiledModel::from_artifact(artifact))
}
