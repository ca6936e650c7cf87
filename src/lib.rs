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

//! adcodegen: compile differentiable models into derivative kernels.
//!
//! A model implements [`AdModel`]. [`compile`] records it on a symbolic
//! [`trace::Tape`], synthesizes value, Jacobian and Hessian kernels up to the
//! requested [`DerivativeOrder`], builds them into a shared library and
//! returns a [`CompiledModel`] for evaluation. [`CompiledModel::new`] reloads
//! a library compiled earlier without the model.

pub mod artifact;
pub mod backend;
pub mod codegen;
pub mod config;
pub mod evaluator;
pub mod kernels;
pub mod model;
pub mod order;
pub mod paths;
pub mod pipeline;
pub mod toolchain;
pub mod trace;

pub use artifact::{Artifact, LoadError};
pub use backend::{Backend, InterpretedBackend, NativeBackend};
pub use config::{CompileConfig, ConfigError};
pub use evaluator::{CompiledModel, EvalError};
pub use kernels::DerivativeKernels;
pub use model::{AdModel, ModelFn};
pub use order::{Capability, DerivativeOrder};
pub use paths::{library_exists, library_generic_path, library_real_path};
pub use pipeline::{compile, compile_with, record_and_optimize, CompileError};
pub use toolchain::ToolchainError;
pub use trace::{TraceError, Var};
