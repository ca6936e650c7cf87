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

//! The contract a model author implements.
//!
//! A model supplies an example input vector, an optional example parameter
//! vector and exactly one function form, chosen through [`ModelFn`]. The
//! example vectors fix the artifact's dimensions; parameters occupy the
//! trailing slots of the combined input and are never differentiated with
//! respect to by the `*_with_params` evaluators.

use ndarray::Array1;

use crate::config::CompileConfig;
use crate::evaluator::CompiledModel;
use crate::order::DerivativeOrder;
use crate::pipeline::{self, CompileError};
use crate::trace::Var;

pub type ParameterlessFn<'a> = Box<dyn for<'t> Fn(&[Var<'t>]) -> Vec<Var<'t>> + 'a>;
pub type ParameterizedFn<'a> =
    Box<dyn for<'t> Fn(&[Var<'t>], &[Var<'t>]) -> Vec<Var<'t>> + 'a>;

/// The single function a model exposes.
pub enum ModelFn<'a> {
    /// `y = f(x)`.
    Parameterless(ParameterlessFn<'a>),
    /// `y = f(x, p)`.
    Parameterized(ParameterizedFn<'a>),
}

impl<'a> ModelFn<'a> {
    pub fn parameterless<F>(f: F) -> Self
    where
        F: for<'t> Fn(&[Var<'t>]) -> Vec<Var<'t>> + 'a,
    {
        ModelFn::Parameterless(Box::new(f))
    }

    pub fn parameterized<F>(f: F) -> Self
    where
        F: for<'t> Fn(&[Var<'t>], &[Var<'t>]) -> Vec<Var<'t>> + 'a,
    {
        ModelFn::Parameterized(Box::new(f))
    }

    pub fn is_parameterized(&self) -> bool {
        matches!(self, ModelFn::Parameterized(_))
    }

    /// Run the function on traced variables. Parameterless functions ignore `p`.
    pub fn apply<'t>(&self, x: &[Var<'t>], p: &[Var<'t>]) -> Vec<Var<'t>> {
        match self {
            ModelFn::Parameterless(f) => f(x),
            ModelFn::Parameterized(f) => f(x, p),
        }
    }
}

impl std::fmt::Debug for ModelFn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFn::Parameterless(_) => f.write_str("ModelFn::Parameterless(..)"),
            ModelFn::Parameterized(_) => f.write_str("ModelFn::Parameterized(..)"),
        }
    }
}

/// A differentiable model.
pub trait AdModel {
    /// Example input; its length is the size of the differentiated input.
    fn input(&self) -> Array1<f64>;

    /// Example parameters. Empty for parameterless models.
    fn parameters(&self) -> Array1<f64> {
        Array1::zeros(0)
    }

    fn function(&self) -> ModelFn<'_>;

    /// Compile this model natively with `config`.
    fn compile(
        &self,
        model_name: &str,
        order: DerivativeOrder,
        config: &CompileConfig,
    ) -> Result<CompiledModel, CompileError> {
        pipeline::compile(self, model_name, order, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Tape;

    struct Scale(f64);

    impl AdModel for Scale {
        fn input(&self) -> Array1<f64> {
            Array1::ones(2)
        }

        fn function(&self) -> ModelFn<'_> {
            ModelFn::parameterless(move |x| x.iter().map(|v| *v * self.0).collect())
        }
    }

    #[test]
    fn parameters_default_to_empty() {
        let model = Scale(3.0);
        assert!(model.parameters().is_empty());
        assert!(!model.function().is_parameterized());
    }

    #[test]
    fn apply_dispatches_on_variant() {
        let tape = Tape::new();
        let x = tape.independent(&[1.0, 2.0]);
        let p = tape.independent(&[10.0]);

        let scaled = Scale(3.0).function().apply(&x, &p);
        assert_eq!(scaled.iter().map(|v| v.value()).collect::<Vec<_>>(), vec![3.0, 6.0]);

        let shifted = ModelFn::parameterized(|x, p| vec![x[0] + p[0]]);
        assert!(shifted.is_parameterized());
        assert_eq!(shifted.apply(&x, &p)[0].value(), 11.0);
    }
}
