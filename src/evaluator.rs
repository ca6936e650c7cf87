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

//! Evaluation of a loaded artifact.
//!
//! [`CompiledModel`] owns one [`Artifact`] and exposes the value, Jacobian
//! and Hessian operations on ndarray vectors. Every call validates the
//! combined input length against the artifact's declared dimension `D`;
//! derivative calls check the artifact's capability first.

use std::borrow::Cow;
use std::path::Path;

use ndarray::{s, Array1, Array2, ArrayView1, AsArray};

use crate::artifact::{Artifact, InterpretedArtifact, LoadError, NativeLibrary};
use crate::order::{Capability, DerivativeOrder};
use crate::trace::TraceError;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Fewer values than the model's input dimension.
    #[error(
        "input has {found} values but the model expects {expected}; \
         did you forget to pass the parameters?"
    )]
    InputTooSmall { expected: usize, found: usize },
    /// More values than the model's input dimension.
    #[error("input has {found} values but the model expects {expected}")]
    InputTooLarge { expected: usize, found: usize },
    /// The artifact was compiled below the order this operation needs.
    #[error(
        "{operation} is not available: the model must be compiled with derivative order \
         {required} or higher, but it was compiled with order {compiled}"
    )]
    DerivativeUnavailable {
        operation: &'static str,
        required: DerivativeOrder,
        compiled: DerivativeOrder,
    },
    #[error("output dimension {output_dim} is out of range for a model with {output_size} outputs")]
    OutputDimOutOfRange {
        output_dim: usize,
        output_size: usize,
    },
    /// A raw kernel buffer had the wrong length.
    #[error("{buffer} buffer has length {found}, expected {expected}")]
    BufferLength {
        buffer: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("kernel evaluation failed: {0}")]
    Trace(#[from] TraceError),
    #[error("result shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl EvalError {
    /// Whether the error reports an input of the wrong combined length.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            EvalError::InputTooSmall { .. } | EvalError::InputTooLarge { .. }
        )
    }
}

/// A compiled model ready for evaluation.
pub struct CompiledModel {
    artifact: Box<dyn Artifact>,
    input_size: usize,
    output_size: usize,
}

impl CompiledModel {
    /// Load the native library at `<generic_path><platform extension>`.
    pub fn new(model_name: &str, generic_path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let library = NativeLibrary::open(model_name, generic_path.as_ref())?;
        Ok(Self::from_artifact(Box::new(library)))
    }

    /// Load kernels written by the interpreted backend.
    pub fn open_interpreted(
        model_name: &str,
        generic_path: impl AsRef<Path>,
    ) -> Result<Self, LoadError> {
        let artifact = InterpretedArtifact::open(model_name, generic_path.as_ref())?;
        Ok(Self::from_artifact(Box::new(artifact)))
    }

    /// Wrap an already loaded artifact. Dimensions are read from it once.
    pub fn from_artifact(artifact: Box<dyn Artifact>) -> Self {
        let input_size = artifact.input_size();
        let output_size = artifact.output_size();
        Self {
            artifact,
            input_size,
            output_size,
        }
    }

    /// Combined input dimension `D` (inputs plus parameters).
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Output dimension `O`.
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn capability(&self) -> Capability {
        self.artifact.capability()
    }

    pub fn order(&self) -> DerivativeOrder {
        self.artifact.order()
    }

    pub fn artifact(&self) -> &dyn Artifact {
        self.artifact.as_ref()
    }

    /// `f(x)`; `x` must hold exactly `D` values.
    pub fn evaluate<'a>(&self, x: impl AsArray<'a, f64>) -> Result<Array1<f64>, EvalError> {
        let x: ArrayView1<'a, f64> = x.into();
        self.check_input_size(x.len())?;
        self.forward(&contiguous(&x))
    }

    /// `f([x; p])`; `len(x) + len(p)` must equal `D`.
    pub fn evaluate_with_params<'a, 'b>(
        &self,
        x: impl AsArray<'a, f64>,
        p: impl AsArray<'b, f64>,
    ) -> Result<Array1<f64>, EvalError> {
        let (x, p): (ArrayView1<'a, f64>, ArrayView1<'b, f64>) = (x.into(), p.into());
        self.check_input_size(x.len() + p.len())?;
        self.forward(&concat(&x, &p))
    }

    /// `O x D` Jacobian at `x`.
    pub fn jacobian<'a>(&self, x: impl AsArray<'a, f64>) -> Result<Array2<f64>, EvalError> {
        let x: ArrayView1<'a, f64> = x.into();
        self.require(DerivativeOrder::First, "jacobian")?;
        self.check_input_size(x.len())?;
        self.full_jacobian(&contiguous(&x))
    }

    /// `O x len(x)` Jacobian with respect to the inputs only; the parameter
    /// columns are dropped.
    pub fn jacobian_with_params<'a, 'b>(
        &self,
        x: impl AsArray<'a, f64>,
        p: impl AsArray<'b, f64>,
    ) -> Result<Array2<f64>, EvalError> {
        let (x, p): (ArrayView1<'a, f64>, ArrayView1<'b, f64>) = (x.into(), p.into());
        self.require(DerivativeOrder::First, "jacobian")?;
        self.check_input_size(x.len() + p.len())?;
        let full = self.full_jacobian(&concat(&x, &p))?;
        Ok(full.slice(s![.., ..x.len()]).to_owned())
    }

    /// `D x D` Hessian of output `output_dim` at `x`.
    pub fn hessian<'a>(
        &self,
        x: impl AsArray<'a, f64>,
        output_dim: usize,
    ) -> Result<Array2<f64>, EvalError> {
        let x: ArrayView1<'a, f64> = x.into();
        self.require(DerivativeOrder::Second, "hessian")?;
        self.check_input_size(x.len())?;
        self.full_hessian(&contiguous(&x), output_dim)
    }

    /// `len(x) x len(x)` Hessian block of output `output_dim` with respect to
    /// the inputs only.
    pub fn hessian_with_params<'a, 'b>(
        &self,
        x: impl AsArray<'a, f64>,
        p: impl AsArray<'b, f64>,
        output_dim: usize,
    ) -> Result<Array2<f64>, EvalError> {
        let (x, p): (ArrayView1<'a, f64>, ArrayView1<'b, f64>) = (x.into(), p.into());
        self.require(DerivativeOrder::Second, "hessian")?;
        self.check_input_size(x.len() + p.len())?;
        let n = x.len();
        let full = self.full_hessian(&concat(&x, &p), output_dim)?;
        Ok(full.slice(s![..n, ..n]).to_owned())
    }

    fn require(&self, required: DerivativeOrder, operation: &'static str) -> Result<(), EvalError> {
        let compiled = self.order();
        if compiled >= required {
            Ok(())
        } else {
            Err(EvalError::DerivativeUnavailable {
                operation,
                required,
                compiled,
            })
        }
    }

    fn check_input_size(&self, found: usize) -> Result<(), EvalError> {
        let expected = self.input_size;
        if found < expected {
            Err(EvalError::InputTooSmall { expected, found })
        } else if found > expected {
            Err(EvalError::InputTooLarge { expected, found })
        } else {
            Ok(())
        }
    }

    fn forward(&self, xp: &[f64]) -> Result<Array1<f64>, EvalError> {
        let mut y = vec![0.0; self.output_size];
        self.artifact.forward_zero(xp, &mut y)?;
        Ok(Array1::from_vec(y))
    }

    fn full_jacobian(&self, xp: &[f64]) -> Result<Array2<f64>, EvalError> {
        let mut jac = vec![0.0; self.output_size * self.input_size];
        self.artifact.jacobian(xp, &mut jac)?;
        Ok(Array2::from_shape_vec(
            (self.output_size, self.input_size),
            jac,
        )?)
    }

    fn full_hessian(&self, xp: &[f64], output_dim: usize) -> Result<Array2<f64>, EvalError> {
        if output_dim >= self.output_size {
            return Err(EvalError::OutputDimOutOfRange {
                output_dim,
                output_size: self.output_size,
            });
        }
        // One-hot selection of a single output; every other weight is zero.
        let mut weights = vec![0.0; self.output_size];
        weights[output_dim] = 1.0;

        let mut hess = vec![0.0; self.input_size * self.input_size];
        self.artifact.hessian(xp, &weights, &mut hess)?;
        Ok(Array2::from_shape_vec(
            (self.input_size, self.input_size),
            hess,
        )?)
    }
}

impl std::fmt::Debug for CompiledModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModel")
            .field("input_size", &self.input_size)
            .field("output_size", &self.output_size)
            .field("order", &self.order())
            .finish_non_exhaustive()
    }
}

fn contiguous<'a>(x: &'a ArrayView1<'_, f64>) -> Cow<'a, [f64]> {
    match x.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(x.to_vec()),
    }
}

fn concat(x: &ArrayView1<'_, f64>, p: &ArrayView1<'_, f64>) -> Vec<f64> {
    x.iter().chain(p.iter()).copied().collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use ndarray::array;

    use super::*;

    /// `y_k = (k + 1) * sum(x)`, with weights recorded for inspection.
    struct Linear {
        inputs: usize,
        outputs: usize,
        order: DerivativeOrder,
        last_weights: Arc<Mutex<Vec<f64>>>,
    }

    impl Linear {
        fn new(inputs: usize, outputs: usize, order: DerivativeOrder) -> Self {
            Self {
                inputs,
                outputs,
                order,
                last_weights: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Artifact for Linear {
        fn input_size(&self) -> usize {
            self.inputs
        }

        fn output_size(&self) -> usize {
            self.outputs
        }

        fn order(&self) -> DerivativeOrder {
            self.order
        }

        fn forward_zero(&self, x: &[f64], y: &mut [f64]) -> Result<(), EvalError> {
            let sum: f64 = x.iter().sum();
            for (k, slot) in y.iter_mut().enumerate() {
                *slot = (k + 1) as f64 * sum;
            }
            Ok(())
        }

        fn jacobian(&self, _x: &[f64], jac: &mut [f64]) -> Result<(), EvalError> {
            for (index, slot) in jac.iter_mut().enumerate() {
                *slot = (index / self.inputs + 1) as f64 * 10.0 + (index % self.inputs) as f64;
            }
            Ok(())
        }

        fn hessian(&self, _x: &[f64], w: &[f64], hess: &mut [f64]) -> Result<(), EvalError> {
            *self.last_weights.lock().expect("lock") = w.to_vec();
            for (index, slot) in hess.iter_mut().enumerate() {
                *slot = index as f64;
            }
            Ok(())
        }
    }

    fn model(inputs: usize, outputs: usize, order: DerivativeOrder) -> CompiledModel {
        CompiledModel::from_artifact(Box::new(Linear::new(inputs, outputs, order)))
    }

    #[test]
    fn split_evaluate_matches_concatenated() {
        let m = model(3, 2, DerivativeOrder::Zero);
        let joined = m.evaluate(&array![1.0, 2.0, 3.0]).expect("joined");
        let split = m
            .evaluate_with_params(&array![1.0, 2.0], &array![3.0])
            .expect("split");
        assert_eq!(joined, split);
        assert_eq!(joined, array![6.0, 12.0]);
    }

    #[test]
    fn short_input_hints_at_parameters() {
        let m = model(3, 1, DerivativeOrder::Second);
        let err = m.evaluate(&[1.0, 2.0][..]).unwrap_err();
        assert!(matches!(err, EvalError::InputTooSmall { expected: 3, found: 2 }));
        assert!(err.to_string().contains("forget to pass the parameters"));

        let err = m.jacobian(&[1.0; 4][..]).unwrap_err();
        assert!(matches!(err, EvalError::InputTooLarge { expected: 3, found: 4 }));
        assert!(!err.to_string().contains("parameters"));

        assert!(m.hessian(&[1.0; 2][..], 0).unwrap_err().is_shape_mismatch());
        assert!(m
            .evaluate_with_params(&[1.0; 2][..], &[1.0; 2][..])
            .unwrap_err()
            .is_shape_mismatch());
    }

    #[test]
    fn capability_is_checked_before_size() {
        let m = model(3, 1, DerivativeOrder::Zero);
        let err = m.jacobian(&[1.0][..]).unwrap_err();
        assert!(matches!(
            err,
            EvalError::DerivativeUnavailable {
                operation: "jacobian",
                required: DerivativeOrder::First,
                compiled: DerivativeOrder::Zero,
            }
        ));

        let m = model(3, 1, DerivativeOrder::First);
        let err = m.hessian_with_params(&[1.0][..], &[0.0f64; 0][..], 0).unwrap_err();
        assert!(matches!(err, EvalError::DerivativeUnavailable { .. }));
        assert!(err.to_string().contains("second"));
        assert!(m.evaluate(&[1.0; 3][..]).is_ok());
    }

    #[test]
    fn jacobian_with_params_keeps_input_columns() {
        let m = model(3, 2, DerivativeOrder::First);
        let full = m.jacobian(&[0.0; 3][..]).expect("full");
        assert_eq!(full, array![[10.0, 11.0, 12.0], [20.0, 21.0, 22.0]]);

        let sliced = m
            .jacobian_with_params(&[0.0; 2][..], &[0.0][..])
            .expect("sliced");
        assert_eq!(sliced, array![[10.0, 11.0], [20.0, 21.0]]);
    }

    #[test]
    fn hessian_uses_one_hot_weights() {
        let linear = Linear::new(3, 4, DerivativeOrder::Second);
        let m = CompiledModel::from_artifact(Box::new(linear));
        let hess = m.hessian(&[0.0; 3][..], 2).expect("hessian");
        assert_eq!(hess.dim(), (3, 3));
        assert_eq!(hess[[1, 2]], 5.0);

        let block = m
            .hessian_with_params(&[0.0; 2][..], &[0.0][..], 1)
            .expect("block");
        assert_eq!(block, array![[0.0, 1.0], [3.0, 4.0]]);
    }

    #[test]
    fn one_hot_vector_has_a_single_entry() {
        let linear = Linear::new(2, 3, DerivativeOrder::Second);
        let weights = Arc::clone(&linear.last_weights);
        let m = CompiledModel::from_artifact(Box::new(linear));
        m.hessian(&[0.0; 2][..], 1).expect("hessian");
        assert_eq!(*weights.lock().expect("lock"), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn output_dim_must_be_in_range() {
        let m = model(2, 3, DerivativeOrder::Second);
        assert!(m.hessian(&[0.0; 2][..], 2).is_ok());
        let err = m.hessian(&[0.0; 2][..], 3).unwrap_err();
        assert!(matches!(
            err,
            EvalError::OutputDimOutOfRange {
                output_dim: 3,
                output_size: 3
            }
        ));
    }
}
