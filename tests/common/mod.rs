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

#![allow(dead_code)]

use std::path::Path;

use ndarray::{Array1, Array2};

use adcodegen::toolchain::Toolchain;
use adcodegen::{AdModel, CompileConfig, ModelFn};

/// `y = 2x` over three inputs.
pub struct BasicModel;

impl AdModel for BasicModel {
    fn input(&self) -> Array1<f64> {
        Array1::ones(3)
    }

    fn function(&self) -> ModelFn<'_> {
        ModelFn::parameterless(|x| x.iter().map(|v| *v * 2.0).collect())
    }
}

/// `y = sum_i 0.5 * p_i * x_i^2` with one parameter per input.
pub struct ParameterizedModel;

impl AdModel for ParameterizedModel {
    fn input(&self) -> Array1<f64> {
        Array1::ones(3)
    }

    fn parameters(&self) -> Array1<f64> {
        Array1::ones(3)
    }

    fn function(&self) -> ModelFn<'_> {
        ModelFn::parameterized(|x, p| {
            let terms = x.iter().zip(p).map(|(xi, pi)| 0.5 * *pi * xi.square());
            vec![x[0].tape().sum(terms)]
        })
    }
}

/// `y = [sin(x0) cos(x1), sqrt(x2), x . x]`.
pub struct MathFunctionsModel;

impl AdModel for MathFunctionsModel {
    fn input(&self) -> Array1<f64> {
        Array1::ones(3)
    }

    fn function(&self) -> ModelFn<'_> {
        ModelFn::parameterless(|x| {
            let dot = x[0].tape().sum(x.iter().map(|v| *v * *v));
            vec![x[0].sin() * x[1].cos(), x[2].sqrt(), dot]
        })
    }
}

pub fn math_jacobian(x: &Array1<f64>) -> Array2<f64> {
    let (a, b, c) = (x[0], x[1], x[2]);
    ndarray::array![
        [a.cos() * b.cos(), -a.sin() * b.sin(), 0.0],
        [0.0, 0.0, 0.5 / c.sqrt()],
        [2.0 * a, 2.0 * b, 2.0 * c],
    ]
}

pub fn math_hessians(x: &Array1<f64>) -> [Array2<f64>; 3] {
    let (a, b, c) = (x[0], x[1], x[2]);
    let mut h0 = Array2::zeros((3, 3));
    h0[[0, 0]] = -a.sin() * b.cos();
    h0[[0, 1]] = -a.cos() * b.sin();
    h0[[1, 0]] = -a.cos() * b.sin();
    h0[[1, 1]] = -a.sin() * b.cos();

    let mut h1 = Array2::zeros((3, 3));
    h1[[2, 2]] = -0.25 * c.powf(-1.5);

    let h2 = Array2::eye(3) * 2.0;
    [h0, h1, h2]
}

const TOLERANCE: f64 = 1e-10;

pub fn assert_close(actual: f64, expected: f64) {
    let scale = 1.0 + actual.abs().max(expected.abs());
    assert!(
        (actual - expected).abs() <= TOLERANCE * scale,
        "expected {expected}, got {actual}"
    );
}

pub fn assert_vector_close(actual: &Array1<f64>, expected: &Array1<f64>) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (a, e) in actual.iter().zip(expected) {
        assert_close(*a, *e);
    }
}

pub fn assert_matrix_close(actual: &Array2<f64>, expected: &Array2<f64>) {
    assert_eq!(actual.dim(), expected.dim(), "shape mismatch");
    for (a, e) in actual.iter().zip(expected) {
        assert_close(*a, *e);
    }
}

/// Whether a C compiler can be resolved; prints why a test is skipped.
pub fn native_toolchain_available() -> bool {
    Toolchain::resolve(&CompileConfig::default())
        .map(|_| true)
        .unwrap_or_else(|err| {
            eprintln!("Skipping native backend test: {err}");
            false
        })
}

/// Native config with portable flags so results are deterministic.
pub fn native_config(directory: &Path) -> CompileConfig {
    CompileConfig::in_directory(directory).with_flags(["-O2"])
}
