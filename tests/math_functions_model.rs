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

mod common;

use ndarray::{array, Array1};
use tempfile::tempdir;

use adcodegen::{compile_with, AdModel, CompileConfig, CompiledModel, DerivativeOrder, InterpretedBackend};
use common::{
    assert_matrix_close, assert_vector_close, math_hessians, math_jacobian, native_config,
    MathFunctionsModel,
};

const NAME: &str = "MathFunctionsTestModel";

fn check_at(model: &CompiledModel, x: Array1<f64>) {
    let (a, b, c) = (x[0], x[1], x[2]);
    let expected = array![a.sin() * b.cos(), c.sqrt(), a * a + b * b + c * c];
    assert_vector_close(&model.evaluate(&x).expect("evaluate"), &expected);
    assert_matrix_close(&model.jacobian(&x).expect("jacobian"), &math_jacobian(&x));
    for (k, expected) in math_hessians(&x).iter().enumerate() {
        assert_matrix_close(&model.hessian(&x, k).expect("hessian"), expected);
    }
}

fn check_math(model: &CompiledModel) {
    assert_eq!((model.input_size(), model.output_size()), (3, 3));
    check_at(model, Array1::ones(3));
    check_at(model, array![0.3, -0.7, 2.5]);
}

#[test]
fn math_functions_interpreted() {
    let dir = tempdir().expect("tempdir");
    let model = compile_with(
        &InterpretedBackend,
        &MathFunctionsModel,
        NAME,
        DerivativeOrder::Second,
        &CompileConfig::in_directory(dir.path()),
    )
    .expect("compile");
    check_math(&model);
}

#[test]
fn math_functions_native() {
    if !common::native_toolchain_available() {
        return;
    }
    let dir = tempdir().expect("tempdir");
    let model = MathFunctionsModel
        .compile(NAME, DerivativeOrder::Second, &native_config(dir.path()))
        .expect("compile");
    check_math(&model);
}
