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

use ndarray::{array, Array1, Array2};
use tempfile::tempdir;

use adcodegen::{
    compile_with, AdModel, CompileConfig, CompiledModel, DerivativeOrder, EvalError,
    InterpretedBackend,
};
use common::{assert_close, assert_matrix_close, assert_vector_close, native_config, ParameterizedModel};

const NAME: &str = "ParameterizedTestModel";

fn check_parameterized(model: &CompiledModel) {
    assert_eq!(model.input_size(), 6);
    assert_eq!(model.output_size(), 1);

    let x: Array1<f64> = Array1::ones(3);
    let p: Array1<f64> = Array1::ones(3);
    assert_vector_close(&model.evaluate_with_params(&x, &p).expect("evaluate"), &array![1.5]);
    assert_matrix_close(
        &model.jacobian_with_params(&x, &p).expect("jacobian"),
        &array![[1.0, 1.0, 1.0]],
    );
    assert_matrix_close(
        &model.hessian_with_params(&x, &p, 0).expect("hessian"),
        &Array2::eye(3),
    );

    let x = array![1.0, 2.0, 3.0];
    let p = array![4.0, 5.0, 6.0];
    let split = model.evaluate_with_params(&x, &p).expect("split");
    let joined = model
        .evaluate(&array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        .expect("joined");
    assert_close(split[0], 0.5 * (4.0 + 20.0 + 54.0));
    assert_vector_close(&split, &joined);

    // J = x^T diag(p), parameter columns dropped.
    assert_matrix_close(
        &model.jacobian_with_params(&x, &p).expect("jacobian"),
        &array![[4.0, 10.0, 18.0]],
    );
    let full = model
        .jacobian(&array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        .expect("full jacobian");
    assert_matrix_close(&full, &array![[4.0, 10.0, 18.0, 0.5, 2.0, 4.5]]);

    let mut expected = Array2::zeros((3, 3));
    for (i, value) in p.iter().enumerate() {
        expected[[i, i]] = *value;
    }
    assert_matrix_close(&model.hessian_with_params(&x, &p, 0).expect("hessian"), &expected);
}

fn check_missing_parameters(model: &CompiledModel) {
    let x: Array1<f64> = Array1::ones(3);
    for err in [
        model.evaluate(&x).unwrap_err(),
        model.jacobian(&x).unwrap_err(),
        model.hessian(&x, 0).unwrap_err(),
    ] {
        assert!(matches!(err, EvalError::InputTooSmall { expected: 6, found: 3 }));
        assert!(err.to_string().contains("parameters"));
    }

    let err = model
        .evaluate_with_params(&x, &array![1.0, 1.0, 1.0, 1.0])
        .unwrap_err();
    assert!(matches!(err, EvalError::InputTooLarge { expected: 6, found: 7 }));
}

#[test]
fn parameterized_model_interpreted() {
    let dir = tempdir().expect("tempdir");
    let model = compile_with(
        &InterpretedBackend,
        &ParameterizedModel,
        NAME,
        DerivativeOrder::Second,
        &CompileConfig::in_directory(dir.path()),
    )
    .expect("compile");
    check_parameterized(&model);
    check_missing_parameters(&model);
}

#[test]
fn parameterized_model_native() {
    if !common::native_toolchain_available() {
        return;
    }
    let dir = tempdir().expect("tempdir");
    let model = ParameterizedModel
        .compile(NAME, DerivativeOrder::Second, &native_config(dir.path()))
        .expect("compile");
    check_parameterized(&model);
    check_missing_parameters(&model);
}
