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

//! C source emission for derivative kernels.
//!
//! Each kernel becomes one straight-line function: a `const double` per
//! trace node followed by stores into the output buffer. Symbols follow the
//! `<name>_<kernel>` convention read back by
//! [`NativeLibrary`](crate::artifact::NativeLibrary).

use crate::kernels::DerivativeKernels;
use crate::trace::{BinOp, Node, Trace, UnaryOp};

const PRELUDE: &str = "\
#include <math.h>
#include <stddef.h>

#if defined(_WIN32)
#define ADCG_EXPORT __declspec(dllexport)
#else
#define ADCG_EXPORT __attribute__((visibility(\"default\")))
#endif

";

/// Render the complete translation unit for `model_name`.
///
/// The caller guarantees `model_name` is a valid C identifier.
pub fn emit_c_source(model_name: &str, kernels: &DerivativeKernels) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "/* {model_name}: generated by adcodegen, derivative order {} */\n",
        kernels.order
    ));
    out.push_str(PRELUDE);

    out.push_str(&format!(
        "ADCG_EXPORT size_t {model_name}_input_size(void) {{ return {}; }}\n",
        kernels.input_size
    ));
    out.push_str(&format!(
        "ADCG_EXPORT size_t {model_name}_output_size(void) {{ return {}; }}\n",
        kernels.output_size
    ));
    out.push_str(&format!(
        "ADCG_EXPORT int {model_name}_derivative_order(void) {{ return {}; }}\n\n",
        kernels.order.as_u8()
    ));

    emit_kernel(
        &mut out,
        &format!("{model_name}_forward_zero"),
        "const double *x, double *y",
        "y",
        &kernels.forward,
    );
    if let Some(jacobian) = &kernels.jacobian {
        emit_kernel(
            &mut out,
            &format!("{model_name}_jacobian"),
            "const double *x, double *jac",
            "jac",
            jacobian,
        );
    }
    if let Some(hessian) = &kernels.hessian {
        emit_kernel(
            &mut out,
            &format!("{model_name}_hessian"),
            "const double *x, const double *w, double *hess",
            "hess",
            hessian,
        );
    }
    out
}

fn emit_kernel(out: &mut String, symbol: &str, params: &str, result: &str, trace: &Trace) {
    out.push_str(&format!("ADCG_EXPORT void {symbol}({params})\n{{\n"));
    out.push_str("    (void)x;\n");
    if trace.num_weights > 0 {
        out.push_str("    (void)w;\n");
    }
    for (index, node) in trace.nodes.iter().enumerate() {
        out.push_str(&format!("    const double v{index} = {};\n", expression(node)));
    }
    for (position, id) in trace.outputs.iter().enumerate() {
        out.push_str(&format!("    {result}[{position}] = v{id};\n"));
    }
    out.push_str("}\n\n");
}

fn expression(node: &Node) -> String {
    match *node {
        Node::Input(index) => format!("x[{index}]"),
        Node::Weight(index) => format!("w[{index}]"),
        Node::Const(value) => literal(value),
        Node::Unary { op, arg } => match op {
            UnaryOp::Neg => format!("-v{arg}"),
            UnaryOp::Sin => format!("sin(v{arg})"),
            UnaryOp::Cos => format!("cos(v{arg})"),
            UnaryOp::Tan => format!("tan(v{arg})"),
            UnaryOp::Exp => format!("exp(v{arg})"),
            UnaryOp::Ln => format!("log(v{arg})"),
            UnaryOp::Sqrt => format!("sqrt(v{arg})"),
            UnaryOp::Tanh => format!("tanh(v{arg})"),
        },
        Node::Binary { op, lhs, rhs } => match op {
            BinOp::Add => format!("v{lhs} + v{rhs}"),
            BinOp::Sub => format!("v{lhs} - v{rhs}"),
            BinOp::Mul => format!("v{lhs} * v{rhs}"),
            BinOp::Div => format!("v{lhs} / v{rhs}"),
            BinOp::Pow => format!("pow(v{lhs}, v{rhs})"),
        },
        Node::Powi { base, exp } => format!("pow(v{base}, {exp}.0)"),
    }
}

/// A C double literal for `value`.
fn literal(value: f64) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "INFINITY".to_string()
        } else {
            "(-INFINITY)".to_string()
        }
    } else if value.is_sign_negative() {
        format!("({value:?})")
    } else {
        format!("{value:?}")
    }
}
