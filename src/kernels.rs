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

use serde::{Deserialize, Serialize};

use crate::order::DerivativeOrder;
use crate::trace::{verify_trace, Trace, TraceError};

/// Optimized value and derivative kernels for one model.
///
/// `input_size` is the combined dimension `D` (inputs followed by
/// parameters); `parameter_size` of those slots are parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivativeKernels {
    pub input_size: usize,
    pub parameter_size: usize,
    pub output_size: usize,
    pub order: DerivativeOrder,
    /// Outputs: `y`, length `O`.
    pub forward: Trace,
    /// Outputs: row-major `O x D` Jacobian. Present iff `order >= First`.
    pub jacobian: Option<Trace>,
    /// Weights: `O`. Outputs: row-major `D x D` weighted Hessian.
    /// Present iff `order >= Second`.
    pub hessian: Option<Trace>,
}

impl DerivativeKernels {
    /// Check every kernel against the declared dimensions and order.
    pub fn validate(&self) -> Result<(), TraceError> {
        let (d, o) = (self.input_size, self.output_size);
        check_kernel("forward", &self.forward, d, 0, o)?;

        match (&self.jacobian, self.order.includes_jacobian()) {
            (Some(jacobian), true) => check_kernel("jacobian", jacobian, d, 0, o * d)?,
            (None, false) => {}
            _ => {
                return Err(TraceError::KernelPresence {
                    kernel: "jacobian",
                    order: self.order,
                })
            }
        }

        match (&self.hessian, self.order.includes_hessian()) {
            (Some(hessian), true) => check_kernel("hessian", hessian, d, o, d * d)?,
            (None, false) => {}
            _ => {
                return Err(TraceError::KernelPresence {
                    kernel: "hessian",
                    order: self.order,
                })
            }
        }
        Ok(())
    }
}

fn check_kernel(
    kernel: &'static str,
    trace: &Trace,
    inputs: usize,
    weights: usize,
    outputs: usize,
) -> Result<(), TraceError> {
    verify_trace(trace)?;
    if trace.num_inputs != inputs {
        return Err(TraceError::KernelInputs {
            kernel,
            expected: inputs,
            found: trace.num_inputs,
        });
    }
    if trace.num_weights != weights {
        return Err(TraceError::ArgumentLength {
            what: "kernel weights",
            expected: weights,
            found: trace.num_weights,
        });
    }
    if trace.outputs.len() != outputs {
        return Err(TraceError::KernelOutputs {
            kernel,
            expected: outputs,
            found: trace.outputs.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Node;

    fn square_kernels() -> DerivativeKernels {
        let mut forward = Trace::new(1, 0);
        let x = forward.push(Node::Input(0));
        let y = forward.mul(x, x);
        forward.outputs = vec![y];

        let mut jacobian = Trace::new(1, 0);
        let x = jacobian.push(Node::Input(0));
        let two = jacobian.constant(2.0);
        let d = jacobian.mul(two, x);
        jacobian.outputs = vec![d];

        DerivativeKernels {
            input_size: 1,
            parameter_size: 0,
            output_size: 1,
            order: DerivativeOrder::First,
            forward,
            jacobian: Some(jacobian),
            hessian: None,
        }
    }

    #[test]
    fn consistent_kernels_validate() {
        assert_eq!(square_kernels().validate(), Ok(()));
    }

    #[test]
    fn order_and_kernels_must_agree() {
        let mut kernels = square_kernels();
        kernels.order = DerivativeOrder::Second;
        assert_eq!(
            kernels.validate(),
            Err(TraceError::KernelPresence {
                kernel: "hessian",
                order: DerivativeOrder::Second
            })
        );

        let mut kernels = square_kernels();
        kernels.order = DerivativeOrder::Zero;
        assert!(matches!(
            kernels.validate(),
            Err(TraceError::KernelPresence { kernel: "jacobian", .. })
        ));
    }

    #[test]
    fn jacobian_must_be_output_by_input() {
        let mut kernels = square_kernels();
        kernels.output_size = 2;
        let y = kernels.forward.outputs[0];
        kernels.forward.outputs.push(y);
        assert!(matches!(
            kernels.validate(),
            Err(TraceError::KernelOutputs { kernel: "jacobian", expected: 2, found: 1 })
        ));
    }
}
