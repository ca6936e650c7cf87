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

use std::collections::BTreeMap;

use super::{Node, NodeId, Trace};
use crate::order::DerivativeOrder;

/// Structured errors returned while recording or verifying a trace.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TraceError {
    /// The model's example input vector is empty.
    #[error("model input is empty; at least one input is required")]
    EmptyInput,
    /// The model function produced no outputs.
    #[error("model function returned no outputs")]
    EmptyOutput,
    /// An operand refers to a node that is not defined before its use.
    #[error("node %{node} uses %{operand}, which is not defined before it")]
    UseBeforeDefinition { node: NodeId, operand: NodeId },
    /// An input node indexes past the declared input count.
    #[error("node %{node} reads input {index}, but the trace has {num_inputs} inputs")]
    InputOutOfRange {
        node: NodeId,
        index: usize,
        num_inputs: usize,
    },
    /// A weight node indexes past the declared weight count.
    #[error("node %{node} reads weight {index}, but the trace has {num_weights} weights")]
    WeightOutOfRange {
        node: NodeId,
        index: usize,
        num_weights: usize,
    },
    /// Two nodes read the same independent variable.
    #[error("input {index} is defined twice (%{first} and %{second})")]
    DuplicateInput {
        index: usize,
        first: NodeId,
        second: NodeId,
    },
    /// An output refers to a node that does not exist.
    #[error("output {position} refers to undefined node %{node}")]
    UndefinedOutput { position: usize, node: NodeId },
    /// A derivative kernel exposes the wrong number of outputs.
    #[error("{kernel} kernel has {found} outputs, expected {expected}")]
    KernelOutputs {
        kernel: &'static str,
        expected: usize,
        found: usize,
    },
    /// A derivative kernel was built over a different input dimension.
    #[error("{kernel} kernel reads {found} inputs, expected {expected}")]
    KernelInputs {
        kernel: &'static str,
        expected: usize,
        found: usize,
    },
    /// The declared derivative order and the kernels present disagree.
    #[error("{kernel} kernel presence does not match derivative order {order}")]
    KernelPresence {
        kernel: &'static str,
        order: DerivativeOrder,
    },
    /// A numeric evaluation was handed a slice of the wrong length.
    #[error("{what} has length {found}, expected {expected}")]
    ArgumentLength {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Verify that a [`Trace`] is well-formed.
///
/// Enforces SSA order (operands precede their users), input and weight
/// bounds, at most one node per input, and valid output references.
pub fn verify_trace(trace: &Trace) -> Result<(), TraceError> {
    let mut inputs: BTreeMap<usize, NodeId> = BTreeMap::new();

    for (index, node) in trace.nodes.iter().enumerate() {
        let id = NodeId(index);
        for operand in node.operands() {
            if operand >= id {
                return Err(TraceError::UseBeforeDefinition { node: id, operand });
            }
        }

        match node {
            Node::Input(input) => {
                if *input >= trace.num_inputs {
                    return Err(TraceError::InputOutOfRange {
                        node: id,
                        index: *input,
                        num_inputs: trace.num_inputs,
                    });
                }
                if let Some(first) = inputs.insert(*input, id) {
                    return Err(TraceError::DuplicateInput {
                        index: *input,
                        first,
                        second: id,
                    });
                }
            }
            Node::Weight(weight) if *weight >= trace.num_weights => {
                return Err(TraceError::WeightOutOfRange {
                    node: id,
                    index: *weight,
                    num_weights: trace.num_weights,
                });
            }
            _ => {}
        }
    }

    for (position, node) in trace.outputs.iter().enumerate() {
        if node.0 >= trace.nodes.len() {
            return Err(TraceError::UndefinedOutput {
                position,
                node: *node,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::BinOp;

    #[test]
    fn accepts_recorded_trace() {
        let mut trace = Trace::new(1, 0);
        let x = trace.push(Node::Input(0));
        let y = trace.push(Node::Binary {
            op: BinOp::Mul,
            lhs: x,
            rhs: x,
        });
        trace.outputs.push(y);
        assert_eq!(verify_trace(&trace), Ok(()));
    }

    #[test]
    fn rejects_forward_reference() {
        let mut trace = Trace::new(1, 0);
        trace.push(Node::Unary {
            op: crate::trace::UnaryOp::Sin,
            arg: NodeId(1),
        });
        trace.push(Node::Input(0));
        assert_eq!(
            verify_trace(&trace),
            Err(TraceError::UseBeforeDefinition {
                node: NodeId(0),
                operand: NodeId(1)
            })
        );
    }

    #[test]
    fn rejects_duplicate_and_out_of_range_inputs() {
        let mut trace = Trace::new(1, 0);
        trace.push(Node::Input(0));
        trace.push(Node::Input(0));
        assert!(matches!(
            verify_trace(&trace),
            Err(TraceError::DuplicateInput { index: 0, .. })
        ));

        let mut trace = Trace::new(1, 1);
        trace.push(Node::Input(3));
        assert!(matches!(
            verify_trace(&trace),
            Err(TraceError::InputOutOfRange { index: 3, .. })
        ));

        let mut trace = Trace::new(1, 1);
        trace.push(Node::Weight(1));
        assert!(matches!(
            verify_trace(&trace),
            Err(TraceError::WeightOutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn rejects_dangling_output() {
        let mut trace = Trace::new(0, 0);
        trace.push(Node::Const(1.0));
        trace.outputs.push(NodeId(5));
        assert_eq!(
            verify_trace(&trace),
            Err(TraceError::UndefinedOutput {
                position: 0,
                node: NodeId(5)
            })
        );
    }
}
