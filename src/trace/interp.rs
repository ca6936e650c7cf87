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

use super::{Node, Trace, TraceError};

impl Trace {
    /// Evaluate every output for the given input and weight values.
    pub fn evaluate(&self, inputs: &[f64], weights: &[f64]) -> Result<Vec<f64>, TraceError> {
        let mut out = vec![0.0; self.outputs.len()];
        self.evaluate_into(inputs, weights, &mut out)?;
        Ok(out)
    }

    /// Like [`Trace::evaluate`] but writes into a caller-owned buffer.
    ///
    /// The trace is assumed to pass [`verify_trace`](super::verify_trace).
    pub fn evaluate_into(
        &self,
        inputs: &[f64],
        weights: &[f64],
        out: &mut [f64],
    ) -> Result<(), TraceError> {
        check_length("inputs", self.num_inputs, inputs.len())?;
        check_length("weights", self.num_weights, weights.len())?;
        check_length("outputs", self.outputs.len(), out.len())?;

        let mut values: Vec<f64> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let value = match *node {
                Node::Input(index) => inputs[index],
                Node::Weight(index) => weights[index],
                Node::Const(value) => value,
                Node::Unary { op, arg } => op.apply(values[arg.0]),
                Node::Binary { op, lhs, rhs } => op.apply(values[lhs.0], values[rhs.0]),
                Node::Powi { base, exp } => values[base.0].powi(exp),
            };
            values.push(value);
        }

        for (slot, id) in out.iter_mut().zip(&self.outputs) {
            *slot = values[id.0];
        }
        Ok(())
    }
}

fn check_length(what: &'static str, expected: usize, found: usize) -> Result<(), TraceError> {
    if expected == found {
        Ok(())
    } else {
        Err(TraceError::ArgumentLength {
            what,
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{BinOp, NodeId, UnaryOp};

    #[test]
    fn evaluates_in_node_order() {
        let mut trace = Trace::new(2, 1);
        let x0 = trace.push(Node::Input(0));
        let x1 = trace.push(Node::Input(1));
        let w = trace.push(Node::Weight(0));
        let s = trace.push(Node::Unary {
            op: UnaryOp::Sin,
            arg: x0,
        });
        let p = trace.push(Node::Binary {
            op: BinOp::Mul,
            lhs: s,
            rhs: x1,
        });
        let q = trace.push(Node::Powi { base: w, exp: 2 });
        trace.outputs = vec![p, q, x1];

        let out = trace.evaluate(&[0.5, 3.0], &[4.0]).expect("evaluate");
        assert_eq!(out, vec![0.5f64.sin() * 3.0, 16.0, 3.0]);
    }

    #[test]
    fn rejects_wrong_argument_lengths() {
        let mut trace = Trace::new(2, 0);
        let x = trace.push(Node::Input(0));
        trace.outputs = vec![x];

        let err = trace.evaluate(&[1.0], &[]).unwrap_err();
        assert_eq!(
            err,
            TraceError::ArgumentLength {
                what: "inputs",
                expected: 2,
                found: 1
            }
        );

        let mut out = [0.0; 2];
        let err = trace.evaluate_into(&[1.0, 2.0], &[], &mut out).unwrap_err();
        assert!(matches!(err, TraceError::ArgumentLength { what: "outputs", .. }));
        assert_eq!(trace.outputs, vec![NodeId(0)]);
    }
}
