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

//! Symbolic reverse accumulation over a [`Trace`].
//!
//! Derivatives are built as ordinary trace nodes, so a gradient node can be
//! differentiated again. That is how Hessian kernels are produced: the
//! gradient of `sum_k w_k y_k` followed by the gradient of each of its
//! entries.

use std::collections::BTreeMap;

use super::{BinOp, Node, NodeId, Trace, UnaryOp};

struct Adjoints<'a> {
    trace: &'a mut Trace,
    grads: BTreeMap<NodeId, NodeId>,
    active: Vec<bool>,
}

impl Adjoints<'_> {
    fn is_active(&self, id: NodeId) -> bool {
        self.active.get(id.0).copied().unwrap_or(false)
    }

    fn add_grad(&mut self, target: NodeId, contribution: NodeId) {
        if !self.is_active(target) || self.trace.is_const(contribution, 0.0) {
            return;
        }
        match self.grads.get(&target).copied() {
            None => {
                self.grads.insert(target, contribution);
            }
            Some(existing) => {
                let summed = self.trace.add(existing, contribution);
                self.grads.insert(target, summed);
            }
        }
    }
}

/// Nodes that depend on at least one input.
fn activity(nodes: &[Node]) -> Vec<bool> {
    let mut active = Vec::with_capacity(nodes.len());
    for node in nodes {
        let flag = match node {
            Node::Input(_) => true,
            Node::Weight(_) | Node::Const(_) => false,
            other => other.operands().iter().any(|id| active[id.0]),
        };
        active.push(flag);
    }
    active
}

/// Append the derivative of `output` with respect to every input.
///
/// Returns one node per input; inputs `output` does not depend on map to a
/// constant zero. The trace must satisfy [`verify_trace`](super::verify_trace).
pub fn gradient(trace: &mut Trace, output: NodeId) -> Vec<NodeId> {
    let limit = output.0 + 1;
    let active = activity(&trace.nodes[..limit]);
    let input_nodes: Vec<(usize, NodeId)> = trace.nodes[..limit]
        .iter()
        .enumerate()
        .filter_map(|(index, node)| match node {
            Node::Input(input) => Some((*input, NodeId(index))),
            _ => None,
        })
        .collect();
    let num_inputs = trace.num_inputs;

    let mut adjoints = Adjoints {
        trace,
        grads: BTreeMap::new(),
        active,
    };
    if adjoints.is_active(output) {
        let seed = adjoints.trace.constant(1.0);
        adjoints.grads.insert(output, seed);
    }

    for index in (0..limit).rev() {
        let id = NodeId(index);
        let Some(&upstream) = adjoints.grads.get(&id) else {
            continue;
        };
        let node = adjoints.trace.nodes[index].clone();
        propagate(&mut adjoints, id, &node, upstream);
    }

    let zero = adjoints.trace.constant(0.0);
    let mut result = vec![zero; num_inputs];
    for (input, id) in input_nodes {
        if let (Some(slot), Some(&grad)) = (result.get_mut(input), adjoints.grads.get(&id)) {
            *slot = grad;
        }
    }
    result
}

fn propagate(adjoints: &mut Adjoints<'_>, id: NodeId, node: &Node, upstream: NodeId) {
    match *node {
        Node::Input(_) | Node::Weight(_) | Node::Const(_) => {}
        Node::Unary { op, arg } => {
            if !adjoints.is_active(arg) {
                return;
            }
            let t = &mut *adjoints.trace;
            let contribution = match op {
                UnaryOp::Neg => t.neg(upstream),
                UnaryOp::Sin => {
                    let local = t.unary(UnaryOp::Cos, arg);
                    t.mul(upstream, local)
                }
                UnaryOp::Cos => {
                    let sin = t.unary(UnaryOp::Sin, arg);
                    let local = t.neg(sin);
                    t.mul(upstream, local)
                }
                UnaryOp::Tan => {
                    let square = t.mul(id, id);
                    let one = t.constant(1.0);
                    let local = t.add(one, square);
                    t.mul(upstream, local)
                }
                UnaryOp::Exp => t.mul(upstream, id),
                UnaryOp::Ln => t.div(upstream, arg),
                UnaryOp::Sqrt => {
                    let two = t.constant(2.0);
                    let denom = t.mul(two, id);
                    t.div(upstream, denom)
                }
                UnaryOp::Tanh => {
                    let square = t.mul(id, id);
                    let one = t.constant(1.0);
                    let local = t.sub(one, square);
                    t.mul(upstream, local)
                }
            };
            adjoints.add_grad(arg, contribution);
        }
        Node::Binary { op, lhs, rhs } => {
            let lhs_active = adjoints.is_active(lhs);
            let rhs_active = adjoints.is_active(rhs);
            match op {
                BinOp::Add => {
                    adjoints.add_grad(lhs, upstream);
                    adjoints.add_grad(rhs, upstream);
                }
                BinOp::Sub => {
                    adjoints.add_grad(lhs, upstream);
                    if rhs_active {
                        let negated = adjoints.trace.neg(upstream);
                        adjoints.add_grad(rhs, negated);
                    }
                }
                BinOp::Mul => {
                    if lhs_active {
                        let dlhs = adjoints.trace.mul(upstream, rhs);
                        adjoints.add_grad(lhs, dlhs);
                    }
                    if rhs_active {
                        let drhs = adjoints.trace.mul(upstream, lhs);
                        adjoints.add_grad(rhs, drhs);
                    }
                }
                BinOp::Div => {
                    if lhs_active {
                        let dlhs = adjoints.trace.div(upstream, rhs);
                        adjoints.add_grad(lhs, dlhs);
                    }
                    if rhs_active {
                        // d(a/b)/db = -(a/b)/b
                        let t = &mut *adjoints.trace;
                        let quotient = t.div(id, rhs);
                        let scaled = t.mul(upstream, quotient);
                        let drhs = t.neg(scaled);
                        adjoints.add_grad(rhs, drhs);
                    }
                }
                BinOp::Pow => {
                    if lhs_active {
                        let t = &mut *adjoints.trace;
                        let one = t.constant(1.0);
                        let reduced = t.sub(rhs, one);
                        let power = t.pow(lhs, reduced);
                        let local = t.mul(rhs, power);
                        let dlhs = t.mul(upstream, local);
                        adjoints.add_grad(lhs, dlhs);
                    }
                    if rhs_active {
                        let t = &mut *adjoints.trace;
                        let log = t.unary(UnaryOp::Ln, lhs);
                        let local = t.mul(id, log);
                        let drhs = t.mul(upstream, local);
                        adjoints.add_grad(rhs, drhs);
                    }
                }
            }
        }
        Node::Powi { base, exp } => {
            if !adjoints.is_active(base) {
                return;
            }
            let t = &mut *adjoints.trace;
            let power = t.powi(base, exp - 1);
            let factor = t.constant(f64::from(exp));
            let local = t.mul(factor, power);
            let contribution = t.mul(upstream, local);
            adjoints.add_grad(base, contribution);
        }
    }
}

/// Trace whose outputs are the row-major `O x D` Jacobian entries of `primal`.
pub fn jacobian_trace(primal: &Trace) -> Trace {
    let mut trace = primal.clone();
    let mut entries = Vec::with_capacity(primal.outputs.len() * primal.num_inputs);
    for &output in &primal.outputs {
        entries.extend(gradient(&mut trace, output));
    }
    trace.outputs = entries;
    trace
}

/// Trace whose outputs are the row-major `D x D` entries of the weighted
/// Hessian `sum_k w_k d2 y_k / dx2`.
///
/// One weight node is added per primal output; callers select a single
/// output's Hessian with a one-hot weight vector.
pub fn hessian_trace(primal: &Trace) -> Trace {
    let mut trace = primal.clone();
    trace.num_weights = primal.outputs.len();

    let mut weighted = trace.constant(0.0);
    for (index, &output) in primal.outputs.iter().enumerate() {
        let weight = trace.push(Node::Weight(index));
        let term = trace.mul(weight, output);
        weighted = trace.add(weighted, term);
    }

    let first = gradient(&mut trace, weighted);
    let mut entries = Vec::with_capacity(first.len() * first.len());
    for partial in first {
        entries.extend(gradient(&mut trace, partial));
    }
    trace.outputs = entries;
    trace
}
