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

//! Straight-line symbolic traces.
//!
//! A [`Trace`] is an SSA graph in which every node's id is its position and
//! operands always point backwards. Models are recorded into a trace through
//! a [`Tape`]; derivatives are synthesized by appending adjoint nodes to the
//! same graph ([`gradient`]); [`optimize`] then shrinks each kernel before it
//! is turned into code or interpreted.

mod diff;
mod interp;
mod optimize;
mod tape;
mod verify;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use diff::{gradient, hessian_trace, jacobian_trace};
pub use optimize::optimize;
pub use tape::{Tape, Var};
pub use verify::{verify_trace, TraceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnaryOp {
    Neg,
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Tanh,
}

impl UnaryOp {
    pub fn apply(self, a: f64) -> f64 {
        match self {
            UnaryOp::Neg => -a,
            UnaryOp::Sin => a.sin(),
            UnaryOp::Cos => a.cos(),
            UnaryOp::Tan => a.tan(),
            UnaryOp::Exp => a.exp(),
            UnaryOp::Ln => a.ln(),
            UnaryOp::Sqrt => a.sqrt(),
            UnaryOp::Tanh => a.tanh(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Exp => "exp",
            UnaryOp::Ln => "ln",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Tanh => "tanh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Pow => "pow",
        }
    }

    fn is_commutative(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Mul)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Independent variable `x[index]` (inputs followed by parameters).
    Input(usize),
    /// Output weight `w[index]`, only present in Hessian kernels.
    Weight(usize),
    Const(f64),
    Unary { op: UnaryOp, arg: NodeId },
    Binary { op: BinOp, lhs: NodeId, rhs: NodeId },
    Powi { base: NodeId, exp: i32 },
}

impl Node {
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            Node::Input(_) | Node::Weight(_) | Node::Const(_) => Vec::new(),
            Node::Unary { arg, .. } => vec![*arg],
            Node::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Node::Powi { base, .. } => vec![*base],
        }
    }

    fn map_operands(&self, mut f: impl FnMut(NodeId) -> NodeId) -> Node {
        match self {
            Node::Input(_) | Node::Weight(_) | Node::Const(_) => self.clone(),
            Node::Unary { op, arg } => Node::Unary {
                op: *op,
                arg: f(*arg),
            },
            Node::Binary { op, lhs, rhs } => Node::Binary {
                op: *op,
                lhs: f(*lhs),
                rhs: f(*rhs),
            },
            Node::Powi { base, exp } => Node::Powi {
                base: f(*base),
                exp: *exp,
            },
        }
    }
}

/// Outcome of local simplification before a node is appended.
enum Simplified {
    Existing(NodeId),
    New(Node),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trace {
    pub nodes: Vec<Node>,
    pub num_inputs: usize,
    pub num_weights: usize,
    pub outputs: Vec<NodeId>,
}

impl Trace {
    pub fn new(num_inputs: usize, num_weights: usize) -> Self {
        Self {
            nodes: Vec::new(),
            num_inputs,
            num_weights,
            outputs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Append `node` verbatim.
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Append `node` after local simplification; may return an existing id.
    pub fn insert(&mut self, node: Node) -> NodeId {
        match self.simplify(node) {
            Simplified::Existing(id) => id,
            Simplified::New(node) => self.push(node),
        }
    }

    pub fn constant(&mut self, value: f64) -> NodeId {
        self.push(Node::Const(value))
    }

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.insert(Node::Binary {
            op: BinOp::Add,
            lhs,
            rhs,
        })
    }

    pub fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.insert(Node::Binary {
            op: BinOp::Sub,
            lhs,
            rhs,
        })
    }

    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.insert(Node::Binary {
            op: BinOp::Mul,
            lhs,
            rhs,
        })
    }

    pub fn div(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.insert(Node::Binary {
            op: BinOp::Div,
            lhs,
            rhs,
        })
    }

    pub fn neg(&mut self, arg: NodeId) -> NodeId {
        self.unary(UnaryOp::Neg, arg)
    }

    pub fn unary(&mut self, op: UnaryOp, arg: NodeId) -> NodeId {
        self.insert(Node::Unary { op, arg })
    }

    pub fn powi(&mut self, base: NodeId, exp: i32) -> NodeId {
        self.insert(Node::Powi { base, exp })
    }

    pub fn pow(&mut self, base: NodeId, exponent: NodeId) -> NodeId {
        self.insert(Node::Binary {
            op: BinOp::Pow,
            lhs: base,
            rhs: exponent,
        })
    }

    pub fn const_value(&self, id: NodeId) -> Option<f64> {
        match self.nodes.get(id.0) {
            Some(Node::Const(value)) => Some(*value),
            _ => None,
        }
    }

    fn is_const(&self, id: NodeId, value: f64) -> bool {
        self.const_value(id) == Some(value)
    }

    /// Copy of this trace exposing a different set of outputs.
    pub fn with_outputs(&self, outputs: Vec<NodeId>) -> Trace {
        Trace {
            nodes: self.nodes.clone(),
            num_inputs: self.num_inputs,
            num_weights: self.num_weights,
            outputs,
        }
    }

    /// Local rewrites: constant folding, identities and operand order.
    ///
    /// `0 * x` folds to zero even when `x` is not finite.
    fn simplify(&self, node: Node) -> Simplified {
        match node {
            Node::Unary { op, arg } => {
                if let Some(a) = self.const_value(arg) {
                    return Simplified::New(Node::Const(op.apply(a)));
                }
                if op == UnaryOp::Neg {
                    if let Node::Unary {
                        op: UnaryOp::Neg,
                        arg: inner,
                    } = self.node(arg)
                    {
                        return Simplified::Existing(*inner);
                    }
                }
                Simplified::New(Node::Unary { op, arg })
            }
            Node::Powi { base, exp } => {
                if exp == 0 {
                    return Simplified::New(Node::Const(1.0));
                }
                if exp == 1 {
                    return Simplified::Existing(base);
                }
                if let Some(b) = self.const_value(base) {
                    return Simplified::New(Node::Const(b.powi(exp)));
                }
                Simplified::New(Node::Powi { base, exp })
            }
            Node::Binary { op, lhs, rhs } => self.simplify_binary(op, lhs, rhs),
            leaf => Simplified::New(leaf),
        }
    }

    fn simplify_binary(&self, op: BinOp, lhs: NodeId, rhs: NodeId) -> Simplified {
        if let (Some(a), Some(b)) = (self.const_value(lhs), self.const_value(rhs)) {
            return Simplified::New(Node::Const(op.apply(a, b)));
        }
        match op {
            BinOp::Add => {
                if self.is_const(lhs, 0.0) {
                    return Simplified::Existing(rhs);
                }
                if self.is_const(rhs, 0.0) {
                    return Simplified::Existing(lhs);
                }
            }
            BinOp::Sub => {
                if self.is_const(rhs, 0.0) {
                    return Simplified::Existing(lhs);
                }
                if self.is_const(lhs, 0.0) {
                    return self.simplify(Node::Unary {
                        op: UnaryOp::Neg,
                        arg: rhs,
                    });
                }
            }
            BinOp::Mul => {
                if self.is_const(lhs, 0.0) {
                    return Simplified::Existing(lhs);
                }
                if self.is_const(rhs, 0.0) {
                    return Simplified::Existing(rhs);
                }
                if self.is_const(lhs, 1.0) {
                    return Simplified::Existing(rhs);
                }
                if self.is_const(rhs, 1.0) {
                    return Simplified::Existing(lhs);
                }
                if self.is_const(lhs, -1.0) {
                    return self.simplify(Node::Unary {
                        op: UnaryOp::Neg,
                        arg: rhs,
                    });
                }
                if self.is_const(rhs, -1.0) {
                    return self.simplify(Node::Unary {
                        op: UnaryOp::Neg,
                        arg: lhs,
                    });
                }
            }
            BinOp::Div => {
                if self.is_const(lhs, 0.0) {
                    return Simplified::Existing(lhs);
                }
                if self.is_const(rhs, 1.0) {
                    return Simplified::Existing(lhs);
                }
            }
            BinOp::Pow => {
                if self.is_const(rhs, 1.0) {
                    return Simplified::Existing(lhs);
                }
                if self.is_const(rhs, 0.0) {
                    return Simplified::New(Node::Const(1.0));
                }
            }
        }

        let (lhs, rhs) = if op.is_commutative() && rhs < lhs {
            (rhs, lhs)
        } else {
            (lhs, rhs)
        };
        Simplified::New(Node::Binary { op, lhs, rhs })
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Input(index) => write!(f, "input[{index}]"),
            Node::Weight(index) => write!(f, "weight[{index}]"),
            Node::Const(value) => write!(f, "const {value:?}"),
            Node::Unary { op, arg } => write!(f, "{} %{arg}", op.name()),
            Node::Binary { op, lhs, rhs } => write!(f, "{} %{lhs}, %{rhs}", op.name()),
            Node::Powi { base, exp } => write!(f, "powi %{base}, {exp}"),
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "trace inputs={} weights={} nodes={}",
            self.num_inputs,
            self.num_weights,
            self.nodes.len()
        )?;
        for (index, node) in self.nodes.iter().enumerate() {
            writeln!(f, "  %{index} = {node}")?;
        }
        for (position, id) in self.outputs.iter().enumerate() {
            writeln!(f, "  out[{position}] = %{id}")?;
        }
        Ok(())
    }
}
