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

//! Operator-overloading recorder used while tracing a model function.

use std::cell::RefCell;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use super::{BinOp, Node, NodeId, Trace, UnaryOp};

/// Records every operation performed on its [`Var`]s.
#[derive(Debug, Default)]
pub struct Tape {
    trace: RefCell<Trace>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare independent variables at the given example point.
    ///
    /// Successive calls continue the input numbering.
    pub fn independent(&self, values: &[f64]) -> Vec<Var<'_>> {
        values
            .iter()
            .map(|&value| {
                let index = {
                    let mut trace = self.trace.borrow_mut();
                    let index = trace.num_inputs;
                    trace.num_inputs += 1;
                    index
                };
                self.record(Node::Input(index), value)
            })
            .collect()
    }

    pub fn constant(&self, value: f64) -> Var<'_> {
        self.record(Node::Const(value), value)
    }

    /// Sum of `terms`, or the constant zero when there are none.
    pub fn sum<'t>(&'t self, terms: impl IntoIterator<Item = Var<'t>>) -> Var<'t> {
        let mut iter = terms.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, |acc, term| acc + term),
            None => self.constant(0.0),
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.trace.borrow().num_inputs
    }

    pub fn len(&self) -> usize {
        self.trace.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace.borrow().is_empty()
    }

    /// Stop recording and expose `outputs` as the trace results.
    pub fn into_trace(self, outputs: Vec<NodeId>) -> Trace {
        let mut trace = self.trace.into_inner();
        trace.outputs = outputs;
        trace
    }

    fn record(&self, node: Node, value: f64) -> Var<'_> {
        let id = self.trace.borrow_mut().push(node);
        Var {
            tape: self,
            id,
            value,
        }
    }
}

/// A traced scalar.
///
/// Carries its value at the example point so model code may inspect it while
/// recording; branches taken on it are baked into the trace.
#[derive(Clone, Copy)]
pub struct Var<'t> {
    tape: &'t Tape,
    id: NodeId,
    value: f64,
}

impl<'t> Var<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn tape(&self) -> &'t Tape {
        self.tape
    }

    /// A constant on the same tape.
    pub fn constant(&self, value: f64) -> Var<'t> {
        self.tape.constant(value)
    }

    pub fn sin(self) -> Var<'t> {
        self.unary(UnaryOp::Sin)
    }

    pub fn cos(self) -> Var<'t> {
        self.unary(UnaryOp::Cos)
    }

    pub fn tan(self) -> Var<'t> {
        self.unary(UnaryOp::Tan)
    }

    pub fn exp(self) -> Var<'t> {
        self.unary(UnaryOp::Exp)
    }

    pub fn ln(self) -> Var<'t> {
        self.unary(UnaryOp::Ln)
    }

    pub fn sqrt(self) -> Var<'t> {
        self.unary(UnaryOp::Sqrt)
    }

    pub fn tanh(self) -> Var<'t> {
        self.unary(UnaryOp::Tanh)
    }

    pub fn powi(self, exp: i32) -> Var<'t> {
        self.tape
            .record(Node::Powi { base: self.id, exp }, self.value.powi(exp))
    }

    pub fn powf(self, exponent: f64) -> Var<'t> {
        self.pow(self.constant(exponent))
    }

    pub fn pow(self, exponent: Var<'t>) -> Var<'t> {
        self.binary(BinOp::Pow, exponent)
    }

    pub fn square(self) -> Var<'t> {
        self * self
    }

    fn unary(self, op: UnaryOp) -> Var<'t> {
        self.tape
            .record(Node::Unary { op, arg: self.id }, op.apply(self.value))
    }

    fn binary(self, op: BinOp, rhs: Var<'t>) -> Var<'t> {
        assert!(
            std::ptr::eq(self.tape, rhs.tape),
            "cannot combine variables recorded on different tapes"
        );
        self.tape.record(
            Node::Binary {
                op,
                lhs: self.id,
                rhs: rhs.id,
            },
            op.apply(self.value, rhs.value),
        )
    }
}

impl fmt::Debug for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Var(%{} = {:?})", self.id, self.value)
    }
}

impl<'t> Neg for Var<'t> {
    type Output = Var<'t>;

    fn neg(self) -> Var<'t> {
        self.unary(UnaryOp::Neg)
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:expr) => {
        impl<'t> $trait for Var<'t> {
            type Output = Var<'t>;

            fn $method(self, rhs: Var<'t>) -> Var<'t> {
                self.binary($op, rhs)
            }
        }

        impl<'t> $trait<f64> for Var<'t> {
            type Output = Var<'t>;

            fn $method(self, rhs: f64) -> Var<'t> {
                self.binary($op, self.constant(rhs))
            }
        }

        impl<'t> $trait<Var<'t>> for f64 {
            type Output = Var<'t>;

            fn $method(self, rhs: Var<'t>) -> Var<'t> {
                rhs.constant(self).binary($op, rhs)
            }
        }

        impl<'t> $assign_trait for Var<'t> {
            fn $assign_method(&mut self, rhs: Var<'t>) {
                *self = self.binary($op, rhs);
            }
        }

        impl<'t> $assign_trait<f64> for Var<'t> {
            fn $assign_method(&mut self, rhs: f64) {
                *self = self.binary($op, self.constant(rhs));
            }
        }
    };
}

binary_operator!(Add, add, AddAssign, add_assign, BinOp::Add);
binary_operator!(Sub, sub, SubAssign, sub_assign, BinOp::Sub);
binary_operator!(Mul, mul, MulAssign, mul_assign, BinOp::Mul);
binary_operator!(Div, div, DivAssign, div_assign, BinOp::Div);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_operations_in_order() {
        let tape = Tape::new();
        let ids = {
            let x = tape.independent(&[2.0, 3.0]);
            let y = x[0] * x[1] + 1.0;
            assert_eq!(y.value(), 7.0);
            vec![y.id()]
        };
        let trace = tape.into_trace(ids);
        assert_eq!(trace.num_inputs, 2);
        assert_eq!(trace.nodes[0], Node::Input(0));
        assert_eq!(trace.nodes[1], Node::Input(1));
        assert_eq!(trace.outputs, vec![NodeId(4)]);
    }

    #[test]
    fn scalar_on_the_left_keeps_operand_order() {
        let tape = Tape::new();
        let x = tape.independent(&[4.0]);
        let y = 1.0 - x[0];
        assert_eq!(y.value(), -3.0);
        let z = 8.0 / x[0];
        assert_eq!(z.value(), 2.0);
    }

    #[test]
    fn compound_assignment_accumulates() {
        let tape = Tape::new();
        let x = tape.independent(&[1.5, 2.0]);
        let mut acc = tape.constant(0.0);
        for v in &x {
            acc += *v * *v;
        }
        acc *= 2.0;
        assert_eq!(acc.value(), 2.0 * (2.25 + 4.0));
    }

    #[test]
    fn sum_of_nothing_is_zero() {
        let tape = Tape::new();
        assert_eq!(tape.sum(Vec::new()).value(), 0.0);
    }

    #[test]
    #[should_panic(expected = "different tapes")]
    fn mixing_tapes_panics() {
        let a = Tape::new();
        let b = Tape::new();
        let x = a.independent(&[1.0]);
        let y = b.independent(&[1.0]);
        let _ = x[0] + y[0];
    }
}
