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

//! Kernel shrinking: dead-node pruning, local simplification, common
//! subexpression elimination and dense renumbering.

use std::collections::HashMap;

use super::{BinOp, Node, NodeId, Simplified, Trace, UnaryOp};

#[derive(Debug, PartialEq, Eq, Hash)]
enum NodeKey {
    Input(usize),
    Weight(usize),
    Const(u64),
    Unary(UnaryOp, NodeId),
    Binary(BinOp, NodeId, NodeId),
    Powi(NodeId, i32),
}

impl From<&Node> for NodeKey {
    fn from(node: &Node) -> Self {
        match *node {
            Node::Input(index) => NodeKey::Input(index),
            Node::Weight(index) => NodeKey::Weight(index),
            Node::Const(value) => NodeKey::Const(value.to_bits()),
            Node::Unary { op, arg } => NodeKey::Unary(op, arg),
            Node::Binary { op, lhs, rhs } => NodeKey::Binary(op, lhs, rhs),
            Node::Powi { base, exp } => NodeKey::Powi(base, exp),
        }
    }
}

/// Return an equivalent trace with only the nodes its outputs need.
///
/// Outputs keep their order and values. Applying `optimize` to its own
/// result yields the same trace.
pub fn optimize(trace: &Trace) -> Trace {
    let mut current = rebuild(trace);
    loop {
        let next = rebuild(&current);
        if next.nodes.len() >= current.nodes.len() {
            return next;
        }
        current = next;
    }
}

fn live_nodes(trace: &Trace) -> Vec<bool> {
    let mut live = vec![false; trace.nodes.len()];
    for output in &trace.outputs {
        live[output.0] = true;
    }
    for index in (0..trace.nodes.len()).rev() {
        if live[index] {
            for operand in trace.nodes[index].operands() {
                live[operand.0] = true;
            }
        }
    }
    live
}

fn rebuild(trace: &Trace) -> Trace {
    let live = live_nodes(trace);
    let mut out = Trace::new(trace.num_inputs, trace.num_weights);
    let mut memo: HashMap<NodeKey, NodeId> = HashMap::new();
    // Only entries of live nodes are read: operands of a live node are live.
    let mut remap = vec![NodeId(0); trace.nodes.len()];

    for (index, node) in trace.nodes.iter().enumerate() {
        if !live[index] {
            continue;
        }
        let node = node.map_operands(|id| remap[id.0]);
        remap[index] = intern(&mut out, &mut memo, node);
    }

    out.outputs = trace.outputs.iter().map(|id| remap[id.0]).collect();
    out
}

fn intern(out: &mut Trace, memo: &mut HashMap<NodeKey, NodeId>, node: Node) -> NodeId {
    let node = match out.simplify(node) {
        Simplified::Existing(id) => return id,
        Simplified::New(node) => node,
    };
    let key = NodeKey::from(&node);
    if let Some(&id) = memo.get(&key) {
        return id;
    }
    let id = out.push(node);
    memo.insert(key, id);
    id
}
