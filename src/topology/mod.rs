//! Mutable DAG of typed computation nodes being evolved.
//!
//! A `Topology` is always valid: acyclic, no dangling inputs, every node fed
//! from a declared input and reaching a declared output, shapes consistent.
//! Edits go through `TopologyBuilder`, which re-validates on `build`.

pub mod builder;
pub mod descriptor;
pub mod node_view;
pub mod op;

pub use builder::{NodeSpec, TopologyBuilder};
pub use descriptor::{NodeDescriptor, TopologyDescriptor};
pub use node_view::NodeView;
pub use op::{Activation, AxisRole, Op, OpKind, ParamSpec};

use crate::error::{ArchevoError, Result};
use crate::graph::{Backward, Forward, Traverse, ViewExt};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOPOLOGY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a built topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopologyId(u64);

impl TopologyId {
    pub(crate) fn next() -> Self {
        TopologyId(NEXT_TOPOLOGY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for TopologyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Index of a node in topological order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub op: Op,
    pub inputs: Vec<NodeId>,
    pub shape: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Topology {
    id: TopologyId,
    nodes: Vec<Node>,
    index: HashMap<String, NodeId>,
    consumers: Vec<Vec<NodeId>>,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
}

impl Topology {
    pub(crate) fn assemble(
        id: TopologyId,
        nodes: Vec<Node>,
        index: HashMap<String, NodeId>,
        inputs: Vec<NodeId>,
        outputs: Vec<NodeId>,
    ) -> Self {
        let mut consumers = vec![Vec::new(); nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for input in &node.inputs {
                let list: &mut Vec<NodeId> = &mut consumers[input.0];
                if !list.contains(&NodeId(i)) {
                    list.push(NodeId(i));
                }
            }
        }
        Self {
            id,
            nodes,
            index,
            consumers,
            inputs,
            outputs,
        }
    }

    /// Linear stack of layers on a single input; the last layer is the output
    pub fn sequential(input_shape: Vec<usize>, layers: Vec<(&str, Op)>) -> Result<Topology> {
        let mut builder = TopologyBuilder::new();
        builder.add_input("input", input_shape)?;
        let mut previous = "input".to_string();
        for (name, op) in layers {
            builder.add_node(name, op, &[previous.as_str()])?;
            previous = name.to_string();
        }
        builder.set_outputs(&[previous.as_str()])?;
        builder.build()
    }

    pub(crate) fn check_reaches_outputs(&self) -> Result<()> {
        let mut walk = Traverse::new(Backward::new(self).single_visit());
        for output in &self.outputs {
            walk.inner_mut().mark(*output);
            walk.walk(*output);
        }
        let visited = walk.inner_mut().visited();
        match (0..self.nodes.len()).find(|i| !visited.contains(&NodeId(*i))) {
            Some(i) => Err(ArchevoError::Disconnected(self.nodes[i].name.clone())),
            None => Ok(()),
        }
    }

    pub fn id(&self) -> TopologyId {
        self.id
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

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    /// Nodes in topological order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Result<NodeId> {
        self.find(name)
            .ok_or_else(|| ArchevoError::UnknownNode(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn producers(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].inputs
    }

    pub fn consumers(&self, id: NodeId) -> &[NodeId] {
        &self.consumers[id.0]
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn is_input(&self, id: NodeId) -> bool {
        self.inputs.contains(&id)
    }

    pub fn is_output(&self, id: NodeId) -> bool {
        self.outputs.contains(&id)
    }

    /// Shape of the first input, the one parameters are sized against
    pub fn input_shape(&self, id: NodeId) -> Option<&[usize]> {
        self.producers(id)
            .first()
            .map(|p| self.nodes[p.0].shape.as_slice())
    }

    /// Channel width of a node's output
    pub fn width(&self, id: NodeId) -> usize {
        self.nodes[id.0].shape.last().copied().unwrap_or(0)
    }

    pub fn param_specs(&self, id: NodeId) -> Vec<ParamSpec> {
        let input = self.input_shape(id).unwrap_or(&[]);
        self.nodes[id.0].op.param_specs(input)
    }

    /// Everything forward-reachable from `id`, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        Traverse::new(Forward::new(self).single_visit()).walk(id)
    }

    /// Everything backward-reachable from `id`, excluding `id`
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        Traverse::new(Backward::new(self).single_visit()).walk(id)
    }

    /// `1 - |forward-reachable| / |nodes|`: 1.0 at an output, near 0 at an input
    pub fn relative_position(&self, id: NodeId) -> f64 {
        1.0 - self.descendants(id).len() as f64 / self.nodes.len() as f64
    }

    pub fn view(&self, id: NodeId) -> NodeView<'_> {
        NodeView::new(self, id)
    }

    /// Mutable copy for editing; all current names stay reserved
    pub fn to_builder(&self) -> Result<TopologyBuilder> {
        let mut builder = TopologyBuilder::new();
        for node in &self.nodes {
            let inputs = node.inputs.iter().map(|i| self.name(*i).to_string()).collect();
            builder.insert(node.name.clone(), node.op.clone(), inputs)?;
        }
        for input in &self.inputs {
            builder.declare_input(self.name(*input))?;
        }
        let outputs = self.outputs.iter().map(|o| self.name(*o).to_string()).collect();
        builder.set_output_names(outputs)?;
        Ok(builder)
    }

    pub fn descriptor(&self) -> TopologyDescriptor {
        TopologyDescriptor::from(self)
    }

    /// Names, ops, edges and declared inputs/outputs all equal
    pub fn same_structure(&self, other: &Topology) -> bool {
        self.descriptor() == other.descriptor()
    }

    /// Canonical description of the structure, independent of node names and
    /// of the order nodes were inserted in.
    ///
    /// Each node is summarised by its op and the summaries of its inputs
    /// (unordered for `Add`), and the sorted summaries form the key.
    pub fn fingerprint(&self) -> String {
        let mut signatures: Vec<u64> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut inputs: Vec<u64> = node.inputs.iter().map(|i| signatures[i.0]).collect();
            if matches!(node.op, Op::Add) {
                inputs.sort_unstable();
            }
            let mut hasher = DefaultHasher::new();
            serde_json::to_string(&node.op)
                .unwrap_or_default()
                .hash(&mut hasher);
            inputs.hash(&mut hasher);
            signatures.push(hasher.finish());
        }
        let outputs: Vec<String> = self
            .outputs
            .iter()
            .map(|o| format!("{:016x}", signatures[o.0]))
            .collect();
        let mut nodes: Vec<String> = signatures.iter().map(|s| format!("{:016x}", s)).collect();
        nodes.sort_unstable();
        serde_json::to_string(&(nodes, outputs)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mlp() -> Topology {
        Topology::sequential(
            vec![8],
            vec![
                ("hidden", Op::Dense { units: 16 }),
                ("act", Op::Activation(Activation::Relu)),
                ("out", Op::Dense { units: 3 }),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_relative_position_runs_input_to_output() {
        let t = mlp();
        assert_eq!(t.relative_position(t.get("out").unwrap()), 1.0);
        assert!((t.relative_position(t.get("input").unwrap()) - 0.25).abs() < 1e-12);
        assert!((t.relative_position(t.get("act").unwrap()) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip_through_builder_keeps_structure() {
        let t = mlp();
        let rebuilt = t.to_builder().unwrap().build().unwrap();
        assert!(t.same_structure(&rebuilt));
        assert_ne!(t.id(), rebuilt.id());
    }

    #[test]
    fn test_fingerprint_ignores_names() {
        let a = mlp();
        let b = Topology::sequential(
            vec![8],
            vec![
                ("h", Op::Dense { units: 16 }),
                ("r", Op::Activation(Activation::Relu)),
                ("o", Op::Dense { units: 3 }),
            ],
        )
        .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(!a.same_structure(&b));
    }

    #[test]
    fn test_param_specs_use_input_width() {
        let t = mlp();
        let specs = t.param_specs(t.get("out").unwrap());
        assert_eq!(specs[0].shape, vec![16, 3]);
        assert_eq!(specs[1].shape, vec![3]);
    }

    fn skip_net(units: usize, reversed: bool) -> Topology {
        let mut builder = TopologyBuilder::new();
        builder.add_input("in", vec![8]).unwrap();
        let add_branch = |builder: &mut TopologyBuilder| {
            builder.add_node("p", Op::Dense { units: 4 }, &["in"]).unwrap();
        };
        if !reversed {
            add_branch(&mut builder);
        }
        builder.add_node("q", Op::Dense { units }, &["in"]).unwrap();
        builder.add_node("r", Op::Dense { units: 4 }, &["q"]).unwrap();
        if reversed {
            add_branch(&mut builder);
            builder.add_node("join", Op::Add, &["r", "p"]).unwrap();
        } else {
            builder.add_node("join", Op::Add, &["p", "r"]).unwrap();
        }
        builder.set_outputs(&["join"]).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_fingerprint_ignores_insertion_order() {
        let a = skip_net(2, false);
        let b = skip_net(2, true);
        let order = |t: &Topology| t.nodes().map(|(_, n)| n.name.clone()).collect::<Vec<_>>();
        assert_ne!(order(&a), order(&b));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), skip_net(3, false).fingerprint());
    }
}
