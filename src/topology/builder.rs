use super::{Node, NodeId, Op, Topology, TopologyId};
use crate::error::{ArchevoError, Result};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub op: Op,
    pub inputs: Vec<String>,
}

/// Mutable arena every topology edit goes through.
///
/// Nothing is validated until `build`, so intermediate states of a multi-step
/// edit may be inconsistent.
#[derive(Debug, Clone, Default)]
pub struct TopologyBuilder {
    order: Vec<String>,
    nodes: HashMap<String, NodeSpec>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    reserved: HashSet<String>, // every name ever used here, fresh names avoid all of them
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&mut self, name: &str, shape: Vec<usize>) -> Result<()> {
        self.add_node(name, Op::Input { shape }, &[])?;
        self.inputs.push(name.to_string());
        Ok(())
    }

    /// Declares an existing `Input` node as a network input
    pub fn declare_input(&mut self, name: &str) -> Result<()> {
        if !self.nodes.contains_key(name) {
            return Err(ArchevoError::UnknownNode(name.to_string()));
        }
        if !self.inputs.iter().any(|i| i == name) {
            self.inputs.push(name.to_string());
        }
        Ok(())
    }

    pub fn add_node(&mut self, name: &str, op: Op, inputs: &[&str]) -> Result<()> {
        self.insert(name.to_string(), op, inputs.iter().map(|s| s.to_string()).collect())
    }

    pub fn insert(&mut self, name: String, op: Op, inputs: Vec<String>) -> Result<()> {
        if self.nodes.contains_key(&name) {
            return Err(ArchevoError::InvalidTopology(format!(
                "duplicate node name '{}'",
                name
            )));
        }
        self.reserved.insert(name.clone());
        self.order.push(name.clone());
        self.nodes.insert(name, NodeSpec { op, inputs });
        Ok(())
    }

    pub fn remove_node(&mut self, name: &str) -> Result<NodeSpec> {
        let spec = self
            .nodes
            .remove(name)
            .ok_or_else(|| ArchevoError::UnknownNode(name.to_string()))?;
        self.order.retain(|n| n != name);
        self.inputs.retain(|n| n != name);
        self.outputs.retain(|n| n != name);
        Ok(spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Result<&NodeSpec> {
        self.nodes
            .get(name)
            .ok_or_else(|| ArchevoError::UnknownNode(name.to_string()))
    }

    pub fn node_mut(&mut self, name: &str) -> Result<&mut NodeSpec> {
        self.nodes
            .get_mut(name)
            .ok_or_else(|| ArchevoError::UnknownNode(name.to_string()))
    }

    /// Node names in insertion order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn node_inputs(&self, name: &str) -> Result<&[String]> {
        Ok(&self.node(name)?.inputs)
    }

    /// Nodes listing `name` among their inputs, in insertion order
    pub fn consumers(&self, name: &str) -> Vec<String> {
        self.order
            .iter()
            .filter(|n| self.nodes[*n].inputs.iter().any(|i| i == name))
            .cloned()
            .collect()
    }

    /// Points every input slot of `consumer` that reads `old` at `new` instead
    pub fn replace_input(&mut self, consumer: &str, old: &str, new: &str) -> Result<()> {
        let spec = self.node_mut(consumer)?;
        for input in spec.inputs.iter_mut().filter(|i| *i == old) {
            *input = new.to_string();
        }
        Ok(())
    }

    pub fn declared_inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn set_outputs(&mut self, outputs: &[&str]) -> Result<()> {
        self.set_output_names(outputs.iter().map(|s| s.to_string()).collect())
    }

    pub fn set_output_names(&mut self, outputs: Vec<String>) -> Result<()> {
        if let Some(missing) = outputs.iter().find(|o| !self.nodes.contains_key(*o)) {
            return Err(ArchevoError::UnknownNode(missing.clone()));
        }
        self.outputs = outputs;
        Ok(())
    }

    pub fn is_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }

    /// Reserves names so fresh names never collide with them
    pub fn reserve<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        self.reserved.extend(names.into_iter().map(str::to_string));
    }

    /// Allocates a name not used now or previously, by incrementing a numeric suffix
    pub fn fresh_name(&mut self, base: &str) -> String {
        let stem = match base.rsplit_once('_') {
            Some((stem, suffix)) if !stem.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) => stem,
            _ => base,
        };
        let mut k = 1;
        loop {
            let candidate = format!("{}_{}", stem, k);
            if !self.reserved.contains(&candidate) {
                self.reserved.insert(candidate.clone());
                return candidate;
            }
            k += 1;
        }
    }

    /// Validates the arena and freezes it into a `Topology`
    pub fn build(&self) -> Result<Topology> {
        if self.inputs.is_empty() {
            return Err(ArchevoError::InvalidTopology("no declared inputs".to_string()));
        }
        if self.outputs.is_empty() {
            return Err(ArchevoError::InvalidTopology("no declared outputs".to_string()));
        }

        for name in &self.order {
            let spec = &self.nodes[name];
            let declared = self.inputs.contains(name);
            match (&spec.op, declared) {
                (Op::Input { .. }, true) if spec.inputs.is_empty() => {}
                (Op::Input { .. }, true) => {
                    return Err(ArchevoError::InvalidTopology(format!(
                        "declared input '{}' has inputs",
                        name
                    )))
                }
                (Op::Input { .. }, false) => {
                    return Err(ArchevoError::InvalidTopology(format!(
                        "input node '{}' is not declared",
                        name
                    )))
                }
                (_, true) => {
                    return Err(ArchevoError::InvalidTopology(format!(
                        "declared input '{}' is a {}",
                        name,
                        spec.op.type_name()
                    )))
                }
                (_, false) => {}
            }
            if let Some(missing) = spec.inputs.iter().find(|i| !self.nodes.contains_key(*i)) {
                return Err(ArchevoError::DanglingInput {
                    node: name.clone(),
                    input: missing.clone(),
                });
            }
        }

        let sorted = self.topological_order()?;
        let index: HashMap<String, NodeId> = sorted
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), NodeId(i)))
            .collect();

        let mut nodes: Vec<Node> = Vec::with_capacity(sorted.len());
        for name in &sorted {
            let spec = &self.nodes[name];
            let inputs: Vec<NodeId> = spec.inputs.iter().map(|i| index[i]).collect();
            let shape = {
                let input_shapes: Vec<&[usize]> =
                    inputs.iter().map(|id| nodes[id.0].shape.as_slice()).collect();
                spec.op.output_shape(name, &input_shapes)?
            };
            nodes.push(Node {
                name: name.clone(),
                op: spec.op.clone(),
                inputs,
                shape,
            });
        }

        let topology = Topology::assemble(
            TopologyId::next(),
            nodes,
            index.clone(),
            self.inputs.iter().map(|n| index[n]).collect(),
            self.outputs.iter().map(|n| index[n]).collect(),
        );
        topology.check_reaches_outputs()?;
        Ok(topology)
    }

    /// Kahn's algorithm, ties broken by insertion order
    fn topological_order(&self) -> Result<Vec<String>> {
        let mut indegree: HashMap<&str, usize> = self
            .order
            .iter()
            .map(|n| (n.as_str(), self.nodes[n].inputs.len()))
            .collect();
        let mut consumers: HashMap<&str, Vec<&str>> = HashMap::new();
        for name in &self.order {
            for input in &self.nodes[name].inputs {
                consumers.entry(input.as_str()).or_default().push(name.as_str());
            }
        }

        let mut queue: VecDeque<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|n| indegree[n] == 0)
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());

        while let Some(name) = queue.pop_front() {
            sorted.push(name.to_string());
            for consumer in consumers.get(name).into_iter().flatten() {
                let degree = indegree.get_mut(consumer).map(|d| {
                    *d -= 1;
                    *d
                });
                if degree == Some(0) {
                    queue.push_back(*consumer);
                }
            }
        }

        if sorted.len() != self.order.len() {
            let stuck: Vec<&str> = self
                .order
                .iter()
                .map(String::as_str)
                .filter(|n| indegree[n] > 0)
                .collect();
            return Err(ArchevoError::Cycle(stuck.join(", ")));
        }
        Ok(sorted)
    }
}
