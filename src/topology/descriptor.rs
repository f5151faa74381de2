use super::{Op, Topology, TopologyBuilder};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Serializable form of a topology.
///
/// Round-trips node names, ops, edges and declared inputs/outputs exactly.
/// Node order is topological.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyDescriptor {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub nodes: Vec<NodeDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: String,
    pub op: Op,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
}

impl TopologyDescriptor {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build(&self) -> Result<Topology> {
        let mut builder = TopologyBuilder::new();
        for node in &self.nodes {
            builder.insert(node.name.clone(), node.op.clone(), node.inputs.clone())?;
        }
        for input in &self.inputs {
            builder.declare_input(input)?;
        }
        builder.set_output_names(self.outputs.clone())?;
        builder.build()
    }
}

impl From<&Topology> for TopologyDescriptor {
    fn from(topology: &Topology) -> Self {
        let name = |id: &super::NodeId| topology.name(*id).to_string();
        Self {
            inputs: topology.inputs().iter().map(name).collect(),
            outputs: topology.outputs().iter().map(name).collect(),
            nodes: topology
                .nodes()
                .map(|(_, node)| NodeDescriptor {
                    name: node.name.clone(),
                    op: node.op.clone(),
                    inputs: node.inputs.iter().map(name).collect(),
                })
                .collect(),
        }
    }
}
