use crate::topology::Topology;
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Tensor = ArrayD<f32>;

/// Trained tensors keyed by node name, then parameter name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamStore {
    nodes: BTreeMap<String, BTreeMap<String, Tensor>>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniform values in `[-0.5, 0.5)` for every parameter of `topology`
    pub fn random(topology: &Topology, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut store = Self::new();
        for (id, node) in topology.nodes() {
            for spec in topology.param_specs(id) {
                let tensor = ArrayD::from_shape_fn(IxDyn(&spec.shape), |_| rng.gen::<f32>() - 0.5);
                store.insert(&node.name, spec.name, tensor);
            }
        }
        store
    }

    pub fn insert(&mut self, node: &str, param: &str, tensor: Tensor) {
        self.nodes
            .entry(node.to_string())
            .or_default()
            .insert(param.to_string(), tensor);
    }

    pub fn get(&self, node: &str, param: &str) -> Option<&Tensor> {
        self.nodes.get(node).and_then(|params| params.get(param))
    }

    pub fn node(&self, node: &str) -> Option<&BTreeMap<String, Tensor>> {
        self.nodes.get(node)
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of nodes holding parameters
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tensor_count(&self) -> usize {
        self.nodes.values().map(BTreeMap::len).sum()
    }
}
