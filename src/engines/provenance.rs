use crate::topology::{Topology, TopologyId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a node of a derived topology came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub topology: TopologyId,
    pub name: String,
}

impl Origin {
    pub fn new(topology: TopologyId, name: &str) -> Self {
        Self {
            topology,
            name: name.to_string(),
        }
    }
}

/// Renames performed by one mutation or crossover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceLayer {
    pub derived: TopologyId,
    pub origins: HashMap<String, Origin>,
}

/// Explicit chain of rename layers.
///
/// Resolution walks layers from the queried topology back towards the source,
/// one hop per layer, so a crossover of crossover outputs still traces every
/// node to the topology it was first built in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    layers: Vec<ProvenanceLayer>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, derived: TopologyId, origins: HashMap<String, Origin>) {
        self.layers.retain(|l| l.derived != derived);
        self.layers.push(ProvenanceLayer { derived, origins });
    }

    /// Appends layers from an earlier derivation step
    pub fn extend(&mut self, earlier: &Provenance) {
        for layer in &earlier.layers {
            if !self.layers.iter().any(|l| l.derived == layer.derived) {
                self.layers.push(layer.clone());
            }
        }
    }

    pub fn layers(&self) -> &[ProvenanceLayer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// One hop back from `derived`
    pub fn origin(&self, derived: TopologyId, name: &str) -> Option<&Origin> {
        self.layers
            .iter()
            .find(|l| l.derived == derived)
            .and_then(|l| l.origins.get(name))
    }

    /// Name that `name` in `derived` had in `source`, if it descends from it
    pub fn resolve(&self, derived: TopologyId, name: &str, source: TopologyId) -> Option<String> {
        if derived == source {
            return Some(name.to_string());
        }
        let mut current = Origin::new(derived, name);
        for _ in 0..self.layers.len() {
            let origin = self.origin(current.topology, &current.name)?;
            if origin.topology == source {
                return Some(origin.name.clone());
            }
            current = origin.clone();
        }
        None
    }

    /// Pairs of (name in `derived`, name in `source`) for every node tracing back to `source`
    pub fn traced_to(&self, derived: &Topology, source: TopologyId) -> Vec<(String, String)> {
        derived
            .nodes()
            .filter_map(|(_, node)| {
                self.resolve(derived.id(), &node.name, source)
                    .map(|old| (node.name.clone(), old))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::mutation::{mutate, Edit};
    use crate::topology::{Activation, Op};

    fn mlp() -> Topology {
        Topology::sequential(
            vec![4],
            vec![
                ("hidden", Op::Dense { units: 8 }),
                ("act", Op::Activation(Activation::Relu)),
                ("out", Op::Dense { units: 2 }),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_resolution_walks_every_layer() {
        let source = mlp();
        let first = mutate(
            &source,
            &[Edit::ReplaceOp {
                node: "act".to_string(),
                op: Op::BatchNorm,
            }],
        )
        .unwrap();
        let second = mutate::<Edit>(&first.topology, &[]).unwrap();

        let mut chained = second.provenance.clone();
        chained.extend(&first.provenance);
        let leaf = second.topology.id();

        assert_eq!(chained.resolve(leaf, "hidden", source.id()), Some("hidden".to_string()));
        assert_eq!(chained.resolve(leaf, "batch_norm_1", first.topology.id()), Some("batch_norm_1".to_string()));
        assert_eq!(chained.resolve(leaf, "batch_norm_1", source.id()), None);
        assert_eq!(second.provenance.resolve(leaf, "hidden", source.id()), None);
    }

    #[test]
    fn test_traced_to_lists_surviving_pairs() {
        let source = mlp();
        let outcome = mutate(
            &source,
            &[Edit::ReplaceOp {
                node: "act".to_string(),
                op: Op::Dropout { rate: 0.2 },
            }],
        )
        .unwrap();
        let mut pairs = outcome.provenance.traced_to(&outcome.topology, source.id());
        pairs.sort();
        let names: Vec<&str> = pairs.iter().map(|(new, _)| new.as_str()).collect();
        assert_eq!(names, vec!["hidden", "input", "out"]);
    }
}
