use super::{mutate, Edit, MutationOutcome, Rewire};
use crate::config::{ConfigSection, MutationConfig};
use crate::error::{ArchevoError, Result};
use crate::topology::{Activation, NodeId, Op, Topology};
use log::{debug, info};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::HashSet;

const HIDDEN_ACTIVATIONS: [Activation; 3] = [Activation::Relu, Activation::Tanh, Activation::Sigmoid];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditKind {
    Insert,
    Remove,
    Resize,
    SwapActivation,
}

const KINDS: [EditKind; 4] = [
    EditKind::Insert,
    EditKind::Remove,
    EditKind::Resize,
    EditKind::SwapActivation,
];

/// Draws random edits for a topology.
///
/// Declared outputs are never touched, so the network's output shape is
/// stable across generations. Each proposal edits distinct nodes.
pub struct MutationProposer {
    config: MutationConfig,
    kinds: WeightedIndex<f64>,
    rng: StdRng,
}

impl MutationProposer {
    pub fn new(config: MutationConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let kinds = WeightedIndex::new([
            config.insert_weight,
            config.remove_weight,
            config.resize_weight,
            config.activation_weight,
        ])
        .map_err(|e| ArchevoError::Configuration(format!("mutation weights: {}", e)))?;
        Ok(Self {
            config,
            kinds,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn propose(&mut self, topology: &Topology) -> Vec<Edit> {
        let count = self.rng.gen_range(1..=self.config.max_edits);
        let mut touched = HashSet::new();
        let mut edits = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = KINDS[self.kinds.sample(&mut self.rng)];
            if let Some((node, edit)) = self.propose_one(topology, kind, &touched) {
                touched.insert(node);
                edits.push(edit);
            }
        }
        edits
    }

    /// Proposes and applies edits, retrying proposals that break the graph.
    /// Gives back an unchanged copy once every attempt failed.
    pub fn mutate(&mut self, topology: &Topology) -> Result<MutationOutcome> {
        for attempt in 1..=self.config.max_attempts {
            let edits = self.propose(topology);
            match mutate(topology, &edits) {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_shape_mismatch() || matches!(e, ArchevoError::UnsupportedEdit { .. }) => {
                    debug!("attempt {} on {} rejected: {}", attempt, topology.id(), e);
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            "no valid mutation of {} after {} attempts, keeping structure",
            topology.id(),
            self.config.max_attempts
        );
        mutate::<Edit>(topology, &[])
    }

    fn propose_one(
        &mut self,
        topology: &Topology,
        kind: EditKind,
        touched: &HashSet<String>,
    ) -> Option<(String, Edit)> {
        let eligible: Vec<NodeId> = topology
            .nodes()
            .filter(|(id, node)| {
                !topology.is_output(*id) && !touched.contains(&node.name) && self.accepts(topology, *id, kind)
            })
            .map(|(id, _)| id)
            .collect();
        let id = *eligible.choose(&mut self.rng)?;
        let node = topology.node(id);
        let name = node.name.clone();

        let edit = match kind {
            EditKind::Insert => Edit::InsertAfter {
                node: name.clone(),
                block: vec![self.random_layer(node.shape.len())],
                rewire: Rewire::All,
            },
            EditKind::Remove => Edit::Remove { node: name.clone() },
            EditKind::Resize => {
                let factor = *self.config.resize_factors.choose(&mut self.rng)?;
                let width = ((topology.width(id) as f64 * factor).round() as usize).max(1);
                Edit::ReplaceOp {
                    node: name.clone(),
                    op: node.op.with_width(width)?,
                }
            }
            EditKind::SwapActivation => {
                let current = match node.op {
                    Op::Activation(a) => a,
                    _ => return None,
                };
                let choices: Vec<Activation> = HIDDEN_ACTIVATIONS
                    .iter()
                    .copied()
                    .filter(|a| *a != current)
                    .collect();
                Edit::ReplaceOp {
                    node: name.clone(),
                    op: Op::Activation(*choices.choose(&mut self.rng)?),
                }
            }
        };
        Some((name, edit))
    }

    fn accepts(&self, topology: &Topology, id: NodeId, kind: EditKind) -> bool {
        let op = &topology.node(id).op;
        match kind {
            EditKind::Insert => true,
            EditKind::Remove => {
                !topology.is_input(id)
                    && !op.is_merge()
                    && !matches!(op, Op::Flatten)
                    && topology.producers(id).len() == 1
                    && topology.consumers(id).len() == 1
            }
            EditKind::Resize => op.defines_width(),
            EditKind::SwapActivation => matches!(op, Op::Activation(_)),
        }
    }

    /// A single-input layer valid on an input of the given rank
    fn random_layer(&mut self, rank: usize) -> Op {
        let width = self.config.insert_widths.choose(&mut self.rng).copied().unwrap_or(16);
        let mut options = vec![
            Op::BatchNorm,
            Op::Activation(Activation::Relu),
            Op::Dropout { rate: 0.1 },
        ];
        if rank == 3 {
            options.push(Op::Conv2d {
                filters: width,
                kernel: (3, 3),
            });
        } else if rank >= 1 {
            options.push(Op::Dense { units: width });
        }
        let pick = self.rng.gen_range(0..options.len());
        options.swap_remove(pick)
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

    fn only(kind: &str) -> MutationConfig {
        let mut config = MutationConfig {
            insert_weight: 0.0,
            remove_weight: 0.0,
            resize_weight: 0.0,
            activation_weight: 0.0,
            max_edits: 1,
            ..MutationConfig::default()
        };
        match kind {
            "insert" => config.insert_weight = 1.0,
            "remove" => config.remove_weight = 1.0,
            "resize" => config.resize_weight = 1.0,
            _ => config.activation_weight = 1.0,
        }
        config
    }

    #[test]
    fn test_random_mutations_always_build() {
        let t = mlp();
        let mut proposer = MutationProposer::new(MutationConfig::default(), 11).unwrap();
        for _ in 0..50 {
            let outcome = proposer.mutate(&t).unwrap();
            assert_eq!(outcome.topology.node(outcome.topology.outputs()[0]).shape, vec![3]);
        }
    }

    #[test]
    fn test_same_seed_same_proposals() {
        let t = mlp();
        let mut a = MutationProposer::new(MutationConfig::default(), 5).unwrap();
        let mut b = MutationProposer::new(MutationConfig::default(), 5).unwrap();
        for _ in 0..10 {
            assert_eq!(a.propose(&t), b.propose(&t));
        }
    }

    #[test]
    fn test_resize_only_touches_hidden_dense() {
        let t = mlp();
        let mut proposer = MutationProposer::new(only("resize"), 3).unwrap();
        let edits = proposer.propose(&t);
        assert_eq!(edits.len(), 1);
        assert!(matches!(&edits[0], Edit::ReplaceOp { node, op: Op::Dense { units } } if node == "hidden" && *units != 16));
    }

    #[test]
    fn test_swap_changes_activation() {
        let t = mlp();
        let mut proposer = MutationProposer::new(only("activation"), 9).unwrap();
        let edits = proposer.propose(&t);
        assert!(matches!(&edits[0], Edit::ReplaceOp { op: Op::Activation(a), .. } if *a != Activation::Relu));
    }

    #[test]
    fn test_remove_never_targets_inputs_or_outputs() {
        let t = mlp();
        let mut proposer = MutationProposer::new(only("remove"), 1).unwrap();
        for _ in 0..20 {
            for edit in proposer.propose(&t) {
                assert!(matches!(&edit, Edit::Remove { node } if node == "hidden" || node == "act"));
            }
        }
    }

    #[test]
    fn test_zero_weights_are_rejected() {
        let config = MutationConfig {
            insert_weight: 0.0,
            remove_weight: 0.0,
            resize_weight: 0.0,
            activation_weight: 0.0,
            ..MutationConfig::default()
        };
        assert!(MutationProposer::new(config, 0).is_err());
    }
}
