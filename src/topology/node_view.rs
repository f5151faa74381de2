use super::{NodeId, Op, Topology};

/// A node together with its relative topological position.
///
/// `location` is `1 - |forward-reachable| / |nodes|`, only meaningful as a
/// crossover heuristic and never persisted.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'t> {
    pub id: NodeId,
    pub topology: &'t Topology,
    pub location: f64,
}

impl<'t> NodeView<'t> {
    pub fn new(topology: &'t Topology, id: NodeId) -> Self {
        Self {
            id,
            topology,
            location: topology.relative_position(id),
        }
    }

    pub fn name(&self) -> &'t str {
        self.topology.name(self.id)
    }

    pub fn op(&self) -> &'t Op {
        &self.topology.node(self.id).op
    }

    pub fn shape(&self) -> &'t [usize] {
        &self.topology.node(self.id).shape
    }
}
