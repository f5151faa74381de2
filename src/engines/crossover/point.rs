use crate::graph::{Forward, Traverse, ViewExt};
use crate::topology::{NodeId, NodeView, Topology};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Where to aim a cut.
///
/// `distance` is the wanted difference between the cut depth in the bottom
/// parent and in the top parent; `relative_location` is the wanted depth of
/// the cut in the bottom parent, both on the `[0, 1]` position scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossoverTarget {
    pub distance: f64,
    pub relative_location: f64,
}

impl Default for CrossoverTarget {
    fn default() -> Self {
        Self {
            distance: 0.0,
            relative_location: 0.5,
        }
    }
}

/// A pair of compatible nodes, one per parent
#[derive(Debug, Clone, Copy)]
pub struct CrossoverPoint<'a> {
    pub bottom: NodeView<'a>,
    pub top: NodeView<'a>,
    pub distance: f64,
}

impl<'a> CrossoverPoint<'a> {
    pub fn new(bottom: NodeView<'a>, top: NodeView<'a>) -> Self {
        Self {
            bottom,
            top,
            distance: bottom.location - top.location,
        }
    }

    fn tie_break(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.bottom.name().hash(&mut hasher);
        self.top.name().hash(&mut hasher);
        hasher.finish()
    }

    fn rank(&self, other: &Self, target: &CrossoverTarget) -> Ordering {
        let by_distance = |p: &Self| (target.distance - p.distance).abs();
        let by_location = |p: &Self| (target.relative_location - p.bottom.location).abs();
        by_distance(self)
            .total_cmp(&by_distance(other))
            .then_with(|| by_location(self).total_cmp(&by_location(other)))
            .then_with(|| self.tie_break().cmp(&other.tie_break()))
    }
}

/// Whether cutting at `id` keeps every side input of the cut-off region.
///
/// Merges, declared inputs and declared outputs never qualify. Nodes inside
/// a skip connection fail because some descendant reads from outside the
/// node's forward closure.
pub fn is_valid_point(topology: &Topology, id: NodeId) -> bool {
    if topology.node(id).op.is_merge() || topology.is_input(id) || topology.is_output(id) {
        return false;
    }
    let descendants = Traverse::new(Forward::new(topology).single_visit()).walk(id);
    let mut closure: HashSet<NodeId> = descendants.iter().copied().collect();
    closure.insert(id);
    descendants
        .iter()
        .all(|d| topology.producers(*d).iter().all(|p| closure.contains(p)))
}

pub fn valid_points(topology: &Topology) -> Vec<NodeView<'_>> {
    topology
        .nodes()
        .filter(|(id, _)| is_valid_point(topology, *id))
        .map(|(id, _)| topology.view(id))
        .collect()
}

/// Same op type and same output shape apart from the channel axis
pub fn compatible(bottom: &NodeView<'_>, top: &NodeView<'_>) -> bool {
    let (b, t) = (bottom.shape(), top.shape());
    bottom.op().type_name() == top.op().type_name()
        && b.len() == t.len()
        && b[..b.len().saturating_sub(1)] == t[..t.len().saturating_sub(1)]
}

/// Every compatible pair, best first
pub fn ranked_points<'a>(
    bottom: &'a Topology,
    top: &'a Topology,
    target: &CrossoverTarget,
) -> Vec<CrossoverPoint<'a>> {
    let tops = valid_points(top);
    let mut points: Vec<CrossoverPoint<'a>> = valid_points(bottom)
        .into_iter()
        .flat_map(|b| {
            tops.iter()
                .filter(move |t| compatible(&b, t))
                .map(move |t| CrossoverPoint::new(b, *t))
        })
        .collect();
    points.sort_by(|a, b| a.rank(b, target));
    points
}
