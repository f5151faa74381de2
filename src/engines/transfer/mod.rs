//! Carries trained parameters from parent topologies onto a derived one.
//!
//! Nodes are matched through provenance. For each matched node the output
//! channels are mapped once (pruned by importance, or padded) and every
//! tensor axis tied to those channels reuses that map: the node's own bias
//! and kernel output axis, and the input axis of whatever consumes it.
//! Width-defining nodes summed by the same `Add` shrink as one group, ranked
//! on their combined scores, so the merge keeps adding matching channels.

pub mod channel_map;
pub mod importance;
pub mod store;

pub use channel_map::ChannelMap;
pub use importance::{top_k, Importance, ImportanceFn, TransferContext};
pub use store::{ParamStore, Tensor};

use crate::engines::provenance::Provenance;
use crate::error::{ArchevoError, Result};
use crate::graph::{Backward, Traverse, ViewExt};
use crate::topology::{AxisRole, NodeId, Op, Topology};
use log::debug;
use ndarray::{ArrayD, IxDyn};
use std::collections::HashMap;

/// A parent topology with its trained parameters
#[derive(Debug, Clone, Copy)]
pub struct ParamSource<'a> {
    pub topology: &'a Topology,
    pub params: &'a ParamStore,
}

impl<'a> ParamSource<'a> {
    pub fn new(topology: &'a Topology, params: &'a ParamStore) -> Self {
        Self { topology, params }
    }
}

/// Builds the parameter store of `target` from its parents.
///
/// Nodes without a counterpart in any source, or whose op type changed, get
/// no entry and are left to the model adapter to initialise.
pub fn transfer(
    sources: &[ParamSource<'_>],
    target: &Topology,
    provenance: &Provenance,
    ctx: &TransferContext,
) -> Result<ParamStore> {
    let mut run = Transfer {
        sources,
        target,
        matches: Vec::with_capacity(target.len()),
        shared: HashMap::new(),
        maps: Vec::with_capacity(target.len()),
    };
    for (id, node) in target.nodes() {
        let matched = run.find_match(id, &node.name, provenance);
        run.matches.push(matched);
    }
    run.shared = run.shared_selections(ctx);
    for (id, _) in target.nodes() {
        let map = run.output_map(id, ctx);
        run.maps.push(map);
    }

    let mut store = ParamStore::new();
    for (id, _) in target.nodes() {
        if let Some((source, old)) = run.matches[id.0] {
            run.copy_node(id, source, old, ctx, &mut store)?;
        }
    }
    debug!(
        "transferred {} tensors onto {} from {} sources",
        store.tensor_count(),
        target.id(),
        sources.len()
    );
    Ok(store)
}

struct Transfer<'s, 'a> {
    sources: &'s [ParamSource<'a>],
    target: &'s Topology,
    matches: Vec<Option<(usize, NodeId)>>,
    shared: HashMap<NodeId, Vec<usize>>, // kept channels of merge-group members
    maps: Vec<Option<ChannelMap>>,
}

impl Transfer<'_, '_> {
    fn find_match(&self, id: NodeId, name: &str, provenance: &Provenance) -> Option<(usize, NodeId)> {
        let op = &self.target.node(id).op;
        self.sources.iter().enumerate().find_map(|(i, source)| {
            let old_name = provenance.resolve(self.target.id(), name, source.topology.id())?;
            let old = source.topology.find(&old_name)?;
            (source.topology.node(old).op.type_name() == op.type_name()).then_some((i, old))
        })
    }

    fn old_topology(&self, source: usize) -> &Topology {
        self.sources[source].topology
    }

    /// Old kernel of a matched node and the axis of its output channels
    fn old_kernel(&self, source: usize, old: NodeId) -> (Option<&Tensor>, usize) {
        let old_topology = self.old_topology(source);
        let kernel = self.sources[source].params.get(old_topology.name(old), "kernel");
        let out_axis = old_topology
            .param_specs(old)
            .iter()
            .find(|s| s.name == "kernel")
            .and_then(|s| s.axes.iter().position(|a| *a == AxisRole::Output))
            .unwrap_or(0);
        (kernel, out_axis)
    }

    /// One channel selection per shrinking merge group. The group is ranked
    /// with the importance of its first member.
    fn shared_selections(&self, ctx: &TransferContext) -> HashMap<NodeId, Vec<usize>> {
        let mut shared = HashMap::new();
        for group in merge_groups(self.target) {
            let members: Vec<(NodeId, usize, NodeId)> = group
                .iter()
                .filter_map(|id| self.matches[id.0].map(|(source, old)| (*id, source, old)))
                .collect();
            let Some(&(first, first_source, first_old)) = members.first() else {
                continue;
            };
            let width = self.target.width(first);
            let old_width = self.old_topology(first_source).width(first_old);
            let uniform = members.iter().all(|(id, source, old)| {
                self.target.width(*id) == width && self.old_topology(*source).width(*old) == old_width
            });
            if members.len() < 2 || width >= old_width || !uniform {
                continue;
            }

            let importance = ctx.importance(self.target.name(first));
            let mut total = vec![0.0f32; old_width];
            let mut scored = false;
            for (_, source, old) in &members {
                let (kernel, out_axis) = self.old_kernel(*source, *old);
                if let Some(scores) = importance.scores(kernel, out_axis) {
                    total.iter_mut().zip(scores).for_each(|(t, s)| *t += s);
                    scored = true;
                }
            }
            let kept = if scored {
                top_k(&total, old_width, width)
            } else {
                (0..width).collect()
            };
            debug!(
                "{} merged nodes keep channels {:?} of {}",
                members.len(),
                kept,
                old_width
            );
            for (id, _, _) in members {
                shared.insert(id, kept.clone());
            }
        }
        shared
    }

    /// Map of the channels `id` reads on input `slot`, relative to the
    /// matching input of its old counterpart
    fn input_map(&self, id: NodeId, slot: usize) -> Option<ChannelMap> {
        let (source, old) = self.matches[id.0]?;
        let old_topology = self.old_topology(source);
        let producer = *self.target.producers(id).get(slot)?;
        let old_producer = *old_topology.producers(old).get(slot)?;

        let effective = through_transparent(self.target, producer);
        let old_effective = through_transparent(old_topology, old_producer);
        let linked = self.matches[effective.0] == Some((source, old_effective));
        match (&self.maps[effective.0], linked) {
            (Some(map), true) => Some(map.clone()),
            _ => Some(ChannelMap::positional(
                self.target.width(producer),
                old_topology.width(old_producer),
            )),
        }
    }

    fn output_map(&self, id: NodeId, ctx: &TransferContext) -> Option<ChannelMap> {
        let (source, old) = self.matches[id.0]?;
        let old_topology = self.old_topology(source);
        let node = self.target.node(id);
        let (width, old_width) = (self.target.width(id), old_topology.width(old));

        let map = match &node.op {
            Op::Input { .. } => ChannelMap::positional(width, old_width),
            op if op.defines_width() => {
                if width >= old_width {
                    ChannelMap::positional(width, old_width)
                } else {
                    let kept = match self.shared.get(&id) {
                        Some(kept) => kept.clone(),
                        None => {
                            let (kernel, out_axis) = self.old_kernel(source, old);
                            ctx.importance(&node.name).select(kernel, out_axis, old_width, width)
                        }
                    };
                    ChannelMap::from_kept(kept, width)
                }
            }
            Op::Concat => {
                let old_producers = old_topology.producers(old);
                if old_producers.len() != self.target.producers(id).len() {
                    ChannelMap::positional(width, old_width)
                } else {
                    let parts = old_producers
                        .iter()
                        .enumerate()
                        .map(|(slot, p)| Some((self.input_map(id, slot)?, old_topology.width(*p))))
                        .collect::<Option<Vec<_>>>()?;
                    ChannelMap::concat(&parts)
                }
            }
            Op::Flatten => {
                let channels = self.input_map(id, 0)?;
                let new_in = self.target.input_shape(id)?;
                let old_in = old_topology.input_shape(old)?;
                ChannelMap::flatten(&channels, new_in, old_in)
            }
            // Add and width-transparent ops pass their first input's channels on
            _ => self.input_map(id, 0)?,
        };
        Some(map)
    }

    fn copy_node(
        &self,
        id: NodeId,
        source: usize,
        old: NodeId,
        ctx: &TransferContext,
        store: &mut ParamStore,
    ) -> Result<()> {
        let name = self.target.name(id);
        let old_name = self.old_topology(source).name(old);
        let params = self.sources[source].params;

        for spec in self.target.param_specs(id) {
            let old_tensor = match params.get(old_name, spec.name) {
                Some(t) => t,
                None => continue,
            };
            if old_tensor.ndim() != spec.shape.len() {
                return Err(ArchevoError::RankMismatch {
                    node: name.to_string(),
                    param: spec.name.to_string(),
                    expected: spec.shape.len(),
                    actual: old_tensor.ndim(),
                });
            }

            let axis_maps: Vec<ChannelMap> = spec
                .axes
                .iter()
                .zip(spec.shape.iter().zip(old_tensor.shape()))
                .map(|(role, (new_dim, old_dim))| {
                    let map = match role {
                        AxisRole::Output => self.maps[id.0].clone(),
                        AxisRole::Input => self.input_map(id, 0),
                        AxisRole::Spatial => None,
                    };
                    map.filter(|m| m.len() == *new_dim)
                        .unwrap_or_else(|| ChannelMap::positional(*new_dim, *old_dim))
                })
                .collect();

            let tensor = gather(old_tensor, &spec.shape, &axis_maps, ctx.pad_value);
            store.insert(name, spec.name, tensor);
        }
        Ok(())
    }
}

/// Width-defining nodes whose outputs meet in an `Add`, directly or through
/// width-transparent ops. Overlapping groups are joined.
fn merge_groups(topology: &Topology) -> Vec<Vec<NodeId>> {
    let carries = |id: NodeId| {
        let op = &topology.node(id).op;
        op.is_width_transparent() || matches!(op, Op::Add)
    };
    let mut groups: Vec<Vec<NodeId>> = Vec::new();
    for (id, node) in topology.nodes() {
        if !matches!(node.op, Op::Add) {
            continue;
        }
        let sources = Backward::new(topology).enter_if(carries).single_visit();
        let mut members: Vec<NodeId> = Traverse::new(sources)
            .walk(id)
            .into_iter()
            .filter(|n| topology.node(*n).op.defines_width())
            .collect();
        let (overlapping, rest): (Vec<_>, Vec<_>) = groups
            .into_iter()
            .partition(|g| g.iter().any(|n| members.contains(n)));
        groups = rest;
        members.extend(overlapping.into_iter().flatten());
        members.sort_unstable();
        members.dedup();
        groups.push(members);
    }
    groups
}

/// First producer upstream of `id` that is not width-transparent.
/// Transparent ops keep channel indices, so its channel map still applies.
fn through_transparent(topology: &Topology, mut id: NodeId) -> NodeId {
    while topology.node(id).op.is_width_transparent() {
        match topology.producers(id) {
            [only] => id = *only,
            _ => break,
        }
    }
    id
}

fn gather(old: &Tensor, shape: &[usize], maps: &[ChannelMap], pad: f32) -> Tensor {
    if old.shape() == shape && maps.iter().zip(shape).all(|(m, dim)| m.is_identity(*dim)) {
        return old.clone();
    }
    let old_shape = old.shape();
    ArrayD::from_shape_fn(IxDyn(shape), |index| {
        let mut old_index = Vec::with_capacity(shape.len());
        for (axis, map) in maps.iter().enumerate() {
            match map.get(index[axis]) {
                Some(i) if i < old_shape[axis] => old_index.push(i),
                _ => return pad,
            }
        }
        old[old_index.as_slice()]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::mutation::{mutate, Edit, Rewire};
    use crate::topology::{Activation, TopologyBuilder};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Axis};

    fn mlp(hidden: usize) -> Topology {
        Topology::sequential(
            vec![4],
            vec![
                ("hidden", Op::Dense { units: hidden }),
                ("norm", Op::BatchNorm),
                ("act", Op::Activation(Activation::Relu)),
                ("out", Op::Dense { units: 2 }),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_identity_transfer_is_exact() {
        let t = mlp(6);
        let params = ParamStore::random(&t, 1);
        let outcome = mutate::<Edit>(&t, &[]).unwrap();
        let moved = transfer(
            &[ParamSource::new(&t, &params)],
            &outcome.topology,
            &outcome.provenance,
            &TransferContext::default(),
        )
        .unwrap();
        assert_eq!(moved, params);
    }

    #[test]
    fn test_inserted_node_leaves_others_untouched() {
        let t = mlp(6);
        let params = ParamStore::random(&t, 2);
        let edit = Edit::InsertAfter {
            node: "act".to_string(),
            block: vec![Op::Dropout { rate: 0.3 }],
            rewire: Rewire::All,
        };
        let outcome = mutate(&t, &[edit]).unwrap();
        let moved = transfer(
            &[ParamSource::new(&t, &params)],
            &outcome.topology,
            &outcome.provenance,
            &TransferContext::default(),
        )
        .unwrap();
        for name in ["hidden", "norm", "out"] {
            assert_eq!(moved.node(name), params.node(name));
        }
    }

    #[test]
    fn test_shrink_prunes_consistently_downstream() {
        let t = mlp(4);
        let mut params = ParamStore::random(&t, 3);
        // channel 2 carries by far the largest weights
        let mut kernel = params.get("hidden", "kernel").unwrap().clone();
        kernel.index_axis_mut(Axis(1), 2).fill(10.0);
        params.insert("hidden", "kernel", kernel);

        let edit = Edit::ReplaceOp {
            node: "hidden".to_string(),
            op: Op::Dense { units: 2 },
        };
        let outcome = mutate(&t, &[edit]).unwrap();
        let ctx = TransferContext::default().with_node("hidden", Importance::L1);
        let moved = transfer(&[ParamSource::new(&t, &params)], &outcome.topology, &outcome.provenance, &ctx).unwrap();

        let old_bias = params.get("hidden", "bias").unwrap();
        let new_bias = moved.get("hidden", "bias").unwrap();
        assert_eq!(new_bias.shape(), &[2]);
        assert!(new_bias.iter().any(|v| *v == old_bias[[2]]));

        // kept channels are ascending, so channel 2 is the second one whenever it survives
        let kept: Vec<usize> = (0..4)
            .filter(|c| new_bias.iter().any(|v| *v == old_bias[[*c]]))
            .collect();
        assert_eq!(kept.len(), 2);
        let gamma = moved.get("norm", "gamma").unwrap();
        let old_gamma = params.get("norm", "gamma").unwrap();
        let out_kernel = moved.get("out", "kernel").unwrap();
        let old_out_kernel = params.get("out", "kernel").unwrap();
        for (slot, channel) in kept.iter().enumerate() {
            assert_abs_diff_eq!(gamma[[slot]], old_gamma[[*channel]]);
            assert_abs_diff_eq!(out_kernel[[slot, 1]], old_out_kernel[[*channel, 1]]);
        }
    }

    #[test]
    fn test_growth_pads_with_zeros() {
        let t = mlp(2);
        let params = ParamStore::random(&t, 4);
        let edit = Edit::ReplaceOp {
            node: "hidden".to_string(),
            op: Op::Dense { units: 3 },
        };
        let outcome = mutate(&t, &[edit]).unwrap();
        let moved = transfer(
            &[ParamSource::new(&t, &params)],
            &outcome.topology,
            &outcome.provenance,
            &TransferContext::default(),
        )
        .unwrap();

        let kernel = moved.get("hidden", "kernel").unwrap();
        assert_eq!(kernel.shape(), &[4, 3]);
        let old_kernel = params.get("hidden", "kernel").unwrap();
        for row in 0..4 {
            for col in 0..2 {
                assert_abs_diff_eq!(kernel[[row, col]], old_kernel[[row, col]]);
            }
        }
        assert!(kernel.index_axis(Axis(1), 2).iter().all(|v| *v == 0.0));
        let out_kernel = moved.get("out", "kernel").unwrap();
        assert_eq!(out_kernel.shape(), &[3, 2]);
        assert!(out_kernel.index_axis(Axis(0), 2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_rank_mismatch_is_fatal() {
        let t = mlp(2);
        let mut params = ParamStore::random(&t, 5);
        params.insert("out", "kernel", array![1.0f32, 2.0].into_dyn());
        let outcome = mutate::<Edit>(&t, &[]).unwrap();
        let err = transfer(
            &[ParamSource::new(&t, &params)],
            &outcome.topology,
            &outcome.provenance,
            &TransferContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ArchevoError::RankMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_concat_maps_follow_each_branch() {
        let mut builder = TopologyBuilder::new();
        builder.add_input("input", vec![3]).unwrap();
        builder.add_node("left", Op::Dense { units: 2 }, &["input"]).unwrap();
        builder.add_node("right", Op::Dense { units: 3 }, &["input"]).unwrap();
        builder.add_node("cat", Op::Concat, &["left", "right"]).unwrap();
        builder.add_node("out", Op::Dense { units: 1 }, &["cat"]).unwrap();
        builder.set_outputs(&["out"]).unwrap();
        let t = builder.build().unwrap();
        let params = ParamStore::random(&t, 6);

        let edit = Edit::ReplaceOp {
            node: "left".to_string(),
            op: Op::Dense { units: 1 },
        };
        let outcome = mutate(&t, &[edit]).unwrap();
        let moved = transfer(
            &[ParamSource::new(&t, &params)],
            &outcome.topology,
            &outcome.provenance,
            &TransferContext::default(),
        )
        .unwrap();

        // rows of out.kernel: [left0, right0, right1, right2], old had left1 in between
        let old = params.get("out", "kernel").unwrap();
        let new = moved.get("out", "kernel").unwrap();
        assert_eq!(new.shape(), &[4, 1]);
        assert_abs_diff_eq!(new[[0, 0]], old[[0, 0]]);
        for row in 1..4 {
            assert_abs_diff_eq!(new[[row, 0]], old[[row + 1, 0]]);
        }
    }

    #[test]
    fn test_add_inputs_shrink_to_one_channel_set() {
        let mut builder = TopologyBuilder::new();
        builder.add_input("input", vec![3]).unwrap();
        builder.add_node("d1", Op::Dense { units: 4 }, &["input"]).unwrap();
        builder.add_node("d2", Op::Dense { units: 4 }, &["input"]).unwrap();
        builder.add_node("sum", Op::Add, &["d1", "d2"]).unwrap();
        builder.add_node("out", Op::Dense { units: 2 }, &["sum"]).unwrap();
        builder.set_outputs(&["out"]).unwrap();
        let t = builder.build().unwrap();

        // each branch alone would keep a different channel
        let mut params = ParamStore::random(&t, 7);
        for (name, heavy, weight) in [("d1", 3, 10.0), ("d2", 0, 20.0)] {
            let mut kernel = params.get(name, "kernel").unwrap().clone();
            kernel.index_axis_mut(Axis(1), heavy).fill(weight);
            params.insert(name, "kernel", kernel);
        }

        let shrink = |node: &str| Edit::ReplaceOp {
            node: node.to_string(),
            op: Op::Dense { units: 1 },
        };
        let outcome = mutate(&t, &[shrink("d1"), shrink("d2")]).unwrap();
        let ctx = TransferContext {
            default: Importance::L1,
            ..TransferContext::default()
        };
        let moved = transfer(&[ParamSource::new(&t, &params)], &outcome.topology, &outcome.provenance, &ctx).unwrap();

        let kept = |name: &str| {
            let old = params.get(name, "bias").unwrap();
            let new = moved.get(name, "bias").unwrap();
            (0..4).find(|c| old[[*c]] == new[[0]]).unwrap()
        };
        assert_eq!(kept("d1"), kept("d2"));
        assert_eq!(kept("d1"), 0);
        let out_kernel = moved.get("out", "kernel").unwrap();
        assert_eq!(out_kernel.shape(), &[1, 2]);
        assert_abs_diff_eq!(out_kernel[[0, 1]], params.get("out", "kernel").unwrap()[[0, 1]]);
    }
}
