use super::point::CrossoverPoint;
use crate::engines::provenance::Origin;
use crate::error::{ArchevoError, Result};
use crate::graph::{Backward, Forward, Traverse, ViewExt};
use crate::topology::{NodeId, Op, Topology};
use log::debug;
use std::collections::HashMap;

/// Bottom parent up to and including the cut, top parent above it.
///
/// The top cut node is dropped and its consumers read from the bottom cut
/// node instead. Grafted nodes keep their names unless a surviving bottom node
/// already uses it. Returns the child and the origin of each of its nodes.
pub(crate) fn splice(
    bottom: &Topology,
    top: &Topology,
    point: &CrossoverPoint<'_>,
) -> Result<(Topology, HashMap<String, Origin>)> {
    let (b, t) = (point.bottom.id, point.top.id);
    let cut = bottom.name(b).to_string();

    let mut builder = bottom.to_builder()?;
    builder.reserve(top.nodes().map(|(_, node)| node.name.as_str()));
    for id in bottom.descendants(b) {
        builder.remove_node(bottom.name(id))?;
    }

    let mut graft = top.descendants(t);
    graft.sort();
    let mut renames: HashMap<NodeId, String> = HashMap::new();
    renames.insert(t, cut.clone());
    let mut grafted: HashMap<String, Origin> = HashMap::new();
    for id in graft {
        let node = top.node(id);
        let name = if builder.contains(&node.name) {
            builder.fresh_name(&node.name)
        } else {
            node.name.clone()
        };
        let inputs = node
            .inputs
            .iter()
            .map(|input| {
                renames.get(input).cloned().ok_or_else(|| {
                    ArchevoError::InvalidTopology(format!(
                        "'{}' reads '{}' from outside the grafted region",
                        node.name,
                        top.name(*input)
                    ))
                })
            })
            .collect::<Result<Vec<String>>>()?;
        builder.insert(name.clone(), node.op.clone(), inputs)?;
        grafted.insert(name.clone(), Origin::new(top.id(), &node.name));
        renames.insert(id, name);
    }

    let mut outputs: Vec<String> = bottom
        .outputs()
        .iter()
        .map(|o| bottom.name(*o))
        .filter(|name| builder.contains(name))
        .map(str::to_string)
        .collect();
    outputs.extend(
        top.outputs()
            .iter()
            .filter(|o| **o != t)
            .filter_map(|o| renames.get(o).cloned()),
    );
    builder.set_output_names(outputs)?;

    let (bottom_width, top_width) = (bottom.width(b), top.width(t));
    let grown = top_width > bottom_width
        && match width_source(bottom, b) {
            Some(source) => {
                let name = bottom.name(source);
                match builder.node(name)?.op.with_width(top_width) {
                    Some(op) => {
                        debug!("growing '{}' from {} to {} channels", name, bottom_width, top_width);
                        builder.node_mut(name)?.op = op;
                        true
                    }
                    None => false,
                }
            }
            None => false,
        };
    if !grown && top_width != bottom_width {
        for name in tied_to_cut(top, t).iter().filter_map(|id| renames.get(id)) {
            if let Some(op) = builder.node(name)?.op.with_width(bottom_width) {
                debug!("resizing grafted '{}' from {} to {} channels", name, top_width, bottom_width);
                builder.node_mut(name)?.op = op;
            }
        }
    }

    let child = builder.build()?;
    let origins = child
        .nodes()
        .map(|(_, node)| {
            let origin = grafted
                .get(&node.name)
                .cloned()
                .unwrap_or_else(|| Origin::new(bottom.id(), &node.name));
            (node.name.clone(), origin)
        })
        .collect();
    Ok((child, origins))
}

/// Nearest node at or below `start` whose op sets the width `start` outputs,
/// following only width-transparent links that nothing else reads from.
fn width_source(topology: &Topology, start: NodeId) -> Option<NodeId> {
    let op = &topology.node(start).op;
    if op.defines_width() {
        return Some(start);
    }
    if !op.is_width_transparent() {
        return None;
    }
    let chain = Backward::new(topology)
        .enter_if(|id| topology.node(id).op.is_width_transparent())
        .stop_before(|id| topology.consumers(id).len() > 1)
        .single_visit();
    Traverse::new(chain)
        .walk(start)
        .into_iter()
        .find(|id| topology.node(*id).op.defines_width())
}

/// Grafted width-defining nodes whose output width must equal the cut's.
///
/// Width is shared along width-transparent links and across the inputs of an
/// elementwise merge, so the walk goes forward into those and backward out of
/// them. Declared outputs keep their width.
fn tied_to_cut(top: &Topology, cut: NodeId) -> Vec<NodeId> {
    let carries = |id: NodeId| {
        let op = &top.node(id).op;
        op.is_width_transparent() || matches!(op, Op::Add)
    };
    let shared = Forward::new(top)
        .filter_children(carries)
        .connect(Backward::new(top).enter_if(carries))
        .single_visit();
    let mut walk = Traverse::new(shared);
    walk.inner_mut().mark(cut);
    walk.walk(cut)
        .into_iter()
        .filter(|id| top.node(*id).op.defines_width() && !top.is_output(*id))
        .collect()
}
