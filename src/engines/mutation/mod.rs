//! Declarative structural edits.
//!
//! `mutate` applies a sequence of edits to a copy of a topology and returns
//! the rebuilt topology together with the provenance of every surviving node.
//! Nodes created by an edit get fresh names, so they never alias a source
//! node during parameter transfer.

pub mod edit;
pub mod proposer;

pub use edit::{Edit, EditRecord, Mutation, Rewire};
pub use proposer::MutationProposer;

use crate::engines::provenance::{Origin, Provenance};
use crate::error::Result;
use crate::topology::Topology;
use log::debug;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub topology: Topology,
    pub provenance: Provenance,
    pub records: Vec<EditRecord>,
}

pub fn mutate<M: Mutation>(source: &Topology, edits: &[M]) -> Result<MutationOutcome> {
    let mut builder = source.to_builder()?;
    let mut records = Vec::with_capacity(edits.len());
    for edit in edits {
        records.push(edit.apply(&mut builder)?);
    }
    let topology = builder.build()?;

    let origins: HashMap<String, Origin> = topology
        .nodes()
        .filter(|(_, node)| source.contains(&node.name))
        .map(|(_, node)| (node.name.clone(), Origin::new(source.id(), &node.name)))
        .collect();
    debug!(
        "mutated {} into {}: {} edits, {} of {} nodes carried over",
        source.id(),
        topology.id(),
        records.len(),
        origins.len(),
        topology.len()
    );

    let mut provenance = Provenance::new();
    provenance.record(topology.id(), origins);
    Ok(MutationOutcome {
        topology,
        provenance,
        records,
    })
}
