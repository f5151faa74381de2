use crate::engines::provenance::Provenance;
use crate::engines::transfer::{transfer, ParamSource, ParamStore, TransferContext};
use crate::error::Result;
use crate::topology::Topology;
use crate::types::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

static NEXT_CANDIDATE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(u64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Inner {
    id: CandidateId,
    topology: Topology,
    provenance: Provenance,
    fingerprint: String,
    params: RwLock<Option<Arc<ParamStore>>>,
}

/// One population member: a topology plus whatever it learned.
///
/// Clones share the same member. Identity is the id handed out at creation,
/// so two structurally equal candidates are still distinct members.
#[derive(Debug, Clone)]
pub struct Candidate(Arc<Inner>);

impl Candidate {
    /// A fresh, untrained candidate
    pub fn new(topology: Topology) -> Self {
        Self::with_parts(topology, Provenance::new(), None)
    }

    fn with_parts(topology: Topology, provenance: Provenance, params: Option<ParamStore>) -> Self {
        let fingerprint = topology.fingerprint();
        Candidate(Arc::new(Inner {
            id: CandidateId(NEXT_CANDIDATE_ID.fetch_add(1, Ordering::Relaxed)),
            topology,
            provenance,
            fingerprint,
            params: RwLock::new(params.map(Arc::new)),
        }))
    }

    /// A child derived from `parents`, starting from their trained parameters.
    ///
    /// `provenance` maps the child's names onto the parents' topologies. Only
    /// that one derivation step is kept, transfer never looks further back.
    pub fn offspring(
        topology: Topology,
        provenance: Provenance,
        parents: &[&Candidate],
        ctx: &TransferContext,
    ) -> Result<Self> {
        let trained: Vec<(&Candidate, Arc<ParamStore>)> = parents
            .iter()
            .filter_map(|p| p.params().map(|store| (*p, store)))
            .collect();
        let params = if trained.is_empty() {
            None
        } else {
            let sources: Vec<ParamSource<'_>> = trained
                .iter()
                .map(|(parent, store)| ParamSource::new(parent.topology(), store))
                .collect();
            Some(transfer(&sources, &topology, &provenance, ctx)?)
        };
        Ok(Self::with_parts(topology, provenance, params))
    }

    pub fn id(&self) -> CandidateId {
        self.0.id
    }

    pub fn topology(&self) -> &Topology {
        &self.0.topology
    }

    pub fn provenance(&self) -> &Provenance {
        &self.0.provenance
    }

    pub fn fingerprint(&self) -> &str {
        &self.0.fingerprint
    }

    pub fn params(&self) -> Option<Arc<ParamStore>> {
        self.0
            .params
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_params(&self, params: ParamStore) {
        *self.0.params.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(params));
    }

    pub fn is_trained(&self) -> bool {
        self.params().is_some()
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Candidate {}

impl Identity for Candidate {
    type Key = CandidateId;

    fn identity(&self) -> CandidateId {
        self.0.id
    }
}

/// Key used for de-duplication and aging
pub fn fingerprint_key(candidate: &Candidate) -> String {
    candidate.fingerprint().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::mutation::{mutate, Edit, Rewire};
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
    fn test_clones_share_identity_and_params() {
        let a = Candidate::new(mlp());
        let b = a.clone();
        assert_eq!(a, b);
        assert!(!b.is_trained());
        a.set_params(ParamStore::random(a.topology(), 1));
        assert!(b.is_trained());
        assert_ne!(a, Candidate::new(mlp()));
    }

    #[test]
    fn test_offspring_inherits_parameters() {
        let parent = Candidate::new(mlp());
        parent.set_params(ParamStore::random(parent.topology(), 7));

        let edit = Edit::InsertAfter {
            node: "act".to_string(),
            block: vec![Op::Dropout { rate: 0.5 }],
            rewire: Rewire::All,
        };
        let outcome = mutate(parent.topology(), &[edit]).unwrap();
        let child = Candidate::offspring(
            outcome.topology,
            outcome.provenance,
            &[&parent],
            &TransferContext::default(),
        )
        .unwrap();

        let inherited = child.params().unwrap();
        let original = parent.params().unwrap();
        assert_eq!(inherited.node("hidden"), original.node("hidden"));
        assert_eq!(inherited.node("out"), original.node("out"));
        assert_ne!(child.fingerprint(), parent.fingerprint());
    }

    #[test]
    fn test_untrained_parents_give_untrained_child() {
        let parent = Candidate::new(mlp());
        let outcome = mutate::<Edit>(parent.topology(), &[]).unwrap();
        let child = Candidate::offspring(
            outcome.topology,
            outcome.provenance,
            &[&parent],
            &TransferContext::default(),
        )
        .unwrap();
        assert!(!child.is_trained());
        assert_eq!(child.fingerprint(), parent.fingerprint());
    }
}
