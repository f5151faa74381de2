use crate::engines::generation::Candidate;
use crate::engines::transfer::ParamStore;
use crate::error::Result;
use crate::topology::Topology;
use log::debug;

/// Boundary to whatever actually trains networks.
///
/// Implementations own the tensor library. Parameters cross the boundary as a
/// `ParamStore` keyed by node name and parameter name, in the layouts given
/// by `Op::param_specs`.
pub trait ModelAdapter: Send + Sync {
    type Model;

    /// Builds a model for `topology`. Nodes missing from `params` are
    /// initialised by the adapter.
    fn build(&self, topology: &Topology, params: Option<&ParamStore>) -> anyhow::Result<Self::Model>;

    fn fit(&self, model: &mut Self::Model) -> anyhow::Result<()>;

    /// Lower is better
    fn evaluate(&self, model: &Self::Model) -> anyhow::Result<f64>;

    fn parameters(&self, model: &Self::Model) -> anyhow::Result<ParamStore>;
}

/// Builds, trains and scores a candidate, then stores what it learned on it
pub fn evaluate_candidate<A: ModelAdapter + ?Sized>(adapter: &A, candidate: &Candidate) -> Result<f64> {
    let inherited = candidate.params();
    let mut model = adapter.build(candidate.topology(), inherited.as_deref())?;
    adapter.fit(&mut model)?;
    let fitness = adapter.evaluate(&model)?;
    candidate.set_params(adapter.parameters(&model)?);
    debug!(
        "candidate {} ({} nodes) scored {:.5}",
        candidate.id(),
        candidate.topology().len(),
        fitness
    );
    Ok(fitness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchevoError;
    use crate::topology::Op;
    use anyhow::bail;

    /// Scores a network by its parameter count; refuses very wide ones
    struct CountingAdapter;

    impl ModelAdapter for CountingAdapter {
        type Model = (Topology, ParamStore);

        fn build(&self, topology: &Topology, params: Option<&ParamStore>) -> anyhow::Result<Self::Model> {
            if topology.nodes().any(|(_, n)| matches!(n.op, Op::Dense { units } if units > 100)) {
                bail!("out of memory");
            }
            let params = params.cloned().unwrap_or_else(|| ParamStore::random(topology, 3));
            Ok((topology.clone(), params))
        }

        fn fit(&self, _model: &mut Self::Model) -> anyhow::Result<()> {
            Ok(())
        }

        fn evaluate(&self, model: &Self::Model) -> anyhow::Result<f64> {
            Ok(model.1.tensor_count() as f64)
        }

        fn parameters(&self, model: &Self::Model) -> anyhow::Result<ParamStore> {
            Ok(model.1.clone())
        }
    }

    #[test]
    fn test_evaluation_stores_trained_params() {
        let topology = Topology::sequential(vec![3], vec![("out", Op::Dense { units: 2 })]).unwrap();
        let candidate = Candidate::new(topology);
        let fitness = evaluate_candidate(&CountingAdapter, &candidate).unwrap();
        assert_eq!(fitness, 2.0);
        assert!(candidate.is_trained());
    }

    #[test]
    fn test_adapter_failure_is_a_collaborator_error() {
        let topology = Topology::sequential(vec![3], vec![("out", Op::Dense { units: 500 })]).unwrap();
        let err = evaluate_candidate(&CountingAdapter, &Candidate::new(topology)).unwrap_err();
        assert!(matches!(err, ArchevoError::Collaborator(_)));
    }
}
