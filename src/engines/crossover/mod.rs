//! Splices the bottom of one topology onto the top of another.
//!
//! Best effort: when the parents share no compatible cut, the bottom parent
//! comes back unchanged and the miss is only logged.

pub mod point;
mod splice;

pub use point::{compatible, is_valid_point, ranked_points, valid_points, CrossoverPoint, CrossoverTarget};

use crate::engines::provenance::Provenance;
use crate::error::Result;
use crate::topology::Topology;
use log::{debug, info};

#[derive(Debug, Clone)]
pub struct CrossoverOutcome {
    pub topology: Topology,
    pub provenance: Provenance,
    /// Names of the bottom and top cut nodes, `None` for a no-op
    pub point: Option<(String, String)>,
}

impl CrossoverOutcome {
    pub fn is_noop(&self) -> bool {
        self.point.is_none()
    }
}

pub fn crossover(bottom: &Topology, top: &Topology, target: &CrossoverTarget) -> Result<CrossoverOutcome> {
    let points = ranked_points(bottom, top, target);
    for point in &points {
        match splice::splice(bottom, top, point) {
            Ok((topology, origins)) => {
                debug!(
                    "crossed {}:{} with {}:{} into {} (distance {:.3})",
                    bottom.id(),
                    point.bottom.name(),
                    top.id(),
                    point.top.name(),
                    topology.id(),
                    point.distance
                );
                let mut provenance = Provenance::new();
                provenance.record(topology.id(), origins);
                return Ok(CrossoverOutcome {
                    point: Some((point.bottom.name().to_string(), point.top.name().to_string())),
                    topology,
                    provenance,
                });
            }
            Err(e) if e.is_shape_mismatch() => {
                debug!(
                    "cut {} / {} rejected: {}",
                    point.bottom.name(),
                    point.top.name(),
                    e
                );
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "no usable crossover point between {} and {} ({} tried), keeping {}",
        bottom.id(),
        top.id(),
        points.len(),
        bottom.id()
    );
    Ok(CrossoverOutcome {
        topology: bottom.clone(),
        provenance: Provenance::new(),
        point: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Activation, Op};

    fn seq(layers: Vec<(&str, Op)>) -> Topology {
        Topology::sequential(vec![8], layers).unwrap()
    }

    fn parent_a() -> Topology {
        seq(vec![
            ("hidden", Op::Dense { units: 16 }),
            ("act", Op::Activation(Activation::Relu)),
            ("out", Op::Dense { units: 2 }),
        ])
    }

    fn parent_b() -> Topology {
        seq(vec![
            ("act", Op::Dense { units: 4 }),
            ("hidden", Op::Activation(Activation::Tanh)),
            ("out", Op::Dense { units: 2 }),
        ])
    }

    #[test]
    fn test_bottom_grows_to_top_width() {
        let bottom = seq(vec![
            ("b1", Op::Dense { units: 16 }),
            ("b_act", Op::Activation(Activation::Relu)),
            ("b2", Op::Dense { units: 8 }),
            ("b_out", Op::Dense { units: 2 }),
        ]);
        let top = seq(vec![
            ("t1", Op::Dense { units: 32 }),
            ("t_act", Op::Activation(Activation::Tanh)),
            ("t_out", Op::Dense { units: 2 }),
        ]);
        let outcome = crossover(&bottom, &top, &CrossoverTarget::default()).unwrap();
        let child = &outcome.topology;

        assert_eq!(outcome.point, Some(("b1".to_string(), "t1".to_string())));
        let names: Vec<&str> = child.nodes().map(|(_, n)| n.name.as_str()).collect();
        assert_eq!(names, vec!["input", "b1", "t_act", "t_out"]);
        assert_eq!(child.width(child.get("b1").unwrap()), 32);
        assert_eq!(child.node(child.outputs()[0]).shape, vec![2]);
        assert_eq!(
            outcome.provenance.resolve(child.id(), "t_act", top.id()),
            Some("t_act".to_string())
        );
        assert_eq!(
            outcome.provenance.resolve(child.id(), "b1", bottom.id()),
            Some("b1".to_string())
        );
    }

    #[test]
    fn test_colliding_names_are_renamed() {
        let (a, b) = (parent_a(), parent_b());
        let outcome = crossover(&a, &b, &CrossoverTarget::default()).unwrap();
        let child = &outcome.topology;

        assert_eq!(outcome.point, Some(("hidden".to_string(), "act".to_string())));
        assert!(child.contains("hidden_1"));
        assert_eq!(child.width(child.get("hidden").unwrap()), 16);
        assert_eq!(
            outcome.provenance.resolve(child.id(), "hidden_1", b.id()),
            Some("hidden".to_string())
        );
        assert_eq!(
            outcome.provenance.resolve(child.id(), "hidden", a.id()),
            Some("hidden".to_string())
        );
        assert!(outcome.provenance.resolve(child.id(), "hidden", b.id()).is_none());
    }

    #[test]
    fn test_no_point_returns_bottom_unchanged() {
        let bottom = seq(vec![("out", Op::Dense { units: 2 })]);
        let top = parent_b();
        let outcome = crossover(&bottom, &top, &CrossoverTarget::default()).unwrap();
        assert!(outcome.is_noop());
        assert_eq!(outcome.topology.id(), bottom.id());
        assert!(outcome.topology.same_structure(&bottom));
    }

    #[test]
    fn test_provenance_chains_through_repeated_crossover() {
        let (a, b) = (parent_a(), parent_b());
        let first = crossover(&a, &b, &CrossoverTarget::default()).unwrap();
        let c = &first.topology;

        let d = seq(vec![
            ("d1", Op::Dense { units: 8 }),
            ("d_out", Op::Dense { units: 2 }),
        ]);
        let second = crossover(c, &d, &CrossoverTarget::default()).unwrap();
        let e = &second.topology;
        assert_eq!(second.point, Some(("hidden".to_string(), "d1".to_string())));

        let mut chain = second.provenance.clone();
        chain.extend(&first.provenance);
        assert_eq!(chain.resolve(e.id(), "hidden", a.id()), Some("hidden".to_string()));
        assert_eq!(chain.resolve(e.id(), "input", a.id()), Some("input".to_string()));
        assert!(chain.resolve(e.id(), "d_out", a.id()).is_none());
        assert_eq!(chain.resolve(e.id(), "d_out", d.id()), Some("d_out".to_string()));
    }
}
