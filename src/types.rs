use std::fmt::Debug;
use std::hash::Hash;

/// One evaluated population member. Lower fitness is better throughout the
/// crate; callers holding an accuracy-style metric pass `1.0 - accuracy`.
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessRecord<C> {
    pub fitness: f64,
    pub candidate: C,
}

impl<C> FitnessRecord<C> {
    pub fn new(fitness: f64, candidate: C) -> Self {
        Self { fitness, candidate }
    }
}

/// Reference identity of a population member, used for fitness bookkeeping
pub trait Identity {
    type Key: Eq + Hash + Clone + Debug + Send;

    fn identity(&self) -> Self::Key;
}
