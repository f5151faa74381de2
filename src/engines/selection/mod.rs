//! Composable selection strategies.
//!
//! A selection turns the evaluated population into a lazy, possibly endless
//! stream of candidates; callers always bound it (`Limit`, `take`). Lower
//! fitness is better everywhere.

pub mod age;
pub mod combinators;
pub mod distinct;
pub mod elite;
pub mod roulette;

pub use age::FixedAge;
pub use combinators::{
    roulette_mate, Compound, CompoundFixed, CrossFn, CrossoverSelection, Limit, MateFn, MutateFn,
    Mutated,
};
pub use distinct::{Distinct, DistinctScope, SeenSet, DEFAULT_PATIENCE};
pub use elite::Elite;
pub use roulette::{spin, Roulette};

use crate::error::Result;
use crate::types::FitnessRecord;

pub type Selected<'a, C> = Box<dyn Iterator<Item = Result<C>> + 'a>;

/// Uniqueness key of a candidate, e.g. its structural fingerprint
pub type KeyFn<C> = Box<dyn Fn(&C) -> String + Send>;

pub trait Selection<C>: Send {
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C>;
}

impl<C, S: Selection<C> + ?Sized> Selection<C> for Box<S> {
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        (**self).select(records)
    }
}

pub trait SelectionExt<C>: Selection<C> + Sized {
    fn limit(self, n: usize) -> Limit<C, Self> {
        Limit::new(self, n)
    }

    fn mutated(self, mutate: impl FnMut(&C) -> Result<C> + Send + 'static) -> Mutated<C, Self> {
        Mutated::new(self, Box::new(mutate))
    }

    fn distinct(self, key: impl Fn(&C) -> String + Send + 'static) -> Distinct<C, Self> {
        Distinct::new(self, Box::new(key))
    }

    fn fixed_age(self, max_age: usize, key: impl Fn(&C) -> String + Send + 'static) -> FixedAge<C, Self> {
        FixedAge::new(self, max_age, Box::new(key))
    }

    fn boxed(self) -> Box<dyn Selection<C>>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<C, S: Selection<C>> SelectionExt<C> for S {}
