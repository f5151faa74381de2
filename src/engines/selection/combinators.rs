use super::{Roulette, Selected, Selection};
use crate::error::Result;
use crate::types::FitnessRecord;
use std::marker::PhantomData;

pub type MutateFn<C> = Box<dyn FnMut(&C) -> Result<C> + Send>;
/// Picks a mate for a parent from the whole evaluated pool
pub type MateFn<C> = Box<dyn FnMut(&C, &[FitnessRecord<C>]) -> Result<C> + Send>;
/// Crosses `(bottom, top)` into a child
pub type CrossFn<C> = Box<dyn FnMut(&C, &C) -> Result<C> + Send>;

/// First `n` candidates of the source
pub struct Limit<C, S> {
    source: S,
    n: usize,
    _candidate: PhantomData<fn() -> C>,
}

impl<C, S> Limit<C, S> {
    pub fn new(source: S, n: usize) -> Self {
        Self {
            source,
            n,
            _candidate: PhantomData,
        }
    }
}

impl<C, S: Selection<C>> Selection<C> for Limit<C, S> {
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        Box::new(self.source.select(records).take(self.n))
    }
}

/// Applies a fallible transformation to everything the source yields
pub struct Mutated<C, S> {
    source: S,
    mutate: MutateFn<C>,
}

impl<C, S> Mutated<C, S> {
    pub fn new(source: S, mutate: MutateFn<C>) -> Self {
        Self { source, mutate }
    }
}

impl<C, S: Selection<C>> Selection<C> for Mutated<C, S> {
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        let Self { source, mutate } = self;
        Box::new(
            source
                .select(records)
                .map(move |candidate| mutate(&candidate?)),
        )
    }
}

/// Crosses every candidate of the source with a mate from the full pool
pub struct CrossoverSelection<C, S> {
    source: S,
    mate: MateFn<C>,
    cross: CrossFn<C>,
}

impl<C, S> CrossoverSelection<C, S> {
    pub fn new(source: S, mate: MateFn<C>, cross: CrossFn<C>) -> Self {
        Self { source, mate, cross }
    }
}

impl<C, S: Selection<C>> Selection<C> for CrossoverSelection<C, S> {
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        let Self { source, mate, cross } = self;
        Box::new(source.select(records).map(move |parent| {
            let parent = parent?;
            let other = mate(&parent, records)?;
            cross(&parent, &other)
        }))
    }
}

/// Mate chosen by its own roulette wheel. An empty pool mates the parent with itself.
pub fn roulette_mate<C: Clone + 'static>(seed: u64) -> MateFn<C> {
    let mut wheel = Roulette::new(seed);
    Box::new(move |parent: &C, records: &[FitnessRecord<C>]| {
        wheel
            .pick(records)
            .unwrap_or_else(|| Ok(parent.clone()))
    })
}

/// Outputs of each part in turn, each part exhausted before the next starts
pub struct Compound<C> {
    parts: Vec<Box<dyn Selection<C>>>,
}

impl<C> Compound<C> {
    pub fn new(parts: Vec<Box<dyn Selection<C>>>) -> Self {
        Self { parts }
    }
}

impl<C> Selection<C> for Compound<C> {
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        Box::new(self.parts.iter_mut().flat_map(move |part| part.select(records)))
    }
}

/// Like `Compound`, with each part capped at a fixed count
pub struct CompoundFixed<C> {
    parts: Vec<(Box<dyn Selection<C>>, usize)>,
}

impl<C> CompoundFixed<C> {
    pub fn new(parts: Vec<(Box<dyn Selection<C>>, usize)>) -> Self {
        Self { parts }
    }

    pub fn capacity(&self) -> usize {
        self.parts.iter().map(|(_, n)| n).sum()
    }
}

impl<C> Selection<C> for CompoundFixed<C> {
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        Box::new(
            self.parts
                .iter_mut()
                .flat_map(move |(part, n)| part.select(records).take(*n)),
        )
    }
}
