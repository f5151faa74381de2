use super::{Selected, Selection};
use crate::error::{ArchevoError, Result};
use crate::types::FitnessRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fitness-proportionate draws with weight `1 / fitness`, endlessly.
///
/// A non-positive fitness counts as `f64::EPSILON`, so it dominates the wheel
/// without dividing by zero. NaN fitness gets no weight.
pub struct Roulette {
    rng: StdRng,
}

impl Roulette {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn weight(fitness: f64) -> f64 {
        if fitness.is_nan() {
            0.0
        } else if fitness <= 0.0 {
            1.0 / f64::EPSILON
        } else {
            1.0 / fitness
        }
    }

    /// Normalised running sum of weights; uniform when no record has weight
    pub fn cumulative<C>(records: &[FitnessRecord<C>]) -> Vec<f64> {
        let weights: Vec<f64> = records.iter().map(|r| Self::weight(r.fitness)).collect();
        let total: f64 = weights.iter().sum();
        let mut running = 0.0;
        weights
            .iter()
            .map(|w| {
                running += if total > 0.0 && total.is_finite() {
                    w / total
                } else {
                    1.0 / records.len() as f64
                };
                running
            })
            .collect()
    }

    /// One draw, or `None` for an empty pool
    pub fn pick<C: Clone>(&mut self, records: &[FitnessRecord<C>]) -> Option<Result<C>> {
        let cumulative = Self::cumulative(records);
        if cumulative.is_empty() {
            return None;
        }
        let draw = self.rng.gen::<f64>();
        Some(spin(&cumulative, draw).map(|i| records[i].candidate.clone()))
    }
}

/// Index whose cumulative share first exceeds `draw`
pub fn spin(cumulative: &[f64], draw: f64) -> Result<usize> {
    if !(0.0..1.0).contains(&draw) {
        return Err(ArchevoError::DrawOutOfRange(draw));
    }
    let index = cumulative.partition_point(|c| *c <= draw);
    // rounding can leave the last share a hair under 1.0
    Ok(index.min(cumulative.len().saturating_sub(1)))
}

impl<C: Clone> Selection<C> for Roulette {
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        let cumulative = Self::cumulative(records);
        if cumulative.is_empty() {
            return Box::new(std::iter::empty());
        }
        let rng = &mut self.rng;
        Box::new(std::iter::from_fn(move || {
            let draw = rng.gen::<f64>();
            Some(spin(&cumulative, draw).map(|i| records[i].candidate.clone()))
        }))
    }
}
