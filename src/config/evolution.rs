use super::traits::{invalid, ConfigSection};
use crate::error::ArchevoError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub num_generations: usize,
    /// Best candidates copied unchanged into the next generation
    pub elitism_count: usize,
    /// Roulette picks that are mutated into new candidates
    pub mutation_count: usize,
    /// Roulette picks crossed with a roulette-chosen mate
    pub crossover_count: usize,
    /// Generations a structure may survive before it is aged out
    pub max_age: usize,
    /// Consecutive duplicates tolerated before a distinct branch gives up
    pub distinct_patience: usize,
    pub hall_of_fame_size: usize,
    pub crossover_distance: f64,
    pub crossover_location: f64,
    pub seed: u64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            num_generations: 10,
            elitism_count: 2,
            mutation_count: 12,
            crossover_count: 6,
            max_age: 5,
            distinct_patience: 1_000,
            hall_of_fame_size: 10,
            crossover_distance: 0.0,
            crossover_location: 0.5,
            seed: 42,
        }
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<(), ArchevoError> {
        let section = Self::section_name();
        if self.population_size < 2 {
            return Err(invalid(section, "population_size must be at least 2"));
        }
        if self.elitism_count + self.mutation_count + self.crossover_count == 0 {
            return Err(invalid(section, "selection would produce no candidates"));
        }
        if self.elitism_count > self.population_size {
            return Err(invalid(section, "elitism_count exceeds population_size"));
        }
        if self.max_age == 0 {
            return Err(invalid(section, "max_age must be at least 1"));
        }
        if self.distinct_patience == 0 {
            return Err(invalid(section, "distinct_patience must be at least 1"));
        }
        if !(-1.0..=1.0).contains(&self.crossover_distance) {
            return Err(invalid(section, "crossover_distance must be between -1 and 1"));
        }
        if !(0.0..=1.0).contains(&self.crossover_location) {
            return Err(invalid(section, "crossover_location must be between 0 and 1"));
        }
        Ok(())
    }
}
