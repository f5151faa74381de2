use super::candidate::{fingerprint_key, Candidate};
use super::hall_of_fame::{HallOfFame, HallOfFameEntry};
use crate::config::AppConfig;
use crate::engines::crossover::{crossover, CrossoverTarget};
use crate::engines::evaluation::{evaluate_candidate, ModelAdapter};
use crate::engines::mutation::MutationProposer;
use crate::engines::population::{PopulationController, PopulationListener, Report};
use crate::engines::selection::{
    roulette_mate, CompoundFixed, CrossFn, CrossoverSelection, Distinct, DistinctScope, Elite,
    FixedAge, KeyFn, MutateFn, Mutated, Roulette, SeenSet, Selection, SelectionExt,
};
use crate::engines::transfer::TransferContext;
use crate::error::Result;
use crate::topology::Topology;
use log::info;
use rayon::prelude::*;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Runs the whole search: evaluate, select, breed, repeat.
///
/// Each generation is assembled as
/// `FixedAge(DistinctScope(elite + mutated roulette picks + crossed roulette picks))`,
/// all three branches sharing one fingerprint seen-set.
pub struct EvolutionEngine<A: ModelAdapter> {
    config: AppConfig,
    adapter: A,
    transfer: TransferContext,
    hall_of_fame: Mutex<HallOfFame>,
    listeners: Vec<Box<dyn PopulationListener<Candidate>>>,
}

impl<A: ModelAdapter> EvolutionEngine<A> {
    pub fn new(config: AppConfig, adapter: A) -> Result<Self> {
        config.validate()?;
        let transfer = TransferContext::from_config(&config.transfer);
        let hall_of_fame = Mutex::new(HallOfFame::new(config.evolution.hall_of_fame_size));
        Ok(Self {
            config,
            adapter,
            transfer,
            hall_of_fame,
            listeners: Vec::new(),
        })
    }

    /// Replaces the importance context used when children inherit parameters
    pub fn with_transfer_context(mut self, transfer: TransferContext) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn add_listener(&mut self, listener: Box<dyn PopulationListener<Candidate>>) {
        self.listeners.push(listener);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    fn lock_hall_of_fame(&self) -> MutexGuard<'_, HallOfFame> {
        self.hall_of_fame.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn build_selection(&self) -> Result<Box<dyn Selection<Candidate>>> {
        let evo = &self.config.evolution;
        let seen = SeenSet::new();
        let key = || -> KeyFn<Candidate> { Box::new(fingerprint_key) };

        let mut proposer = MutationProposer::new(self.config.mutation.clone(), evo.seed.wrapping_add(1))?;
        let ctx = self.transfer.clone();
        let mutate: MutateFn<Candidate> = Box::new(move |parent: &Candidate| {
            let outcome = proposer.mutate(parent.topology())?;
            Candidate::offspring(outcome.topology, outcome.provenance, &[parent], &ctx)
        });

        let ctx = self.transfer.clone();
        let target = CrossoverTarget {
            distance: evo.crossover_distance,
            relative_location: evo.crossover_location,
        };
        let cross: CrossFn<Candidate> = Box::new(move |bottom: &Candidate, top: &Candidate| {
            let outcome = crossover(bottom.topology(), top.topology(), &target)?;
            Candidate::offspring(outcome.topology, outcome.provenance, &[bottom, top], &ctx)
        });

        let elite = Distinct::sharing(Elite, key(), seen.clone()).with_patience(evo.distinct_patience);
        let mutated = Distinct::sharing(
            Mutated::new(Roulette::new(evo.seed.wrapping_add(2)), mutate),
            key(),
            seen.clone(),
        )
        .with_patience(evo.distinct_patience);
        let crossed = Distinct::sharing(
            CrossoverSelection::new(
                Roulette::new(evo.seed.wrapping_add(3)),
                roulette_mate(evo.seed.wrapping_add(4)),
                cross,
            ),
            key(),
            seen.clone(),
        )
        .with_patience(evo.distinct_patience);

        let compound = CompoundFixed::new(vec![
            (elite.boxed(), evo.elitism_count),
            (mutated.boxed(), evo.mutation_count),
            (crossed.boxed(), evo.crossover_count),
        ]);
        Ok(FixedAge::new(DistinctScope::new(seen, compound), evo.max_age, key()).boxed())
    }

    /// Evolves the seed topologies for the configured number of generations
    /// and returns the best structures seen, best first.
    pub fn run(&mut self, seeds: Vec<Topology>) -> Result<Vec<HallOfFameEntry>> {
        let evo = self.config.evolution.clone();
        let initial: Vec<Candidate> = seeds.into_iter().map(Candidate::new).collect();
        let controller = PopulationController::new(initial, self.build_selection()?, evo.population_size)?;
        for listener in self.listeners.drain(..) {
            controller.add_listener(listener);
        }

        for generation in 0..evo.num_generations {
            let population = controller.population();
            info!(
                "Generation {}/{}: evaluating {} candidates",
                generation + 1,
                evo.num_generations,
                population.len()
            );

            let adapter = &self.adapter;
            let hall_of_fame = &self.hall_of_fame;
            let reports: Vec<Result<Report<Candidate>>> = population
                .par_iter()
                .map(|candidate| {
                    let fitness = evaluate_candidate(adapter, candidate)?;
                    hall_of_fame
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .try_add(candidate, fitness, generation);
                    controller.report(candidate, fitness)
                })
                .collect();
            for report in reports {
                report?;
            }

            let hall_of_fame = self.lock_hall_of_fame();
            if let Some(best) = hall_of_fame.best() {
                info!(
                    "Generation {} complete. Best fitness so far: {:.5} (candidate {}), hall of fame: {}",
                    generation + 1,
                    best.fitness,
                    best.candidate.id(),
                    hall_of_fame.len()
                );
            }
        }

        Ok(self.lock_hall_of_fame().get_all().to_vec())
    }
}
