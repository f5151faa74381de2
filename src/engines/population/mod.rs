//! Generation bookkeeping.
//!
//! The controller hands out the current population, collects exactly one
//! fitness per candidate, and evolves the instant the last one arrives. The
//! report and the evolution run under one lock, so among concurrent
//! reporters exactly one observes `Report::Evolved`.

pub mod progress;

pub use progress::{ChannelProgress, GenerationSummary, LogProgress, PopulationListener, ProgressMessage};

use crate::engines::selection::Selection;
use crate::error::{ArchevoError, Result};
use crate::types::{FitnessRecord, Identity};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum Report<C> {
    /// Still collecting; `remaining` candidates have no fitness yet
    Pending { remaining: usize },
    /// This report completed the generation and the population was replaced
    Evolved { generation: usize, population: Vec<C> },
}

struct State<C: Identity> {
    generation: usize,
    population: Vec<C>,
    index: HashMap<C::Key, usize>,
    fitness: Vec<Option<f64>>,
    remaining: usize,
    target_size: usize,
    selection: Box<dyn Selection<C>>,
    listeners: Vec<Box<dyn PopulationListener<C>>>,
}

impl<C: Identity + Clone> State<C> {
    fn install(&mut self, population: Vec<C>) {
        self.index = population
            .iter()
            .enumerate()
            .map(|(i, c)| (c.identity(), i))
            .collect();
        self.fitness = vec![None; population.len()];
        self.remaining = population.len();
        self.population = population;
    }
}

pub struct PopulationController<C: Identity> {
    state: Mutex<State<C>>,
}

impl<C: Identity + Clone + Send> PopulationController<C> {
    /// `target_size` bounds every next generation; duplicates of the same
    /// candidate are dropped, so a generation may come out smaller.
    pub fn new(initial: Vec<C>, selection: Box<dyn Selection<C>>, target_size: usize) -> Result<Self> {
        let mut seen = HashSet::new();
        if let Some(dup) = initial.iter().find(|c| !seen.insert(c.identity())) {
            return Err(ArchevoError::Configuration(format!(
                "candidate {:?} appears twice in the initial population",
                dup.identity()
            )));
        }
        if initial.is_empty() {
            return Err(ArchevoError::EmptySelection(0));
        }

        let mut state = State {
            generation: 0,
            population: Vec::new(),
            index: HashMap::new(),
            fitness: Vec::new(),
            remaining: 0,
            target_size,
            selection,
            listeners: Vec::new(),
        };
        state.install(initial);
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_listener(&self, listener: Box<dyn PopulationListener<C>>) {
        self.lock().listeners.push(listener);
    }

    pub fn population(&self) -> Vec<C> {
        self.lock().population.clone()
    }

    pub fn generation(&self) -> usize {
        self.lock().generation
    }

    pub fn remaining(&self) -> usize {
        self.lock().remaining
    }

    /// Records the fitness of a current candidate.
    ///
    /// Unknown candidates and second reports within one generation are
    /// caller bugs and fail without touching the collected state.
    pub fn report(&self, candidate: &C, fitness: f64) -> Result<Report<C>> {
        let mut state = self.lock();
        let key = candidate.identity();
        let slot = *state
            .index
            .get(&key)
            .ok_or_else(|| ArchevoError::UnknownCandidate(format!("{:?}", key)))?;
        if state.fitness[slot].is_some() {
            return Err(ArchevoError::DuplicateFitness(format!("{:?}", key), state.generation));
        }

        state.fitness[slot] = Some(fitness);
        state.remaining -= 1;
        let (generation, total, remaining) = (state.generation, state.population.len(), state.remaining);
        for listener in state.listeners.iter_mut() {
            listener.on_candidate_evaluated(generation, total - remaining, total);
        }

        if remaining > 0 {
            return Ok(Report::Pending { remaining });
        }
        Self::evolve(&mut state)
    }

    /// Runs the selection again after it failed on a completed generation
    pub fn retry(&self) -> Result<Report<C>> {
        let mut state = self.lock();
        if state.remaining > 0 {
            return Ok(Report::Pending {
                remaining: state.remaining,
            });
        }
        Self::evolve(&mut state)
    }

    fn evolve(state: &mut State<C>) -> Result<Report<C>> {
        let fitness: Vec<f64> = state.fitness.iter().map(|f| f.unwrap_or(f64::NAN)).collect();
        let records: Vec<FitnessRecord<C>> = state
            .population
            .iter()
            .zip(&fitness)
            .map(|(c, f)| FitnessRecord::new(*f, c.clone()))
            .collect();

        // fitness stays collected on failure so `retry` can run the selection again
        let selected: Vec<C> = state
            .selection
            .select(&records)
            .take(state.target_size)
            .collect::<Result<_>>()?;

        let mut seen = HashSet::new();
        let produced = selected.len();
        let next: Vec<C> = selected
            .into_iter()
            .filter(|c| seen.insert(c.identity()))
            .collect();
        if next.is_empty() {
            return Err(ArchevoError::EmptySelection(state.generation));
        }
        if produced > next.len() {
            debug!("dropped {} repeated candidates", produced - next.len());
        }
        if next.len() < state.target_size {
            warn!(
                "generation {} shrank to {} of {} candidates",
                state.generation + 1,
                next.len(),
                state.target_size
            );
        }

        let summary = GenerationSummary::from_fitness(state.generation, &fitness, next.len());
        for listener in state.listeners.iter_mut() {
            listener.on_evolved(&summary, &next);
        }

        state.install(next);
        state.generation += 1;
        Ok(Report::Evolved {
            generation: state.generation,
            population: state.population.clone(),
        })
    }
}
