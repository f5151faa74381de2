use log::info;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;

/// What one evolution step saw and produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub generation: usize,
    pub evaluated: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub next_size: usize,
}

impl GenerationSummary {
    pub fn from_fitness(generation: usize, fitness: &[f64], next_size: usize) -> Self {
        let evaluated = fitness.len();
        let best_fitness = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let mean_fitness = if evaluated == 0 {
            f64::NAN
        } else {
            fitness.iter().sum::<f64>() / evaluated as f64
        };
        Self {
            generation,
            evaluated,
            best_fitness,
            mean_fitness,
            next_size,
        }
    }
}

/// Observer of a population controller
pub trait PopulationListener<C>: Send {
    fn on_evolved(&mut self, summary: &GenerationSummary, next: &[C]);

    fn on_candidate_evaluated(&mut self, _generation: usize, _done: usize, _total: usize) {}
}

pub struct LogProgress;

impl<C> PopulationListener<C> for LogProgress {
    fn on_evolved(&mut self, summary: &GenerationSummary, _next: &[C]) {
        info!(
            "Generation {} evolved. Best fitness: {:.4}, mean: {:.4}, next population: {}",
            summary.generation, summary.best_fitness, summary.mean_fitness, summary.next_size
        );
    }

    fn on_candidate_evaluated(&mut self, generation: usize, done: usize, total: usize) {
        if done % 10 == 0 || done == total {
            info!("  Generation {}: evaluated {}/{} candidates", generation, done, total);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    CandidateEvaluated { generation: usize, done: usize, total: usize },
    GenerationEvolved(GenerationSummary),
}

/// Forwards progress to another thread, e.g. a UI or a test
pub struct ChannelProgress {
    sender: Sender<ProgressMessage>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl<C> PopulationListener<C> for ChannelProgress {
    fn on_evolved(&mut self, summary: &GenerationSummary, _next: &[C]) {
        let _ = self
            .sender
            .send(ProgressMessage::GenerationEvolved(summary.clone()));
    }

    fn on_candidate_evaluated(&mut self, generation: usize, done: usize, total: usize) {
        let _ = self.sender.send(ProgressMessage::CandidateEvaluated {
            generation,
            done,
            total,
        });
    }
}
