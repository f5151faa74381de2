pub mod candidate;
pub mod evolution_engine;
pub mod hall_of_fame;

pub use candidate::{fingerprint_key, Candidate, CandidateId};
pub use evolution_engine::EvolutionEngine;
pub use hall_of_fame::{HallOfFame, HallOfFameEntry};
