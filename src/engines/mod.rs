pub mod crossover;
pub mod evaluation;
pub mod generation;
pub mod mutation;
pub mod population;
pub mod provenance;
pub mod selection;
pub mod transfer;
