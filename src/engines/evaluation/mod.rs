pub mod adapter;

pub use adapter::{evaluate_candidate, ModelAdapter};
