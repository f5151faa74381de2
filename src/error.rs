use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchevoError {
    #[error("Topology contains a cycle through: {0}")]
    Cycle(String),

    #[error("Node '{node}' references missing input '{input}'")]
    DanglingInput { node: String, input: String },

    #[error("Node '{0}' does not reach any declared output")]
    Disconnected(String),

    #[error("Shape mismatch at '{node}': {reason}")]
    ShapeMismatch { node: String, reason: String },

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Unsupported edit on '{node}': {reason}")]
    UnsupportedEdit { node: String, reason: String },

    #[error("Rank mismatch for '{node}.{param}': expected rank {expected}, got {actual}")]
    RankMismatch {
        node: String,
        param: String,
        expected: usize,
        actual: usize,
    },

    #[error("Fitness reported for candidate {0} which is not in the current population")]
    UnknownCandidate(String),

    #[error("Fitness reported twice for candidate {0} in generation {1}")]
    DuplicateFitness(String, usize),

    #[error("Roulette draw {0} is outside [0, 1)")]
    DrawOutOfRange(f64),

    #[error("Selection produced no candidates in generation {0}")]
    EmptySelection(usize),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model adapter error: {0}")]
    Collaborator(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ArchevoError {
    /// Shape errors are the only structural failures a splice attempt may recover from.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, ArchevoError::ShapeMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, ArchevoError>;
