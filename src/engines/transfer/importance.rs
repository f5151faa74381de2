use super::store::Tensor;
use crate::config::{PrunePolicy, TransferConfig};
use ndarray::Axis;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Score per output channel of a kernel, given the kernel and its output axis
pub type ImportanceFn = Arc<dyn Fn(&Tensor, usize) -> Vec<f32> + Send + Sync>;

/// Ranks channels when a node shrinks; higher scores survive
#[derive(Clone)]
pub enum Importance {
    KeepFirst,
    L1,
    L2,
    Custom(ImportanceFn),
}

impl fmt::Debug for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Importance::KeepFirst => write!(f, "KeepFirst"),
            Importance::L1 => write!(f, "L1"),
            Importance::L2 => write!(f, "L2"),
            Importance::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl From<PrunePolicy> for Importance {
    fn from(policy: PrunePolicy) -> Self {
        match policy {
            PrunePolicy::KeepFirst => Importance::KeepFirst,
            PrunePolicy::L1Norm => Importance::L1,
            PrunePolicy::L2Norm => Importance::L2,
        }
    }
}

impl Importance {
    /// Score per output channel, `None` when the policy ignores weights
    pub fn scores(&self, kernel: Option<&Tensor>, out_axis: usize) -> Option<Vec<f32>> {
        match (self, kernel) {
            (Importance::KeepFirst, _) | (_, None) => None,
            (Importance::L1, Some(k)) => Some(norms(k, out_axis, |v| v.abs())),
            (Importance::L2, Some(k)) => Some(norms(k, out_axis, |v| v * v)),
            (Importance::Custom(score), Some(k)) => Some(score(k, out_axis)),
        }
    }

    /// Indices of the `keep` most important channels, in ascending order.
    /// Equal scores prefer the lower index.
    pub fn select(&self, kernel: Option<&Tensor>, out_axis: usize, width: usize, keep: usize) -> Vec<usize> {
        match self.scores(kernel, out_axis) {
            Some(scores) => top_k(&scores, width, keep),
            None => (0..keep.min(width)).collect(),
        }
    }
}

/// The `keep` highest-scoring of `width` channels, ascending
pub fn top_k(scores: &[f32], width: usize, keep: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..width).collect();
    ranked.sort_by(|a, b| {
        let score = |i: &usize| scores.get(*i).copied().unwrap_or(f32::NEG_INFINITY);
        score(b).total_cmp(&score(a)).then(a.cmp(b))
    });
    let mut kept: Vec<usize> = ranked.into_iter().take(keep).collect();
    kept.sort_unstable();
    kept
}

fn norms(kernel: &Tensor, out_axis: usize, f: impl Fn(f32) -> f32) -> Vec<f32> {
    if out_axis >= kernel.ndim() {
        return Vec::new();
    }
    kernel
        .axis_iter(Axis(out_axis))
        .map(|channel| channel.iter().map(|v| f(*v)).sum())
        .collect()
}

/// Pruning policy for one transfer call, optionally overridden per target node
#[derive(Debug, Clone)]
pub struct TransferContext {
    pub default: Importance,
    pub per_node: HashMap<String, Importance>,
    pub pad_value: f32,
}

impl Default for TransferContext {
    fn default() -> Self {
        Self {
            default: Importance::KeepFirst,
            per_node: HashMap::new(),
            pad_value: 0.0,
        }
    }
}

impl TransferContext {
    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            default: config.prune_policy.into(),
            per_node: HashMap::new(),
            pad_value: config.pad_value,
        }
    }

    pub fn with_node(mut self, node: &str, importance: Importance) -> Self {
        self.per_node.insert(node.to_string(), importance);
        self
    }

    pub fn importance(&self, node: &str) -> &Importance {
        self.per_node.get(node).unwrap_or(&self.default)
    }
}
