use crate::error::{ArchevoError, Result};
use serde::{Deserialize, Serialize};

/// Activation functions usable as standalone nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Tanh,
    Sigmoid,
    Softmax,
}

/// Operation carried by a topology node.
///
/// Shapes never include the batch axis. The last axis is the channel axis,
/// which is the "width" that mutation and crossover resize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Input { shape: Vec<usize> },
    Dense { units: usize },
    Conv2d { filters: usize, kernel: (usize, usize) },
    BatchNorm,
    Activation(Activation),
    Dropout { rate: f64 },
    MaxPool2d { size: usize },
    Flatten,
    Add,    // elementwise merge
    Concat, // merge along channel axis
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Input,
    Layer,
    Elementwise,
    Merge,
}

/// How one axis of a parameter tensor relates to the node's channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    Input,
    Output,
    Spatial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub shape: Vec<usize>,
    pub axes: Vec<AxisRole>,
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Op::Input { .. } => OpKind::Input,
            Op::Add => OpKind::Elementwise,
            Op::Concat => OpKind::Merge,
            Op::Dense { .. }
            | Op::Conv2d { .. }
            | Op::BatchNorm
            | Op::Activation(_)
            | Op::Dropout { .. }
            | Op::MaxPool2d { .. }
            | Op::Flatten => OpKind::Layer,
        }
    }

    /// Type name used for crossover matching and fresh node names
    pub fn type_name(&self) -> &'static str {
        match self {
            Op::Input { .. } => "input",
            Op::Dense { .. } => "dense",
            Op::Conv2d { .. } => "conv2d",
            Op::BatchNorm => "batch_norm",
            Op::Activation(_) => "activation",
            Op::Dropout { .. } => "dropout",
            Op::MaxPool2d { .. } => "max_pool2d",
            Op::Flatten => "flatten",
            Op::Add => "add",
            Op::Concat => "concat",
        }
    }

    pub fn is_merge(&self) -> bool {
        matches!(self.kind(), OpKind::Elementwise | OpKind::Merge)
    }

    /// Output width is a free parameter of the op
    pub fn defines_width(&self) -> bool {
        matches!(self, Op::Dense { .. } | Op::Conv2d { .. })
    }

    /// Output width is forced equal to input width
    pub fn is_width_transparent(&self) -> bool {
        matches!(
            self,
            Op::BatchNorm | Op::Activation(_) | Op::Dropout { .. } | Op::MaxPool2d { .. }
        )
    }

    /// Copy of this op with its output width replaced. Only width-defining ops can be resized.
    pub fn with_width(&self, width: usize) -> Option<Op> {
        match self {
            Op::Dense { .. } => Some(Op::Dense { units: width }),
            Op::Conv2d { kernel, .. } => Some(Op::Conv2d {
                filters: width,
                kernel: *kernel,
            }),
            _ => None,
        }
    }

    pub fn output_shape(&self, node: &str, inputs: &[&[usize]]) -> Result<Vec<usize>> {
        let mismatch = |reason: String| ArchevoError::ShapeMismatch {
            node: node.to_string(),
            reason,
        };

        if let Op::Input { shape } = self {
            if !inputs.is_empty() {
                return Err(mismatch("input nodes take no inputs".to_string()));
            }
            return Ok(shape.clone());
        }

        let first = match inputs.first() {
            Some(shape) => *shape,
            None => return Err(mismatch(format!("{} needs at least one input", self.type_name()))),
        };
        if !self.is_merge() && inputs.len() != 1 {
            return Err(mismatch(format!(
                "{} takes exactly one input, got {}",
                self.type_name(),
                inputs.len()
            )));
        }

        match self {
            Op::Input { .. } => unreachable!("handled above"),
            Op::Dense { units } => {
                if first.is_empty() {
                    return Err(mismatch("dense on a scalar".to_string()));
                }
                let mut out = first.to_vec();
                if let Some(last) = out.last_mut() {
                    *last = *units;
                }
                Ok(out)
            }
            Op::Conv2d { filters, .. } => {
                if first.len() != 3 {
                    return Err(mismatch(format!("conv2d expects [h, w, c], got {:?}", first)));
                }
                Ok(vec![first[0], first[1], *filters])
            }
            Op::BatchNorm | Op::Activation(_) | Op::Dropout { .. } => Ok(first.to_vec()),
            Op::MaxPool2d { size } => {
                if first.len() != 3 || *size == 0 {
                    return Err(mismatch(format!("max_pool2d expects [h, w, c], got {:?}", first)));
                }
                Ok(vec![first[0] / size, first[1] / size, first[2]])
            }
            Op::Flatten => Ok(vec![first.iter().product()]),
            Op::Add => {
                if let Some(other) = inputs.iter().find(|s| ***s != *first) {
                    return Err(mismatch(format!("add of {:?} and {:?}", first, other)));
                }
                Ok(first.to_vec())
            }
            Op::Concat => {
                let lead = &first[..first.len().saturating_sub(1)];
                let mut channels = 0;
                for shape in inputs {
                    if shape.is_empty() || &shape[..shape.len() - 1] != lead {
                        return Err(mismatch(format!("concat of {:?} and {:?}", first, shape)));
                    }
                    channels += shape[shape.len() - 1];
                }
                let mut out = lead.to_vec();
                out.push(channels);
                Ok(out)
            }
        }
    }

    /// Parameter tensors of this op given the shape of its (single) input
    pub fn param_specs(&self, input_shape: &[usize]) -> Vec<ParamSpec> {
        let in_width = input_shape.last().copied().unwrap_or(0);
        match self {
            Op::Dense { units } => vec![
                ParamSpec {
                    name: "kernel",
                    shape: vec![in_width, *units],
                    axes: vec![AxisRole::Input, AxisRole::Output],
                },
                ParamSpec {
                    name: "bias",
                    shape: vec![*units],
                    axes: vec![AxisRole::Output],
                },
            ],
            Op::Conv2d { filters, kernel } => vec![
                ParamSpec {
                    name: "kernel",
                    shape: vec![kernel.0, kernel.1, in_width, *filters],
                    axes: vec![
                        AxisRole::Spatial,
                        AxisRole::Spatial,
                        AxisRole::Input,
                        AxisRole::Output,
                    ],
                },
                ParamSpec {
                    name: "bias",
                    shape: vec![*filters],
                    axes: vec![AxisRole::Output],
                },
            ],
            Op::BatchNorm => ["gamma", "beta", "moving_mean", "moving_variance"]
                .into_iter()
                .map(|name| ParamSpec {
                    name,
                    shape: vec![in_width],
                    axes: vec![AxisRole::Output],
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_replaces_last_axis() {
        let op = Op::Dense { units: 8 };
        assert_eq!(op.output_shape("d", &[&[4, 4, 3]]).unwrap(), vec![4, 4, 8]);
    }

    #[test]
    fn test_concat_sums_channels() {
        let shape = Op::Concat.output_shape("c", &[&[5, 5, 2], &[5, 5, 3]]).unwrap();
        assert_eq!(shape, vec![5, 5, 5]);
    }

    #[test]
    fn test_add_rejects_different_shapes() {
        let err = Op::Add.output_shape("a", &[&[4], &[5]]).unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_conv_requires_rank_three() {
        let op = Op::Conv2d { filters: 4, kernel: (3, 3) };
        assert!(op.output_shape("c", &[&[16]]).is_err());
    }

    #[test]
    fn test_batch_norm_params_follow_input_width() {
        let specs = Op::BatchNorm.param_specs(&[7]);
        assert_eq!(specs.len(), 4);
        assert!(specs.iter().all(|s| s.shape == vec![7]));
    }

    #[test]
    fn test_only_weighted_layers_resize() {
        assert!(Op::Dense { units: 3 }.with_width(5).is_some());
        assert!(Op::BatchNorm.with_width(5).is_none());
    }
}
