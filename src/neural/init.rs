//! Bounded-uniform weight initialisation (Glorot/Xavier heuristic).
//!
//! Every layer builder goes through [`InitScheme`] before it allocates
//! anything, so a malformed shape is rejected while the registry is still
//! untouched.

use std::fmt;

use tch::nn;

use crate::{PolicyNetError, Result};

/// Constant every bias starts at. Slightly positive so ELU units are not dead
/// on the first forward pass.
pub const BIAS_INIT: f64 = 0.1;

/// Which kind of layer a shape descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Convolution,
    Dense,
}

impl LayerKind {
    /// Number of entries a shape descriptor must have for this kind.
    pub fn arity(self) -> usize {
        match self {
            LayerKind::Convolution => 4,
            LayerKind::Dense => 2,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Convolution => write!(f, "convolution"),
            LayerKind::Dense => write!(f, "dense"),
        }
    }
}

/// Shape of a layer's weight tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerShape {
    /// `(kernel_height, kernel_width, in_channels, out_channels)`
    Conv {
        kernel_h: i64,
        kernel_w: i64,
        in_channels: i64,
        out_channels: i64,
    },
    /// `(in_features, out_features)`
    Dense { in_features: i64, out_features: i64 },
}

impl LayerShape {
    /// Parse a raw shape descriptor. The length must match `kind` exactly.
    pub fn parse(kind: LayerKind, shape: &[i64]) -> Result<Self> {
        if shape.len() != kind.arity() {
            return Err(PolicyNetError::ShapeArity {
                layer: kind,
                shape: shape.to_vec(),
                expected: kind.arity(),
            });
        }
        Ok(match kind {
            LayerKind::Convolution => LayerShape::Conv {
                kernel_h: shape[0],
                kernel_w: shape[1],
                in_channels: shape[2],
                out_channels: shape[3],
            },
            LayerKind::Dense => LayerShape::Dense {
                in_features: shape[0],
                out_features: shape[1],
            },
        })
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            LayerShape::Conv { .. } => LayerKind::Convolution,
            LayerShape::Dense { .. } => LayerKind::Dense,
        }
    }

    /// Dimensions of the weight tensor, in descriptor order.
    pub fn dims(&self) -> Vec<i64> {
        match *self {
            LayerShape::Conv {
                kernel_h,
                kernel_w,
                in_channels,
                out_channels,
            } => vec![kernel_h, kernel_w, in_channels, out_channels],
            LayerShape::Dense {
                in_features,
                out_features,
            } => vec![in_features, out_features],
        }
    }

    /// Number of output units, which is also the per-unit bias length.
    pub fn out_units(&self) -> i64 {
        match *self {
            LayerShape::Conv { out_channels, .. } => out_channels,
            LayerShape::Dense { out_features, .. } => out_features,
        }
    }

    pub fn fan_in(&self) -> i64 {
        match *self {
            LayerShape::Conv {
                kernel_h,
                kernel_w,
                in_channels,
                ..
            } => kernel_h * kernel_w * in_channels,
            LayerShape::Dense { in_features, .. } => in_features,
        }
    }

    pub fn fan_out(&self) -> i64 {
        match *self {
            LayerShape::Conv {
                kernel_h,
                kernel_w,
                out_channels,
                ..
            } => kernel_h * kernel_w * out_channels,
            LayerShape::Dense { out_features, .. } => out_features,
        }
    }
}

/// Initialisation ranges derived from a layer shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitScheme {
    /// Weights are drawn from `[-max_weight, max_weight]`.
    pub max_weight: f64,
    pub bias: f64,
}

impl InitScheme {
    pub fn for_shape(shape: &LayerShape) -> Self {
        let fan_sum = (shape.fan_in() + shape.fan_out()) as f64;
        Self {
            max_weight: (6.0 / fan_sum).sqrt(),
            bias: BIAS_INIT,
        }
    }

    /// Parse `shape` for `kind` and compute its ranges in one go.
    pub fn for_raw_shape(kind: LayerKind, shape: &[i64]) -> Result<(LayerShape, Self)> {
        let parsed = LayerShape::parse(kind, shape)?;
        Ok((parsed, Self::for_shape(&parsed)))
    }

    pub fn weight_init(&self) -> nn::Init {
        nn::Init::Uniform {
            lo: -self.max_weight,
            up: self.max_weight,
        }
    }

    pub fn bias_init(&self) -> nn::Init {
        nn::Init::Const(self.bias)
    }
}
