//! Convolution and fully-connected layer builders.

use tch::Tensor;

use crate::neural::activation::Activation;
use crate::neural::init::{InitScheme, LayerKind, LayerShape};
use crate::neural::registry::ParameterRegistry;
use crate::{PolicyNetError, Result};

/// Valid (unpadded) strided convolution over channels-last input.
#[derive(Debug)]
pub struct ConvLayer {
    name: String,
    shape: LayerShape,
    kernel: (i64, i64),
    stride: i64,
    activation: Activation,
    /// `(kh, kw, in, out)`
    weights: Tensor,
    bias: Tensor,
}

impl ConvLayer {
    pub fn new(
        registry: &mut ParameterRegistry,
        name: &str,
        shape: &[i64],
        stride: i64,
        activation: Activation,
    ) -> Result<Self> {
        let (shape, init) = InitScheme::for_raw_shape(LayerKind::Convolution, shape)?;
        let dims = shape.dims();
        let weights = registry.create(name, "weights", &dims, init.weight_init())?;
        let bias = registry.create(name, "bias", &[shape.out_units()], init.bias_init())?;

        Ok(Self {
            name: name.to_string(),
            shape,
            kernel: (dims[0], dims[1]),
            stride,
            activation,
            weights,
            bias,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn out_channels(&self) -> i64 {
        self.shape.out_units()
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Spatial size after this layer: `floor((in - k) / stride) + 1`.
    pub fn output_dims(&self, height: i64, width: i64) -> Result<(i64, i64)> {
        let (kernel_h, kernel_w) = self.kernel;
        Ok((
            valid_output_dim(&self.name, height, kernel_h, self.stride)?,
            valid_output_dim(&self.name, width, kernel_w, self.stride)?,
        ))
    }

    /// `x` is `(batch, height, width, channels)`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        // libtorch convolves NCHW with (out, in, kh, kw) kernels
        let input = x.f_permute([0, 3, 1, 2])?;
        let kernel = self.weights.f_permute([3, 2, 0, 1])?;
        let conv = input.f_conv2d(
            &kernel,
            Some(&self.bias),
            [self.stride, self.stride],
            [0, 0],
            [1, 1],
            1,
        )?;
        self.activation.apply(&conv.f_permute([0, 2, 3, 1])?)
    }
}

fn valid_output_dim(layer: &str, input: i64, kernel: i64, stride: i64) -> Result<i64> {
    if input < kernel || stride <= 0 {
        return Err(PolicyNetError::DimensionCollapse {
            layer: layer.to_string(),
            input,
            kernel,
            stride,
        });
    }
    Ok((input - kernel) / stride + 1)
}

/// How a dense layer biases its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiasMode {
    /// One bias per output unit.
    #[default]
    PerUnit,
    /// A single scalar broadcast to every output unit.
    Shared,
}

/// `activation(x @ W + b)`
#[derive(Debug)]
pub struct DenseLayer {
    name: String,
    shape: LayerShape,
    activation: Activation,
    weights: Tensor,
    bias: Tensor,
}

impl DenseLayer {
    pub fn new(
        registry: &mut ParameterRegistry,
        name: &str,
        shape: &[i64],
        activation: Activation,
        bias_mode: BiasMode,
    ) -> Result<Self> {
        let (shape, init) = InitScheme::for_raw_shape(LayerKind::Dense, shape)?;
        let weights = registry.create(name, "weights", &shape.dims(), init.weight_init())?;
        let bias_len = match bias_mode {
            BiasMode::PerUnit => shape.out_units(),
            BiasMode::Shared => 1,
        };
        let bias = registry.create(name, "bias", &[bias_len], init.bias_init())?;

        Ok(Self {
            name: name.to_string(),
            shape,
            activation,
            weights,
            bias,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn in_features(&self) -> i64 {
        self.shape.fan_in()
    }

    pub fn out_features(&self) -> i64 {
        self.shape.out_units()
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// `x` is `(batch, in_features)`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let h = x.f_matmul(&self.weights)?.f_add(&self.bias)?;
        self.activation.apply(&h)
    }
}
