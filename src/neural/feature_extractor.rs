use tch::Tensor;

use crate::neural::activation::Activation;
use crate::neural::layers::ConvLayer;
use crate::neural::registry::ParameterRegistry;
use crate::Result;

pub const CONV_LAYERS: usize = 4;
pub const CONV_CHANNELS: i64 = 32;
pub const CONV_KERNEL: i64 = 3;
pub const CONV_STRIDE: i64 = 2;

/// Four 3x3 stride-2 ELU convolutions followed by a flatten.
#[derive(Debug)]
pub struct FeatureExtractor {
    convs: Vec<ConvLayer>,
    /// Spatial size left after the last convolution.
    output_hw: (i64, i64),
}

impl FeatureExtractor {
    /// `state_shape` is `(width, height, depth)` as laid out in the input
    /// tensor after the batch dimension.
    pub fn new(registry: &mut ParameterRegistry, state_shape: (i64, i64, i64)) -> Result<Self> {
        let (width, height, depth) = state_shape;
        let mut convs = Vec::with_capacity(CONV_LAYERS);
        let mut in_channels = depth;
        let mut dims = (width, height);

        for idx in 0..CONV_LAYERS {
            let conv = ConvLayer::new(
                registry,
                &format!("conv_{}", idx + 1),
                &[CONV_KERNEL, CONV_KERNEL, in_channels, CONV_CHANNELS],
                CONV_STRIDE,
                Activation::Elu,
            )?;
            dims = conv.output_dims(dims.0, dims.1)?;
            log::debug!("{} output: {}x{}x{}", conv.name(), dims.0, dims.1, CONV_CHANNELS);
            in_channels = conv.out_channels();
            convs.push(conv);
        }

        Ok(Self {
            convs,
            output_hw: dims,
        })
    }

    /// Width of the flattened feature vector per batch row.
    pub fn output_size(&self) -> i64 {
        self.output_hw.0 * self.output_hw.1 * CONV_CHANNELS
    }

    pub fn layers(&self) -> &[ConvLayer] {
        &self.convs
    }

    /// `(batch, width, height, depth)` to `(batch, output_size)`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut h = x.shallow_clone();
        for conv in &self.convs {
            h = conv.forward(&h)?;
        }
        Ok(h.f_reshape([-1, self.output_size()])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PolicyNetError;
    use assert_matches::assert_matches;
    use tch::{Device, Kind};

    #[test]
    fn test_atari_sized_input() {
        let mut registry = ParameterRegistry::new(Device::Cpu);
        let extractor = FeatureExtractor::new(&mut registry, (84, 84, 3)).unwrap();
        // 84 -> 41 -> 20 -> 9 -> 4
        assert_eq!(extractor.output_size(), 4 * 4 * 32);
        assert_eq!(registry.len(), 8);

        let x = Tensor::zeros([2, 84, 84, 3], (Kind::Float, Device::Cpu));
        assert_eq!(extractor.forward(&x).unwrap().size(), vec![2, 512]);
    }

    #[test]
    fn test_rectangular_input() {
        let mut registry = ParameterRegistry::new(Device::Cpu);
        let extractor = FeatureExtractor::new(&mut registry, (100, 80, 1)).unwrap();
        // 100 -> 49 -> 24 -> 11 -> 5, 80 -> 39 -> 19 -> 9 -> 4
        assert_eq!(extractor.output_size(), 5 * 4 * 32);

        let x = Tensor::rand([1, 100, 80, 1], (Kind::Float, Device::Cpu));
        assert_eq!(extractor.forward(&x).unwrap().size(), vec![1, 640]);
    }

    #[test]
    fn test_too_small_input_collapses() {
        let mut registry = ParameterRegistry::new(Device::Cpu);
        assert_matches!(
            FeatureExtractor::new(&mut registry, (3, 3, 1)),
            Err(PolicyNetError::DimensionCollapse { .. })
        );
    }

    #[test]
    fn test_smallest_surviving_input() {
        // 31 -> 15 -> 7 -> 3 -> 1
        let mut registry = ParameterRegistry::new(Device::Cpu);
        let extractor = FeatureExtractor::new(&mut registry, (31, 31, 2)).unwrap();
        assert_eq!(extractor.output_size(), 32);

        let mut registry = ParameterRegistry::new(Device::Cpu);
        assert!(FeatureExtractor::new(&mut registry, (30, 31, 2)).is_err());
    }
}
