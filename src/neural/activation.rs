use tch::Tensor;

use crate::Result;

/// Element-wise nonlinearity applied at the end of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Identity,
    /// Exponential linear unit, `x` for `x > 0`, `exp(x) - 1` otherwise.
    Elu,
}

impl Activation {
    pub fn apply(self, x: &Tensor) -> Result<Tensor> {
        match self {
            Activation::Identity => Ok(x.shallow_clone()),
            Activation::Elu => Ok(x.f_elu()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_passthrough() {
        let x = Tensor::from_slice(&[-2.0f32, 0.0, 3.5]);
        let y = Activation::Identity.apply(&x).unwrap();
        assert!(y.allclose(&x, 1e-6, 1e-6, false));
    }

    #[test]
    fn test_elu_negative_branch() {
        let x = Tensor::from_slice(&[-1.0f32, 2.0]);
        let y = Activation::Elu.apply(&x).unwrap();
        let expected = Tensor::from_slice(&[(-1.0f32).exp() - 1.0, 2.0]);
        assert!(y.allclose(&expected, 1e-5, 1e-6, false));
    }
}
