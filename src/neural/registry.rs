//! Per-network parameter ownership.
//!
//! Layer builders never look parameters up through ambient scope; they ask
//! the registry of the network they belong to, which records every tensor it
//! hands out together with its scoped name.

use tch::{nn, Device, Tensor};

use crate::{PolicyNetError, Result};

#[derive(Debug)]
pub struct ParameterRegistry {
    vs: nn::VarStore,
    names: Vec<String>,
}

impl ParameterRegistry {
    pub fn new(device: Device) -> Self {
        Self {
            vs: nn::VarStore::new(device),
            names: Vec::new(),
        }
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    /// Create a trainable tensor named `scope.name`. Names are unique per
    /// registry.
    pub fn create(
        &mut self,
        scope: &str,
        name: &str,
        dims: &[i64],
        init: nn::Init,
    ) -> Result<Tensor> {
        let full_name = format!("{scope}.{name}");
        if self.names.contains(&full_name) {
            return Err(PolicyNetError::DuplicateParameter(full_name));
        }
        let var = (self.vs.root() / scope).f_var(name, dims, init)?;
        log::debug!("registered parameter {} {:?}", full_name, dims);
        self.names.push(full_name);
        Ok(var)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Scoped names in creation order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Every parameter in creation order, each exactly once.
    pub fn parameters(&self) -> Vec<(String, Tensor)> {
        let variables = self.vs.variables();
        self.names
            .iter()
            .filter_map(|name| {
                variables
                    .get(name)
                    .map(|tensor| (name.clone(), tensor.shallow_clone()))
            })
            .collect()
    }

    /// Total number of scalar values across all parameters.
    pub fn num_scalars(&self) -> i64 {
        self.vs
            .variables()
            .values()
            .map(|t| t.size().iter().product::<i64>())
            .sum()
    }

    /// Backing store, for optimisers (`nn::Adam::default().build(vs, lr)`).
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Overwrite every parameter value with the one of the same name in
    /// `source`. Both registries must hold the same names and shapes.
    pub fn copy_from(&mut self, source: &ParameterRegistry) -> Result<()> {
        if self.names != source.names {
            return Err(PolicyNetError::ShapeMismatch {
                context: "parameter sync (names differ)".to_string(),
                expected: vec![self.names.len() as i64],
                actual: vec![source.names.len() as i64],
            });
        }
        let src = source.vs.variables();
        for (name, dst) in self.vs.variables() {
            if let Some(value) = src.get(&name) {
                if value.size() != dst.size() {
                    return Err(PolicyNetError::ShapeMismatch {
                        context: format!("parameter sync ({name})"),
                        expected: dst.size(),
                        actual: value.size(),
                    });
                }
            }
        }
        self.vs.copy(&source.vs)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_records_order() {
        let mut registry = ParameterRegistry::new(Device::Cpu);
        registry
            .create("conv_1", "weights", &[3, 3, 1, 8], nn::Init::Const(0.0))
            .unwrap();
        registry
            .create("conv_1", "bias", &[8], nn::Init::Const(0.1))
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), ["conv_1.weights", "conv_1.bias"]);
        assert_eq!(registry.num_scalars(), 3 * 3 * 8 + 8);

        let params = registry.parameters();
        assert_eq!(params[1].1.size(), vec![8]);
    }

    #[test]
    fn test_copy_from_overwrites_values() {
        let mut a = ParameterRegistry::new(Device::Cpu);
        let mut b = ParameterRegistry::new(Device::Cpu);
        let wa = a
            .create("dense", "weights", &[2, 2], nn::Init::Const(0.0))
            .unwrap();
        b.create("dense", "weights", &[2, 2], nn::Init::Const(1.5))
            .unwrap();

        a.copy_from(&b).unwrap();
        assert_eq!(wa.sum(tch::Kind::Float).double_value(&[]), 6.0);
    }

    #[test]
    fn test_copy_from_rejects_different_layout() {
        let mut a = ParameterRegistry::new(Device::Cpu);
        let mut b = ParameterRegistry::new(Device::Cpu);
        a.create("dense", "weights", &[2, 2], nn::Init::Const(0.0))
            .unwrap();
        b.create("other", "weights", &[2, 2], nn::Init::Const(0.0))
            .unwrap();
        assert!(a.copy_from(&b).is_err());
    }

    #[test]
    fn test_negative_dims_surface_as_tensor_error() {
        let mut registry = ParameterRegistry::new(Device::Cpu);
        let result = registry.create("dense", "weights", &[4, -3], nn::Init::Const(0.0));
        assert!(matches!(result, Err(PolicyNetError::Tensor(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = ParameterRegistry::new(Device::Cpu);
        registry
            .create("dense", "bias", &[4], nn::Init::Const(0.1))
            .unwrap();
        let again = registry.create("dense", "bias", &[4], nn::Init::Const(0.1));
        assert!(matches!(again, Err(PolicyNetError::DuplicateParameter(_))));
        assert_eq!(registry.len(), 1);
    }
}
