use std::fmt;

use tch::{nn, Tensor};

use crate::neural::activation::Activation;
use crate::neural::config::NetworkConfig;
use crate::neural::feature_extractor::FeatureExtractor;
use crate::neural::layers::{BiasMode, DenseLayer};
use crate::neural::recurrent::{RecurrentMemory, RecurrentState, MEMORY_SIZE};
use crate::neural::registry::ParameterRegistry;
use crate::{PolicyNetError, Result};

/// Result of one forward pass.
#[derive(Debug)]
pub struct NetworkOutput {
    /// Unnormalised action scores, `(batch, num_actions)`
    pub logits: Tensor,
    /// State-value estimate, `(batch, 1)`
    pub value: Tensor,
    /// Memory after the last row of the batch, to feed into the next call
    pub state: RecurrentState,
}

/// Convolutional-recurrent policy/value network for one actor-critic worker.
///
/// The network owns its parameters. Inputs and the recurrent state belong to
/// the caller: start from [`PolicyNetwork::initial_state`] and pass
/// [`NetworkOutput::state`] back in on the next step.
#[derive(Debug)]
pub struct PolicyNetwork {
    config: NetworkConfig,
    registry: ParameterRegistry,
    features: FeatureExtractor,
    memory: RecurrentMemory,
    policy_head: DenseLayer,
    value_head: DenseLayer,
    initial_state: RecurrentState,
}

impl PolicyNetwork {
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        if let Some(seed) = config.seed {
            tch::manual_seed(seed);
        }
        log::info!(
            "🔧 Building policy network: {} actions, state shape {:?}",
            config.num_actions,
            config.state_shape
        );

        let mut registry = ParameterRegistry::new(config.device);
        let features = FeatureExtractor::new(&mut registry, config.state_shape)?;
        log::debug!("flattened feature width: {}", features.output_size());

        let memory = RecurrentMemory::new(&mut registry, features.output_size(), MEMORY_SIZE)?;
        let policy_head = DenseLayer::new(
            &mut registry,
            "policy",
            &[MEMORY_SIZE, config.num_actions],
            Activation::Identity,
            BiasMode::PerUnit,
        )?;
        let value_head = DenseLayer::new(
            &mut registry,
            "value",
            &[MEMORY_SIZE, 1],
            Activation::Identity,
            BiasMode::PerUnit,
        )?;
        let initial_state = RecurrentState::zeros(MEMORY_SIZE, config.device);

        log::info!(
            "✅ Policy network ready: {} parameter tensors, {} values",
            registry.len(),
            registry.num_scalars()
        );

        Ok(Self {
            config,
            registry,
            features,
            memory,
            policy_head,
            value_head,
            initial_state,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn num_actions(&self) -> i64 {
        self.config.num_actions
    }

    /// All-zero `(1, 256)` state pair for the start of an episode.
    pub fn initial_state(&self) -> &RecurrentState {
        &self.initial_state
    }

    /// `states` is `(batch, width, height, depth)`; `state` is the memory
    /// carried over from the previous call.
    ///
    /// All rows share one memory lane: row `t` sees the memory left by rows
    /// `0..t`, and only the state after the final row is returned.
    pub fn forward(&self, states: &Tensor, state: &RecurrentState) -> Result<NetworkOutput> {
        let (width, height, depth) = self.config.state_shape;
        let size = states.size();
        if size.len() != 4 || size[1..] != [width, height, depth] {
            return Err(PolicyNetError::ShapeMismatch {
                context: "input states".to_string(),
                expected: vec![-1, width, height, depth],
                actual: size,
            });
        }

        let flat = self.features.forward(states)?;
        let (memory_out, new_state) = self.memory.run_one_step_per_row(&flat, state)?;

        Ok(NetworkOutput {
            logits: self.policy_head.forward(&memory_out)?,
            value: self.value_head.forward(&memory_out)?,
            state: new_state,
        })
    }

    /// Trainable parameters in creation order: four convolutions, the
    /// recurrent cell, then the policy and value heads.
    pub fn parameters(&self) -> Vec<(String, Tensor)> {
        self.registry.parameters()
    }

    pub fn trainable_parameters(&self) -> Vec<Tensor> {
        self.parameters().into_iter().map(|(_, t)| t).collect()
    }

    /// Backing store, for building an optimiser or saving a checkpoint.
    pub fn var_store(&self) -> &nn::VarStore {
        self.registry.var_store()
    }

    /// Copy every parameter value from `shared`, which must have been built
    /// with the same state shape and action count.
    pub fn sync_from(&mut self, shared: &PolicyNetwork) -> Result<()> {
        self.registry.copy_from(&shared.registry)?;
        log::debug!("synchronised {} parameter tensors", self.registry.len());
        Ok(())
    }

    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            num_actions: self.config.num_actions,
            state_shape: self.config.state_shape,
            feature_size: self.features.output_size(),
            memory_size: self.memory.hidden_size(),
            parameter_tensors: self.registry.len(),
            parameter_values: self.registry.num_scalars(),
            device: format!("{:?}", self.registry.device()),
        }
    }
}

/// Summary information about a built network
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSummary {
    pub num_actions: i64,
    pub state_shape: (i64, i64, i64),
    pub feature_size: i64,
    pub memory_size: i64,
    pub parameter_tensors: usize,
    pub parameter_values: i64,
    pub device: String,
}

impl fmt::Display for NetworkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Policy Network Summary:\n\
             📐 State Shape: {:?}\n\
             🎯 Actions: {}\n\
             🧩 Feature Width: {}, Memory Size: {}\n\
             🔢 Parameter Tensors: {}, Values: {}\n\
             💻 Device: {}",
            self.state_shape,
            self.num_actions,
            self.feature_size,
            self.memory_size,
            self.parameter_tensors,
            self.parameter_values,
            self.device
        )
    }
}
