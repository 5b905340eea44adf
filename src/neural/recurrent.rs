//! Recurrent memory carried between forward calls.
//!
//! The cell is a basic LSTM: one kernel over `[input, hidden]`, one bias,
//! gates laid out as input, candidate, forget, output, and a constant added
//! to the forget gate before its sigmoid.
//!
//! [`RecurrentMemory::run_one_step_per_row`] feeds a whole batch through the
//! cell as if it were one trajectory: the batch is viewed as
//! `(1, batch, features)`, i.e. a single lane whose sequence length is the
//! batch size. Every row therefore sees the memory left by the rows before
//! it, starting from the caller's state, and only the state after the last
//! row is returned. Per-row intermediate states are not exposed.

use tch::{nn, Device, Kind, Tensor};

use crate::neural::init::{InitScheme, LayerKind};
use crate::neural::registry::ParameterRegistry;
use crate::{PolicyNetError, Result};

pub const MEMORY_SIZE: i64 = 256;
pub const FORGET_BIAS: f64 = 1.0;

/// `(cell, hidden)`, each `(1, hidden_size)`.
#[derive(Debug)]
pub struct RecurrentState {
    pub cell: Tensor,
    pub hidden: Tensor,
}

impl RecurrentState {
    /// All-zero state used at the start of an episode.
    pub fn zeros(hidden_size: i64, device: Device) -> Self {
        Self {
            cell: Tensor::zeros([1, hidden_size], (Kind::Float, device)),
            hidden: Tensor::zeros([1, hidden_size], (Kind::Float, device)),
        }
    }

    pub fn shallow_clone(&self) -> Self {
        Self {
            cell: self.cell.shallow_clone(),
            hidden: self.hidden.shallow_clone(),
        }
    }

    /// Detached copy, safe to keep across optimiser steps.
    pub fn detach(&self) -> Self {
        Self {
            cell: self.cell.detach(),
            hidden: self.hidden.detach(),
        }
    }

    fn check(&self, hidden_size: i64) -> Result<()> {
        for (context, t) in [
            ("recurrent cell state", &self.cell),
            ("recurrent hidden state", &self.hidden),
        ] {
            if t.size() != [1, hidden_size] {
                return Err(PolicyNetError::ShapeMismatch {
                    context: context.to_string(),
                    expected: vec![1, hidden_size],
                    actual: t.size(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct LstmCell {
    input_size: i64,
    hidden_size: i64,
    /// `(input_size + hidden_size, 4 * hidden_size)`
    kernel: Tensor,
    bias: Tensor,
}

impl LstmCell {
    pub fn new(
        registry: &mut ParameterRegistry,
        name: &str,
        input_size: i64,
        hidden_size: i64,
    ) -> Result<Self> {
        let (shape, init) = InitScheme::for_raw_shape(
            LayerKind::Dense,
            &[input_size + hidden_size, 4 * hidden_size],
        )?;
        let kernel = registry.create(name, "kernel", &shape.dims(), init.weight_init())?;
        let bias = registry.create(name, "bias", &[4 * hidden_size], nn::Init::Const(0.0))?;
        Ok(Self {
            input_size,
            hidden_size,
            kernel,
            bias,
        })
    }

    pub fn input_size(&self) -> i64 {
        self.input_size
    }

    pub fn hidden_size(&self) -> i64 {
        self.hidden_size
    }

    /// One transition. `input` is `(batch, input_size)`, state tensors are
    /// `(batch, hidden_size)`.
    pub fn step(&self, input: &Tensor, state: &RecurrentState) -> Result<RecurrentState> {
        let rows = input.size().first().copied().unwrap_or(0);
        for (context, t) in [
            ("recurrent cell state", &state.cell),
            ("recurrent hidden state", &state.hidden),
        ] {
            if t.size() != [rows, self.hidden_size] {
                return Err(PolicyNetError::ShapeMismatch {
                    context: context.to_string(),
                    expected: vec![rows, self.hidden_size],
                    actual: t.size(),
                });
            }
        }

        let concat = Tensor::f_cat(&[input, &state.hidden], 1)?;
        let gates = concat.f_matmul(&self.kernel)?.f_add(&self.bias)?;
        let chunks = gates.f_chunk(4, 1)?;
        let (i, j, f, o) = (&chunks[0], &chunks[1], &chunks[2], &chunks[3]);

        let keep = state.cell.f_mul(&f.f_add_scalar(FORGET_BIAS)?.f_sigmoid()?)?;
        let write = i.f_sigmoid()?.f_mul(&j.f_tanh()?)?;
        let cell = keep.f_add(&write)?;
        let hidden = cell.f_tanh()?.f_mul(&o.f_sigmoid()?)?;
        Ok(RecurrentState { cell, hidden })
    }
}

#[derive(Debug)]
pub struct RecurrentMemory {
    cell: LstmCell,
}

impl RecurrentMemory {
    pub fn new(registry: &mut ParameterRegistry, input_size: i64, hidden_size: i64) -> Result<Self> {
        let cell = LstmCell::new(registry, "lstm", input_size, hidden_size)?;
        Ok(Self { cell })
    }

    pub fn cell(&self) -> &LstmCell {
        &self.cell
    }

    pub fn hidden_size(&self) -> i64 {
        self.cell.hidden_size
    }

    /// Run each row of `features` `(batch, input_size)` as one time step of
    /// a single trajectory starting at `prev`. Returns the hidden output per
    /// row `(batch, hidden_size)` and the state after the final row.
    pub fn run_one_step_per_row(
        &self,
        features: &Tensor,
        prev: &RecurrentState,
    ) -> Result<(Tensor, RecurrentState)> {
        let size = features.size();
        if size.len() != 2 || size[1] != self.cell.input_size || size[0] == 0 {
            return Err(PolicyNetError::ShapeMismatch {
                context: "recurrent memory input".to_string(),
                expected: vec![-1, self.cell.input_size],
                actual: size,
            });
        }
        prev.check(self.cell.hidden_size)?;

        // (batch, features) -> (1, batch, features): one lane, batch steps
        let sequence = features.f_unsqueeze(0)?;
        let steps = sequence.size()[1];

        let mut state = prev.shallow_clone();
        let mut outputs = Vec::with_capacity(steps as usize);
        for t in 0..steps {
            let row = sequence.f_select(1, t)?;
            state = self.cell.step(&row, &state)?;
            outputs.push(state.hidden.shallow_clone());
        }

        // (1, batch, hidden) -> (batch, hidden)
        let output = Tensor::f_stack(&outputs, 1)?.f_reshape([-1, self.cell.hidden_size])?;
        Ok((output, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tch::IndexOp;

    fn memory(input_size: i64) -> (ParameterRegistry, RecurrentMemory) {
        let mut registry = ParameterRegistry::new(Device::Cpu);
        let memory = RecurrentMemory::new(&mut registry, input_size, MEMORY_SIZE).unwrap();
        (registry, memory)
    }

    #[test]
    fn test_two_parameter_groups() {
        let (registry, memory) = memory(512);
        assert_eq!(memory.cell().input_size(), 512);
        assert_eq!(memory.hidden_size(), 256);
        assert_eq!(registry.names(), ["lstm.kernel", "lstm.bias"]);
        let params = registry.parameters();
        assert_eq!(params[0].1.size(), vec![512 + 256, 1024]);
        assert_eq!(params[1].1.size(), vec![1024]);
    }

    #[test]
    fn test_single_row_matches_single_step() {
        let (_registry, memory) = memory(16);
        let zero = RecurrentState::zeros(MEMORY_SIZE, Device::Cpu);
        let x = Tensor::rand([1, 16], (Kind::Float, Device::Cpu));

        let (output, state) = memory.run_one_step_per_row(&x, &zero).unwrap();
        let direct = memory.cell().step(&x, &zero).unwrap();

        assert_eq!(output.size(), vec![1, 256]);
        assert!(output.allclose(&direct.hidden, 1e-6, 1e-6, false));
        assert!(state.hidden.allclose(&direct.hidden, 1e-6, 1e-6, false));
        assert!(state.cell.allclose(&direct.cell, 1e-6, 1e-6, false));
    }

    #[test]
    fn test_batch_threads_state_through_rows() {
        let (_registry, memory) = memory(16);
        let start = RecurrentState {
            cell: Tensor::rand([1, 256], (Kind::Float, Device::Cpu)),
            hidden: Tensor::rand([1, 256], (Kind::Float, Device::Cpu)),
        };
        let x = Tensor::rand([5, 16], (Kind::Float, Device::Cpu));

        let (output, state) = memory.run_one_step_per_row(&x, &start).unwrap();
        assert_eq!(output.size(), vec![5, 256]);

        let mut expected = start.shallow_clone();
        for t in 0..5 {
            expected = memory.cell().step(&x.i(t..t + 1), &expected).unwrap();
            assert!(output
                .i(t..t + 1)
                .allclose(&expected.hidden, 1e-5, 1e-6, false));
        }
        assert!(state.cell.allclose(&expected.cell, 1e-5, 1e-6, false));
        assert!(state.hidden.allclose(&expected.hidden, 1e-5, 1e-6, false));
        assert_eq!(state.cell.size(), vec![1, 256]);
    }

    #[test]
    fn test_rejects_wrong_state_width() {
        let (_registry, memory) = memory(16);
        let bad = RecurrentState::zeros(128, Device::Cpu);
        let x = Tensor::rand([2, 16], (Kind::Float, Device::Cpu));
        assert_matches!(
            memory.run_one_step_per_row(&x, &bad),
            Err(PolicyNetError::ShapeMismatch { .. })
        );
    }

    #[test]
    fn test_step_rejects_mismatched_state_pair() {
        let (_registry, memory) = memory(16);
        let state = RecurrentState {
            cell: Tensor::zeros([1, 3], (Kind::Float, Device::Cpu)),
            hidden: Tensor::zeros([1, 256], (Kind::Float, Device::Cpu)),
        };
        let x = Tensor::rand([1, 16], (Kind::Float, Device::Cpu));
        assert_matches!(
            memory.cell().step(&x, &state),
            Err(PolicyNetError::ShapeMismatch { .. })
        );
    }

    #[test]
    fn test_detached_state_drops_gradient_history() {
        let (_registry, memory) = memory(16);
        let zero = RecurrentState::zeros(MEMORY_SIZE, Device::Cpu);
        let x = Tensor::rand([2, 16], (Kind::Float, Device::Cpu));
        let (_, state) = memory.run_one_step_per_row(&x, &zero).unwrap();
        assert!(state.hidden.requires_grad());

        let detached = state.detach();
        assert!(!detached.hidden.requires_grad());
        assert!(!detached.cell.requires_grad());
        assert!(detached.cell.allclose(&state.cell, 1e-7, 1e-7, false));
    }

    #[test]
    fn test_rejects_wrong_feature_width() {
        let (_registry, memory) = memory(16);
        let zero = RecurrentState::zeros(MEMORY_SIZE, Device::Cpu);
        let x = Tensor::rand([2, 15], (Kind::Float, Device::Cpu));
        assert_matches!(
            memory.run_one_step_per_row(&x, &zero),
            Err(PolicyNetError::ShapeMismatch { .. })
        );
    }

    #[test]
    fn test_zero_input_keeps_forget_gate_open() {
        let (_registry, memory) = memory(4);
        let state = RecurrentState {
            cell: Tensor::ones([1, 256], (Kind::Float, Device::Cpu)),
            hidden: Tensor::zeros([1, 256], (Kind::Float, Device::Cpu)),
        };
        let x = Tensor::zeros([1, 4], (Kind::Float, Device::Cpu));
        let next = memory.cell().step(&x, &state).unwrap();
        // zero input and hidden leave only the bias: c' = sigmoid(1) + 0.5 * tanh(0)
        let expected = 1.0f64 / (1.0 + (-1.0f64).exp());
        let got = next.cell.mean(Kind::Float).double_value(&[]);
        assert!((got - expected).abs() < 1e-5);
    }
}
