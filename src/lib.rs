//! # A3C Network Library
//!
//! Policy/value network for asynchronous advantage actor-critic workers,
//! built on `tch`.
//!
//! ## Features
//!
//! - **Layer builders**: convolution and dense layers with Glorot-style
//!   bounded-uniform initialisation and 0.1 biases
//! - **Feature extractor**: four 3x3 stride-2 ELU convolutions
//! - **Recurrent memory**: LSTM memory threaded through a batch one row per step
//! - **Policy network**: policy logits and value heads over the memory output
//!
//! ## Usage
//!
//! ```no_run
//! use a3c_network::{NetworkConfig, PolicyNetwork};
//! use tch::{Device, Kind, Tensor};
//!
//! let net = PolicyNetwork::new(NetworkConfig::new(4, (84, 84, 3)))?;
//! let states = Tensor::zeros([1, 84, 84, 3], (Kind::Float, Device::Cpu));
//! let out = net.forward(&states, net.initial_state())?;
//! let next_state = out.state;
//! # Ok::<(), a3c_network::PolicyNetError>(())
//! ```

// ============================================================================
// PUBLIC API MODULES
// ============================================================================

/// Network components
pub mod neural;

/// Logger setup for binaries
pub mod logging;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use neural::*;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Main error type for the library
#[derive(Debug, thiserror::Error)]
pub enum PolicyNetError {
    #[error("Shape {shape:?} is invalid for a {layer} layer: must have length {expected}")]
    ShapeArity {
        layer: LayerKind,
        shape: Vec<i64>,
        expected: usize,
    },

    #[error(
        "Layer {layer} collapses its input: dimension {input} with kernel {kernel} and stride {stride}"
    )]
    DimensionCollapse {
        layer: String,
        input: i64,
        kernel: i64,
        stride: i64,
    },

    #[error("Shape mismatch for {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<i64>,
        actual: Vec<i64>,
    },

    #[error("Parameter {0} is already registered")]
    DuplicateParameter(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tensor error: {0}")]
    Tensor(#[from] tch::TchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PolicyNetError>;

// ============================================================================
// LIBRARY VERSION INFO
// ============================================================================

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
