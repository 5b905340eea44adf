pub mod activation;
pub mod config;
pub mod feature_extractor;
pub mod init;
pub mod layers;
pub mod policy_network;
pub mod recurrent;
pub mod registry;

// Re-export key components for convenience
pub use activation::Activation;
pub use config::NetworkConfig;
pub use feature_extractor::FeatureExtractor;
pub use init::{InitScheme, LayerKind, LayerShape};
pub use layers::{BiasMode, ConvLayer, DenseLayer};
pub use policy_network::{NetworkOutput, NetworkSummary, PolicyNetwork};
pub use recurrent::{LstmCell, RecurrentMemory, RecurrentState, MEMORY_SIZE};
pub use registry::ParameterRegistry;
