//! Generative model adapters.

pub mod command;
pub mod presets;
pub mod trait_def;

pub use command::CommandModel;
pub use presets::{ModelPreset, ModelSpec, ModelSpecError, builtin_presets};
pub use trait_def::Model;
