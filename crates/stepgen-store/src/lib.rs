//! Durable state for stepgen projects.
//!
//! A project keeps everything it owns under `<root>/.stepgen/`: the
//! customized step templates, one output file per generated step, and the
//! project config. This crate knows where those live ([`layout`]), how steps
//! are identified ([`models`]), and how step outputs are persisted
//! ([`outputs`]).

pub mod layout;
pub mod models;
pub mod outputs;

pub use layout::ProjectLayout;
pub use models::{StepId, StepIdParseError};
pub use outputs::{FsOutputStore, OutputStore, StoreError};
