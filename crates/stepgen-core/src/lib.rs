//! The stepgen step-generation pipeline.
//!
//! ```text
//! OutputStore --prior outputs--> context::assemble --ContextBundle-->
//!     plan::generate_plan --PlanText--> OutputStore::save_output
//!         |
//!         v
//!     plan::parse_plan --Vec<FileAction>--> apply::ApplyEngine --> ApplyReport
//! ```
//!
//! [`pipeline::StepPipeline`] drives one step through all stages;
//! [`init::initialize_project`] prepares the customized step templates the
//! pipeline later reads.

pub mod apply;
pub mod context;
pub mod init;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod steps;
pub mod template;

pub use stepgen_store::{OutputStore, ProjectLayout, StepId};
