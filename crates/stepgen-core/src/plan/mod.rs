//! Plans: generating free-form plan text and extracting file actions from it.

pub mod action;
pub mod generate;
pub mod parser;

pub use action::{FileAction, OperationKind};
pub use generate::{GenerationError, build_plan_prompt, generate_plan};
pub use parser::{PlanParseError, build_extraction_prompt, decode_actions, parse_plan};
