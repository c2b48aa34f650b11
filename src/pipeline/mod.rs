//! Pipeline module - the cleaning stages and their orchestration

mod columns;
pub mod completeness;
pub mod correlation;
pub mod dedup;
pub mod loader;
pub mod missing;
pub mod orchestrator;
pub mod rules;
pub mod schema;
pub mod transform;
pub mod winsorize;

pub use columns::parse_bool;
pub use completeness::*;
pub use correlation::*;
pub use dedup::*;
pub use loader::*;
pub use missing::*;
pub use orchestrator::*;
pub use rules::*;
pub use schema::*;
pub use transform::*;
pub use winsorize::*;
