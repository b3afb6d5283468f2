//! Stage specifications and the argument splitter.
//!
//! A stage is one external program in the pipeline. This module turns the
//! tool's flat argument vector into an ordered list of [`StageSpec`]s.

mod resolver;
mod spec;
mod splitter;

pub use resolver::{CommandResolver, FixedResolver, PathResolver};
pub use spec::StageSpec;
pub use splitter::StageSplitter;
