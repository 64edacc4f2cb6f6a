//! Tag resolution and tag writing
//!
//! - [`resolver`] turns remote metadata into a [`TagSet`](crate::types::TagSet)
//!   according to the run's [`TagMode`](crate::types::TagMode)
//! - [`prompt`] asks the user for values in manual mode
//! - [`writer`] writes a `TagSet` into a finished audio file

pub mod prompt;
pub mod resolver;
pub mod writer;

pub use prompt::{Prompter, StdioPrompter};
pub use resolver::TagResolver;
pub use writer::append_tags;
