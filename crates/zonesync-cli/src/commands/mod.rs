pub mod common;
pub mod completions;
pub mod simulate;
pub mod status;
pub mod token;
