//! Command-line front end

mod commands;

pub use commands::*;
