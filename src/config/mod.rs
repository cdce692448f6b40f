//! Configuration file handling

mod settings;

pub use settings::*;
