//! Document conversion library: TXT/PDF to chaptered JSON, Markdown and plain text

pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod processing;
pub mod output;

pub use config::{BatchConfig, Config};
pub use error::{ConversionWarning, ConvertError, Result};
pub use processing::pipeline::Pipeline;
