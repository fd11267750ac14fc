/// Installs the `tracing` subscriber with console and rotated JSON file output.
pub mod loggerlocal;

pub use loggerlocal::{LoggerLocal, LoggerLocalOptions};
