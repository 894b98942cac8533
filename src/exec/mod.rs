pub mod executor;

pub use executor::{BuildExecutor, CommandOutput, ExecError, ShellExecutor};
