pub mod logging;
pub mod text;

pub use logging::{init_default, init_logging};
