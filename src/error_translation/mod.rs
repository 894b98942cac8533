pub mod extractor;

pub use extractor::{BuildErrorExtractor, ErrorExtractor};
