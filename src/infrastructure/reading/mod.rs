//! Reading components

mod reader;

pub use reader::{Reader, ReaderConfig};
