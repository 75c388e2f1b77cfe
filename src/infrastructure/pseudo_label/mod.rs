//! Pseudo-label generation

mod generator;

pub use generator::{PseudoLabelConfig, PseudoLabelGenerator};
