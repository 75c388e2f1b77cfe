//! Infrastructure layer - Concrete components and services

pub mod evaluation;
pub mod logging;
pub mod pipeline;
pub mod pseudo_label;
pub mod reading;
pub mod retrieval;
pub mod store;
