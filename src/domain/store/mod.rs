//! Document store capability interface

mod provider;

pub use provider::{
    DeleteDocumentsResult, DeleteTarget, DocumentStore, DuplicatePolicy, WriteDocumentsResult,
};
