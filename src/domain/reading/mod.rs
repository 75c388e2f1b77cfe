//! Reading capability interface

mod scorer;

pub use scorer::ReadingScorer;

#[cfg(test)]
pub use scorer::MockReadingScorer;
