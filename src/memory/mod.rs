//! Advisory memory accounting for the index cache.

mod budget;

pub use budget::CacheBudget;
