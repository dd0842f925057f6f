//! Queryable entity sources that accept permission filters.

mod memory;
mod select;

pub use memory::MemoryQuery;
pub use select::to_condition;

use crate::predicate::{Predicate, PredicateError};

/// A not-yet-materialized query that row filters can be pushed onto.
///
/// Filters accumulate: calling [`filter_by`](Filterable::filter_by) several
/// times yields the rows matching all of the predicates.
pub trait Filterable: Sized {
    /// Restrict the query to rows matching `predicate`.
    ///
    /// # Errors
    /// Returns `PredicateError` if the predicate cannot be expressed for this
    /// source.
    fn filter_by(self, predicate: &Predicate) -> Result<Self, PredicateError>;

    /// A query over the same source that yields no rows.
    #[must_use]
    fn none(self) -> Self;
}
