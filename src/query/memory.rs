use crate::predicate::{Predicate, PredicateError};
use crate::reflect::Record;

use super::Filterable;

/// Lazily filtered in-memory collection.
///
/// Predicates are stored as they are pushed and only evaluated by
/// [`into_vec`](MemoryQuery::into_vec).
#[derive(Debug, Clone)]
pub struct MemoryQuery<T> {
    items: Vec<T>,
    predicates: Vec<Predicate>,
    empty: bool,
}

impl<T: Record> MemoryQuery<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
            predicates: Vec::new(),
            empty: false,
        }
    }

    /// Materialize the rows matching every pushed predicate.
    ///
    /// # Errors
    /// Returns the first `PredicateError` hit while evaluating.
    pub fn into_vec(self) -> Result<Vec<T>, PredicateError> {
        if self.empty {
            return Ok(Vec::new());
        }

        let mut rows = Vec::with_capacity(self.items.len());
        'items: for item in self.items {
            for predicate in &self.predicates {
                if !predicate.evaluate(&item)? {
                    continue 'items;
                }
            }
            rows.push(item);
        }
        Ok(rows)
    }
}

impl<T: Record> Filterable for MemoryQuery<T> {
    fn filter_by(mut self, predicate: &Predicate) -> Result<Self, PredicateError> {
        self.predicates.push(predicate.clone());
        Ok(self)
    }

    fn none(mut self) -> Self {
        self.empty = true;
        self
    }
}
