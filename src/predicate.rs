//! Boolean predicates over [`Record`]s.
//!
//! Predicates are built parameter-agnostic: every field reference is a
//! dotted path from the root record, so a predicate written for one type can
//! be embedded into a predicate over another type with
//! [`Predicate::relocate`]. The same tree is evaluated in memory and compiled
//! into SQL conditions by the `query` module.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::reflect::{Field, Record};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    #[error("Type {type_name} has no field '{field}'")]
    UnknownField {
        type_name: &'static str,
        field: String,
    },
    #[error("Unsupported expression: {0}")]
    UnsupportedExpressionKind(String),
    #[error("Entity has no column '{0}'")]
    UnknownColumn(String),
}

/// Dotted path to a field, e.g. `project.owner_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self` followed by `other`.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        Self(self.0.iter().chain(other.0.iter()).cloned().collect())
    }

    /// The only segment of a single-segment path.
    #[must_use]
    pub fn single(&self) -> Option<&str> {
        match self.0.as_slice() {
            [segment] => Some(segment),
            _ => None,
        }
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// How the items of a collection are stored relationally, needed to turn an
/// [`Predicate::Any`] into a SQL sub-query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionLink {
    /// Table holding the collection items
    pub table: String,
    /// Column of the item table referencing the parent
    pub foreign_key: String,
    /// Column of the parent table the foreign key points at
    pub parent_key: String,
}

impl CollectionLink {
    pub fn new(
        table: impl Into<String>,
        foreign_key: impl Into<String>,
        parent_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            foreign_key: foreign_key.into(),
            parent_key: parent_key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Const(bool),
    /// `path == value`
    Eq { path: FieldPath, value: Value },
    /// Some item of the collection at `collection` satisfies `item`.
    /// The item predicate's paths start at the item, not at the root.
    Any {
        collection: FieldPath,
        item: Box<Predicate>,
        link: Option<CollectionLink>,
    },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn equals(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Self::Eq {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn any(collection: impl Into<FieldPath>, item: Self) -> Self {
        Self::Any {
            collection: collection.into(),
            item: Box::new(item),
            link: None,
        }
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut predicates) => {
                predicates.push(other);
                Self::And(predicates)
            }
            first => Self::And(vec![first, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut predicates) => {
                predicates.push(other);
                Self::Or(predicates)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Re-root this predicate under `prefix`.
    ///
    /// Evaluating the result against an outer record gives the same answer as
    /// evaluating `self` against the record reached through `prefix`.
    ///
    /// # Errors
    /// Returns `UnsupportedExpressionKind` for an empty prefix.
    pub fn relocate(&self, prefix: &FieldPath) -> Result<Self, PredicateError> {
        if prefix.is_empty() {
            return Err(PredicateError::UnsupportedExpressionKind(
                "relocation through an empty path".to_string(),
            ));
        }
        Ok(self.prefixed(prefix))
    }

    pub(crate) fn prefixed(&self, prefix: &FieldPath) -> Self {
        match self {
            Self::Const(value) => Self::Const(*value),
            Self::Eq { path, value } => Self::Eq {
                path: prefix.join(path),
                value: value.clone(),
            },
            Self::Any {
                collection,
                item,
                link,
            } => Self::Any {
                collection: prefix.join(collection),
                item: item.clone(),
                link: link.clone(),
            },
            Self::Not(inner) => Self::Not(Box::new(inner.prefixed(prefix))),
            Self::And(predicates) => {
                Self::And(predicates.iter().map(|p| p.prefixed(prefix)).collect())
            }
            Self::Or(predicates) => {
                Self::Or(predicates.iter().map(|p| p.prefixed(prefix)).collect())
            }
        }
    }

    /// Evaluate against an in-memory record.
    ///
    /// A path that crosses a null nested record compares as `false`.
    ///
    /// # Errors
    /// Returns `PredicateError` if a path names a missing field or navigates
    /// through a scalar or a collection.
    pub fn evaluate(&self, record: &dyn Record) -> Result<bool, PredicateError> {
        match self {
            Self::Const(value) => Ok(*value),
            Self::Eq { path, value } => match walk(record, path)? {
                None => Ok(false),
                Some(Field::Value(actual)) => Ok(&actual == value),
                Some(_) => Err(PredicateError::UnsupportedExpressionKind(format!(
                    "'{path}' is not a scalar field"
                ))),
            },
            Self::Any {
                collection, item, ..
            } => match walk(record, collection)? {
                None => Ok(false),
                Some(Field::Records(items)) => {
                    for candidate in items {
                        if item.evaluate(candidate)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Some(_) => Err(PredicateError::UnsupportedExpressionKind(format!(
                    "'{collection}' is not a collection"
                ))),
            },
            Self::Not(inner) => Ok(!inner.evaluate(record)?),
            Self::And(predicates) => {
                for predicate in predicates {
                    if !predicate.evaluate(record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(predicates) => {
                for predicate in predicates {
                    if predicate.evaluate(record)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

impl std::ops::Not for Predicate {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

/// Follow `path` from `record`. `Ok(None)` means a null nested record was hit.
fn walk<'a>(record: &'a dyn Record, path: &FieldPath) -> Result<Option<Field<'a>>, PredicateError> {
    let Some((last, parents)) = path.segments().split_last() else {
        return Err(PredicateError::UnsupportedExpressionKind(
            "empty field path".to_string(),
        ));
    };

    let mut current = record;
    for segment in parents {
        match field(current, segment)? {
            Field::Record(Some(next)) => current = next,
            Field::Record(None) => return Ok(None),
            Field::Value(_) | Field::Records(_) => {
                return Err(PredicateError::UnsupportedExpressionKind(format!(
                    "cannot navigate through '{segment}' in '{path}'"
                )))
            }
        }
    }

    field(current, last).map(Some)
}

fn field<'a>(record: &'a dyn Record, name: &str) -> Result<Field<'a>, PredicateError> {
    record
        .field(name)
        .ok_or_else(|| PredicateError::UnknownField {
            type_name: record.type_name(),
            field: name.to_string(),
        })
}
