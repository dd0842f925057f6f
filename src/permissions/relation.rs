use std::fmt;
use std::marker::PhantomData;

use crate::predicate::{CollectionLink, FieldPath, Predicate, PredicateError};
use crate::reflect::Record;
use crate::value::Value;

/// A structural link between a secured entity and a user.
///
/// Built once while configuring permissions and reused for every check.
/// The reference variant compares a single user key on the entity, the
/// collection variant looks for the user among the items of a collection.
pub struct UserRelation<E> {
    kind: RelationKind,
    /// Path from the entity to the record the relation was declared on
    prefix: Option<FieldPath>,
    _entity: PhantomData<fn(&E)>,
}

#[derive(Debug, Clone, PartialEq)]
enum RelationKind {
    Reference {
        accessor: FieldPath,
    },
    Collection {
        collection: FieldPath,
        item: FieldPath,
        link: Option<CollectionLink>,
    },
}

impl<E> UserRelation<E> {
    /// The entity holds the user key directly, e.g. `owner_id`.
    pub fn reference(accessor: impl Into<FieldPath>) -> Self {
        Self::new(RelationKind::Reference {
            accessor: accessor.into(),
        })
    }

    /// The user key is held by an item of a collection, e.g. `members` /
    /// `user_id`.
    pub fn collection(collection: impl Into<FieldPath>, item: impl Into<FieldPath>) -> Self {
        Self::new(RelationKind::Collection {
            collection: collection.into(),
            item: item.into(),
            link: None,
        })
    }

    /// Describe how collection items are stored so the relation can be
    /// compiled into SQL. Has no effect on reference relations.
    #[must_use]
    pub fn with_link(mut self, link: CollectionLink) -> Self {
        if let RelationKind::Collection { link: slot, .. } = &mut self.kind {
            *slot = Some(link);
        }
        self
    }

    /// Reuse this relation for an entity `P` that reaches `E` through `path`.
    ///
    /// # Arguments
    /// * `path` - Field path from `P` to the `E` record, e.g. `project`
    ///
    /// # Returns
    /// The same relation, re-rooted on `P`
    ///
    /// # Errors
    /// Returns `UnsupportedExpressionKind` for an empty path.
    pub fn through<P>(&self, path: impl Into<FieldPath>) -> Result<UserRelation<P>, PredicateError> {
        let path = path.into();
        if path.is_empty() {
            return Err(PredicateError::UnsupportedExpressionKind(
                "relation relocated through an empty path".to_string(),
            ));
        }

        let prefix = match &self.prefix {
            Some(existing) => path.join(existing),
            None => path,
        };
        Ok(UserRelation {
            kind: self.kind.clone(),
            prefix: Some(prefix),
            _entity: PhantomData,
        })
    }

    /// Predicate matching entities related to `user_id`.
    ///
    /// # Arguments
    /// * `user_id` - Key of the current user
    ///
    /// # Returns
    /// `accessor == user_id` for references, `any(collection, item == user_id)`
    /// for collections
    #[must_use]
    pub fn build_predicate(&self, user_id: &Value) -> Predicate {
        let predicate = match &self.kind {
            RelationKind::Reference { accessor } => Predicate::Eq {
                path: accessor.clone(),
                value: user_id.clone(),
            },
            RelationKind::Collection {
                collection,
                item,
                link,
            } => Predicate::Any {
                collection: collection.clone(),
                item: Box::new(Predicate::Eq {
                    path: item.clone(),
                    value: user_id.clone(),
                }),
                link: link.clone(),
            },
        };

        match &self.prefix {
            Some(prefix) => predicate.prefixed(prefix),
            None => predicate,
        }
    }

    /// Check if `entity` is related to `user_id`.
    ///
    /// # Arguments
    /// * `entity` - The in-memory entity to test
    /// * `user_id` - Key of the current user
    ///
    /// # Returns
    /// `true` if the relation's predicate holds for the entity
    ///
    /// # Errors
    /// Returns `PredicateError` if the relation's paths do not fit the entity.
    pub fn test_user(&self, entity: &E, user_id: &Value) -> Result<bool, PredicateError>
    where
        E: Record,
    {
        self.build_predicate(user_id).evaluate(entity)
    }

    fn new(kind: RelationKind) -> Self {
        Self {
            kind,
            prefix: None,
            _entity: PhantomData,
        }
    }
}

impl<E> Clone for UserRelation<E> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            prefix: self.prefix.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for UserRelation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRelation")
            .field("kind", &self.kind)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// OR-combine predicates left to right.
///
/// Returns `None` for an empty input; callers must treat that as "no rows".
pub fn combine(predicates: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
    predicates.into_iter().reduce(Predicate::or)
}
