use std::collections::HashSet;

use tracing::trace;

use crate::predicate::Predicate;
use crate::reflect::{Assign, Field, Record, Reflect, ReflectError};
use crate::value::Value;

use super::{MappingCache, MappingError, MappingMode, PropertyPair, ViewModel};

/// Copies values between entities and their view-models.
///
/// `allowed`, where accepted, restricts copying to the listed model
/// properties; `None` copies every mapped property.
#[derive(Clone, Copy)]
pub struct ViewModelMapper<'a> {
    cache: &'a MappingCache,
}

impl Default for ViewModelMapper<'static> {
    fn default() -> Self {
        Self::new(MappingCache::shared())
    }
}

impl<'a> ViewModelMapper<'a> {
    #[must_use]
    pub const fn new(cache: &'a MappingCache) -> Self {
        Self { cache }
    }

    /// Build the details view-model of `entity`.
    ///
    /// # Arguments
    /// * `entity` - The entity to read from
    /// * `allowed` - Model properties that may be copied, `None` for all
    ///
    /// # Returns
    /// The view-model from [`ViewModel::from_model`] when it provides one,
    /// otherwise a default view-model filled through the details mapping
    ///
    /// # Errors
    /// Returns `MappingError` if the mapping cannot be resolved or a value
    /// does not fit the view-model.
    pub fn entity_to_view_model<M, V>(
        &self,
        entity: &M,
        allowed: Option<&HashSet<String>>,
    ) -> Result<V, MappingError>
    where
        M: Reflect,
        V: ViewModel<M>,
    {
        if let Some(view_model) = V::from_model(entity) {
            trace!("{} built its own view-model", entity.type_name());
            return Ok(view_model);
        }

        let pairs = self.cache.mode_mapping::<M, V>(MappingMode::TO_DETAILS)?;
        let mut view_model = V::default();
        for pair in pairs.iter().filter(|pair| is_allowed(allowed, pair)) {
            let value = read_scalar(entity, pair.model)?;
            view_model.assign(pair.view_model, value)?;
        }
        Ok(view_model)
    }

    /// Copy the create-mode properties of `view_model` into a new entity.
    ///
    /// # Arguments
    /// * `entity` - The freshly constructed entity to fill
    /// * `view_model` - The submitted create view-model
    /// * `allowed` - Model properties that may be written, `None` for all
    ///
    /// # Errors
    /// Returns `MappingError` if the mapping cannot be resolved or a value
    /// does not fit the entity. `entity` is left untouched on error.
    pub fn initialize_new_entity<M, V>(
        &self,
        entity: &mut M,
        view_model: &V,
        allowed: Option<&HashSet<String>>,
    ) -> Result<(), MappingError>
    where
        M: Reflect + Clone,
        V: Reflect,
    {
        let pairs = self.cache.mode_mapping::<M, V>(MappingMode::FROM_CREATE)?;
        copy_into_entity(&pairs, entity, view_model, allowed)
    }

    /// Copy the update-mode properties of `view_model` into `entity`.
    ///
    /// # Arguments
    /// * `entity` - The stored entity to update
    /// * `view_model` - The submitted update view-model
    /// * `allowed` - Model properties that may be written, `None` for all
    ///
    /// # Errors
    /// Returns `MappingError` if the mapping cannot be resolved or a value
    /// does not fit the entity. `entity` is left untouched on error.
    pub fn update_existing_entity<M, V>(
        &self,
        entity: &mut M,
        view_model: &V,
        allowed: Option<&HashSet<String>>,
    ) -> Result<(), MappingError>
    where
        M: Reflect + Clone,
        V: Reflect,
    {
        let pairs = self.cache.mode_mapping::<M, V>(MappingMode::FROM_UPDATE)?;
        copy_into_entity(&pairs, entity, view_model, allowed)
    }

    /// Predicate selecting the entity `view_model` refers to by key.
    ///
    /// # Arguments
    /// * `view_model` - The view-model carrying the key values
    ///
    /// # Returns
    /// The conjunction of `model_key == view_model_key` over the key mapping
    ///
    /// # Errors
    /// Returns `MappingError` if no key mapping can be resolved.
    pub fn build_single_query_expression<M, V>(
        &self,
        view_model: &V,
    ) -> Result<Predicate, MappingError>
    where
        M: Reflect,
        V: Reflect,
    {
        let pairs = self.cache.key_mapping::<M, V>()?;

        let mut conditions = Vec::with_capacity(pairs.len());
        for pair in pairs.iter() {
            let value = read_scalar(view_model, pair.view_model)?;
            conditions.push(Predicate::equals(pair.model, value));
        }

        Ok(conditions
            .into_iter()
            .reduce(Predicate::and)
            .unwrap_or(Predicate::Const(false)))
    }
}

/// All-or-nothing copy: values are read first, then written to a copy of
/// `entity` that replaces it only when every write succeeded.
fn copy_into_entity<M, V>(
    pairs: &[PropertyPair],
    entity: &mut M,
    view_model: &V,
    allowed: Option<&HashSet<String>>,
) -> Result<(), MappingError>
where
    M: Assign + Clone,
    V: Record,
{
    let values = pairs
        .iter()
        .filter(|pair| is_allowed(allowed, pair))
        .map(|pair| Ok((pair.model, read_scalar(view_model, pair.view_model)?)))
        .collect::<Result<Vec<_>, MappingError>>()?;

    let mut staged = entity.clone();
    for (property, value) in values {
        staged.assign(property, value)?;
    }
    *entity = staged;
    Ok(())
}

fn is_allowed(allowed: Option<&HashSet<String>>, pair: &PropertyPair) -> bool {
    allowed.is_none_or(|allowed| allowed.contains(pair.model))
}

fn read_scalar<R: Record + ?Sized>(record: &R, property: &'static str) -> Result<Value, MappingError> {
    match record.field(property) {
        Some(Field::Value(value)) => Ok(value),
        Some(_) => Err(MappingError::NotScalar {
            type_name: record.type_name(),
            property,
        }),
        None => Err(ReflectError::UnknownProperty {
            type_name: record.type_name(),
            property: property.to_string(),
        }
        .into()),
    }
}
