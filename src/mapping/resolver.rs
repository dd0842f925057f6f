use tracing::trace;

use crate::reflect::{PropertyInfo, TypeInfo};

use super::{MappingError, MappingMode, PropertyPair};

/// Resolve the key property pairs between `model` and `view_model`.
///
/// Strategies, first applicable wins:
/// 1. a view-model property annotated with `key_mapping`,
/// 2. the model's `primary_key` property, matched by name and type,
/// 3. a property named `id` on both sides, ignoring case.
pub(crate) fn resolve_key(
    model: &TypeInfo,
    view_model: &TypeInfo,
) -> Result<Vec<PropertyPair>, MappingError> {
    if let Some(pairs) = annotated_key(model, view_model)? {
        return Ok(pairs);
    }
    if let Some(pairs) = primary_key(model, view_model)? {
        return Ok(pairs);
    }
    conventional_key(model, view_model)
}

fn annotated_key(
    model: &TypeInfo,
    view_model: &TypeInfo,
) -> Result<Option<Vec<PropertyPair>>, MappingError> {
    let annotated = single(
        view_model
            .mappable()
            .filter_map(|property| property.key_mapping.map(|source| (property, source))),
        view_model,
    )?;
    let Some((property, source)) = annotated else {
        return Ok(None);
    };

    let Some(model_property) = model.find(source) else {
        return Err(MappingError::MappedPropertyNotFound {
            view_model: view_model.name,
            property: property.name,
            model: model.name,
            model_property: source,
        });
    };
    if !model_property.same_type(property) {
        return Err(MappingError::TypeMismatch {
            model: model.name,
            model_property: model_property.name,
            view_model: view_model.name,
            property: property.name,
        });
    }

    Ok(Some(vec![PropertyPair::new(model_property.name, property.name)]))
}

fn primary_key(
    model: &TypeInfo,
    view_model: &TypeInfo,
) -> Result<Option<Vec<PropertyPair>>, MappingError> {
    let Some(key) = single(model.mappable().filter(|property| property.primary_key), model)?
    else {
        return Ok(None);
    };

    Ok(view_model
        .find(key.name)
        .filter(|property| property.same_type(key))
        .map(|property| vec![PropertyPair::new(key.name, property.name)]))
}

fn conventional_key(
    model: &TypeInfo,
    view_model: &TypeInfo,
) -> Result<Vec<PropertyPair>, MappingError> {
    let id = |info: &TypeInfo| {
        info.mappable()
            .find(|property| property.name.eq_ignore_ascii_case("id"))
            .cloned()
    };

    match (id(model), id(view_model)) {
        (Some(key), Some(property)) if key.same_type(&property) => {
            Ok(vec![PropertyPair::new(key.name, property.name)])
        }
        _ => Err(MappingError::UnresolvableKey {
            model: model.name,
            view_model: view_model.name,
        }),
    }
}

/// At most one item, or `AmbiguousKeyMapping` naming `owner`.
fn single<T>(
    mut candidates: impl Iterator<Item = T>,
    owner: &TypeInfo,
) -> Result<Option<T>, MappingError> {
    let first = candidates.next();
    if candidates.next().is_some() {
        return Err(MappingError::AmbiguousKeyMapping {
            type_name: owner.name,
        });
    }
    Ok(first)
}

/// Resolve the property pairs copied in `mode`.
///
/// A view-model property takes part when its mode (explicit, else the
/// type's default, else `ALL`) contains `mode`. Its model counterpart is the
/// property with the same or overridden name and the same type. Annotated
/// properties without a counterpart are an error; the rest are skipped.
pub(crate) fn resolve_mode(
    model: &TypeInfo,
    view_model: &TypeInfo,
    mode: MappingMode,
) -> Result<Vec<PropertyPair>, MappingError> {
    let default_mode = view_model.default_mode.unwrap_or_default();
    let mut pairs = Vec::new();

    for property in view_model.mappable() {
        let property_mode = property
            .map_from
            .and_then(|annotation| annotation.mode)
            .unwrap_or(default_mode);
        if !property_mode.contains(mode) {
            continue;
        }

        let source = property
            .map_from
            .and_then(|annotation| annotation.source)
            .unwrap_or(property.name);

        match counterpart(model, source, property) {
            Some(model_property) => {
                pairs.push(PropertyPair::new(model_property.name, property.name));
            }
            None if property.map_from.is_some() => {
                return Err(MappingError::MappedPropertyNotFound {
                    view_model: view_model.name,
                    property: property.name,
                    model: model.name,
                    model_property: source,
                });
            }
            None => trace!(
                "{}.{} has no counterpart on {}, skipped",
                view_model.name,
                property.name,
                model.name
            ),
        }
    }

    Ok(pairs)
}

fn counterpart<'a>(
    model: &'a TypeInfo,
    source: &str,
    property: &PropertyInfo,
) -> Option<&'a PropertyInfo> {
    model
        .find(source)
        .filter(|model_property| model_property.same_type(property))
}
