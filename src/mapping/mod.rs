//! Copying values between entities and view-models.
//!
//! Which properties are copied is resolved once per `(model, view-model)`
//! type pair from the declared [`TypeInfo`](crate::reflect::TypeInfo) of both
//! sides and cached for the lifetime of the process.

mod cache;
mod converter;
mod resolver;

pub use cache::MappingCache;
pub use converter::ViewModelMapper;

use bitflags::bitflags;
use thiserror::Error;

use crate::reflect::{Reflect, ReflectError};

bitflags! {
    /// Directions a view-model property is copied in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MappingMode: u8 {
        /// Entity to view-model
        const TO_DETAILS = 1 << 0;
        /// View-model into a newly created entity
        const FROM_CREATE = 1 << 1;
        /// View-model into an existing entity
        const FROM_UPDATE = 1 << 2;
        const ALL = Self::TO_DETAILS.bits() | Self::FROM_CREATE.bits() | Self::FROM_UPDATE.bits();
    }
}

impl Default for MappingMode {
    fn default() -> Self {
        Self::ALL
    }
}

/// A model property and the view-model property it is copied to or from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPair {
    pub model: &'static str,
    pub view_model: &'static str,
}

impl PropertyPair {
    #[must_use]
    pub const fn new(model: &'static str, view_model: &'static str) -> Self {
        Self { model, view_model }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("More than one key property declared on {type_name}")]
    AmbiguousKeyMapping { type_name: &'static str },

    #[error("Cannot resolve a key mapping between {model} and {view_model}")]
    UnresolvableKey {
        model: &'static str,
        view_model: &'static str,
    },

    #[error("{view_model}.{property} is mapped from {model}.{model_property}, which does not exist")]
    MappedPropertyNotFound {
        view_model: &'static str,
        property: &'static str,
        model: &'static str,
        model_property: &'static str,
    },

    #[error("{model}.{model_property} and {view_model}.{property} have different types")]
    TypeMismatch {
        model: &'static str,
        model_property: &'static str,
        view_model: &'static str,
        property: &'static str,
    },

    #[error("{type_name}.{property} is not a scalar property")]
    NotScalar {
        type_name: &'static str,
        property: &'static str,
    },

    #[error(transparent)]
    Assign(#[from] ReflectError),
}

/// A view-model of entity type `M`.
pub trait ViewModel<M>: Reflect + Default {
    /// Build the view-model directly from the entity.
    ///
    /// Returning `Some` skips property copying entirely.
    fn from_model(_model: &M) -> Option<Self> {
        None
    }
}
