//! Runtime property access for entities and view-models.
//!
//! Rust has no runtime reflection, so types opt in by implementing
//! [`Record`] (read access, including nested records and collections),
//! [`Assign`] (write access) and [`Reflect`] (declared property metadata and
//! mapping annotations). The [`impl_record!`](crate::impl_record) macro
//! derives `Record` and `Assign` for structs made of scalar fields.

mod macros;

use thiserror::Error;

use crate::mapping::MappingMode;
use crate::value::{HasKind, Value, ValueError, ValueKind};

/// A property read off a [`Record`].
pub enum Field<'a> {
    /// Scalar property value
    Value(Value),
    /// Nested record, `None` when the reference is null
    Record(Option<&'a dyn Record>),
    /// Collection of nested records
    Records(Vec<&'a dyn Record>),
}

/// Read access to the properties of an object by name.
pub trait Record {
    /// Name of the concrete type, used in error messages.
    fn type_name(&self) -> &'static str;

    /// Look up a property by name.
    ///
    /// # Returns
    /// `None` if the type has no property with this name
    fn field(&self, name: &str) -> Option<Field<'_>>;
}

/// Write access to scalar properties by name.
pub trait Assign {
    /// Set a scalar property.
    ///
    /// # Errors
    /// Returns `ReflectError` if the property does not exist or the value has
    /// the wrong type.
    fn assign(&mut self, name: &str, value: Value) -> Result<(), ReflectError>;
}

/// Type-level property metadata used by the view-model mapper.
pub trait Reflect: Record + Assign + 'static {
    fn type_info() -> TypeInfo;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReflectError {
    #[error("Type {type_name} has no property '{property}'")]
    UnknownProperty {
        type_name: &'static str,
        property: String,
    },
    #[error("Invalid value for property '{property}': {source}")]
    Value {
        property: &'static str,
        source: ValueError,
    },
}

/// Mapping annotation carried by a view-model property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapFrom {
    /// Model property name, defaults to the view-model property's own name
    pub source: Option<&'static str>,
    /// Modes the property participates in, defaults to the type's default mode
    pub mode: Option<MappingMode>,
}

/// Declared metadata of a single property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub kind: ValueKind,
    pub nullable: bool,
    pub readable: bool,
    pub writable: bool,
    /// Model side: the property is the entity's primary key
    pub primary_key: bool,
    /// View-model side: the property holds the value of this model key property
    pub key_mapping: Option<&'static str>,
    pub map_from: Option<MapFrom>,
}

impl PropertyInfo {
    #[must_use]
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            readable: true,
            writable: true,
            primary_key: false,
            key_mapping: None,
            map_from: None,
        }
    }

    /// Property whose declared kind and nullability come from `T`.
    #[must_use]
    pub const fn of<T: HasKind>(name: &'static str) -> Self {
        let mut property = Self::new(name, T::KIND);
        property.nullable = T::NULLABLE;
        property
    }

    /// Property declared from a struct field, so the declared type cannot
    /// drift from the field's real type.
    ///
    /// # Usage
    ///
    /// ```rust,ignore
    /// TypeInfo::new("Order")
    ///     .property(PropertyInfo::field("total", |order: &Order| &order.total))
    /// ```
    #[must_use]
    pub const fn field<S, T: HasKind>(name: &'static str, _field: fn(&S) -> &T) -> Self {
        Self::of::<T>(name)
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    #[must_use]
    pub const fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub const fn key_mapping(mut self, model_property: &'static str) -> Self {
        self.key_mapping = Some(model_property);
        self
    }

    /// Map this property from a differently named model property.
    #[must_use]
    pub fn map_from(mut self, source: &'static str) -> Self {
        self.map_from.get_or_insert_with(MapFrom::default).source = Some(source);
        self
    }

    /// Restrict the mapping modes this property participates in.
    #[must_use]
    pub fn mode(mut self, mode: MappingMode) -> Self {
        self.map_from.get_or_insert_with(MapFrom::default).mode = Some(mode);
        self
    }

    /// Whether the property can take part in mapping at all.
    #[must_use]
    pub const fn is_mappable(&self) -> bool {
        self.readable && self.writable
    }

    /// Whether both properties declare the identical type, integer width
    /// and nullability included.
    #[must_use]
    pub fn same_type(&self, other: &Self) -> bool {
        self.kind == other.kind && self.nullable == other.nullable
    }
}

/// Declared metadata of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: &'static str,
    pub properties: Vec<PropertyInfo>,
    /// Mode for properties without an explicit one, `ALL` when unset
    pub default_mode: Option<MappingMode>,
}

impl TypeInfo {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            properties: Vec::new(),
            default_mode: None,
        }
    }

    #[must_use]
    pub fn property(mut self, property: PropertyInfo) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn default_mode(mut self, mode: MappingMode) -> Self {
        self.default_mode = Some(mode);
        self
    }

    /// Properties that are both readable and writable.
    pub fn mappable(&self) -> impl Iterator<Item = &PropertyInfo> {
        self.properties.iter().filter(|p| p.is_mappable())
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&PropertyInfo> {
        self.mappable().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Invoice {
        id: i64,
        number: String,
        paid: bool,
        note: Option<String>,
    }

    crate::impl_record!(Invoice {
        id,
        number,
        paid,
        note
    });

    #[test]
    fn test_record_reads_fields() {
        let invoice = Invoice {
            id: 3,
            number: "INV-3".to_string(),
            paid: true,
            note: None,
        };

        assert_eq!(invoice.type_name(), "Invoice");
        assert!(matches!(invoice.field("id"), Some(Field::Value(Value::Int(3)))));
        assert!(matches!(invoice.field("note"), Some(Field::Value(Value::Null))));
        assert!(invoice.field("missing").is_none());
    }

    #[test]
    fn test_assign_converts_values() {
        let mut invoice = Invoice::default();

        invoice.assign("number", Value::from("INV-9")).unwrap();
        invoice.assign("note", Value::from("late")).unwrap();
        invoice.assign("paid", Value::Bool(true)).unwrap();

        assert_eq!(invoice.number, "INV-9");
        assert_eq!(invoice.note.as_deref(), Some("late"));
        assert!(invoice.paid);
    }

    #[test]
    fn test_assign_rejects_unknown_and_mistyped() {
        let mut invoice = Invoice::default();

        assert_eq!(
            invoice.assign("total", Value::Int(1)),
            Err(ReflectError::UnknownProperty {
                type_name: "Invoice",
                property: "total".to_string(),
            })
        );
        assert!(matches!(
            invoice.assign("id", Value::from("x")),
            Err(ReflectError::Value { property: "id", .. })
        ));
    }

    #[test]
    fn test_declared_kind_follows_the_field() {
        let id = PropertyInfo::field("id", |invoice: &Invoice| &invoice.id);
        let note = PropertyInfo::field("note", |invoice: &Invoice| &invoice.note);

        assert_eq!(id, PropertyInfo::new("id", ValueKind::Int64));
        assert_eq!(note, PropertyInfo::new("note", ValueKind::Text).nullable());
        assert!(!PropertyInfo::of::<i32>("id").same_type(&id));
        assert!(!PropertyInfo::of::<String>("note").same_type(&note));
    }

    #[test]
    fn test_property_annotations() {
        let info = TypeInfo::new("InvoiceForm")
            .property(PropertyInfo::new("id", ValueKind::Int64).read_only())
            .property(
                PropertyInfo::new("label", ValueKind::Text)
                    .map_from("number")
                    .mode(MappingMode::FROM_CREATE),
            );

        assert!(info.find("id").is_none());
        let label = info.find("label").unwrap();
        assert_eq!(
            label.map_from,
            Some(MapFrom {
                source: Some("number"),
                mode: Some(MappingMode::FROM_CREATE),
            })
        );
    }
}
