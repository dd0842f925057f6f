/// Implement [`Record`](crate::reflect::Record) and
/// [`Assign`](crate::reflect::Assign) for a struct of scalar fields.
///
/// Every listed field must convert into a [`Value`](crate::value::Value)
/// with `From` and back with `TryFrom`. Nested records and collections are
/// not covered; implement `Record` by hand for those types.
///
/// # Usage
///
/// ```rust,ignore
/// use crudkit::impl_record;
///
/// #[derive(Default)]
/// pub struct Order {
///     pub id: i64,
///     pub owner_id: i64,
/// }
///
/// impl_record!(Order { id, owner_id });
/// ```
#[macro_export]
macro_rules! impl_record {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl $crate::reflect::Record for $ty {
            fn type_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn field(&self, name: &str) -> ::std::option::Option<$crate::reflect::Field<'_>> {
                match name {
                    $(
                        stringify!($field) => ::std::option::Option::Some(
                            $crate::reflect::Field::Value($crate::value::Value::from(
                                ::std::clone::Clone::clone(&self.$field),
                            )),
                        ),
                    )*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl $crate::reflect::Assign for $ty {
            fn assign(
                &mut self,
                name: &str,
                value: $crate::value::Value,
            ) -> ::std::result::Result<(), $crate::reflect::ReflectError> {
                match name {
                    $(
                        stringify!($field) => match ::std::convert::TryFrom::try_from(value) {
                            ::std::result::Result::Ok(converted) => {
                                self.$field = converted;
                                ::std::result::Result::Ok(())
                            }
                            ::std::result::Result::Err(source) => {
                                ::std::result::Result::Err($crate::reflect::ReflectError::Value {
                                    property: stringify!($field),
                                    source,
                                })
                            }
                        },
                    )*
                    _ => ::std::result::Result::Err($crate::reflect::ReflectError::UnknownProperty {
                        type_name: stringify!($ty),
                        property: name.to_string(),
                    }),
                }
            }
        }
    };
}
