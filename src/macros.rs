/// Declares a native value type and generates its marshalling binding.
///
/// The macro emits the struct itself plus the [`FieldCodec`](crate::FieldCodec)
/// and [`ValueType`](crate::ValueType) implementations: the type's layout,
/// and the code that stores and loads its fields in declaration order. The
/// layout is derived from the same field list the codec walks, so the two
/// cannot drift apart.
///
/// Field types must implement [`FieldCodec`](crate::FieldCodec). A field whose
/// type is another value type is flattened inline; that type has to be
/// registered first.
///
/// ```rust
/// use crossbind::{value_type, TypeLookup, TypeRegistryBuilder};
///
/// value_type! {
///     /// A 2D integer point.
///     #[derive(Clone, Copy, Debug, PartialEq)]
///     pub struct Point as "Demo.Point" {
///         pub x: i32,
///         pub y: i32,
///     }
/// }
///
/// value_type! {
///     #[derive(Clone, Copy, Debug, PartialEq)]
///     pub struct Segment as "Demo.Segment" {
///         pub from: Point,
///         pub to: Point,
///     }
/// }
///
/// let mut types = TypeRegistryBuilder::new();
/// types.register_value_type::<Point>()?;
/// let segment = types.register_value_type::<Segment>()?;
/// assert_eq!(types.require(segment)?.slot_count, 4);
/// # Ok::<(), crossbind::Error>(())
/// ```
#[macro_export]
macro_rules! value_type {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident as $type_name:literal {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::FieldCodec for $name {
            fn element_type(
                lookup: &impl $crate::TypeLookup,
            ) -> $crate::Result<$crate::ElementType> {
                Ok($crate::ElementType::ValueType(
                    $crate::TypeLookup::token_of::<$name>(lookup)?,
                ))
            }

            #[allow(unused_variables)]
            fn store(&self, sink: &mut $crate::FieldSink<'_>) -> $crate::Result<()> {
                $( $crate::FieldCodec::store(&self.$field, sink)?; )*
                Ok(())
            }

            #[allow(unused_variables)]
            fn load(source: &mut $crate::FieldSource<'_>) -> $crate::Result<Self> {
                Ok($name {
                    $( $field: <$ty as $crate::FieldCodec>::load(source)?, )*
                })
            }
        }

        impl $crate::ValueType for $name {
            const TYPE_NAME: &'static str = $type_name;

            #[allow(unused_variables)]
            fn definition(
                lookup: &impl $crate::TypeLookup,
            ) -> $crate::Result<$crate::TypeDefinition> {
                Ok($crate::TypeDefinition::value_type($type_name)
                    $( .field(
                        stringify!($field),
                        <$ty as $crate::FieldCodec>::element_type(lookup)?,
                    ) )*)
            }
        }
    };
}
