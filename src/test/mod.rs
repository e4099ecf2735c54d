//! Fixtures shared by the unit tests.

use std::sync::Arc;

use crate::{
    bindings,
    marshal::DescriptorTable,
    memory::{ManagedHeap, StaticFieldStorage},
    redirect::RedirectionTableBuilder,
    typesystem::{
        ElementType, TypeDefinition, TypeDescriptor, TypeLookup, TypeRegistryBuilder, TypeToken,
    },
};

/// Registers `Test.Foo` and `Test.Pair`.
///
/// `Test.Foo` is a class with instance fields `count: I4` and `next: Object`,
/// and static fields `instance: Object` and `total: I4`. `Test.Pair` is a
/// value type of two `I4` fields.
pub fn register_test_types() -> TypeRegistryBuilder {
    let mut builder = TypeRegistryBuilder::new();
    register_into(&mut builder);
    builder
}

fn register_into(builder: &mut TypeRegistryBuilder) -> (TypeToken, TypeToken) {
    let foo = builder
        .register(
            TypeDefinition::class("Test.Foo")
                .field("count", ElementType::I4)
                .field("next", ElementType::Object)
                .static_field("instance", ElementType::Object)
                .static_field("total", ElementType::I4),
        )
        .unwrap();
    let pair = builder
        .register(
            TypeDefinition::value_type("Test.Pair")
                .field("first", ElementType::I4)
                .field("second", ElementType::I4),
        )
        .unwrap();
    (foo, pair)
}

/// Descriptor of a two-slot value type.
pub fn pair_descriptor() -> Arc<TypeDescriptor> {
    let builder = register_test_types();
    let token = builder.resolve_name("Test.Pair").unwrap();
    builder.require(token).unwrap()
}

/// A descriptor table over the test types and the built-in bindings.
///
/// `holder` is `Test.Holder`, a class with an `ObscuredInt` instance field and
/// a `Vector3` static field.
pub struct TestFixture {
    pub table: DescriptorTable,
    pub foo: TypeToken,
    pub pair: TypeToken,
    pub holder: TypeToken,
    pub obscured: TypeToken,
    pub vector: TypeToken,
}

pub fn test_table() -> TestFixture {
    let mut types = TypeRegistryBuilder::new();
    let redirections = RedirectionTableBuilder::new();
    bindings::initialize(&mut types, &redirections).unwrap();
    let (foo, pair) = register_into(&mut types);

    let obscured = types.token_of::<bindings::ObscuredInt>().unwrap();
    let vector = types.token_of::<bindings::Vector3>().unwrap();
    let holder = types
        .register(
            TypeDefinition::class("Test.Holder")
                .field("value", ElementType::ValueType(obscured))
                .static_field("origin", ElementType::ValueType(vector)),
        )
        .unwrap();

    TestFixture {
        table: DescriptorTable::new(
            Arc::new(types.freeze()),
            Arc::new(ManagedHeap::unbounded()),
            Arc::new(StaticFieldStorage::new()),
        ),
        foo,
        pair,
        holder,
        obscured,
        vector,
    }
}
