//! Lazy schema loading across declaration changes.

use std::sync::Arc;

use typegraph::schema::SchemaState;
use typegraph::{
    Data, Field, LazySchema, Namespace, Resolver, SchemaBuilder, SchemaError, TypeDefinition, TypeExpr,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn test_unresolved_reference_recovers_after_declaration() {
    init_tracing();
    let ns = Namespace::new("plugins");
    let query = TypeDefinition::object("Query")
        .field(
            Field::from_resolver(
                Resolver::new("plugin")
                    .returns(TypeExpr::optional("Plugin"))
                    .sync(|_| Ok(Data::Null)),
            )
            .unwrap(),
        )
        .declare(&ns)
        .unwrap();
    let lazy = LazySchema::new(SchemaBuilder::new(&query));

    tokio_test::block_on(async {
        let err = lazy.get_or_build_wait().await.err().unwrap();
        assert!(matches!(err, SchemaError::UnresolvedFieldType { .. }), "{err}");
        assert_eq!(lazy.state().await, SchemaState::Failed);

        TypeDefinition::object("Plugin")
            .field(Field::new("name").ty(TypeExpr::string()))
            .declare(&ns)
            .unwrap();
        // The failure stays cached until invalidated.
        assert!(lazy.get_or_build_wait().await.is_err());

        lazy.invalidate().await;
        let schema = lazy.get_or_build_wait().await.unwrap();
        assert!(schema.type_map().contains("Plugin"));
        assert!(lazy.last_error().await.is_none());
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_build() {
    init_tracing();
    let ns = Namespace::new("shared");
    let query = TypeDefinition::object("Query")
        .field(Field::new("ok").ty(TypeExpr::boolean()))
        .declare(&ns)
        .unwrap();
    let lazy = Arc::new(LazySchema::new(SchemaBuilder::new(&query)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let lazy = Arc::clone(&lazy);
            tokio::spawn(async move { lazy.get_or_build_wait().await })
        })
        .collect();

    let mut schemas = Vec::new();
    for handle in handles {
        schemas.push(handle.await.unwrap().unwrap());
    }
    assert!(schemas.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert!(lazy.is_ready().await);
}
