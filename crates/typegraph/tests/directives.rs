//! Schema directives: emitted uses, rendered definitions and the checks run
//! against a directive's definition.

use std::sync::Arc;

use typegraph::types::EnumValueDefinition;
use typegraph::{
    ArgumentOverride, Data, DirectiveArgument, DirectiveDefinition, DirectiveLocation, EnumDefinition,
    Field, Metadata, Namespace, Resolver, SchemaBuilder, SchemaDirective, SchemaError, TypeDefinition,
    TypeExpr, UnionDefinition,
};

fn cache_control(ns: &Namespace) -> Arc<DirectiveDefinition> {
    EnumDefinition::new("CacheScope")
        .value("PUBLIC", "public")
        .value("PRIVATE", "private")
        .declare(ns);
    DirectiveDefinition::new(
        "cache_control",
        [DirectiveLocation::Object, DirectiveLocation::FieldDefinition],
    )
    .docstring("Caching hints.\n\nArgs:\n    max_age: Seconds a response stays fresh.")
    .argument(DirectiveArgument::new("max_age", TypeExpr::int()))
    .argument(DirectiveArgument::with_namespace("scope", "CacheScope", ns).default(Data::from("public")))
    .build()
}

fn query_with(directive: SchemaDirective) -> Arc<TypeDefinition> {
    TypeDefinition::object("Query")
        .directive(directive)
        .field(Field::new("ok").ty(TypeExpr::boolean()))
        .build()
        .unwrap()
}

#[test]
fn test_uses_and_definitions_are_rendered() {
    let ns = Namespace::new("cached");
    let cache = cache_control(&ns);
    let config = typegraph::SchemaConfig {
        description_sources: typegraph::DescriptionSources::all(),
        ..Default::default()
    };
    let query = TypeDefinition::object("Query")
        .directive(SchemaDirective::of(&cache).argument("max_age", 30))
        .field(
            Field::new("feed")
                .ty(TypeExpr::list(TypeExpr::string()))
                .directive(
                    SchemaDirective::of(&cache)
                        .argument("max_age", 5)
                        .argument("scope", Data::from("private")),
                ),
        )
        .declare(&ns)
        .unwrap();
    let schema = SchemaBuilder::new(&query).config(config).build().unwrap();
    let sdl = schema.sdl();

    assert!(sdl.contains("type Query @cacheControl(maxAge: 30)"), "{sdl}");
    assert!(sdl.contains("feed: [String!]! @cacheControl(maxAge: 5, scope: PRIVATE)"), "{sdl}");
    assert!(sdl.contains("\"\"\"\nCaching hints.\n\"\"\"\ndirective @cacheControl("), "{sdl}");
    assert!(sdl.contains("\t\"\"\"\n\tSeconds a response stays fresh.\n\t\"\"\"\n\tmaxAge: Int!\n"), "{sdl}");
    assert!(sdl.contains("\tscope: CacheScope! = PUBLIC\n) on OBJECT | FIELD_DEFINITION"), "{sdl}");
    // One definition, however many uses.
    assert_eq!(sdl.matches("directive @cacheControl").count(), 1);
    assert!(schema.type_map().contains("CacheScope"));
}

#[test]
fn test_every_element_kind_carries_its_directives() {
    let ns = Namespace::new("tagged");
    let tag = |name: &str| SchemaDirective::new("tag").argument("name", name);
    EnumDefinition::new("Color")
        .directive(tag("enum"))
        .value_with(EnumValueDefinition::new("RED", 1).directive(tag("enum-value")))
        .declare(&ns);
    TypeDefinition::input("Filter")
        .directive(tag("input"))
        .field(Field::new("color").ty("Color").directive(tag("input-field")))
        .declare(&ns)
        .unwrap();
    TypeDefinition::object("Hit")
        .field(Field::new("id").ty(TypeExpr::id()))
        .declare(&ns)
        .unwrap();
    UnionDefinition::new("Result", ["Hit"]).directive(tag("union")).declare(&ns);
    let query = TypeDefinition::object("Query")
        .field(
            Field::from_resolver(
                Resolver::new("search")
                    .param(
                        "filter",
                        TypeExpr::annotated(
                            TypeExpr::optional("Filter"),
                            [Metadata::Argument(ArgumentOverride::new().directive(tag("argument")))],
                        ),
                    )
                    .returns(TypeExpr::list("Result"))
                    .sync(|_| Ok(Data::List(Vec::new()))),
            )
            .unwrap(),
        )
        .declare(&ns)
        .unwrap();
    let sdl = SchemaBuilder::new(&query).build().unwrap().sdl();

    for element in ["enum", "enum-value", "input", "input-field", "union", "argument"] {
        assert!(sdl.contains(&format!("@tag(name: \"{element}\")")), "{element} missing from {sdl}");
    }
    // Uses without a definition print no definition.
    assert!(!sdl.contains("directive @tag"));
}

#[test]
fn test_location_is_checked_against_the_definition() {
    let ns = Namespace::new("misplaced");
    let cache = cache_control(&ns);
    EnumDefinition::new("Mood")
        .directive(SchemaDirective::of(&cache).argument("max_age", 1))
        .value("HAPPY", 1)
        .declare(&ns);
    let query = TypeDefinition::object("Query")
        .field(Field::new("mood").ty("Mood"))
        .declare(&ns)
        .unwrap();

    let err = SchemaBuilder::new(&query).build().err().unwrap();
    assert_eq!(
        err,
        SchemaError::InvalidDirectiveLocation {
            directive: "cache_control".into(),
            location: "ENUM".into(),
            element: "Mood".into(),
        }
    );
}

#[test]
fn test_only_repeatable_directives_repeat() {
    let once = DirectiveDefinition::new("once", [DirectiveLocation::Object]).build();
    let many = DirectiveDefinition::new("many", [DirectiveLocation::Object])
        .repeatable()
        .build();

    let repeated = TypeDefinition::object("Query")
        .directive(SchemaDirective::of(&once))
        .directive(SchemaDirective::of(&once))
        .field(Field::new("ok").ty(TypeExpr::boolean()))
        .build()
        .unwrap();
    let err = SchemaBuilder::new(&repeated).build().err().unwrap();
    assert!(matches!(err, SchemaError::DirectiveNotRepeatable { ref directive, .. } if directive == "once"), "{err}");

    let allowed = TypeDefinition::object("Query")
        .directive(SchemaDirective::of(&many))
        .directive(SchemaDirective::of(&many))
        .field(Field::new("ok").ty(TypeExpr::boolean()))
        .build()
        .unwrap();
    let sdl = SchemaBuilder::new(&allowed).build().unwrap().sdl();
    assert!(sdl.contains("directive @many repeatable on OBJECT"), "{sdl}");
    assert!(sdl.contains("type Query @many @many"), "{sdl}");
}

#[test]
fn test_arguments_are_checked_against_the_definition() {
    let ns = Namespace::new("arguments");
    let cache = cache_control(&ns);

    let unknown = query_with(SchemaDirective::of(&cache).argument("max_age", 1).argument("ttl", 2));
    let err = SchemaBuilder::new(&unknown).build().err().unwrap();
    assert!(
        matches!(err, SchemaError::InvalidDirectiveArguments { ref reason, .. } if reason == "unknown argument 'ttl'"),
        "{err}"
    );

    let missing = query_with(SchemaDirective::of(&cache));
    let err = SchemaBuilder::new(&missing).build().err().unwrap();
    assert!(
        matches!(err, SchemaError::InvalidDirectiveArguments { ref reason, .. } if reason == "missing required argument 'max_age'"),
        "{err}"
    );
}

#[test]
fn test_two_definitions_cannot_share_a_name() {
    let first = DirectiveDefinition::new("audit", [DirectiveLocation::Object]).build();
    let second = DirectiveDefinition::new("audit", [DirectiveLocation::FieldDefinition]).build();
    let query = TypeDefinition::object("Query")
        .directive(SchemaDirective::of(&first))
        .field(
            Field::new("ok")
                .ty(TypeExpr::boolean())
                .directive(SchemaDirective::of(&second)),
        )
        .build()
        .unwrap();

    let err = SchemaBuilder::new(&query).build().err().unwrap();
    assert_eq!(err, SchemaError::DuplicateDirective { name: "audit".into() });
}

#[test]
fn test_hidden_definitions_still_emit_uses() {
    let key = DirectiveDefinition::new("key", [DirectiveLocation::Object])
        .argument(DirectiveArgument::new("fields", TypeExpr::string()))
        .hide_definition()
        .build();
    let query = query_with(SchemaDirective::of(&key).argument("fields", "id"));

    let sdl = SchemaBuilder::new(&query).build().unwrap().sdl();
    assert!(sdl.contains("type Query @key(fields: \"id\")"), "{sdl}");
    assert!(!sdl.contains("directive @key"));
}
