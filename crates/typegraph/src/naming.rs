//! Public names of schema elements.
//!
//! The converter never invents names itself: every field, argument and type
//! name goes through a [`NameConverter`]. Implement the trait to replace the
//! policy wholesale, or override single methods and keep the defaults.

use heck::{ToLowerCamelCase, ToUpperCamelCase};

use crate::directive::DirectiveDefinition;
use crate::field::{Argument, Field};
use crate::types::{ConcreteType, EnumDefinition, EnumValueDefinition, ScalarType, TypeDefinition, UnionDefinition};

/// Maps declared names to wire names.
pub trait NameConverter: Send + Sync {
    /// Whether declared snake_case names are converted to camelCase.
    fn auto_camel_case(&self) -> bool;

    fn apply_naming_config(&self, name: &str) -> String {
        if self.auto_camel_case() {
            name.to_lower_camel_case()
        } else {
            name.to_owned()
        }
    }

    fn from_directive(&self, directive: &DirectiveDefinition) -> String {
        self.apply_naming_config(directive.name())
    }

    fn from_field(&self, field: &Field) -> String {
        field
            .graphql_name()
            .map_or_else(|| self.apply_naming_config(field.declared_name()), str::to_owned)
    }

    fn from_argument(&self, argument: &Argument) -> String {
        argument
            .graphql_name()
            .map_or_else(|| self.apply_naming_config(argument.declared_name()), str::to_owned)
    }

    /// Name of an object, input or interface type. Specializations are
    /// named after their type arguments.
    fn from_type(&self, definition: &TypeDefinition) -> String {
        match (definition.concrete_of(), definition.specialized_args()) {
            (Some(root), Some(args)) => self.from_generic(root, args),
            _ => definition.name().to_owned(),
        }
    }

    fn from_enum(&self, definition: &EnumDefinition) -> String {
        definition.name().to_owned()
    }

    fn from_enum_value(&self, value: &EnumValueDefinition) -> String {
        value.name().to_owned()
    }

    /// Anonymous unions are named by concatenating their member names.
    fn from_union(&self, union: &UnionDefinition) -> String {
        if let Some(name) = union.name() {
            return name.to_owned();
        }
        union
            .resolved_members()
            .unwrap_or_default()
            .iter()
            .map(|member| self.name_of(member))
            .collect()
    }

    /// `Edge[int, str]` becomes `IntStrEdge`: argument names, then the
    /// generic's own name.
    fn from_generic(&self, generic: &TypeDefinition, args: &[ConcreteType]) -> String {
        let mut name: String = args.iter().map(|arg| self.name_of(arg)).collect();
        name.push_str(generic.name());
        name
    }

    /// Name fragment used when a type appears as a generic argument.
    fn name_of(&self, ty: &ConcreteType) -> String {
        match ty {
            ConcreteType::Scalar(ScalarType::Native(native)) => match native.name() {
                "int" => "Int".to_owned(),
                "float" => "Float".to_owned(),
                "str" => "String".to_owned(),
                "bool" => "Boolean".to_owned(),
                other => other.to_upper_camel_case(),
            },
            ConcreteType::Scalar(ScalarType::Defined(def)) => def.name().to_owned(),
            ConcreteType::Enum(def) => self.from_enum(def),
            ConcreteType::List(inner) => format!("{}List", self.name_of(inner)),
            ConcreteType::Optional(inner) => format!("{}Optional", self.name_of(inner)),
            ConcreteType::Object(def) | ConcreteType::Input(def) | ConcreteType::Interface(def) => {
                self.from_type(def)
            }
            ConcreteType::Union(union) => self.from_union(union),
            ConcreteType::TypeVar(var) => var.name().to_owned(),
            ConcreteType::LazyRef(lazy) => lazy.type_name().to_owned(),
            ConcreteType::Annotated(inner, _) => self.name_of(inner),
        }
    }
}

/// The default policy: camelCase fields and arguments, declared type names.
#[derive(Debug, Clone, Copy)]
pub struct DefaultNameConverter {
    auto_camel_case: bool,
}

impl DefaultNameConverter {
    pub fn new(auto_camel_case: bool) -> Self {
        Self { auto_camel_case }
    }
}

impl Default for DefaultNameConverter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NameConverter for DefaultNameConverter {
    fn auto_camel_case(&self) -> bool {
        self.auto_camel_case
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::annotation::{Namespace, TypeAnnotation, TypeExpr};

    #[test]
    fn test_camel_case_fields() {
        let converter = DefaultNameConverter::default();
        assert_eq!(converter.apply_naming_config("created_at"), "createdAt");
        assert_eq!(converter.apply_naming_config("id"), "id");

        let verbatim = DefaultNameConverter::new(false);
        assert_eq!(verbatim.apply_naming_config("created_at"), "created_at");
    }

    #[test]
    fn test_explicit_field_name_wins() {
        let converter = DefaultNameConverter::default();
        let mut field = Field::new("created_at").ty(TypeExpr::string()).name("creation");
        field.attach("Post", None).unwrap();
        assert_eq!(converter.from_field(&field), "creation");
    }

    #[test]
    fn test_generic_names() {
        let ns = Namespace::new("names");
        let t = ns.type_var("T");
        TypeDefinition::object("Box")
            .field(Field::new("value").ty(&t))
            .declare(&ns)
            .unwrap();
        let converter = DefaultNameConverter::default();

        let name = |text: &str| {
            let ty = TypeAnnotation::with_namespace(TypeExpr::forward(text), &ns)
                .resolve()
                .unwrap();
            converter.name_of(&ty)
        };
        assert_eq!(name("Box[int]"), "IntBox");
        assert_eq!(name("Box[str]"), "StringBox");
        assert_eq!(name("Box[List[int]]"), "IntListBox");
        assert_eq!(name("Box[Optional[Box[bool]]]"), "BooleanBoxOptionalBox");
    }

    #[test]
    fn test_anonymous_union_name() {
        let a = TypeDefinition::object("A").build().unwrap();
        let b = TypeDefinition::object("B").build().unwrap();
        let union = UnionDefinition::anonymous(vec![
            ConcreteType::Object(Arc::clone(&a)),
            ConcreteType::Object(b),
        ]);
        let converter = DefaultNameConverter::default();
        assert_eq!(converter.from_union(&union), "AB");
        assert_eq!(
            converter.from_union(&UnionDefinition::new("Pet", [TypeExpr::from(&a)])),
            "Pet"
        );
    }
}
