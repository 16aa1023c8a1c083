use std::fmt;
use std::sync::Arc;

use super::{ConcreteType, TypeDefinition, TypeVarMap};
use crate::annotation::{Namespace, TypeAnnotation, TypeExpr};
use crate::directive::SchemaDirective;
use crate::error::{AnnotationError, ResolveError};
use crate::value::Data;

/// A concrete member an abstract type may resolve to.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Schema name of the member.
    pub name: String,
    pub definition: Arc<TypeDefinition>,
}

/// Picks the concrete member type of a union or interface value.
pub trait TypeResolution: Send + Sync {
    /// Returns the schema name of the member `value` belongs to.
    ///
    /// # Errors
    ///
    /// [`ResolveError::UnresolvableUnionMember`] when nothing matches and
    /// [`ResolveError::AmbiguousUnionMember`] when the value cannot be told
    /// apart between several members.
    fn resolve_type(
        &self,
        abstract_name: &str,
        value: &Data,
        candidates: &[Candidate],
    ) -> Result<String, ResolveError>;
}

/// Resolution in fixed precedence: explicit typename tag, then the member's
/// `is_type_of` test, then the definition the instance was created from,
/// then the generic that definition specializes. The first level with any
/// match decides.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTypeResolution;

impl TypeResolution for DefaultTypeResolution {
    fn resolve_type(
        &self,
        abstract_name: &str,
        value: &Data,
        candidates: &[Candidate],
    ) -> Result<String, ResolveError> {
        let unresolvable = || ResolveError::UnresolvableUnionMember {
            type_name: abstract_name.to_owned(),
        };
        let instance = value.as_instance().ok_or_else(unresolvable)?;

        if let Some(tag) = instance.typename() {
            return candidates
                .iter()
                .find(|c| c.name == tag)
                .map(|c| c.name.clone())
                .ok_or_else(unresolvable);
        }

        let levels: [&dyn Fn(&Candidate) -> bool; 3] = [
            &|c: &Candidate| c.definition.is_type_of(instance) == Some(true),
            &|c: &Candidate| c.definition.origin() == instance.origin(),
            &|c: &Candidate| {
                c.definition
                    .concrete_of()
                    .is_some_and(|root| root.origin() == instance.origin())
            },
        ];

        for matches_level in levels {
            let matched: Vec<&Candidate> = candidates.iter().filter(|c| matches_level(*c)).collect();
            match matched.as_slice() {
                [] => continue,
                [single] => return Ok(single.name.clone()),
                many => {
                    return Err(ResolveError::AmbiguousUnionMember {
                        type_name: abstract_name.to_owned(),
                        candidates: many.iter().map(|c| c.name.clone()).collect(),
                    });
                }
            }
        }
        Err(unresolvable())
    }
}

/// A union of object types, named or anonymous.
///
/// Anonymous unions come from `A | B` annotations; the name converter
/// derives their schema name from the member names.
#[derive(Clone)]
pub struct UnionDefinition {
    name: Option<String>,
    members: Vec<TypeAnnotation>,
    description: Option<String>,
    directives: Vec<SchemaDirective>,
    resolution: Arc<dyn TypeResolution>,
}

impl UnionDefinition {
    pub fn new(
        name: impl Into<String>,
        members: impl IntoIterator<Item = impl Into<TypeExpr>>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            members: members.into_iter().map(TypeAnnotation::new).collect(),
            description: None,
            directives: Vec::new(),
            resolution: Arc::new(DefaultTypeResolution),
        }
    }

    /// A union built from already resolved members.
    pub fn anonymous(members: Vec<ConcreteType>) -> Self {
        Self {
            name: None,
            members: members.into_iter().map(TypeAnnotation::new).collect(),
            description: None,
            directives: Vec::new(),
            resolution: Arc::new(DefaultTypeResolution),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn directive(mut self, directive: SchemaDirective) -> Self {
        self.directives.push(directive);
        self
    }

    /// Replaces the member resolution strategy.
    #[must_use]
    pub fn resolution(mut self, resolution: impl TypeResolution + 'static) -> Self {
        self.resolution = Arc::new(resolution);
        self
    }

    /// Evaluates forward-referenced members in `namespace`.
    #[must_use]
    pub fn namespace(mut self, namespace: &Namespace) -> Self {
        for member in &mut self.members {
            member.capture_namespace(namespace);
        }
        self
    }

    pub fn declare(self, namespace: &Namespace) -> Arc<UnionDefinition> {
        let definition = Arc::new(self.namespace(namespace));
        namespace.declare(&definition);
        definition
    }

    /// Declared name; `None` for anonymous unions.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn explicit_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn directives(&self) -> &[SchemaDirective] {
        &self.directives
    }

    pub fn type_resolution(&self) -> &Arc<dyn TypeResolution> {
        &self.resolution
    }

    /// Resolves the member annotations.
    ///
    /// # Errors
    ///
    /// Propagates the first member that fails to resolve.
    pub fn resolved_members(&self) -> Result<Vec<ConcreteType>, AnnotationError> {
        self.members.iter().map(TypeAnnotation::resolve).collect()
    }

    /// The union with type variables in its members substituted. Members
    /// are substituted as they resolve, so resolution errors surface from
    /// [`UnionDefinition::resolved_members`].
    #[must_use]
    pub fn copy_with(&self, map: &TypeVarMap) -> Self {
        let members = self.members.iter().map(|member| member.substituted(map)).collect();
        Self {
            members,
            ..self.clone()
        }
    }
}

impl PartialEq for UnionDefinition {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        match (self.resolved_members(), other.resolved_members()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for UnionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnionDefinition")
            .field("name", &self.name)
            .field("members", &self.members)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::value::Instance;

    fn candidates() -> (Vec<Candidate>, Arc<TypeDefinition>, Arc<TypeDefinition>) {
        let cat = TypeDefinition::object("Cat")
            .field(Field::new("meows").ty(TypeExpr::boolean()))
            .build()
            .unwrap();
        let dog = TypeDefinition::object("Dog")
            .field(Field::new("barks").ty(TypeExpr::boolean()))
            .is_type_of(|instance| instance.get("barks").is_some())
            .build()
            .unwrap();
        let candidates = vec![
            Candidate {
                name: "Cat".into(),
                definition: Arc::clone(&cat),
            },
            Candidate {
                name: "Dog".into(),
                definition: Arc::clone(&dog),
            },
        ];
        (candidates, cat, dog)
    }

    #[test]
    fn test_origin_match() {
        let (candidates, cat, _) = candidates();
        let value = Data::Object(cat.instantiate([("meows", true)]).unwrap());
        let resolved = DefaultTypeResolution
            .resolve_type("Pet", &value, &candidates)
            .unwrap();
        assert_eq!(resolved, "Cat");
    }

    #[test]
    fn test_is_type_of_precedes_origin() {
        let (candidates, cat, _) = candidates();
        let value = Data::Object(Instance::new(cat.origin()).with("barks", true));
        let resolved = DefaultTypeResolution
            .resolve_type("Pet", &value, &candidates)
            .unwrap();
        assert_eq!(resolved, "Dog");
    }

    #[test]
    fn test_typename_tag_wins() {
        let (candidates, _, dog) = candidates();
        let value = Data::Object(
            dog.instantiate([("barks", true)])
                .unwrap()
                .with_typename("Cat"),
        );
        let resolved = DefaultTypeResolution
            .resolve_type("Pet", &value, &candidates)
            .unwrap();
        assert_eq!(resolved, "Cat");
    }

    #[test]
    fn test_unresolvable_and_ambiguous() {
        let (mut candidates, cat, _) = candidates();
        let stranger = TypeDefinition::object("Fish").build().unwrap();
        let value = Data::Object(stranger.instantiate(Vec::<(&str, bool)>::new()).unwrap());
        assert!(matches!(
            DefaultTypeResolution.resolve_type("Pet", &value, &candidates),
            Err(ResolveError::UnresolvableUnionMember { .. })
        ));
        assert!(matches!(
            DefaultTypeResolution.resolve_type("Pet", &Data::Int(1), &candidates),
            Err(ResolveError::UnresolvableUnionMember { .. })
        ));

        candidates.push(Candidate {
            name: "Kitten".into(),
            definition: Arc::clone(&cat),
        });
        let value = Data::Object(Instance::new(cat.origin()));
        let err = DefaultTypeResolution
            .resolve_type("Pet", &value, &candidates)
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::AmbiguousUnionMember {
                type_name: "Pet".into(),
                candidates: vec!["Cat".into(), "Kitten".into()]
            }
        );
    }
}
