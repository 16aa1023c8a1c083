use super::DefaultValue;
use super::resolver::Param;
use crate::annotation::{Metadata, Namespace, TypeAnnotation, TypeExpr};
use crate::description::DescriptionSources;
use crate::directive::SchemaDirective;
use crate::error::{AnnotationError, SchemaError};
use crate::types::{ConcreteType, TypeVarMap};

/// Overrides for a resolver argument, attached as annotation metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentOverride {
    name: Option<String>,
    description: Option<String>,
    description_sources: Option<DescriptionSources>,
    deprecation_reason: Option<String>,
    directives: Vec<SchemaDirective>,
}

impl ArgumentOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Public name, bypassing the name converter.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Description sources for this argument, replacing the ones of its
    /// field.
    #[must_use]
    pub fn description_sources(mut self, sources: DescriptionSources) -> Self {
        self.description_sources = Some(sources);
        self
    }

    #[must_use]
    pub fn deprecation(mut self, reason: impl Into<String>) -> Self {
        self.deprecation_reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn directive(mut self, directive: SchemaDirective) -> Self {
        self.directives.push(directive);
        self
    }
}

/// A GraphQL argument derived from a resolver parameter.
#[derive(Debug, Clone)]
pub struct Argument {
    declared_name: String,
    graphql_name: Option<String>,
    annotation: TypeAnnotation,
    default: DefaultValue,
    description: Option<String>,
    description_sources: Option<DescriptionSources>,
    deprecation_reason: Option<String>,
    directives: Vec<SchemaDirective>,
}

impl Argument {
    /// Builds the argument for `param`, applying at most one
    /// [`ArgumentOverride`] found in its annotation metadata.
    pub(crate) fn from_param(resolver: &str, param: &Param) -> Result<Self, SchemaError> {
        let (base, metadata) = param.annotation().expr().strip_annotated();

        let mut overrides = metadata.iter().filter_map(|m| match m {
            Metadata::Argument(o) => Some(o),
            _ => None,
        });
        let argument_override = overrides.next().cloned().unwrap_or_default();
        if overrides.next().is_some() {
            return Err(SchemaError::MultipleArgumentAnnotations {
                argument: param.name().to_owned(),
            });
        }

        let retained: Vec<Metadata> = metadata
            .iter()
            .filter(|m| !matches!(m, Metadata::Argument(_)))
            .cloned()
            .collect();
        let expr = if retained.is_empty() {
            base.clone()
        } else {
            TypeExpr::annotated(base.clone(), retained)
        };
        let mut annotation = TypeAnnotation::new(expr);
        if let Some(ns) = param.annotation().namespace() {
            annotation.capture_namespace(ns);
        }

        let argument = Self {
            declared_name: param.name().to_owned(),
            graphql_name: argument_override.name,
            annotation,
            default: param.default_value().clone(),
            description: argument_override.description,
            description_sources: argument_override.description_sources,
            deprecation_reason: argument_override.deprecation_reason,
            directives: argument_override.directives,
        };
        argument.check_input_shape(resolver)?;
        Ok(argument)
    }

    /// Rejects union and interface arguments when the type already
    /// resolves; forward references are checked again by the converter.
    pub(crate) fn check_input_shape(&self, field: &str) -> Result<(), SchemaError> {
        let Ok(ty) = self.argument_type() else {
            return Ok(());
        };
        let mut current = ty.strip_annotated();
        while let ConcreteType::Optional(inner) | ConcreteType::List(inner) = current {
            current = inner.strip_annotated();
        }
        let kind = match current {
            ConcreteType::Union(_) => "union",
            ConcreteType::Interface(_) => "interface",
            _ => return Ok(()),
        };
        Err(SchemaError::InvalidFieldArgument {
            field: field.to_owned(),
            argument: self.declared_name.clone(),
            kind: kind.to_owned(),
        })
    }

    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    /// Explicit public name, if one was given.
    pub fn graphql_name(&self) -> Option<&str> {
        self.graphql_name.as_deref()
    }

    pub fn annotation(&self) -> &TypeAnnotation {
        &self.annotation
    }

    /// # Errors
    ///
    /// Fails when the annotation does not resolve.
    pub fn argument_type(&self) -> Result<ConcreteType, AnnotationError> {
        self.annotation.resolve()
    }

    pub fn default_value(&self) -> &DefaultValue {
        &self.default
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn description_source_override(&self) -> Option<&DescriptionSources> {
        self.description_sources.as_ref()
    }

    pub fn deprecation_reason(&self) -> Option<&str> {
        self.deprecation_reason.as_deref()
    }

    pub fn directives(&self) -> &[SchemaDirective] {
        &self.directives
    }

    pub(crate) fn capture_namespace(&mut self, namespace: &Namespace) {
        self.annotation.capture_namespace(namespace);
    }

    pub(crate) fn copy_with(&self, map: &TypeVarMap) -> Self {
        Self {
            annotation: self.annotation.substituted(map),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::{TypeDefinition, UnionDefinition};

    #[test]
    fn test_override_applied() {
        let param = Param::new(
            "limit",
            TypeExpr::annotated(
                TypeExpr::int(),
                [Metadata::Argument(
                    ArgumentOverride::new().name("first").description("Page size"),
                )],
            ),
            DefaultValue::Value(10.into()),
        );
        let argument = Argument::from_param("items", &param).unwrap();
        assert_eq!(argument.declared_name(), "limit");
        assert_eq!(argument.graphql_name(), Some("first"));
        assert_eq!(argument.description(), Some("Page size"));
        assert!(matches!(argument.argument_type(), Ok(ConcreteType::Scalar(_))));
    }

    #[test]
    fn test_multiple_overrides_rejected() {
        let param = Param::new(
            "limit",
            TypeExpr::annotated(
                TypeExpr::int(),
                [
                    Metadata::Argument(ArgumentOverride::new().name("first")),
                    Metadata::Argument(ArgumentOverride::new().name("count")),
                ],
            ),
            DefaultValue::Missing,
        );
        assert_eq!(
            Argument::from_param("items", &param).unwrap_err(),
            SchemaError::MultipleArgumentAnnotations {
                argument: "limit".into()
            }
        );
    }

    #[test]
    fn test_union_argument_rejected() {
        let a = TypeDefinition::object("A").build().unwrap();
        let b = TypeDefinition::object("B").build().unwrap();
        let union = Arc::new(UnionDefinition::new("AB", [TypeExpr::from(&a), TypeExpr::from(&b)]));
        let param = Param::new("choice", TypeExpr::optional(&union), DefaultValue::Missing);
        assert_eq!(
            Argument::from_param("pick", &param).unwrap_err(),
            SchemaError::InvalidFieldArgument {
                field: "pick".into(),
                argument: "choice".into(),
                kind: "union".into()
            }
        );
    }
}
