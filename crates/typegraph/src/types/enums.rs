use std::sync::Arc;

use crate::annotation::Namespace;
use crate::description::DescriptionSources;
use crate::directive::SchemaDirective;
use crate::docstring::Docstring;
use crate::error::ResolveError;
use crate::value::{Data, EnumMember, Origin};

/// A declared enum. Members are exposed on the wire under the names the
/// name converter gives them.
#[derive(Debug)]
pub struct EnumDefinition {
    name: String,
    origin: Origin,
    values: Vec<EnumValueDefinition>,
    description: Option<String>,
    docstring: Option<Docstring>,
    description_sources: Option<DescriptionSources>,
    directives: Vec<SchemaDirective>,
}

/// One member of an enum.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDefinition {
    name: String,
    value: Data,
    description: Option<String>,
    description_sources: Option<DescriptionSources>,
    deprecation_reason: Option<String>,
    directives: Vec<SchemaDirective>,
}

impl EnumValueDefinition {
    pub fn new(name: impl Into<String>, value: impl Into<Data>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
            description_sources: None,
            deprecation_reason: None,
            directives: Vec::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

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

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Internal payload. Never sent over the wire.
    pub fn value(&self) -> &Data {
        &self.value
    }

    pub fn explicit_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn deprecation_reason(&self) -> Option<&str> {
        self.deprecation_reason.as_deref()
    }

    pub fn description_source_override(&self) -> Option<&DescriptionSources> {
        self.description_sources.as_ref()
    }

    pub fn directives(&self) -> &[SchemaDirective] {
        &self.directives
    }
}

impl EnumDefinition {
    pub fn new(name: impl Into<String>) -> EnumDefinitionBuilder {
        EnumDefinitionBuilder {
            name: name.into(),
            values: Vec::new(),
            description: None,
            docstring: None,
            description_sources: None,
            directives: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn values(&self) -> &[EnumValueDefinition] {
        &self.values
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn docstring(&self) -> Option<&Docstring> {
        self.docstring.as_ref()
    }

    /// Description sources for the enum and its values, replacing the
    /// schema-wide setting.
    pub fn description_sources(&self) -> Option<&DescriptionSources> {
        self.description_sources.as_ref()
    }

    pub fn directives(&self) -> &[SchemaDirective] {
        &self.directives
    }

    /// The member named `name`, as a runtime value.
    pub fn member(&self, name: &str) -> Option<Data> {
        let index = self.values.iter().position(|v| v.name == name)?;
        self.member_at(index)
    }

    /// Maps an input identifier to its member.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownEnumValue`] when no member has that
    /// name.
    pub fn parse(&self, identifier: &str) -> Result<Data, ResolveError> {
        self.member(identifier)
            .ok_or_else(|| ResolveError::UnknownEnumValue {
                enum_name: self.name.clone(),
                value: identifier.to_owned(),
            })
    }

    /// Maps a resolver result to its declared member name.
    ///
    /// Accepts a member of this enum, or a bare payload equal to exactly one
    /// member's value.
    pub fn serialize(&self, data: &Data) -> Result<&str, ResolveError> {
        self.position(data).map(|index| self.values[index].name.as_str())
    }

    /// Index of the member `data` stands for.
    pub(crate) fn position(&self, data: &Data) -> Result<usize, ResolveError> {
        let found = match data {
            Data::Enum(member) if member.enum_name() == self.name => {
                self.values.iter().position(|v| v.name == member.name())
            }
            other => self.values.iter().position(|v| &v.value == other),
        };
        found.ok_or_else(|| ResolveError::Serialization {
            type_name: self.name.clone(),
            reason: format!("{data:?} is not a member"),
        })
    }

    pub(crate) fn member_at(&self, index: usize) -> Option<Data> {
        self.values
            .get(index)
            .map(|v| Data::Enum(EnumMember::new(&self.name, &v.name, v.value.clone())))
    }
}

/// Collects enum members.
pub struct EnumDefinitionBuilder {
    name: String,
    values: Vec<EnumValueDefinition>,
    description: Option<String>,
    docstring: Option<Docstring>,
    description_sources: Option<DescriptionSources>,
    directives: Vec<SchemaDirective>,
}

impl EnumDefinitionBuilder {
    /// Adds a member whose payload is `value`.
    #[must_use]
    pub fn value(mut self, name: impl Into<String>, value: impl Into<Data>) -> Self {
        self.values.push(EnumValueDefinition::new(name, value));
        self
    }

    #[must_use]
    pub fn value_with(mut self, value: EnumValueDefinition) -> Self {
        self.values.push(value);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn docstring(mut self, docstring: impl Into<Docstring>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    #[must_use]
    pub fn description_sources(mut self, sources: DescriptionSources) -> Self {
        self.description_sources = Some(sources);
        self
    }

    #[must_use]
    pub fn directive(mut self, directive: SchemaDirective) -> Self {
        self.directives.push(directive);
        self
    }

    /// Builds the enum. A member declared twice keeps its last payload at
    /// the position of its first declaration.
    pub fn build(self) -> Arc<EnumDefinition> {
        let mut values: Vec<EnumValueDefinition> = Vec::with_capacity(self.values.len());
        for value in self.values {
            match values.iter_mut().find(|v| v.name == value.name) {
                Some(existing) => *existing = value,
                None => values.push(value),
            }
        }
        Arc::new(EnumDefinition {
            name: self.name,
            origin: Origin::fresh(),
            values,
            description: self.description,
            docstring: self.docstring,
            description_sources: self.description_sources,
            directives: self.directives,
        })
    }

    pub fn declare(self, namespace: &Namespace) -> Arc<EnumDefinition> {
        let definition = self.build();
        namespace.declare(&definition);
        definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color() -> Arc<EnumDefinition> {
        EnumDefinition::new("Color")
            .value("RED", "red")
            .value("GREEN", "green")
            .value_with(EnumValueDefinition::new("BLUE", "blue").deprecation("use GREEN"))
            .build()
    }

    #[test]
    fn test_parse_known_and_unknown() {
        let color = color();
        let red = color.parse("RED").unwrap();
        let member = red.as_enum().unwrap();
        assert_eq!(member.name(), "RED");
        assert_eq!(member.value(), &Data::from("red"));

        assert_eq!(
            color.parse("PURPLE").unwrap_err(),
            ResolveError::UnknownEnumValue {
                enum_name: "Color".into(),
                value: "PURPLE".into()
            }
        );
    }

    #[test]
    fn test_serialize_by_member_or_payload() {
        let color = color();
        let green = color.member("GREEN").unwrap();
        assert_eq!(color.serialize(&green).unwrap(), "GREEN");
        assert_eq!(color.serialize(&Data::from("blue")).unwrap(), "BLUE");
        assert!(color.serialize(&Data::from("purple")).is_err());
    }

    #[test]
    fn test_declaration_order_and_deprecation() {
        let color = color();
        let names: Vec<&str> = color.values().iter().map(EnumValueDefinition::name).collect();
        assert_eq!(names, vec!["RED", "GREEN", "BLUE"]);
        assert_eq!(color.values()[2].deprecation_reason(), Some("use GREEN"));
    }
}
