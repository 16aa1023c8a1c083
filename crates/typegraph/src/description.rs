//! Description sourcing.
//!
//! A schema element can take its description from several places: the
//! explicit `description` given at declaration, a resolver docstring, the
//! owning type's docstring and so on. [`DescriptionSources`] lists the
//! enabled sources in precedence order; [`DescriptionLookup`] gathers the
//! candidates for one element and picks the first one present.

use serde::{Deserialize, Serialize};

use crate::docstring::Docstring;

/// A place a description can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionSource {
    /// Explicit `description` values.
    Descriptions,
    /// Resolver docstrings, and their `Args:` entries for arguments.
    ResolverDocstrings,
    /// Attribute docstrings declared on the owning type.
    TypeAttributeDocstrings,
    /// Type docstrings, and their `Attributes:` entries for fields.
    TypeDocstrings,
    /// Attribute docstrings declared on the owning enum.
    EnumAttributeDocstrings,
    /// Enum docstrings, and their entries for enum values.
    EnumDocstrings,
    /// Attribute docstrings declared on the owning directive.
    DirectiveAttributeDocstrings,
    /// Directive docstrings, and their entries for directive arguments.
    DirectiveDocstrings,
}

impl DescriptionSource {
    const ALL: [Self; 8] = [
        Self::Descriptions,
        Self::ResolverDocstrings,
        Self::TypeAttributeDocstrings,
        Self::TypeDocstrings,
        Self::EnumAttributeDocstrings,
        Self::EnumDocstrings,
        Self::DirectiveAttributeDocstrings,
        Self::DirectiveDocstrings,
    ];
}

/// Ordered set of enabled description sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DescriptionSource>", into = "Vec<DescriptionSource>")]
pub struct DescriptionSources(Vec<DescriptionSource>);

impl DescriptionSources {
    /// Builds a set from sources in precedence order. Duplicates keep their
    /// first position.
    pub fn new(sources: impl IntoIterator<Item = DescriptionSource>) -> Self {
        let mut ordered = Vec::new();
        for source in sources {
            if !ordered.contains(&source) {
                ordered.push(source);
            }
        }
        Self(ordered)
    }

    /// Explicit descriptions only.
    #[must_use]
    pub fn descriptions() -> Self {
        Self::new([DescriptionSource::Descriptions])
    }

    /// Every docstring source, without explicit descriptions.
    #[must_use]
    pub fn docstrings() -> Self {
        Self::new(
            DescriptionSource::ALL
                .into_iter()
                .filter(|s| *s != DescriptionSource::Descriptions),
        )
    }

    /// Every source in the default precedence.
    #[must_use]
    pub fn all() -> Self {
        Self::new(DescriptionSource::ALL)
    }

    /// No sources: every description is omitted.
    #[must_use]
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, source: DescriptionSource) -> bool {
        self.0.contains(&source)
    }

    pub fn iter(&self) -> impl Iterator<Item = DescriptionSource> + '_ {
        self.0.iter().copied()
    }
}

impl Default for DescriptionSources {
    fn default() -> Self {
        Self::descriptions()
    }
}

impl From<Vec<DescriptionSource>> for DescriptionSources {
    fn from(sources: Vec<DescriptionSource>) -> Self {
        Self::new(sources)
    }
}

impl From<DescriptionSources> for Vec<DescriptionSource> {
    fn from(sources: DescriptionSources) -> Self {
        sources.0
    }
}

/// Candidate descriptions for a single schema element.
///
/// `child_name` is the declared (not wire) name of the element inside its
/// parent, used to look up per-attribute and per-argument docstrings.
#[derive(Debug, Default, Clone, Copy)]
pub struct DescriptionLookup<'a> {
    pub description: Option<&'a str>,
    pub type_docstring: Option<&'a Docstring>,
    pub parent_type_docstring: Option<&'a Docstring>,
    pub enum_docstring: Option<&'a Docstring>,
    pub parent_enum_docstring: Option<&'a Docstring>,
    pub resolver_docstring: Option<&'a Docstring>,
    pub parent_resolver_docstring: Option<&'a Docstring>,
    pub directive_docstring: Option<&'a Docstring>,
    pub parent_directive_docstring: Option<&'a Docstring>,
    pub child_name: Option<&'a str>,
}

impl<'a> DescriptionLookup<'a> {
    /// Returns the first candidate present, visiting sources in `sources` order.
    pub fn resolve(&self, sources: &DescriptionSources) -> Option<String> {
        sources
            .iter()
            .find_map(|source| self.candidate(source))
            .map(str::to_owned)
    }

    fn candidate(&self, source: DescriptionSource) -> Option<&'a str> {
        let child = |doc: Option<&'a Docstring>| {
            doc.zip(self.child_name)
                .and_then(|(doc, name)| doc.child_description(name))
        };
        let attribute = |doc: Option<&'a Docstring>| {
            doc.zip(self.child_name)
                .and_then(|(doc, name)| doc.attribute_docstring(name))
        };

        match source {
            DescriptionSource::Descriptions => self.description,
            DescriptionSource::ResolverDocstrings => self
                .resolver_docstring
                .and_then(Docstring::main_description)
                .or_else(|| child(self.parent_resolver_docstring)),
            DescriptionSource::TypeAttributeDocstrings => attribute(self.parent_type_docstring),
            DescriptionSource::TypeDocstrings => self
                .type_docstring
                .and_then(Docstring::main_description)
                .or_else(|| child(self.parent_type_docstring)),
            DescriptionSource::EnumAttributeDocstrings => attribute(self.parent_enum_docstring),
            DescriptionSource::EnumDocstrings => self
                .enum_docstring
                .and_then(Docstring::main_description)
                .or_else(|| child(self.parent_enum_docstring)),
            DescriptionSource::DirectiveAttributeDocstrings => attribute(self.parent_directive_docstring),
            DescriptionSource::DirectiveDocstrings => self
                .directive_docstring
                .and_then(Docstring::main_description)
                .or_else(|| child(self.parent_directive_docstring)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_doc() -> Docstring {
        Docstring::parse(
            "A point.\n\nAttributes:\n    x: type docstring for x\n",
        )
        .with_attribute("x", "attribute docstring for x")
    }

    #[test]
    fn test_new_deduplicates_keeping_first_position() {
        let sources = DescriptionSources::new([
            DescriptionSource::TypeDocstrings,
            DescriptionSource::Descriptions,
            DescriptionSource::TypeDocstrings,
        ]);
        assert_eq!(
            sources.iter().collect::<Vec<_>>(),
            vec![
                DescriptionSource::TypeDocstrings,
                DescriptionSource::Descriptions
            ]
        );
    }

    #[test]
    fn test_explicit_description_wins_by_default() {
        let doc = type_doc();
        let lookup = DescriptionLookup {
            description: Some("explicit"),
            parent_type_docstring: Some(&doc),
            child_name: Some("x"),
            ..Default::default()
        };
        assert_eq!(
            lookup.resolve(&DescriptionSources::all()).as_deref(),
            Some("explicit")
        );
        assert_eq!(lookup.resolve(&DescriptionSources::none()), None);
    }

    #[test]
    fn test_caller_order_decides_precedence() {
        let doc = type_doc();
        let lookup = DescriptionLookup {
            description: Some("explicit"),
            parent_type_docstring: Some(&doc),
            child_name: Some("x"),
            ..Default::default()
        };

        let attribute_first = DescriptionSources::new([
            DescriptionSource::TypeAttributeDocstrings,
            DescriptionSource::Descriptions,
        ]);
        assert_eq!(
            lookup.resolve(&attribute_first).as_deref(),
            Some("attribute docstring for x")
        );

        let type_doc_first = DescriptionSources::new([
            DescriptionSource::TypeDocstrings,
            DescriptionSource::TypeAttributeDocstrings,
        ]);
        assert_eq!(
            lookup.resolve(&type_doc_first).as_deref(),
            Some("type docstring for x")
        );
    }

    #[test]
    fn test_directive_docstrings_describe_arguments() {
        let doc = Docstring::parse("Caching hints.\n\nArgs:\n    max_age: Seconds to cache for.\n")
            .with_attribute("scope", "Who may cache");
        let argument = |name| DescriptionLookup {
            parent_directive_docstring: Some(&doc),
            child_name: Some(name),
            ..Default::default()
        };
        let definition = DescriptionLookup {
            directive_docstring: Some(&doc),
            ..Default::default()
        };

        let sources = DescriptionSources::docstrings();
        assert_eq!(definition.resolve(&sources).as_deref(), Some("Caching hints."));
        assert_eq!(argument("max_age").resolve(&sources).as_deref(), Some("Seconds to cache for."));
        assert_eq!(argument("scope").resolve(&sources).as_deref(), Some("Who may cache"));
        assert_eq!(argument("scope").resolve(&DescriptionSources::descriptions()), None);
    }

    #[test]
    fn test_missing_candidates_fall_through() {
        let lookup = DescriptionLookup {
            description: None,
            child_name: Some("x"),
            ..Default::default()
        };
        assert_eq!(lookup.resolve(&DescriptionSources::all()), None);
    }
}
