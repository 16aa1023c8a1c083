//! Docstring parsing.
//!
//! Understands the subset of Google and reST docstring conventions used to
//! describe schema elements:
//!
//! ```text
//! Short summary.
//!
//! Longer description, possibly spanning
//! several lines.
//!
//! Args:
//!     name: What the argument means.
//!     limit (int): Maximum number of results,
//!         continued on the next line.
//!
//! Attributes:
//!     x: The horizontal coordinate.
//! ```
//!
//! `:param name: text` lines are accepted as well. Attribute docstrings (a
//! string attached directly to a single attribute) are supplied explicitly
//! with [`Docstring::with_attribute`].

use indexmap::IndexMap;

const PARAM_SECTIONS: &[&str] = &[
    "args",
    "arguments",
    "parameters",
    "params",
    "attributes",
    "attribute",
    "keyword args",
    "keyword arguments",
    "other parameters",
];

const OTHER_SECTIONS: &[&str] = &[
    "returns",
    "return",
    "yields",
    "yield",
    "raises",
    "raise",
    "example",
    "examples",
    "note",
    "notes",
    "see also",
    "todo",
    "warning",
    "warnings",
];

/// A parsed docstring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Docstring {
    description: Option<String>,
    params: IndexMap<String, String>,
    attributes: IndexMap<String, String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Description,
    Params,
    Other,
}

impl Docstring {
    /// Parses docstring text.
    pub fn parse(text: &str) -> Self {
        let text = dedent(text);
        let mut doc = Self::default();
        let mut description: Vec<&str> = Vec::new();
        let mut section = Section::Description;
        let mut current: Option<(String, String)> = None;
        let mut param_indent = 0;

        for line in text.lines() {
            let trimmed = line.trim();

            if let Some(header) = section_header(trimmed) {
                doc.push_param(current.take());
                section = header;
                continue;
            }

            if let Some((name, rest)) = rest_param(trimmed) {
                doc.push_param(current.take());
                current = Some((name.to_owned(), rest.to_owned()));
                section = Section::Params;
                param_indent = usize::MAX;
                continue;
            }

            match section {
                Section::Description => description.push(line),
                Section::Other => {}
                Section::Params => {
                    if trimmed.is_empty() {
                        continue;
                    }
                    let indent = line.len() - line.trim_start().len();
                    let continuation = current.is_some() && indent > param_indent;
                    if continuation {
                        if let Some((_, text)) = current.as_mut() {
                            if !text.is_empty() {
                                text.push(' ');
                            }
                            text.push_str(trimmed);
                        }
                    } else if let Some((name, rest)) = google_param(trimmed) {
                        doc.push_param(current.take());
                        current = Some((name.to_owned(), rest.to_owned()));
                        param_indent = indent;
                    }
                }
            }
        }
        doc.push_param(current.take());
        doc.set_description(&description);
        doc
    }

    /// Adds an attribute docstring for `name`.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, text: &str) -> Self {
        let parsed = Self::parse(text);
        if let Some(main) = parsed.main_description() {
            self.attributes.insert(name.into(), main.to_owned());
        }
        self
    }

    /// Adds parameter entries from another docstring that this one lacks.
    ///
    /// Used when a type inherits from a base type: the base's `Attributes:`
    /// entries still describe inherited fields.
    pub(crate) fn inherit_params(&mut self, parent: &Docstring) {
        for (name, text) in &parent.params {
            self.params
                .entry(name.clone())
                .or_insert_with(|| text.clone());
        }
        for (name, text) in &parent.attributes {
            self.attributes
                .entry(name.clone())
                .or_insert_with(|| text.clone());
        }
    }

    /// Summary and body, separated as written.
    pub fn main_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Description of a parameter or attribute entry.
    pub fn child_description(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|text| !text.is_empty())
    }

    /// Attribute docstring for `name`.
    pub fn attribute_docstring(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn push_param(&mut self, entry: Option<(String, String)>) {
        if let Some((name, text)) = entry {
            self.params.insert(name, text.trim().to_owned());
        }
    }

    fn set_description(&mut self, lines: &[&str]) {
        let Some(first) = lines.iter().position(|l| !l.trim().is_empty()) else {
            return;
        };
        let summary = lines[first].trim();
        let rest = &lines[first + 1..];
        let body = rest
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
        let body = body.trim();

        self.description = Some(if body.is_empty() {
            summary.to_owned()
        } else if rest.first().is_some_and(|l| l.trim().is_empty()) {
            format!("{summary}\n\n{body}")
        } else {
            format!("{summary}\n{body}")
        });
    }
}

impl From<&str> for Docstring {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for Docstring {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

fn section_header(line: &str) -> Option<Section> {
    let name = line.strip_suffix(':')?.trim().to_ascii_lowercase();
    if PARAM_SECTIONS.contains(&name.as_str()) {
        Some(Section::Params)
    } else if OTHER_SECTIONS.contains(&name.as_str()) {
        Some(Section::Other)
    } else {
        None
    }
}

/// `name: text` or `name (type): text`.
fn google_param(line: &str) -> Option<(&str, &str)> {
    let (head, rest) = line.split_once(':')?;
    let name = head.split_once('(').map_or(head, |(n, _)| n).trim();
    is_identifier(name).then(|| (name, rest.trim()))
}

/// `:param name: text` or `:param type name: text`.
fn rest_param(line: &str) -> Option<(&str, &str)> {
    let rest = line
        .strip_prefix(":param ")
        .or_else(|| line.strip_prefix(":parameter "))?;
    let (head, text) = rest.split_once(':')?;
    let name = head.split_whitespace().last()?;
    is_identifier(name).then(|| (name, text.trim()))
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Removes the common indentation of all lines but the first.
fn dedent(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default().trim();
    let rest: Vec<&str> = lines.collect();
    let indent = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out = String::from(first);
    for line in rest {
        out.push('\n');
        out.push_str(line.get(indent..).unwrap_or_else(|| line.trim_start()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_only() {
        let doc = Docstring::parse("A single line.");
        assert_eq!(doc.main_description(), Some("A single line."));
    }

    #[test]
    fn test_summary_and_body() {
        let doc = Docstring::parse(
            "Summary line.

            More text
            here.
            ",
        );
        assert_eq!(doc.main_description(), Some("Summary line.\n\nMore text\nhere."));
    }

    #[test]
    fn test_google_sections() {
        let doc = Docstring::parse(
            "Fetch users.

            Args:
                name: The user name.
                limit (int): Maximum number of
                    results returned.

            Returns:
                whatever: not a parameter.
            ",
        );
        assert_eq!(doc.main_description(), Some("Fetch users."));
        assert_eq!(doc.child_description("name"), Some("The user name."));
        assert_eq!(
            doc.child_description("limit"),
            Some("Maximum number of results returned.")
        );
        assert_eq!(doc.child_description("whatever"), None);
    }

    #[test]
    fn test_rest_params() {
        let doc = Docstring::parse(":param str name: The name.\n:param age: The age.");
        assert_eq!(doc.main_description(), None);
        assert_eq!(doc.child_description("name"), Some("The name."));
        assert_eq!(doc.child_description("age"), Some("The age."));
    }

    #[test]
    fn test_attribute_docstrings() {
        let doc = Docstring::parse("A point.").with_attribute("x", "  The x coordinate.  ");
        assert_eq!(doc.attribute_docstring("x"), Some("The x coordinate."));
        assert_eq!(doc.attribute_docstring("y"), None);
    }

    #[test]
    fn test_inherit_params_keeps_own_entries() {
        let mut child = Docstring::parse("Child.\n\nAttributes:\n    a: child a\n");
        let parent = Docstring::parse("Parent.\n\nAttributes:\n    a: parent a\n    b: parent b\n");
        child.inherit_params(&parent);
        assert_eq!(child.child_description("a"), Some("child a"));
        assert_eq!(child.child_description("b"), Some("parent b"));
    }
}
