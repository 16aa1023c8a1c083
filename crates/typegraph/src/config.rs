//! Schema configuration.
//!
//! Configuration controls naming, description sourcing and the limits the
//! execution engine enforces. It can be written in TOML:
//!
//! ```toml
//! auto_camel_case = true
//! description_sources = ["descriptions", "resolver_docstrings"]
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! ```

use serde::{Deserialize, Serialize};

use crate::description::DescriptionSources;
use crate::error::SchemaError;

/// Options consumed by the schema builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Convert declared snake_case names to camelCase wire names.
    /// Default: true
    #[serde(default = "default_auto_camel_case")]
    pub auto_camel_case: bool,

    /// Enabled description sources, in precedence order.
    /// Default: explicit descriptions only
    #[serde(default)]
    pub description_sources: DescriptionSources,

    /// Maximum query depth allowed.
    /// Default: 15
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    /// Default: 500
    #[serde(default = "default_max_complexity")]
    pub max_complexity: usize,

    /// Enable introspection queries.
    /// Default: true
    #[serde(default = "default_introspection")]
    pub introspection: bool,
}

fn default_auto_camel_case() -> bool {
    true
}

fn default_max_depth() -> usize {
    15
}

fn default_max_complexity() -> usize {
    500
}

fn default_introspection() -> bool {
    true
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            auto_camel_case: default_auto_camel_case(),
            description_sources: DescriptionSources::default(),
            max_depth: default_max_depth(),
            max_complexity: default_max_complexity(),
            introspection: default_introspection(),
        }
    }
}

impl SchemaConfig {
    /// Parses a configuration document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidConfig`] for malformed TOML or invalid values.
    pub fn from_toml(source: &str) -> Result<Self, SchemaError> {
        let config: Self =
            toml::from_str(source).map_err(|e| SchemaError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.max_depth == 0 {
            return Err(SchemaError::InvalidConfig("max_depth must be > 0".into()));
        }
        if self.max_complexity == 0 {
            return Err(SchemaError::InvalidConfig(
                "max_complexity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::DescriptionSource;

    #[test]
    fn test_default_config() {
        let config = SchemaConfig::default();
        assert!(config.auto_camel_case);
        assert_eq!(config.max_depth, 15);
        assert_eq!(config.max_complexity, 500);
        assert!(config.introspection);
        assert_eq!(
            config.description_sources.iter().collect::<Vec<_>>(),
            vec![DescriptionSource::Descriptions]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = SchemaConfig {
            max_depth: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SchemaConfig {
            max_complexity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_config() {
        let config = SchemaConfig::from_toml(
            r#"
            auto_camel_case = false
            description_sources = ["resolver_docstrings", "descriptions"]
            max_depth = 20
            introspection = false
        "#,
        )
        .unwrap();

        assert!(!config.auto_camel_case);
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.max_complexity, 500); // default
        assert!(!config.introspection);
        assert_eq!(
            config.description_sources.iter().collect::<Vec<_>>(),
            vec![
                DescriptionSource::ResolverDocstrings,
                DescriptionSource::Descriptions
            ]
        );
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        let err = SchemaConfig::from_toml("max_depth = 0").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidConfig(_)));

        let err = SchemaConfig::from_toml("description_sources = [\"nope\"]").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidConfig(_)));
    }
}
