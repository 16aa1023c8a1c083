use std::fmt;
use std::sync::Arc;

use async_graphql::Value;
use indexmap::IndexMap;

use super::ScalarType;
use crate::annotation::{Namespace, NativeType};
use crate::directive::SchemaDirective;
use crate::error::SchemaError;
use crate::value::Data;

type SerializeFn = Arc<dyn Fn(&Data) -> Result<Value, String> + Send + Sync>;
type ParseFn = Arc<dyn Fn(&Value) -> Result<Data, String> + Send + Sync>;
type ValidateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A wire scalar: how values are serialized and how input is parsed.
#[derive(Clone)]
pub struct ScalarDefinition {
    name: String,
    description: Option<String>,
    specified_by_url: Option<String>,
    builtin: bool,
    serialize: SerializeFn,
    parse_value: ParseFn,
    validator: Option<ValidateFn>,
    directives: Vec<SchemaDirective>,
}

impl ScalarDefinition {
    /// A custom scalar with structural serialization and parsing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            specified_by_url: None,
            builtin: false,
            serialize: Arc::new(|data| {
                data.to_value()
                    .ok_or_else(|| "unset value has no representation".to_owned())
            }),
            parse_value: Arc::new(|value| Ok(Data::from_value(value))),
            validator: None,
            directives: Vec::new(),
        }
    }

    /// Arbitrary JSON passed through unchanged.
    pub fn json() -> Self {
        Self::new("JSON")
            .description("The `JSON` scalar type represents JSON values")
            .specified_by_url("https://ecma-international.org/wp-content/uploads/ECMA-404_2nd_edition_december_2017.pdf")
            .parse_with(|value| {
                value
                    .clone()
                    .into_json()
                    .map(Data::Json)
                    .map_err(|e| e.to_string())
            })
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn specified_by_url(mut self, url: impl Into<String>) -> Self {
        self.specified_by_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn serialize_with(
        mut self,
        serialize: impl Fn(&Data) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.serialize = Arc::new(serialize);
        self
    }

    #[must_use]
    pub fn parse_with(
        mut self,
        parse: impl Fn(&Value) -> Result<Data, String> + Send + Sync + 'static,
    ) -> Self {
        self.parse_value = Arc::new(parse);
        self
    }

    /// Input check run by the execution engine before parsing.
    #[must_use]
    pub fn validator(mut self, validator: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn directive(mut self, directive: SchemaDirective) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn declare(self, namespace: &Namespace) -> Arc<ScalarDefinition> {
        let definition = Arc::new(self);
        namespace.declare(Arc::clone(&definition));
        definition
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn explicit_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn directives(&self) -> &[SchemaDirective] {
        &self.directives
    }

    pub fn specified_by(&self) -> Option<&str> {
        self.specified_by_url.as_deref()
    }

    /// Built-in scalars are predefined by the execution engine and never
    /// registered.
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    pub(crate) fn validator_fn(&self) -> Option<ValidateFn> {
        self.validator.clone()
    }

    /// # Errors
    ///
    /// Returns the scalar's own message when the value does not fit.
    pub fn serialize(&self, data: &Data) -> Result<Value, String> {
        (self.serialize)(data)
    }

    /// # Errors
    ///
    /// Returns the scalar's own message when the input does not fit.
    pub fn parse_value(&self, value: &Value) -> Result<Data, String> {
        (self.parse_value)(value)
    }

    fn builtin(name: &str, serialize: SerializeFn, parse_value: ParseFn) -> Self {
        Self {
            name: name.to_owned(),
            description: None,
            specified_by_url: None,
            builtin: true,
            serialize,
            parse_value,
            validator: None,
            directives: Vec::new(),
        }
    }

    fn int() -> Self {
        Self::builtin(
            "Int",
            Arc::new(|data| match data {
                Data::Int(i) => i32::try_from(*i)
                    .map(Value::from)
                    .map_err(|_| format!("Int cannot represent non 32-bit signed integer value: {i}")),
                Data::Boolean(b) => Ok(Value::from(i32::from(*b))),
                other => Err(format!("Int cannot represent non-integer value: {other:?}")),
            }),
            Arc::new(|value| match value {
                Value::Number(n) => n
                    .as_i64()
                    .map(Data::Int)
                    .ok_or_else(|| format!("Int cannot represent non-integer value: {n}")),
                other => Err(format!("Int cannot represent non-integer value: {other}")),
            }),
        )
    }

    fn float() -> Self {
        Self::builtin(
            "Float",
            Arc::new(|data| {
                data.as_f64()
                    .map(Value::from)
                    .ok_or_else(|| format!("Float cannot represent non numeric value: {data:?}"))
            }),
            Arc::new(|value| match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(Data::Float)
                    .ok_or_else(|| format!("Float cannot represent value: {n}")),
                other => Err(format!("Float cannot represent non numeric value: {other}")),
            }),
        )
    }

    fn string() -> Self {
        Self::builtin(
            "String",
            Arc::new(|data| match data {
                Data::String(s) => Ok(Value::String(s.clone())),
                Data::Int(i) => Ok(Value::String(i.to_string())),
                Data::Float(f) => Ok(Value::String(f.to_string())),
                Data::Boolean(b) => Ok(Value::String(b.to_string())),
                other => Err(format!("String cannot represent value: {other:?}")),
            }),
            Arc::new(|value| match value {
                Value::String(s) => Ok(Data::String(s.clone())),
                other => Err(format!("String cannot represent a non string value: {other}")),
            }),
        )
    }

    fn boolean() -> Self {
        Self::builtin(
            "Boolean",
            Arc::new(|data| match data {
                Data::Boolean(b) => Ok(Value::Boolean(*b)),
                other => Err(format!("Boolean cannot represent a non boolean value: {other:?}")),
            }),
            Arc::new(|value| match value {
                Value::Boolean(b) => Ok(Data::Boolean(*b)),
                other => Err(format!("Boolean cannot represent a non boolean value: {other}")),
            }),
        )
    }

    fn id() -> Self {
        Self::builtin(
            "ID",
            Arc::new(|data| match data {
                Data::String(s) => Ok(Value::String(s.clone())),
                Data::Int(i) => Ok(Value::String(i.to_string())),
                other => Err(format!("ID cannot represent value: {other:?}")),
            }),
            Arc::new(|value| match value {
                Value::String(s) => Ok(Data::String(s.clone())),
                Value::Number(n) => Ok(Data::String(n.to_string())),
                other => Err(format!("ID cannot represent value: {other}")),
            }),
        )
    }
}

impl fmt::Debug for ScalarDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarDefinition")
            .field("name", &self.name)
            .field("builtin", &self.builtin)
            .field("specified_by_url", &self.specified_by_url)
            .finish_non_exhaustive()
    }
}

/// Maps native types to wire scalars.
#[derive(Debug, Clone)]
pub struct ScalarRegistry {
    scalars: IndexMap<NativeType, Arc<ScalarDefinition>>,
}

impl Default for ScalarRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ScalarRegistry {
    /// Registry with `int`, `float`, `str`, `bool` and `ID` mapped to the
    /// built-in scalars.
    pub fn with_builtins() -> Self {
        let scalars = [
            (NativeType::INT, ScalarDefinition::int()),
            (NativeType::FLOAT, ScalarDefinition::float()),
            (NativeType::STR, ScalarDefinition::string()),
            (NativeType::BOOL, ScalarDefinition::boolean()),
            (NativeType::ID, ScalarDefinition::id()),
        ]
        .into_iter()
        .map(|(native, def)| (native, Arc::new(def)))
        .collect();
        Self { scalars }
    }

    /// Maps `native` to `definition`, replacing any previous mapping.
    pub fn register(&mut self, native: NativeType, definition: Arc<ScalarDefinition>) {
        self.scalars.insert(native, definition);
    }

    pub fn get(&self, native: &NativeType) -> Option<&Arc<ScalarDefinition>> {
        self.scalars.get(native)
    }

    /// The definition serving a scalar position.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnsupportedType`] for a native type without a
    /// mapping.
    pub fn resolve(&self, scalar: &ScalarType) -> Result<Arc<ScalarDefinition>, SchemaError> {
        match scalar {
            ScalarType::Defined(def) => Ok(Arc::clone(def)),
            ScalarType::Native(native) => {
                self.get(native)
                    .cloned()
                    .ok_or_else(|| SchemaError::UnsupportedType {
                        type_name: native.name().to_owned(),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let registry = ScalarRegistry::with_builtins();
        let int = registry
            .resolve(&ScalarType::Native(NativeType::INT))
            .unwrap();
        assert_eq!(int.name(), "Int");
        assert!(int.is_builtin());
        assert_eq!(int.serialize(&Data::Int(7)).unwrap(), Value::from(7));
        assert!(int.serialize(&Data::Int(i64::from(i32::MAX) + 1)).is_err());
        assert!(int.serialize(&Data::from("7")).is_err());

        let id = registry.resolve(&ScalarType::Native(NativeType::ID)).unwrap();
        assert_eq!(id.serialize(&Data::Int(3)).unwrap(), Value::from("3"));
    }

    #[test]
    fn test_unknown_native_type() {
        let registry = ScalarRegistry::with_builtins();
        let err = registry
            .resolve(&ScalarType::Native(NativeType::new("datetime")))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedType {
                type_name: "datetime".into()
            }
        );
    }

    #[test]
    fn test_override() {
        let mut registry = ScalarRegistry::with_builtins();
        let datetime = Arc::new(
            ScalarDefinition::new("DateTime").serialize_with(|data| match data {
                Data::String(s) => Ok(Value::String(format!("{s}Z"))),
                _ => Err("expected a timestamp".to_owned()),
            }),
        );
        registry.register(NativeType::new("datetime"), Arc::clone(&datetime));

        let resolved = registry
            .resolve(&ScalarType::Native(NativeType::new("datetime")))
            .unwrap();
        assert!(Arc::ptr_eq(&resolved, &datetime));
        assert!(!resolved.is_builtin());
        assert_eq!(
            resolved.serialize(&Data::from("2024-01-01T00:00:00")).unwrap(),
            Value::from("2024-01-01T00:00:00Z")
        );
    }
}
