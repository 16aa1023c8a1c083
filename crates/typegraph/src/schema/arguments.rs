//! Engine input values to runtime data.

use std::sync::{Arc, OnceLock};

use async_graphql::{Name, Value};
use async_graphql::dynamic::ObjectAccessor;
use indexmap::IndexMap;

use super::output::EnumShape;
use crate::error::ResolveError;
use crate::field::DefaultValue;
use crate::types::{ScalarDefinition, TypeDefinition};
use crate::value::Data;

/// How an input value is converted.
pub(crate) enum InputShape {
    Scalar(Arc<ScalarDefinition>),
    Enum(EnumShape),
    Object(Arc<InputObjectPlan>),
    List(Box<InputShape>),
}

impl InputShape {
    pub(crate) fn convert(&self, value: &Value) -> Result<Data, ResolveError> {
        if matches!(value, Value::Null) {
            return Ok(Data::Null);
        }
        match self {
            Self::Scalar(def) => def.parse_value(value).map_err(ResolveError::InvalidInput),
            Self::Enum(shape) => match value {
                Value::Enum(name) => shape.parse(name.as_str()),
                Value::String(identifier) => shape.parse(identifier),
                other => Err(ResolveError::InvalidInput(format!(
                    "enum '{}' cannot represent {other}",
                    shape.name()
                ))),
            },
            // A single value is accepted where a list is expected.
            Self::List(item) => match value {
                Value::List(items) => items
                    .iter()
                    .map(|value| item.convert(value))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Data::List),
                single => Ok(Data::List(vec![item.convert(single)?])),
            },
            Self::Object(plan) => plan.convert(value),
        }
    }

    /// Engine value of a declared default, with enum members and input
    /// fields under their schema names.
    pub(crate) fn default_value(&self, data: &Data) -> Option<Value> {
        match (self, data) {
            (_, Data::Null) => Some(Value::Null),
            (Self::Enum(shape), data) => shape.serialize(data).ok().map(|name| Value::Enum(Name::new(name))),
            (Self::List(item), Data::List(items)) => Some(Value::List(
                items.iter().filter_map(|data| item.default_value(data)).collect(),
            )),
            (Self::Object(plan), Data::Object(_)) => plan.default_value(data),
            _ => data.to_value(),
        }
    }
}

/// Conversion plan of an input type. Fields are filled in after the plan is
/// registered so self-referencing inputs terminate.
pub(crate) struct InputObjectPlan {
    name: String,
    definition: Arc<TypeDefinition>,
    fields: OnceLock<Vec<InputFieldPlan>>,
}

pub(crate) struct InputFieldPlan {
    pub(crate) declared_name: String,
    pub(crate) graphql_name: String,
    pub(crate) shape: InputShape,
}

impl InputObjectPlan {
    pub(crate) fn new(name: String, definition: Arc<TypeDefinition>) -> Self {
        Self {
            name,
            definition,
            fields: OnceLock::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_fields(&self, fields: Vec<InputFieldPlan>) {
        let _ = self.fields.set(fields);
    }

    fn default_value(&self, data: &Data) -> Option<Value> {
        let (Some(fields), Data::Object(instance)) = (self.fields.get(), data) else {
            return data.to_value();
        };
        Some(Value::Object(
            fields
                .iter()
                .filter_map(|field| {
                    let value = field.shape.default_value(instance.get(&field.declared_name)?)?;
                    Some((Name::new(&field.graphql_name), value))
                })
                .collect(),
        ))
    }

    fn convert(&self, value: &Value) -> Result<Data, ResolveError> {
        let Value::Object(map) = value else {
            return Err(ResolveError::InvalidInput(format!(
                "'{}' expects an object, got {value}",
                self.name
            )));
        };
        let mut values = IndexMap::new();
        for field in self.fields.get().map_or(&[][..], Vec::as_slice) {
            if let Some(value) = map.get(field.graphql_name.as_str()) {
                values.insert(field.declared_name.clone(), field.shape.convert(value)?);
            }
        }
        Ok(Data::Object(self.definition.instantiate_input(values)))
    }
}

/// One argument of a field.
pub(crate) struct ArgumentPlan {
    pub(crate) declared_name: String,
    pub(crate) graphql_name: String,
    pub(crate) default: DefaultValue,
    pub(crate) shape: InputShape,
}

impl ArgumentPlan {
    /// The converted value. An omitted argument takes its declared default,
    /// [`Data::Unset`] for the unset sentinel and null otherwise.
    pub(crate) fn value(&self, args: &ObjectAccessor<'_>) -> Result<Data, ResolveError> {
        match args.get(&self.graphql_name) {
            Some(value) => self.shape.convert(value.as_value()),
            None => Ok(match &self.default {
                DefaultValue::Value(data) => data.clone(),
                DefaultValue::Unset => Data::Unset,
                DefaultValue::Missing => Data::Null,
            }),
        }
    }
}
