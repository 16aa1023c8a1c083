//! Resolver results to engine values.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use async_graphql::dynamic::FieldValue;
use async_graphql::{Name, Value};

use crate::error::ResolveError;
use crate::types::{Candidate, EnumDefinition, ScalarDefinition, TypeResolution};
use crate::value::Data;

/// Members of a union or implementors of an interface. Shared between the
/// converter and every field returning the abstract type; filled once the
/// members are known.
pub(crate) type PossibleTypes = Arc<OnceLock<Vec<Candidate>>>;

/// An enum with the schema names of its members, in declaration order.
#[derive(Clone)]
pub(crate) struct EnumShape {
    definition: Arc<EnumDefinition>,
    names: Arc<[String]>,
}

impl EnumShape {
    pub(crate) fn new(definition: Arc<EnumDefinition>, names: Vec<String>) -> Self {
        Self {
            definition,
            names: names.into(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.definition.name()
    }

    /// Schema name of the member `data` stands for.
    pub(crate) fn serialize(&self, data: &Data) -> Result<&str, ResolveError> {
        let index = self.definition.position(data)?;
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| ResolveError::Serialization {
                type_name: self.definition.name().to_owned(),
                reason: format!("{data:?} has no schema name"),
            })
    }

    /// The member whose schema name is `identifier`.
    pub(crate) fn parse(&self, identifier: &str) -> Result<Data, ResolveError> {
        self.names
            .iter()
            .position(|name| name == identifier)
            .and_then(|index| self.definition.member_at(index))
            .ok_or_else(|| ResolveError::UnknownEnumValue {
                enum_name: self.definition.name().to_owned(),
                value: identifier.to_owned(),
            })
    }
}

pub(crate) struct AbstractShape {
    pub(crate) name: String,
    pub(crate) possible: PossibleTypes,
    pub(crate) resolution: Arc<dyn TypeResolution>,
}

/// How a field's value is handed to the engine.
pub(crate) enum OutputShape {
    Scalar(Arc<ScalarDefinition>),
    Enum(EnumShape),
    Object,
    Abstract(AbstractShape),
    List(Box<OutputShape>),
}

impl OutputShape {
    /// `Null` and `Unset` become a null field; the engine reports it if the
    /// position is non-null.
    pub(crate) fn output<'a>(&self, data: Cow<'a, Data>) -> Result<Option<FieldValue<'a>>, ResolveError> {
        if data.is_null() {
            return Ok(None);
        }
        let value = match self {
            Self::Scalar(def) => {
                let value = def.serialize(&data).map_err(|reason| ResolveError::Serialization {
                    type_name: def.name().to_owned(),
                    reason,
                })?;
                FieldValue::value(value)
            }
            Self::Enum(shape) => FieldValue::value(Value::Enum(Name::new(shape.serialize(&data)?))),
            Self::Object => object_value(data),
            Self::Abstract(shape) => {
                let candidates = shape.possible.get().map_or(&[][..], Vec::as_slice);
                let type_name = shape.resolution.resolve_type(&shape.name, &data, candidates)?;
                object_value(data).with_type(type_name)
            }
            Self::List(item) => FieldValue::list(list_items(item, data)?),
        };
        Ok(Some(value))
    }
}

fn object_value(data: Cow<'_, Data>) -> FieldValue<'_> {
    match data {
        Cow::Borrowed(data) => FieldValue::borrowed_any(data),
        Cow::Owned(data) => FieldValue::owned_any(data),
    }
}

fn list_items<'a>(item: &OutputShape, data: Cow<'a, Data>) -> Result<Vec<FieldValue<'a>>, ResolveError> {
    let convert = |data: Cow<'a, Data>| {
        item.output(data)
            .map(|value| value.unwrap_or(FieldValue::NULL))
    };
    match data {
        Cow::Borrowed(Data::List(items)) => items.iter().map(|d| convert(Cow::Borrowed(d))).collect(),
        Cow::Owned(Data::List(items)) => items.into_iter().map(|d| convert(Cow::Owned(d))).collect(),
        other => Err(ResolveError::Serialization {
            type_name: "List".to_owned(),
            reason: format!("expected a list, got {:?}", other.as_ref()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DefaultTypeResolution, ScalarRegistry, TypeDefinition};
    use crate::annotation::NativeType;

    fn int() -> Arc<ScalarDefinition> {
        Arc::clone(ScalarRegistry::default().get(&NativeType::INT).unwrap())
    }

    #[test]
    fn test_null_and_unset_are_absent() {
        let shape = OutputShape::Scalar(int());
        assert!(shape.output(Cow::Owned(Data::Null)).unwrap().is_none());
        assert!(shape.output(Cow::Owned(Data::Unset)).unwrap().is_none());
        assert!(shape.output(Cow::Owned(Data::Int(3))).unwrap().is_some());
    }

    #[test]
    fn test_scalar_serialization_error() {
        let shape = OutputShape::Scalar(int());
        let err = shape.output(Cow::Owned(Data::from("x"))).unwrap_err();
        assert!(matches!(err, ResolveError::Serialization { ref type_name, .. } if type_name == "Int"));
    }

    #[test]
    fn test_list_requires_list() {
        let shape = OutputShape::List(Box::new(OutputShape::Scalar(int())));
        assert!(shape.output(Cow::Owned(Data::from(vec![1, 2]))).is_ok());
        assert!(shape.output(Cow::Owned(Data::Int(1))).is_err());
    }

    #[test]
    fn test_abstract_without_members_is_unresolvable() {
        let def = TypeDefinition::object("Cat").build().unwrap();
        let shape = OutputShape::Abstract(AbstractShape {
            name: "Pet".into(),
            possible: PossibleTypes::default(),
            resolution: Arc::new(DefaultTypeResolution),
        });
        let value = Data::Object(def.instantiate(Vec::<(&str, Data)>::new()).unwrap());
        assert!(matches!(
            shape.output(Cow::Owned(value)),
            Err(ResolveError::UnresolvableUnionMember { .. })
        ));
    }

    #[test]
    fn test_enum_members_leave_under_schema_names() {
        let status = EnumDefinition::new("Status")
            .value("IN_PROGRESS", 1)
            .value("DONE", 2)
            .build();
        let shape = EnumShape::new(Arc::clone(&status), vec!["inProgress".into(), "done".into()]);

        let member = status.member("IN_PROGRESS").unwrap();
        assert_eq!(shape.serialize(&member).unwrap(), "inProgress");
        assert_eq!(shape.serialize(&Data::Int(2)).unwrap(), "done");
        assert_eq!(shape.parse("inProgress").unwrap(), member);
        assert!(matches!(
            shape.parse("IN_PROGRESS"),
            Err(ResolveError::UnknownEnumValue { .. })
        ));

        let value = OutputShape::Enum(shape).output(Cow::Owned(member)).unwrap();
        assert!(value.is_some());
    }
}
