use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::debug;

use super::{ConcreteType, TypeVarMap};
use crate::annotation::{Namespace, TypeExpr, TypeVar};
use crate::description::DescriptionSources;
use crate::directive::SchemaDirective;
use crate::docstring::Docstring;
use crate::error::{AnnotationError, SchemaError};
use crate::field::{DefaultValue, Field};
use crate::value::{Data, Instance, Origin};

/// The category of a type definition. Input and interface are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Object,
    Input,
    Interface,
}

type IsTypeOf = Arc<dyn Fn(&Instance) -> bool + Send + Sync>;

/// A declared object, input or interface type.
///
/// Definitions are immutable once built. A generic definition owns the
/// cache of its specializations, so specializing with the same arguments
/// always returns the same `Arc`.
pub struct TypeDefinition {
    name: String,
    kind: TypeKind,
    origin: Origin,
    description: Option<String>,
    docstring: Option<Docstring>,
    description_sources: Option<DescriptionSources>,
    directives: Vec<SchemaDirective>,
    interfaces: Vec<Arc<TypeDefinition>>,
    type_params: Vec<TypeVar>,
    fields: OnceLock<Vec<Field>>,
    specialization: Option<Specialization>,
    specializations: DashMap<Vec<ConcreteType>, Arc<TypeDefinition>>,
    is_type_of: Option<IsTypeOf>,
    namespace: Option<Namespace>,
}

struct Specialization {
    of: Arc<TypeDefinition>,
    args: Vec<ConcreteType>,
}

impl TypeDefinition {
    pub fn object(name: impl Into<String>) -> TypeDefinitionBuilder {
        TypeDefinitionBuilder::new(name.into(), TypeKind::Object)
    }

    pub fn input(name: impl Into<String>) -> TypeDefinitionBuilder {
        TypeDefinitionBuilder::new(name.into(), TypeKind::Input)
    }

    pub fn interface(name: impl Into<String>) -> TypeDefinitionBuilder {
        TypeDefinitionBuilder::new(name.into(), TypeKind::Interface)
    }

    /// Declared name. Specializations share the name of their origin; the
    /// schema name is chosen by the name converter.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_input(&self) -> bool {
        self.kind == TypeKind::Input
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn docstring(&self) -> Option<&Docstring> {
        self.docstring.as_ref()
    }

    /// Description sources for this type and its fields, replacing the
    /// schema-wide setting.
    pub fn description_sources(&self) -> Option<&DescriptionSources> {
        self.description_sources.as_ref()
    }

    pub fn directives(&self) -> &[SchemaDirective] {
        &self.directives
    }

    /// Interfaces implemented directly or through bases, without duplicates.
    pub fn interfaces(&self) -> &[Arc<TypeDefinition>] {
        &self.interfaces
    }

    /// Unbound type variables, in order of first occurrence.
    pub fn type_params(&self) -> &[TypeVar] {
        &self.type_params
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    /// Fields in declaration order, inherited fields first.
    pub fn fields(&self) -> &[Field] {
        self.fields.get_or_init(|| match &self.specialization {
            Some(spec) => {
                let map = spec.type_var_map();
                spec.of.fields().iter().map(|f| f.copy_with(&map)).collect()
            }
            None => Vec::new(),
        })
    }

    pub fn field(&self, declared_name: &str) -> Option<&Field> {
        self.fields().iter().find(|f| f.declared_name() == declared_name)
    }

    /// The generic definition this one specializes.
    pub fn concrete_of(&self) -> Option<&Arc<TypeDefinition>> {
        self.specialization.as_ref().map(|spec| &spec.of)
    }

    /// Type arguments this definition was specialized with.
    pub fn specialized_args(&self) -> Option<&[ConcreteType]> {
        self.specialization.as_ref().map(|spec| spec.args.as_slice())
    }

    /// Runs the runtime type test, if one was declared.
    pub fn is_type_of(&self, instance: &Instance) -> Option<bool> {
        self.is_type_of.as_ref().map(|test| test(instance))
    }

    /// Specializes the generic origin of this definition with `args`, one
    /// per type parameter of the origin.
    ///
    /// Arguments identical to the origin's own parameters return the origin
    /// itself. Otherwise the result is cached, so equal arguments always
    /// produce the same definition.
    ///
    /// # Errors
    ///
    /// Fails when the definition is not generic or the argument count differs
    /// from the number of type parameters.
    pub fn specialize(
        self: &Arc<Self>,
        args: Vec<ConcreteType>,
    ) -> Result<Arc<TypeDefinition>, AnnotationError> {
        let root = self.generic_root();
        if root.type_params.is_empty() {
            return Err(AnnotationError::NotGeneric {
                name: root.name.clone(),
            });
        }
        if args.len() != root.type_params.len() {
            return Err(AnnotationError::GenericArity {
                name: root.name.clone(),
                expected: root.type_params.len(),
                found: args.len(),
            });
        }

        let unbound = args
            .iter()
            .zip(&root.type_params)
            .all(|(arg, param)| matches!(arg, ConcreteType::TypeVar(var) if var == param));
        if unbound {
            return Ok(root);
        }

        if let Some(existing) = root.specializations.get(&args) {
            return Ok(Arc::clone(existing.value()));
        }
        debug!(type_name = %root.name, args = args.len(), "Specializing generic type");
        let specialized = Arc::new(root.specialized_copy(args.clone())?);
        // A concurrent caller may have won; keep the first copy.
        let specialized = root
            .specializations
            .entry(args)
            .or_insert(specialized)
            .value()
            .clone();
        Ok(specialized)
    }

    /// Produces the definition with type variables substituted per `map`.
    ///
    /// # Errors
    ///
    /// Propagates a failed specialization.
    pub fn copy_with(self: &Arc<Self>, map: &TypeVarMap) -> Result<Arc<TypeDefinition>, AnnotationError> {
        let current: Vec<ConcreteType> = match &self.specialization {
            Some(spec) => spec.args.clone(),
            None => self
                .type_params
                .iter()
                .cloned()
                .map(ConcreteType::TypeVar)
                .collect(),
        };
        let args = current
            .iter()
            .map(|arg| arg.substitute(map))
            .collect::<Result<Vec<_>, _>>()?;
        self.specialize(args)
    }

    /// Builds an instance from keyword values, the way a generated
    /// constructor would.
    ///
    /// Only basic fields participate. Missing values fall back to the field
    /// default; computed fields and unknown names are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidConstructorArguments`] for missing
    /// required values or unexpected keywords.
    pub fn instantiate<K, V>(
        &self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Instance, SchemaError>
    where
        K: Into<String>,
        V: Into<Data>,
    {
        let mut values: IndexMap<String, Data> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut instance = Instance::new(self.origin);

        for field in self.fields().iter().filter(|f| f.participates_in_init()) {
            let name = field.declared_name();
            let value = match values.shift_remove(name) {
                Some(value) => value,
                None => match field.default_value() {
                    DefaultValue::Value(value) => value.clone(),
                    DefaultValue::Unset => Data::Unset,
                    DefaultValue::Missing => {
                        return Err(SchemaError::InvalidConstructorArguments {
                            type_name: self.name.clone(),
                            reason: format!("missing required argument '{name}'"),
                        });
                    }
                },
            };
            instance.set(name, value);
        }

        if let Some(extra) = values.keys().next() {
            return Err(SchemaError::InvalidConstructorArguments {
                type_name: self.name.clone(),
                reason: format!("unexpected keyword argument '{extra}'"),
            });
        }
        Ok(instance)
    }

    /// Builds an input instance from converted argument values. Missing
    /// values take the field default, or stay unset.
    pub(crate) fn instantiate_input(&self, mut values: IndexMap<String, Data>) -> Instance {
        let mut instance = Instance::new(self.origin);
        for field in self.fields() {
            let name = field.declared_name();
            let value = values.shift_remove(name).unwrap_or_else(|| match field.default_value() {
                DefaultValue::Value(value) => value.clone(),
                DefaultValue::Unset | DefaultValue::Missing => Data::Unset,
            });
            instance.set(name, value);
        }
        instance
    }

    fn generic_root(self: &Arc<Self>) -> Arc<TypeDefinition> {
        match &self.specialization {
            Some(spec) => Arc::clone(&spec.of),
            None => Arc::clone(self),
        }
    }

    fn specialized_copy(self: &Arc<Self>, args: Vec<ConcreteType>) -> Result<TypeDefinition, AnnotationError> {
        let mut type_params = Vec::new();
        for arg in &args {
            arg.collect_type_vars(&mut type_params);
        }

        let map: TypeVarMap = self.type_params.iter().cloned().zip(args.iter().cloned()).collect();
        let interfaces = self
            .interfaces
            .iter()
            .map(|interface| {
                if interface.is_generic() {
                    interface.copy_with(&map)
                } else {
                    Ok(Arc::clone(interface))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TypeDefinition {
            name: self.name.clone(),
            kind: self.kind,
            origin: Origin::fresh(),
            description: self.description.clone(),
            docstring: self.docstring.clone(),
            description_sources: self.description_sources.clone(),
            directives: self.directives.clone(),
            interfaces,
            type_params,
            fields: OnceLock::new(),
            specialization: Some(Specialization {
                of: Arc::clone(self),
                args,
            }),
            specializations: DashMap::new(),
            is_type_of: self.is_type_of.clone(),
            namespace: self.namespace.clone(),
        })
    }
}

impl Specialization {
    fn type_var_map(&self) -> TypeVarMap {
        self.of
            .type_params
            .iter()
            .cloned()
            .zip(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Debug for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("origin", &self.origin)
            .field("type_params", &self.type_params)
            .field(
                "specialized_args",
                &self.specialization.as_ref().map(|s| &s.args),
            )
            .finish_non_exhaustive()
    }
}

/// Collects the parts of a type declaration and validates them.
pub struct TypeDefinitionBuilder {
    name: String,
    kind: TypeKind,
    description: Option<String>,
    docstring: Option<Docstring>,
    description_sources: Option<DescriptionSources>,
    directives: Vec<SchemaDirective>,
    bases: Vec<Arc<TypeDefinition>>,
    fields: Vec<Field>,
    type_params: Option<Vec<TypeVar>>,
    is_type_of: Option<IsTypeOf>,
    namespace: Option<Namespace>,
}

impl TypeDefinitionBuilder {
    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            description: None,
            docstring: None,
            description_sources: None,
            directives: Vec::new(),
            bases: Vec::new(),
            fields: Vec::new(),
            type_params: None,
            is_type_of: None,
            namespace: None,
        }
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

    /// Inherits the fields of `base`. Interfaces, and the interfaces of any
    /// base, become interfaces of the new type.
    #[must_use]
    pub fn base(mut self, base: &Arc<TypeDefinition>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// A plain attribute: a basic field with a default value.
    #[must_use]
    pub fn attribute(
        self,
        name: impl Into<String>,
        ty: impl Into<TypeExpr>,
        default: impl Into<Data>,
    ) -> Self {
        self.field(Field::new(name).ty(ty).default(default))
    }

    /// Declares the type parameters explicitly instead of inferring them
    /// from field types.
    #[must_use]
    pub fn type_params(mut self, params: impl IntoIterator<Item = TypeVar>) -> Self {
        self.type_params = Some(params.into_iter().collect());
        self
    }

    /// Runtime test used to match instances against this type when it is a
    /// member of a union or implements an interface.
    #[must_use]
    pub fn is_type_of(mut self, test: impl Fn(&Instance) -> bool + Send + Sync + 'static) -> Self {
        self.is_type_of = Some(Arc::new(test));
        self
    }

    /// Namespace used to evaluate forward references in field types.
    #[must_use]
    pub fn namespace(mut self, namespace: &Namespace) -> Self {
        self.namespace = Some(namespace.clone());
        self
    }

    /// Validates the declaration and builds the definition.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingFieldAnnotation`] or
    /// [`SchemaError::MissingReturnAnnotation`] for incomplete fields, and
    /// [`SchemaError::FieldWithResolverAndDefault`] for a field with both.
    pub fn build(self) -> Result<Arc<TypeDefinition>, SchemaError> {
        let mut interfaces: Vec<Arc<TypeDefinition>> = Vec::new();
        let mut fields: Vec<Field> = Vec::new();
        let mut docstring = self.docstring;

        for base in &self.bases {
            if base.is_interface() {
                push_interface(&mut interfaces, base);
            }
            for interface in base.interfaces() {
                push_interface(&mut interfaces, interface);
            }
            for field in base.fields() {
                merge_field(&mut fields, field.clone());
            }
            if let (Some(doc), Some(parent)) = (docstring.as_mut(), base.docstring()) {
                doc.inherit_params(parent);
            }
        }

        for mut field in self.fields {
            field.attach(&self.name, self.namespace.as_ref())?;
            merge_field(&mut fields, field);
        }

        let type_params = match self.type_params {
            Some(params) => params,
            None => {
                let mut params = Vec::new();
                for field in &fields {
                    field.collect_type_vars(&mut params)?;
                }
                params
            }
        };

        debug!(
            type_name = %self.name,
            kind = ?self.kind,
            fields = fields.len(),
            generic = !type_params.is_empty(),
            "Declared type"
        );

        Ok(Arc::new(TypeDefinition {
            name: self.name,
            kind: self.kind,
            origin: Origin::fresh(),
            description: self.description,
            docstring,
            description_sources: self.description_sources,
            directives: self.directives,
            interfaces,
            type_params,
            fields: OnceLock::from(fields),
            specialization: None,
            specializations: DashMap::new(),
            is_type_of: self.is_type_of,
            namespace: self.namespace,
        }))
    }

    /// Builds the definition with `namespace` captured and declares it there.
    ///
    /// # Errors
    ///
    /// See [`TypeDefinitionBuilder::build`].
    pub fn declare(self, namespace: &Namespace) -> Result<Arc<TypeDefinition>, SchemaError> {
        let definition = self.namespace(namespace).build()?;
        namespace.declare(&definition);
        Ok(definition)
    }
}

fn push_interface(interfaces: &mut Vec<Arc<TypeDefinition>>, interface: &Arc<TypeDefinition>) {
    if !interfaces.iter().any(|i| i.origin == interface.origin) {
        interfaces.push(Arc::clone(interface));
    }
}

/// Later declarations of a name replace earlier ones in place.
fn merge_field(fields: &mut Vec<Field>, field: Field) {
    match fields
        .iter_mut()
        .find(|f| f.declared_name() == field.declared_name())
    {
        Some(existing) => *existing = field,
        None => fields.push(field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{NativeType, TypeAnnotation};
    use crate::field::Resolver;
    use crate::types::ScalarType;

    #[test]
    fn test_fields_keep_declaration_order() {
        let point = TypeDefinition::object("Point")
            .field(Field::new("x").ty(TypeExpr::int()))
            .field(Field::new("y").ty(TypeExpr::int()))
            .build()
            .unwrap();

        let names: Vec<&str> = point.fields().iter().map(Field::declared_name).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert!(!point.is_generic());
        assert!(!point.is_input());
    }

    #[test]
    fn test_missing_field_annotation() {
        let err = TypeDefinition::object("Broken")
            .field(Field::new("x"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingFieldAnnotation {
                type_name: "Broken".into(),
                field: "x".into()
            }
        );
    }

    #[test]
    fn test_missing_return_annotation() {
        let resolver = Resolver::new("total").sync(|_| Ok(Data::Int(1)));
        let err = TypeDefinition::object("Broken")
            .field(Field::from_resolver(resolver).unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingReturnAnnotation { ref field, .. } if field == "total"));
    }

    #[test]
    fn test_interfaces_collected_transitively_without_duplicates() {
        let node = TypeDefinition::interface("Node")
            .field(Field::new("id").ty(TypeExpr::id()))
            .build()
            .unwrap();
        let named = TypeDefinition::interface("Named")
            .base(&node)
            .field(Field::new("name").ty(TypeExpr::string()))
            .build()
            .unwrap();
        let user = TypeDefinition::object("User")
            .base(&named)
            .base(&node)
            .field(Field::new("email").ty(TypeExpr::string()))
            .build()
            .unwrap();

        let interfaces: Vec<&str> = user.interfaces().iter().map(|i| i.name()).collect();
        assert_eq!(interfaces, vec!["Named", "Node"]);

        let fields: Vec<&str> = user.fields().iter().map(Field::declared_name).collect();
        assert_eq!(fields, vec!["id", "name", "email"]);
    }

    #[test]
    fn test_specialization_is_cached_and_substitutes_fields() {
        let ns = Namespace::new("generic");
        let t = ns.type_var("T");
        let boxed = TypeDefinition::object("Box")
            .field(Field::new("value").ty(&t))
            .declare(&ns)
            .unwrap();
        assert_eq!(boxed.type_params(), &[t.clone()]);

        let int_box = boxed
            .specialize(vec![ConcreteType::Scalar(ScalarType::Native(NativeType::INT))])
            .unwrap();
        let again = TypeAnnotation::with_namespace(TypeExpr::forward("Box[int]"), &ns)
            .resolve()
            .unwrap();

        assert!(Arc::ptr_eq(&int_box, again.definition().unwrap()));
        assert!(!int_box.is_generic());
        assert_eq!(int_box.name(), "Box");
        assert!(Arc::ptr_eq(int_box.concrete_of().unwrap(), &boxed));
        assert_eq!(
            int_box.field("value").unwrap().field_type().unwrap().to_string(),
            "int"
        );
    }

    #[test]
    fn test_unbound_arguments_return_the_generic_itself() {
        let ns = Namespace::new("generic");
        let t = ns.type_var("T");
        let boxed = TypeDefinition::object("Box")
            .field(Field::new("value").ty(&t))
            .declare(&ns)
            .unwrap();
        let same = boxed.specialize(vec![ConcreteType::TypeVar(t)]).unwrap();
        assert!(Arc::ptr_eq(&same, &boxed));
    }

    #[test]
    fn test_self_referential_generic() {
        let ns = Namespace::new("linked");
        let t = ns.type_var("T");
        let node = TypeDefinition::object("Node")
            .field(Field::new("value").ty(&t))
            .field(Field::new("next").ty(TypeExpr::forward("Optional[Node[T]]")))
            .declare(&ns)
            .unwrap();
        assert_eq!(node.type_params().len(), 1);

        let int_node = TypeAnnotation::with_namespace(TypeExpr::forward("Node[int]"), &ns)
            .resolve()
            .unwrap();
        let int_node = int_node.definition().unwrap();
        let next = int_node.field("next").unwrap().field_type().unwrap();
        let ConcreteType::Optional(inner) = next else {
            panic!("expected optional");
        };
        assert!(Arc::ptr_eq(inner.definition().unwrap(), int_node));
    }

    #[test]
    fn test_specialization_substitutes_interfaces() {
        let ns = Namespace::new("generic_interfaces");
        let t = ns.type_var("T");
        let holder = TypeDefinition::interface("Holder")
            .field(Field::new("value").ty(&t))
            .declare(&ns)
            .unwrap();
        let boxed = TypeDefinition::object("Box")
            .base(&holder)
            .field(Field::new("label").ty(TypeExpr::string()))
            .declare(&ns)
            .unwrap();
        assert_eq!(boxed.type_params(), &[t]);

        let int_box = boxed
            .specialize(vec![ConcreteType::Scalar(ScalarType::Native(NativeType::INT))])
            .unwrap();
        let interface = &int_box.interfaces()[0];
        assert!(!interface.is_generic());
        assert!(Arc::ptr_eq(interface.concrete_of().unwrap(), &holder));
        assert_eq!(
            interface.field("value").unwrap().field_type().unwrap().to_string(),
            "int"
        );
    }

    #[test]
    fn test_specialized_field_resolves_once_declared() {
        let ns = Namespace::new("generic_forward");
        let t = ns.type_var("T");
        let boxed = TypeDefinition::object("Box")
            .field(Field::new("value").ty(&t))
            .field(Field::new("later").ty(TypeExpr::forward("Later[T]")))
            .declare(&ns)
            .unwrap();
        assert_eq!(boxed.type_params().len(), 1);

        let int_box = boxed
            .specialize(vec![ConcreteType::Scalar(ScalarType::Native(NativeType::INT))])
            .unwrap();
        let later = int_box.field("later").unwrap();
        assert!(matches!(
            later.field_type(),
            Err(AnnotationError::UnknownName { ref name }) if name == "Later"
        ));

        TypeDefinition::object("Later")
            .field(Field::new("item").ty(&ns.type_var("U")))
            .declare(&ns)
            .unwrap();
        let ty = later.field_type().unwrap();
        assert!(!ty.is_generic());
        assert_eq!(
            ty.definition().unwrap().field("item").unwrap().field_type().unwrap().to_string(),
            "int"
        );
    }

    #[test]
    fn test_malformed_forward_reference_fails_declaration() {
        let ns = Namespace::new("malformed");
        ns.type_var("T");
        let err = TypeDefinition::object("Broken")
            .field(Field::new("items").ty(TypeExpr::forward("List[T")))
            .declare(&ns)
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnresolvedFieldType { ref field, source: AnnotationError::Syntax { .. }, .. }
                if field == "items"
        ));
    }

    #[test]
    fn test_instantiate() {
        let point = TypeDefinition::object("Point")
            .field(Field::new("x").ty(TypeExpr::int()))
            .attribute("y", TypeExpr::int(), 0)
            .field(
                Field::from_resolver(
                    Resolver::new("norm")
                        .returns(TypeExpr::float())
                        .sync(|_| Ok(Data::Float(0.0))),
                )
                .unwrap(),
            )
            .build()
            .unwrap();

        let instance = point.instantiate([("x", 3)]).unwrap();
        assert_eq!(instance.get("x"), Some(&Data::Int(3)));
        assert_eq!(instance.get("y"), Some(&Data::Int(0)));
        assert_eq!(instance.get("norm"), None);
        assert_eq!(instance.origin(), point.origin());

        assert!(point.instantiate(Vec::<(&str, i64)>::new()).is_err());
        assert!(point.instantiate([("x", 1), ("norm", 2)]).is_err());
    }
}
