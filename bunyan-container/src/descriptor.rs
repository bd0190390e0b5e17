//! Class descriptors: what the container knows about a type.
//!
//! Rust has no runtime reflection, so every component type is described
//! up front: its markers, constructors, methods and injectable fields,
//! each member carrying a closure that performs the actual invocation.
//! Descriptors are built once with [`ClassDescriptor::builder`] and shared
//! behind `Arc`.
//!
//! ```
//! use std::sync::Arc;
//! use bunyan_container::prelude::*;
//!
//! struct Repo;
//!
//! struct Service {
//!     repo: Arc<Repo>,
//! }
//!
//! let repo = ClassDescriptor::builder::<Repo>("shop::Repo")
//!     .component()
//!     .constructor(ConstructorDescriptor::new(|_| Ok(Repo)))
//!     .build();
//!
//! let service = ClassDescriptor::builder::<Service>("shop::Service")
//!     .component()
//!     .constructor(
//!         ConstructorDescriptor::new(|args| Ok(Service { repo: args.bean::<Repo>(0)? }))
//!             .param(ParamDescriptor::autowired::<Repo>()),
//!     )
//!     .build();
//!
//! assert_eq!(service.simple_name(), "Service");
//! assert_eq!(repo.package(), "shop");
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bunyan_support::rendering::shorten_type_name;

use crate::args::Args;
use crate::bean::Instance;
use crate::error::{BunyanError, Result};
use crate::key::TypeKey;
use crate::marker::{
    Annotation, Annotations, AutowiredMarker, BeanMarker, ComponentMarker, ConfigurationMarker,
    InjectionMarkers, MethodMarkers, Stereotype, ValueMarker,
};
use crate::slot::{Configured, Wired};

type Caster = Arc<dyn Fn(Instance) -> Option<Box<dyn Any>> + Send + Sync>;
type ConstructFn = Arc<dyn Fn(&mut Args) -> Result<Instance> + Send + Sync>;
type InvokeFn =
    Arc<dyn Fn(&(dyn Any + Send + Sync), &mut Args) -> Result<Option<Instance>> + Send + Sync>;
type AssignFn = Arc<dyn Fn(&(dyn Any + Send + Sync), &mut Args) -> Result<()> + Send + Sync>;

// ═══════════════════════════════════════════════════════════
// Modifiers
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Enum,
    Annotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    /// Visible inside its crate only.
    Crate,
    Private,
}

/// Visibility plus the flags that make a member unfit for injection or
/// invocation by the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
}

impl Modifiers {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn private() -> Self {
        Self {
            visibility: Visibility::Private,
            ..Self::default()
        }
    }

    pub fn crate_visible() -> Self {
        Self {
            visibility: Visibility::Crate,
            ..Self::default()
        }
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

fn downcast_target<'a, C: Any>(object: &'a (dyn Any + Send + Sync), member: &str) -> Result<&'a C> {
    object
        .downcast_ref::<C>()
        .ok_or_else(|| BunyanError::TargetMismatch {
            member: member.to_string(),
            expected: type_name::<C>().to_string(),
        })
}

// ═══════════════════════════════════════════════════════════
// Parameters & constructors
// ═══════════════════════════════════════════════════════════

/// A parameter of a constructor or method.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub ty: TypeKey,
    pub markers: InjectionMarkers,
}

impl ParamDescriptor {
    pub fn unmarked<T: ?Sized + 'static>() -> Self {
        Self {
            ty: TypeKey::of::<T>(),
            markers: InjectionMarkers::default(),
        }
    }

    /// A required dependency on a bean of type `D`.
    pub fn autowired<D: ?Sized + 'static>() -> Self {
        Self::unmarked::<D>().with_autowired(AutowiredMarker::default())
    }

    pub fn autowired_with<D: ?Sized + 'static>(marker: AutowiredMarker) -> Self {
        Self::unmarked::<D>().with_autowired(marker)
    }

    /// A configuration value converted to `V`.
    pub fn value<V: 'static>(expression: impl Into<String>) -> Self {
        Self::unmarked::<V>().with_value(ValueMarker::new(expression))
    }

    pub fn with_autowired(mut self, marker: AutowiredMarker) -> Self {
        self.markers.autowired = Some(marker);
        self
    }

    pub fn with_value(mut self, marker: ValueMarker) -> Self {
        self.markers.value = Some(marker);
        self
    }
}

/// A way to create an instance of a class.
#[derive(Clone)]
pub struct ConstructorDescriptor {
    visibility: Visibility,
    params: Vec<ParamDescriptor>,
    construct: ConstructFn,
}

impl ConstructorDescriptor {
    pub fn new<T, F>(construct: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut Args) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            visibility: Visibility::Public,
            params: Vec::new(),
            construct: Arc::new(move |args: &mut Args| -> Result<Instance> {
                Ok(Arc::new(construct(args)?))
            }),
        }
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub(crate) fn construct(&self, args: &mut Args) -> Result<Instance> {
        (self.construct)(args)
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("visibility", &self.visibility)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════
// Methods
// ═══════════════════════════════════════════════════════════

/// What a method returns.
#[derive(Clone)]
pub enum ReturnType {
    Void,
    /// A plain value such as `i32` or `bool`; never a bean.
    Primitive(TypeKey),
    Class(Arc<ClassDescriptor>),
}

impl fmt::Debug for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("Void"),
            Self::Primitive(key) => write!(f, "Primitive({})", key.type_name()),
            Self::Class(class) => write!(f, "Class({})", class.name()),
        }
    }
}

/// A method the container may call: a factory method, a setter or a
/// lifecycle callback.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    owner: TypeKey,
    modifiers: Modifiers,
    markers: MethodMarkers,
    params: Vec<ParamDescriptor>,
    returns: ReturnType,
    invoke: InvokeFn,
}

impl MethodDescriptor {
    /// A method returning nothing. Arguments are resolved from `params`.
    pub fn new<C, F>(name: impl Into<String>, body: F) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&C, &mut Args) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = name.clone();
        let invoke: InvokeFn = Arc::new(
            move |target: &(dyn Any + Send + Sync), args: &mut Args| -> Result<Option<Instance>> {
                body(downcast_target::<C>(target, &member)?, args)?;
                Ok(None)
            },
        );
        Self::with_invoke::<C>(name, ReturnType::Void, invoke)
    }

    /// A factory method producing a bean of class `returns`.
    pub fn factory<C, R, F>(name: impl Into<String>, returns: Arc<ClassDescriptor>, body: F) -> Self
    where
        C: Any + Send + Sync,
        R: Any + Send + Sync,
        F: Fn(&C, &mut Args) -> Result<R> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = name.clone();
        let invoke: InvokeFn = Arc::new(
            move |target: &(dyn Any + Send + Sync), args: &mut Args| -> Result<Option<Instance>> {
                let produced = body(downcast_target::<C>(target, &member)?, args)?;
                Ok(Some(Arc::new(produced)))
            },
        );
        Self::with_invoke::<C>(name, ReturnType::Class(returns), invoke).bean(BeanMarker::default())
    }

    /// A zero-argument method, e.g. an init or destroy callback.
    pub fn callback<C, F>(name: impl Into<String>, body: F) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&C) -> Result<()> + Send + Sync + 'static,
    {
        Self::new::<C, _>(name, move |target, _| body(target))
    }

    /// A setter receiving a required bean of type `D`.
    pub fn autowired_setter<C, D, F>(name: impl Into<String>, body: F) -> Self
    where
        C: Any + Send + Sync,
        D: ?Sized + 'static,
        F: Fn(&C, Arc<D>) -> Result<()> + Send + Sync + 'static,
    {
        Self::new::<C, _>(name, move |target, args| body(target, args.bean::<D>(0)?))
            .param(ParamDescriptor::unmarked::<D>())
            .autowired(AutowiredMarker::default())
    }

    /// A setter receiving a configuration value converted to `V`.
    pub fn value_setter<C, V, F>(name: impl Into<String>, expression: impl Into<String>, body: F) -> Self
    where
        C: Any + Send + Sync,
        V: Any,
        F: Fn(&C, V) -> Result<()> + Send + Sync + 'static,
    {
        Self::new::<C, _>(name, move |target, args| body(target, args.value::<V>(0)?))
            .param(ParamDescriptor::unmarked::<V>())
            .value(ValueMarker::new(expression))
    }

    fn with_invoke<C: Any>(name: String, returns: ReturnType, invoke: InvokeFn) -> Self {
        Self {
            name,
            owner: TypeKey::of::<C>(),
            modifiers: Modifiers::default(),
            markers: MethodMarkers::default(),
            params: Vec::new(),
            returns,
            invoke,
        }
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_returns(mut self, returns: ReturnType) -> Self {
        self.returns = returns;
        self
    }

    pub fn bean(mut self, marker: BeanMarker) -> Self {
        self.markers.bean = Some(marker);
        self
    }

    pub fn primary(mut self) -> Self {
        self.markers.primary = true;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.markers.order = Some(order);
        self
    }

    pub fn post_construct(mut self) -> Self {
        self.markers.post_construct = true;
        self
    }

    pub fn pre_destroy(mut self) -> Self {
        self.markers.pre_destroy = true;
        self
    }

    pub fn autowired(mut self, marker: AutowiredMarker) -> Self {
        self.markers.injection.autowired = Some(marker);
        self
    }

    pub fn value(mut self, marker: ValueMarker) -> Self {
        self.markers.injection.value = Some(marker);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type the method is declared on.
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn markers(&self) -> &MethodMarkers {
        &self.markers
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn returns(&self) -> &ReturnType {
        &self.returns
    }

    pub(crate) fn invoke(
        &self,
        target: &(dyn Any + Send + Sync),
        args: &mut Args,
    ) -> Result<Option<Instance>> {
        (self.invoke)(target, args)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("modifiers", &self.modifiers)
            .field("markers", &self.markers)
            .field("params", &self.params.len())
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════
// Fields
// ═══════════════════════════════════════════════════════════

/// An injectable field.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    ty: TypeKey,
    modifiers: Modifiers,
    markers: InjectionMarkers,
    assign: AssignFn,
}

impl FieldDescriptor {
    /// An unmarked field of type `ty`; `assign` receives one argument.
    pub fn new<C, F>(name: impl Into<String>, ty: TypeKey, assign: F) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&C, &mut Args) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = name.clone();
        let assign: AssignFn = Arc::new(
            move |target: &(dyn Any + Send + Sync), args: &mut Args| -> Result<()> {
                assign(downcast_target::<C>(target, &member)?, args)
            },
        );
        Self {
            name,
            ty,
            modifiers: Modifiers::default(),
            markers: InjectionMarkers::default(),
            assign,
        }
    }

    /// A field receiving a required bean of type `D`.
    pub fn autowired<C, D>(name: impl Into<String>, slot: fn(&C) -> &Wired<D>) -> Self
    where
        C: Any + Send + Sync,
        D: ?Sized + 'static,
    {
        let name = name.into();
        let member = name.clone();
        Self::new::<C, _>(name, TypeKey::of::<D>(), move |target, args| {
            slot(target)
                .set(args.bean::<D>(0)?)
                .map_err(|_| BunyanError::construction(member.clone(), "field is already injected"))
        })
        .with_autowired(AutowiredMarker::default())
    }

    /// A field receiving a configuration value converted to `V`.
    pub fn value<C, V>(
        name: impl Into<String>,
        expression: impl Into<String>,
        slot: fn(&C) -> &Configured<V>,
    ) -> Self
    where
        C: Any + Send + Sync,
        V: Any,
    {
        let name = name.into();
        let member = name.clone();
        Self::new::<C, _>(name, TypeKey::of::<V>(), move |target, args| {
            slot(target)
                .set(args.value::<V>(0)?)
                .map_err(|_| BunyanError::construction(member.clone(), "field is already injected"))
        })
        .with_value(ValueMarker::new(expression))
    }

    /// Makes an autowired field optional: a missing dependency leaves it unset.
    pub fn optional(mut self) -> Self {
        let marker = self.markers.autowired.take().unwrap_or_default();
        self.markers.autowired = Some(marker.required(false));
        self
    }

    /// Narrows an autowired field to the bean with this name.
    pub fn qualified(mut self, bean: impl Into<String>) -> Self {
        let mut marker = self.markers.autowired.take().unwrap_or_default();
        marker.name = Some(bean.into());
        self.markers.autowired = Some(marker);
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_autowired(mut self, marker: AutowiredMarker) -> Self {
        self.markers.autowired = Some(marker);
        self
    }

    pub fn with_value(mut self, marker: ValueMarker) -> Self {
        self.markers.value = Some(marker);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn markers(&self) -> &InjectionMarkers {
        &self.markers
    }

    pub(crate) fn assign(&self, target: &(dyn Any + Send + Sync), args: &mut Args) -> Result<()> {
        (self.assign)(target, args)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("modifiers", &self.modifiers)
            .field("markers", &self.markers)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════
// Superclass projection
// ═══════════════════════════════════════════════════════════

trait Projection: Send + Sync {
    fn project<'a>(&self, object: &'a (dyn Any + Send + Sync)) -> Option<&'a (dyn Any + Send + Sync)>;
}

struct FieldProjection<T, B> {
    project: fn(&T) -> &B,
}

impl<T: Any + Send + Sync, B: Any + Send + Sync> Projection for FieldProjection<T, B> {
    fn project<'a>(&self, object: &'a (dyn Any + Send + Sync)) -> Option<&'a (dyn Any + Send + Sync)> {
        let object = object.downcast_ref::<T>()?;
        let base: &'a B = (self.project)(object);
        Some(base as &'a (dyn Any + Send + Sync))
    }
}

/// The base a class embeds and delegates to.
///
/// Members declared on the base are injected and invoked on the embedded
/// base value, reached through the projection.
pub struct Superclass {
    class: Arc<ClassDescriptor>,
    projection: Box<dyn Projection>,
}

impl Superclass {
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// Reaches the embedded base value inside `object`.
    pub fn project<'a>(&self, object: &'a (dyn Any + Send + Sync)) -> Option<&'a (dyn Any + Send + Sync)> {
        self.projection.project(object)
    }
}

// ═══════════════════════════════════════════════════════════
// Class descriptor
// ═══════════════════════════════════════════════════════════

/// Everything the container knows about one type.
pub struct ClassDescriptor {
    name: String,
    key: TypeKey,
    kind: ClassKind,
    modifiers: Modifiers,
    annotations: Annotations,
    interfaces: Vec<TypeKey>,
    superclass: Option<Superclass>,
    constructors: Vec<ConstructorDescriptor>,
    methods: Vec<Arc<MethodDescriptor>>,
    fields: Vec<FieldDescriptor>,
    casters: HashMap<TypeId, Caster>,
}

impl ClassDescriptor {
    /// Starts describing `T` under its fully qualified name, using `::`
    /// between module path segments.
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> ClassBuilder<T> {
        let mut casters: HashMap<TypeId, Caster> = HashMap::new();
        casters.insert(
            TypeId::of::<T>(),
            Arc::new(|value: Instance| -> Option<Box<dyn Any>> {
                let concrete = value.downcast::<T>().ok()?;
                Some(Box::new(concrete) as Box<dyn Any>)
            }),
        );

        ClassBuilder {
            class: ClassDescriptor {
                name: name.into(),
                key: TypeKey::of::<T>(),
                kind: ClassKind::Class,
                modifiers: Modifiers::default(),
                annotations: Annotations::default(),
                interfaces: Vec::new(),
                superclass: None,
                constructors: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
                casters,
            },
            _marker: PhantomData,
        }
    }

    /// Describes a trait. Traits are never instantiated; scanning skips them.
    pub fn interface<I: ?Sized + 'static>(
        name: impl Into<String>,
        annotations: Vec<Annotation>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            key: TypeKey::of::<I>(),
            kind: ClassKind::Interface,
            modifiers: Modifiers::default().with_abstract(),
            annotations: Annotations::new(annotations),
            interfaces: Vec::new(),
            superclass: None,
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            casters: HashMap::new(),
        })
    }

    /// Fully qualified name, e.g. `shop::orders::OrderService`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without the module path.
    pub fn simple_name(&self) -> String {
        shorten_type_name(&self.name)
    }

    /// Module path the class lives in, empty at the root.
    pub fn package(&self) -> &str {
        self.name.rsplit_once("::").map(|(package, _)| package).unwrap_or("")
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn interfaces(&self) -> &[TypeKey] {
        &self.interfaces
    }

    pub fn superclass(&self) -> Option<&Superclass> {
        self.superclass.as_ref()
    }

    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    pub fn methods(&self) -> &[Arc<MethodDescriptor>] {
        &self.methods
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns `true` if an instance of this class can stand in for `key`:
    /// the class itself, a trait it implements, or any of its bases.
    pub fn is_assignable_to(&self, key: &TypeKey) -> bool {
        self.key == *key
            || self.interfaces.contains(key)
            || self
                .superclass
                .as_ref()
                .is_some_and(|base| base.class.is_assignable_to(key))
    }

    /// Returns `true` if [`ClassDescriptor::cast`] can produce a view keyed
    /// `key`. A base reached only through `extends` is assignable but not
    /// castable.
    pub fn can_cast(&self, key: &TypeKey) -> bool {
        self.casters.contains_key(&key.type_id())
    }

    /// Views `value` as `T` through the casters this class registered.
    ///
    /// Only the class's own type and the traits it declares with
    /// [`ClassBuilder::implements`] can be cast to.
    pub fn cast<T: ?Sized + 'static>(&self, value: Instance) -> Option<Arc<T>> {
        let caster = self.casters.get(&TypeId::of::<T>())?;
        caster(value)?.downcast::<Arc<T>>().ok().map(|boxed| *boxed)
    }

    /// Finds a method by name on this class or its bases, returning the
    /// object it must be invoked on.
    pub fn locate_method<'a>(
        &self,
        object: &'a (dyn Any + Send + Sync),
        name: &str,
    ) -> Option<(Arc<MethodDescriptor>, &'a (dyn Any + Send + Sync))> {
        if let Some(method) = self.methods.iter().find(|m| m.name == name) {
            return Some((method.clone(), object));
        }
        let base = self.superclass.as_ref()?;
        base.class.locate_method(base.project(object)?, name)
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("modifiers", &self.modifiers)
            .field("annotations", &self.annotations)
            .field("superclass", &self.superclass.as_ref().map(|base| base.class.name()))
            .field("constructors", &self.constructors.len())
            .field("methods", &self.methods)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClassDescriptor`].
pub struct ClassBuilder<T> {
    class: ClassDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ClassBuilder<T> {
    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.class.annotations.push(annotation);
        self
    }

    pub fn component(self) -> Self {
        self.annotate(Annotation::Component(ComponentMarker::default()))
    }

    pub fn named_component(self, name: impl Into<String>) -> Self {
        self.annotate(Annotation::Component(ComponentMarker {
            name: Some(name.into()),
        }))
    }

    pub fn configuration(self) -> Self {
        self.annotate(Annotation::Configuration(ConfigurationMarker::default()))
    }

    pub fn stereotype(self, ty: Arc<Stereotype>, value: Option<String>) -> Self {
        self.annotate(Annotation::Stereotype { ty, value })
    }

    pub fn primary(self) -> Self {
        self.annotate(Annotation::Primary)
    }

    pub fn order(self, order: i32) -> Self {
        self.annotate(Annotation::Order(order))
    }

    pub fn around(self, handler: impl Into<String>) -> Self {
        self.annotate(Annotation::Around(handler.into()))
    }

    pub fn component_scan<S: Into<String>>(self, packages: impl IntoIterator<Item = S>) -> Self {
        self.annotate(Annotation::ComponentScan(
            packages.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn import<S: Into<String>>(self, classes: impl IntoIterator<Item = S>) -> Self {
        self.annotate(Annotation::Import(classes.into_iter().map(Into::into).collect()))
    }

    pub fn kind(mut self, kind: ClassKind) -> Self {
        self.class.kind = kind;
        self
    }

    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.class.modifiers = modifiers;
        self
    }

    /// Declares that `T` implements the trait `I`.
    ///
    /// `upcast` is usually `|value| value as Arc<dyn I>`.
    pub fn implements<I: ?Sized + 'static>(mut self, upcast: fn(Arc<T>) -> Arc<I>) -> Self {
        self.class.interfaces.push(TypeKey::of::<I>());
        self.class.casters.insert(
            TypeId::of::<I>(),
            Arc::new(move |value: Instance| -> Option<Box<dyn Any>> {
                let concrete = value.downcast::<T>().ok()?;
                Some(Box::new(upcast(concrete)) as Box<dyn Any>)
            }),
        );
        self
    }

    /// Declares that `T` embeds a `B` and is assignable to it.
    pub fn extends<B: Any + Send + Sync>(mut self, base: Arc<ClassDescriptor>, project: fn(&T) -> &B) -> Self {
        self.class.superclass = Some(Superclass {
            class: base,
            projection: Box::new(FieldProjection { project }),
        });
        self
    }

    pub fn constructor(mut self, constructor: ConstructorDescriptor) -> Self {
        self.class.constructors.push(constructor);
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.class.methods.push(Arc::new(method));
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.class.fields.push(field);
        self
    }

    pub fn build(self) -> Arc<ClassDescriptor> {
        Arc::new(self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Arg;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    #[derive(Default)]
    struct Base {
        greeting: Configured<String>,
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
        peer: Wired<dyn Greeter>,
    }

    impl Greeter for Derived {
        fn greet(&self) -> String {
            self.base.greeting.get().cloned().unwrap_or_default()
        }
    }

    fn base_class() -> Arc<ClassDescriptor> {
        ClassDescriptor::builder::<Base>("demo::Base")
            .field(FieldDescriptor::value::<Base, String>("greeting", "${greeting}", |b| &b.greeting))
            .method(MethodDescriptor::callback::<Base, _>("ping", |_| Ok(())))
            .build()
    }

    fn derived_class() -> Arc<ClassDescriptor> {
        ClassDescriptor::builder::<Derived>("demo::nested::Derived")
            .component()
            .extends(base_class(), |d: &Derived| &d.base)
            .implements::<dyn Greeter>(|d| d as Arc<dyn Greeter>)
            .build()
    }

    #[test]
    fn names() {
        let class = derived_class();
        assert_eq!(class.name(), "demo::nested::Derived");
        assert_eq!(class.simple_name(), "Derived");
        assert_eq!(class.package(), "demo::nested");
    }

    #[test]
    fn assignability_follows_bases_and_traits() {
        let class = derived_class();
        assert!(class.is_assignable_to(&TypeKey::of::<Derived>()));
        assert!(class.is_assignable_to(&TypeKey::of::<Base>()));
        assert!(class.is_assignable_to(&TypeKey::of::<dyn Greeter>()));
        assert!(!class.is_assignable_to(&TypeKey::of::<String>()));
    }

    #[test]
    fn base_members_reach_the_embedded_value() {
        let class = derived_class();
        let derived = Derived::default();
        let base = class.superclass().unwrap();
        let object = base.project(&derived).unwrap();

        let field = &base.class().fields()[0];
        let mut args = Args::new(vec![Arg::Value(Box::new("hi".to_string()))]);
        field.assign(object, &mut args).unwrap();

        assert_eq!(derived.greet(), "hi");
    }

    #[test]
    fn locate_method_searches_bases() {
        let class = derived_class();
        let derived = Derived::default();
        let (method, target) = class.locate_method(&derived, "ping").unwrap();
        assert_eq!(method.name(), "ping");
        assert!(method.invoke(target, &mut Args::empty()).unwrap().is_none());
        assert!(class.locate_method(&derived, "missing").is_none());
    }

    #[test]
    fn invoking_on_wrong_object_fails() {
        let class = base_class();
        let err = class.methods()[0].invoke(&5u8, &mut Args::empty()).unwrap_err();
        assert!(matches!(err, BunyanError::TargetMismatch { .. }));
    }

    #[test]
    fn cast_through_declared_trait() {
        let class = derived_class();
        let instance: Instance = Arc::new(Derived::default());
        assert!(class.cast::<dyn Greeter>(instance.clone()).is_some());
        assert!(class.cast::<Derived>(instance.clone()).is_some());
        assert!(class.cast::<Base>(instance).is_none());
    }

    #[test]
    fn factory_method_carries_bean_marker() {
        let method = MethodDescriptor::factory::<Base, String, _>(
            "name",
            ClassDescriptor::builder::<String>("std::String").build(),
            |_, _| Ok("x".to_string()),
        );
        assert!(method.markers().bean.is_some());
        let produced = method.invoke(&Base::default(), &mut Args::empty()).unwrap().unwrap();
        assert_eq!(produced.downcast_ref::<String>().unwrap(), "x");
    }

    #[test]
    fn interface_descriptor() {
        let class = ClassDescriptor::interface::<dyn Greeter>("demo::Greeter", vec![]);
        assert_eq!(class.kind(), ClassKind::Interface);
        assert!(class.modifiers().is_abstract);
    }

    #[test]
    fn optional_field_marker() {
        let field = FieldDescriptor::autowired::<Derived, dyn Greeter>("peer", |d| &d.peer).optional();
        let marker = field.markers().autowired.as_ref().unwrap();
        assert!(!marker.required);
        assert_eq!(field.ty(), TypeKey::of::<dyn Greeter>());
    }
}
