//! Error types for container construction and lookup.
//!
//! Every failure is a configuration or wiring error: a malformed graph cannot
//! heal itself, so errors abort the build and carry enough context to fix
//! the offending class.

use std::fmt;

use bunyan_support::rendering::{ChainEntry, render_chain, render_chain_vertical};

/// Broad classification of a [`BunyanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The set of classes cannot be turned into bean definitions.
    Definition,
    /// A bean could not be found, or more than one matched.
    Resolution,
    /// Injection markers are missing, conflicting or misplaced.
    Marker,
    /// A bean depends on itself through its creation parameters.
    Cycle,
    /// A configuration value is missing or malformed.
    Property,
    /// A constructor, factory method or callback failed.
    Invocation,
}

/// Rule broken by a factory method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryMethodViolation {
    Abstract,
    Final,
    Private,
    ReturnsVoid,
    ReturnsPrimitive,
}

impl fmt::Display for FactoryMethodViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Abstract => "must not be abstract",
            Self::Final => "must not be final",
            Self::Private => "must not be private",
            Self::ReturnsVoid => "must not return void",
            Self::ReturnsPrimitive => "must not return a primitive type",
        };
        f.write_str(text)
    }
}

/// Why a class cannot serve as a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentViolation {
    Abstract,
    Private,
}

impl fmt::Display for ComponentViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abstract => f.write_str("abstract classes cannot be beans"),
            Self::Private => f.write_str("private classes cannot be beans"),
        }
    }
}

/// Kind of bean that may not autowire its creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictedBean {
    Configuration,
    PostProcessor,
}

impl fmt::Display for RestrictedBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => f.write_str("configuration"),
            Self::PostProcessor => f.write_str("post-processor"),
        }
    }
}

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum BunyanError {
    // ── definition ──
    #[error("{}", .0)]
    DuplicateBeanName(DuplicateBeanError),

    #[error("Ambiguous constructor in {class}: {public} public and {declared} declared constructors (need exactly one public, or one declared when none is public)")]
    AmbiguousConstructor {
        class: String,
        public: usize,
        declared: usize,
    },

    #[error("Invalid component {class}: {violation}")]
    InvalidComponentClass {
        class: String,
        violation: ComponentViolation,
    },

    #[error("Factory method {class}.{method} {violation}")]
    InvalidFactoryMethod {
        class: String,
        method: String,
        violation: FactoryMethodViolation,
    },

    #[error("{class} is a post-processor and cannot also be a configuration class")]
    ConfigurationPostProcessor { class: String },

    #[error("Invalid lifecycle callback {class}.{method}: {reason}")]
    InvalidCallbackMethod {
        class: String,
        method: String,
        reason: String,
    },

    #[error("Marker {marker} found more than once on {owner}")]
    DuplicateMarker { owner: String, marker: &'static str },

    #[error("Class not found: {name}\n  Hint: register its descriptor in the class catalog")]
    ClassNotFound { name: String },

    // ── resolution ──
    #[error("{}", .0)]
    NotFound(NotFoundError),

    #[error("{}", .0)]
    NoUniquePrimary(NoUniquePrimaryError),

    #[error("Bean '{name}' is a {actual}, which is not assignable to {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Bean '{name}' has no instance yet")]
    BeanNotInitialized { name: String },

    #[error("Cannot store a {actual} as bean '{name}' declared as {declared}")]
    InstanceTypeMismatch {
        name: String,
        declared: String,
        actual: String,
    },

    #[error("Bean '{handler}' named by Around on '{bean}' is not an Interceptor")]
    InvalidInterceptor { bean: String, handler: String },

    #[error("No proxy factory can wrap bean '{bean}' of type {class}")]
    NoProxyFactory { bean: String, class: String },

    // ── markers ──
    #[error("Cannot specify both Autowired and Value on {site} of bean '{bean}'")]
    MarkerConflict { bean: String, site: String },

    #[error("Must specify Autowired or Value on {site} of bean '{bean}'")]
    MissingMarker { bean: String, site: String },

    #[error("Cannot use Autowired on {site} when creating {restriction} bean '{bean}'")]
    ForbiddenAutowired {
        bean: String,
        site: String,
        restriction: RestrictedBean,
    },

    #[error("Cannot inject {modifier} member {member} of bean '{bean}'")]
    ImmutableInjectionTarget {
        bean: String,
        member: String,
        modifier: &'static str,
    },

    #[error("Cannot inject non-setter method {method} of bean '{bean}': takes {params} parameters")]
    NotASetter {
        bean: String,
        method: String,
        params: usize,
    },

    // ── cycle ──
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    // ── properties ──
    #[error("Property '{key}' is required but not set")]
    MissingProperty { key: String },

    #[error("Property '{key}' = '{value}' cannot be read as {target}: {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        target: String,
        reason: String,
    },

    #[error("No converter registered for {target}\n  Hint: call PropertyResolver::register_converter")]
    UnsupportedValueType { target: String },

    #[error("Empty key in placeholder '{expression}'")]
    EmptyPlaceholderKey { expression: String },

    #[error("Placeholder '{expression}' nests deeper than {limit} levels (self reference?)")]
    PlaceholderDepth { expression: String, limit: usize },

    #[error("Failed to read properties: {0}")]
    Io(#[from] std::io::Error),

    // ── invocation ──
    #[error("Failed to create bean '{bean}': {source}")]
    ConstructionFailed {
        bean: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Argument {index} is not a {expected}")]
    ArgumentMismatch { index: usize, expected: String },

    #[error("Member {member} invoked on an object that is not a {expected}")]
    TargetMismatch { member: String, expected: String },
}

impl BunyanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateBeanName(_)
            | Self::AmbiguousConstructor { .. }
            | Self::InvalidComponentClass { .. }
            | Self::InvalidFactoryMethod { .. }
            | Self::ConfigurationPostProcessor { .. }
            | Self::InvalidCallbackMethod { .. }
            | Self::DuplicateMarker { .. }
            | Self::ClassNotFound { .. } => ErrorKind::Definition,

            Self::NotFound(_)
            | Self::NoUniquePrimary(_)
            | Self::TypeMismatch { .. }
            | Self::BeanNotInitialized { .. }
            | Self::InstanceTypeMismatch { .. }
            | Self::InvalidInterceptor { .. }
            | Self::NoProxyFactory { .. } => ErrorKind::Resolution,

            Self::MarkerConflict { .. }
            | Self::MissingMarker { .. }
            | Self::ForbiddenAutowired { .. }
            | Self::ImmutableInjectionTarget { .. }
            | Self::NotASetter { .. } => ErrorKind::Marker,

            Self::CircularDependency(_) => ErrorKind::Cycle,

            Self::MissingProperty { .. }
            | Self::InvalidProperty { .. }
            | Self::UnsupportedValueType { .. }
            | Self::EmptyPlaceholderKey { .. }
            | Self::PlaceholderDepth { .. }
            | Self::Io(_) => ErrorKind::Property,

            Self::ConstructionFailed { .. }
            | Self::ArgumentMismatch { .. }
            | Self::TargetMismatch { .. } => ErrorKind::Invocation,
        }
    }

    /// Wraps an error raised by user code inside a constructor, factory
    /// method or callback.
    pub fn construction(
        bean: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ConstructionFailed {
            bean: bean.into(),
            source: source.into(),
        }
    }
}

/// Two definitions claim the same bean name.
#[derive(Debug)]
pub struct DuplicateBeanError {
    pub name: String,
    pub existing: String,
    pub incoming: String,
}

impl fmt::Display for DuplicateBeanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duplicate bean name '{}'", self.name)?;
        write!(f, "\n  Defined by: {}", self.existing)?;
        write!(f, "\n  And by:     {}", self.incoming)?;
        write!(f, "\n  Hint: give one of them an explicit name")
    }
}

/// No bean matched a required lookup.
#[derive(Debug)]
pub struct NotFoundError {
    /// What was asked for: a name, a type, or both
    pub requested: String,
    /// Bean whose creation or injection needed it
    pub required_by: Option<String>,
    /// Close bean names, for "did you mean?" hints
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bean not found: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

/// Several beans matched a type lookup and primary markers did not settle it.
#[derive(Debug)]
pub struct NoUniquePrimaryError {
    pub requested: String,
    pub candidates: Vec<String>,
    pub primaries: usize,
}

impl fmt::Display for NoUniquePrimaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} beans match {} but {} of them are primary: {}",
            self.candidates.len(),
            self.requested,
            self.primaries,
            self.candidates.join(", "),
        )?;
        write!(f, "\n  Hint: mark exactly one of them Primary, or autowire by name")
    }
}

/// A bean was requested again while it was still being created.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// The creation path, ending with the bean that closes the cycle.
    pub chain: Vec<ChainEntry>,
}

impl CircularDependencyError {
    pub fn names(&self) -> Vec<&str> {
        self.chain.iter().map(|e| e.label.as_str()).collect()
    }
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected: {}", render_chain(&self.names()))?;
        write!(f, "\n{}", render_chain_vertical(&self.chain))?;
        write!(
            f,
            "  Hint: move one of the dependencies from a constructor parameter to an Autowired field"
        )
    }
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, BunyanError>;
