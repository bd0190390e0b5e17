//! Markers: the container's annotations.
//!
//! Every marker is a typed struct attached to a class, method, field or
//! parameter descriptor. Class-level markers live in [`Annotations`], which
//! also resolves stereotypes: user-defined marker types that carry other
//! markers, so that `Controller` can be a component without saying so on
//! every class.

use std::sync::Arc;

use crate::error::{BunyanError, Result};

/// Declares a class as a bean source, optionally naming the bean.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentMarker {
    pub name: Option<String>,
}

/// Declares a class as a configuration source whose [`BeanMarker`] methods
/// produce further beans. Implies [`ComponentMarker`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationMarker {
    pub name: Option<String>,
}

/// Marks a factory method on a configuration class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeanMarker {
    pub name: Option<String>,
    pub init_method: Option<String>,
    pub destroy_method: Option<String>,
}

impl BeanMarker {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    pub fn destroy_method(mut self, method: impl Into<String>) -> Self {
        self.destroy_method = Some(method.into());
        self
    }
}

/// Injects a configuration value. The expression is either a plain key
/// (`app.port`) or a placeholder (`${app.port:8080}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMarker {
    pub expression: String,
}

impl ValueMarker {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }
}

/// Injects another bean, found by type and optionally narrowed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutowiredMarker {
    pub required: bool,
    pub name: Option<String>,
}

impl Default for AutowiredMarker {
    fn default() -> Self {
        Self {
            required: true,
            name: None,
        }
    }
}

impl AutowiredMarker {
    pub fn optional() -> Self {
        Self {
            required: false,
            name: None,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            required: true,
            name: Some(name.into()),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// The pair of injection markers an injectable site may carry.
///
/// Both are stored independently so that a site carrying both (or neither)
/// can be reported instead of silently picking one.
#[derive(Debug, Clone, Default)]
pub struct InjectionMarkers {
    pub value: Option<ValueMarker>,
    pub autowired: Option<AutowiredMarker>,
}

/// What an injectable site asks for.
#[derive(Debug, Clone, Copy)]
pub enum Injection<'a> {
    Unmarked,
    Value(&'a ValueMarker),
    Autowired(&'a AutowiredMarker),
    Conflict,
}

impl InjectionMarkers {
    pub fn injection(&self) -> Injection<'_> {
        match (&self.value, &self.autowired) {
            (None, None) => Injection::Unmarked,
            (Some(value), None) => Injection::Value(value),
            (None, Some(autowired)) => Injection::Autowired(autowired),
            (Some(_), Some(_)) => Injection::Conflict,
        }
    }

    pub fn is_autowired(&self) -> bool {
        self.autowired.is_some()
    }
}

/// A user-defined marker type, e.g. `Repository`, that carries other markers.
#[derive(Debug)]
pub struct Stereotype {
    pub name: String,
    pub annotations: Annotations,
}

impl Stereotype {
    pub fn new(name: impl Into<String>, annotations: Vec<Annotation>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            annotations: Annotations::new(annotations),
        })
    }
}

/// A class-level marker.
#[derive(Debug, Clone)]
pub enum Annotation {
    Component(ComponentMarker),
    Configuration(ConfigurationMarker),
    /// Module paths to scan; empty means the configuration class's module.
    ComponentScan(Vec<String>),
    /// Extra class names to register besides the scanned ones.
    Import(Vec<String>),
    Primary,
    Order(i32),
    /// Proxy the bean through the named interceptor bean.
    Around(String),
    Stereotype {
        ty: Arc<Stereotype>,
        value: Option<String>,
    },
}

/// The class-level markers of one class or stereotype.
#[derive(Debug, Clone, Default)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self(annotations)
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.0.push(annotation);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    /// Finds the component marker, directly or through stereotypes.
    ///
    /// A configuration marker counts as a component marker. A stereotype's
    /// own value names the bean when set.
    ///
    /// # Errors
    /// [`BunyanError::DuplicateMarker`] when more than one path yields a
    /// component marker.
    pub fn find_component(&self, owner: &str) -> Result<Option<ComponentMarker>> {
        let mut found: Option<ComponentMarker> = None;

        for annotation in &self.0 {
            let marker = match annotation {
                Annotation::Component(marker) => Some(marker.clone()),
                Annotation::Configuration(marker) => Some(ComponentMarker {
                    name: marker.name.clone(),
                }),
                Annotation::Stereotype { ty, value } => {
                    ty.annotations.find_component(&ty.name)?.map(|meta| ComponentMarker {
                        name: value.clone().or(meta.name),
                    })
                }
                _ => None,
            };

            if let Some(marker) = marker {
                if found.is_some() {
                    return Err(BunyanError::DuplicateMarker {
                        owner: owner.to_string(),
                        marker: "Component",
                    });
                }
                found = Some(marker);
            }
        }

        Ok(found)
    }

    /// Returns `true` if the configuration marker is present, directly or
    /// through stereotypes.
    pub fn is_configuration(&self) -> bool {
        self.0.iter().any(|annotation| match annotation {
            Annotation::Configuration(_) => true,
            Annotation::Stereotype { ty, .. } => ty.annotations.is_configuration(),
            _ => false,
        })
    }

    pub fn component_scan(&self) -> Option<&[String]> {
        self.0.iter().find_map(|annotation| match annotation {
            Annotation::ComponentScan(packages) => Some(packages.as_slice()),
            _ => None,
        })
    }

    pub fn imports(&self) -> &[String] {
        self.0
            .iter()
            .find_map(|annotation| match annotation {
                Annotation::Import(classes) => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn is_primary(&self) -> bool {
        self.0.iter().any(|annotation| matches!(annotation, Annotation::Primary))
    }

    pub fn order(&self) -> Option<i32> {
        self.0.iter().find_map(|annotation| match annotation {
            Annotation::Order(order) => Some(*order),
            _ => None,
        })
    }

    pub fn around(&self) -> Option<&str> {
        self.0.iter().find_map(|annotation| match annotation {
            Annotation::Around(handler) => Some(handler.as_str()),
            _ => None,
        })
    }
}

/// Method-level markers.
#[derive(Debug, Clone, Default)]
pub struct MethodMarkers {
    pub bean: Option<BeanMarker>,
    pub primary: bool,
    pub order: Option<i32>,
    pub post_construct: bool,
    pub pre_destroy: bool,
    /// Setter injection.
    pub injection: InjectionMarkers,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository_stereotype() -> Arc<Stereotype> {
        Stereotype::new(
            "Repository",
            vec![Annotation::Component(ComponentMarker::default())],
        )
    }

    #[test]
    fn direct_component_name() {
        let annotations = Annotations::new(vec![Annotation::Component(ComponentMarker {
            name: Some("repo".into()),
        })]);
        let marker = annotations.find_component("Repo").unwrap().unwrap();
        assert_eq!(marker.name.as_deref(), Some("repo"));
    }

    #[test]
    fn component_through_stereotype_chain() {
        let repository = repository_stereotype();
        let jpa = Stereotype::new(
            "JpaRepository",
            vec![Annotation::Stereotype {
                ty: repository,
                value: None,
            }],
        );
        let annotations = Annotations::new(vec![Annotation::Stereotype {
            ty: jpa,
            value: Some("orders".into()),
        }]);

        let marker = annotations.find_component("OrderRepo").unwrap().unwrap();
        assert_eq!(marker.name.as_deref(), Some("orders"));
    }

    #[test]
    fn configuration_counts_as_component() {
        let annotations = Annotations::new(vec![Annotation::Configuration(
            ConfigurationMarker::default(),
        )]);
        assert!(annotations.find_component("AppConfig").unwrap().is_some());
        assert!(annotations.is_configuration());
    }

    #[test]
    fn direct_and_meta_component_is_duplicate() {
        let annotations = Annotations::new(vec![
            Annotation::Component(ComponentMarker::default()),
            Annotation::Stereotype {
                ty: repository_stereotype(),
                value: None,
            },
        ]);
        let err = annotations.find_component("Repo").unwrap_err();
        assert!(matches!(err, BunyanError::DuplicateMarker { .. }));
    }

    #[test]
    fn unmarked_class_has_no_component() {
        let annotations = Annotations::new(vec![Annotation::Primary, Annotation::Order(3)]);
        assert!(annotations.find_component("Plain").unwrap().is_none());
        assert!(annotations.is_primary());
        assert_eq!(annotations.order(), Some(3));
    }

    #[test]
    fn injection_markers_classification() {
        let both = InjectionMarkers {
            value: Some(ValueMarker::new("${a}")),
            autowired: Some(AutowiredMarker::default()),
        };
        assert!(matches!(both.injection(), Injection::Conflict));
        assert!(matches!(InjectionMarkers::default().injection(), Injection::Unmarked));
    }
}
