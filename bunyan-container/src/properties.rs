//! Configuration values and `${..}` placeholders.
//!
//! An expression is either a plain key (`app.port`) or a placeholder:
//! `${app.port}` or `${app.port:8080}`. The key ends at the first `:`;
//! everything after it is the default. Defaults and stored values may be
//! placeholders themselves and are resolved until none remains:
//!
//! ```
//! use bunyan_container::properties::PropertyResolver;
//!
//! let props = PropertyResolver::from_pairs([("b", "7")]);
//! assert_eq!(props.get("${a:${b:5}}").unwrap().as_deref(), Some("7"));
//! assert_eq!(props.get_as::<u32>("${c:${d:5}}").unwrap(), Some(5));
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use tracing::{debug, trace};

use crate::error::{BunyanError, Result};
use crate::key::TypeKey;

/// Placeholder nesting deeper than this is reported as an error.
pub const MAX_PLACEHOLDER_DEPTH: usize = 32;

type Converter =
    Arc<dyn Fn(&str) -> std::result::Result<Box<dyn Any + Send + Sync>, String> + Send + Sync>;

struct Placeholder<'a> {
    key: &'a str,
    default: Option<&'a str>,
}

fn parse_placeholder(expression: &str) -> Result<Option<Placeholder<'_>>> {
    let Some(inner) = expression
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return Ok(None);
    };

    let (key, default) = match inner.split_once(':') {
        Some((key, default)) => (key.trim(), Some(default)),
        None => (inner.trim(), None),
    };

    if key.is_empty() {
        return Err(BunyanError::EmptyPlaceholderKey {
            expression: expression.to_string(),
        });
    }

    Ok(Some(Placeholder { key, default }))
}

/// Key/value configuration with placeholder resolution and typed reads.
#[derive(Clone)]
pub struct PropertyResolver {
    properties: HashMap<String, String>,
    converters: HashMap<TypeId, (&'static str, Converter)>,
}

impl PropertyResolver {
    /// An empty resolver with the built-in converters.
    pub fn new() -> Self {
        let mut resolver = Self {
            properties: HashMap::new(),
            converters: HashMap::new(),
        };
        resolver.register_builtin_converters();
        resolver
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut resolver = Self::new();
        for (key, value) in pairs {
            resolver.set(key, value);
        }
        resolver
    }

    /// Parses `.properties` text: one `key=value` or `key: value` per line,
    /// `#` and `!` start comments.
    pub fn from_properties_str(text: &str) -> Self {
        let mut resolver = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let split = line.find(['=', ':']);
            let (key, value) = match split {
                Some(index) => (&line[..index], &line[index + 1..]),
                None => (line, ""),
            };
            resolver.set(key.trim(), value.trim_start());
        }
        resolver
    }

    /// Reads a `.properties` file.
    ///
    /// # Errors
    /// [`BunyanError::Io`] if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let resolver = Self::from_properties_str(&text);
        debug!(path = %path.display(), properties = resolver.len(), "Loaded properties file");
        Ok(resolver)
    }

    /// Adds the process environment. Explicit properties win over
    /// variables with the same name.
    pub fn with_env(mut self) -> Self {
        for (key, value) in std::env::vars() {
            self.properties.entry(key).or_insert(value);
        }
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Resolves an expression; `None` if the key is unset and there is no
    /// default.
    ///
    /// # Errors
    /// A stored value or default that refers to a missing key without a
    /// default of its own is [`BunyanError::MissingProperty`].
    pub fn get(&self, expression: &str) -> Result<Option<String>> {
        let resolved = self.resolve(expression, 0)?;
        trace!(expression, found = resolved.is_some(), "Property lookup");
        Ok(resolved)
    }

    pub fn get_or(&self, expression: &str, default: &str) -> Result<String> {
        Ok(self.get(expression)?.unwrap_or_else(|| default.to_string()))
    }

    /// # Errors
    /// [`BunyanError::MissingProperty`] if the expression resolves to nothing.
    pub fn get_required(&self, expression: &str) -> Result<String> {
        self.get(expression)?.ok_or_else(|| missing(expression))
    }

    /// Resolves and converts to `T`; `None` if unset.
    pub fn get_as<T: Any>(&self, expression: &str) -> Result<Option<T>> {
        let Some(value) = self.get(expression)? else {
            return Ok(None);
        };
        let converted = self.convert(expression, &value, &TypeKey::of::<T>())?;
        converted
            .downcast::<T>()
            .map(|value| Some(*value))
            .map_err(|_| BunyanError::UnsupportedValueType {
                target: type_name::<T>().to_string(),
            })
    }

    pub fn get_required_as<T: Any>(&self, expression: &str) -> Result<T> {
        self.get_as::<T>(expression)?.ok_or_else(|| missing(expression))
    }

    /// Resolves and converts to the type named by `target`.
    pub fn get_required_typed(
        &self,
        expression: &str,
        target: &TypeKey,
    ) -> Result<Box<dyn Any + Send + Sync>> {
        let value = self.get_required(expression)?;
        self.convert(expression, &value, target)
    }

    /// Teaches the resolver to read values of type `T`.
    pub fn register_converter<T, E, F>(&mut self, convert: F)
    where
        T: Any + Send + Sync,
        E: fmt::Display,
        F: Fn(&str) -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        let converter: Converter = Arc::new(
            move |raw: &str| -> std::result::Result<Box<dyn Any + Send + Sync>, String> {
                match convert(raw) {
                    Ok(value) => Ok(Box::new(value)),
                    Err(err) => Err(err.to_string()),
                }
            },
        );
        self.converters
            .insert(TypeId::of::<T>(), (type_name::<T>(), converter));
    }

    pub fn supports(&self, target: &TypeKey) -> bool {
        self.converters.contains_key(&target.type_id())
    }

    fn convert(&self, key: &str, value: &str, target: &TypeKey) -> Result<Box<dyn Any + Send + Sync>> {
        let Some((_, converter)) = self.converters.get(&target.type_id()) else {
            return Err(BunyanError::UnsupportedValueType {
                target: target.type_name().to_string(),
            });
        };
        converter(value).map_err(|reason| BunyanError::InvalidProperty {
            key: key.to_string(),
            value: value.to_string(),
            target: target.type_name().to_string(),
            reason,
        })
    }

    fn resolve(&self, expression: &str, depth: usize) -> Result<Option<String>> {
        if depth > MAX_PLACEHOLDER_DEPTH {
            return Err(BunyanError::PlaceholderDepth {
                expression: expression.to_string(),
                limit: MAX_PLACEHOLDER_DEPTH,
            });
        }

        match parse_placeholder(expression)? {
            Some(placeholder) => match self.lookup(placeholder.key, depth)? {
                Some(value) => Ok(Some(value)),
                None => match placeholder.default {
                    Some(default) => self.resolve_value(default, depth + 1).map(Some),
                    None => Ok(None),
                },
            },
            None => self.lookup(expression, depth),
        }
    }

    fn lookup(&self, key: &str, depth: usize) -> Result<Option<String>> {
        match self.properties.get(key) {
            Some(raw) => self.resolve_value(raw, depth + 1).map(Some),
            None => Ok(None),
        }
    }

    /// A stored value or default: literal, or a placeholder that must resolve.
    fn resolve_value(&self, value: &str, depth: usize) -> Result<String> {
        if parse_placeholder(value)?.is_none() {
            return Ok(value.to_string());
        }
        self.resolve(value, depth)?.ok_or_else(|| missing(value))
    }

    fn register_builtin_converters(&mut self) {
        fn parse<T: std::str::FromStr>(raw: &str) -> std::result::Result<T, T::Err> {
            raw.trim().parse::<T>()
        }

        self.register_converter(|raw: &str| Ok::<_, std::convert::Infallible>(raw.to_string()));
        self.register_converter(|raw: &str| raw.trim().to_ascii_lowercase().parse::<bool>());
        self.register_converter(parse::<i8>);
        self.register_converter(parse::<i16>);
        self.register_converter(parse::<i32>);
        self.register_converter(parse::<i64>);
        self.register_converter(parse::<i128>);
        self.register_converter(parse::<isize>);
        self.register_converter(parse::<u8>);
        self.register_converter(parse::<u16>);
        self.register_converter(parse::<u32>);
        self.register_converter(parse::<u64>);
        self.register_converter(parse::<u128>);
        self.register_converter(parse::<usize>);
        self.register_converter(parse::<f32>);
        self.register_converter(parse::<f64>);
        self.register_converter(|raw: &str| raw.parse::<char>());
        self.register_converter(|raw: &str| Ok::<_, std::convert::Infallible>(PathBuf::from(raw)));

        // ISO-8601 date and time forms
        self.register_converter(parse::<NaiveDate>);
        self.register_converter(parse::<NaiveTime>);
        self.register_converter(parse::<NaiveDateTime>);
        self.register_converter(parse::<DateTime<FixedOffset>>);
        self.register_converter(parse::<FixedOffset>);
        self.register_converter(parse_duration);
    }
}

/// Parses an ISO-8601 duration such as `PT15M`, `P2DT3H4M` or `-PT0.5S`.
/// Days are the largest unit.
fn parse_duration(raw: &str) -> std::result::Result<TimeDelta, String> {
    let invalid = || format!("'{raw}' is not an ISO-8601 duration");
    let overflow = || format!("'{raw}' is out of range");

    let text = raw.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let body = text.strip_prefix(['P', 'p']).ok_or_else(invalid)?;
    let (days, time) = match body.split_once(['T', 't']) {
        Some((days, time)) => (days, Some(time)),
        None => (body, None),
    };
    if days.is_empty() && time.is_none_or(str::is_empty) {
        return Err(invalid());
    }

    let mut total = TimeDelta::zero();
    if !days.is_empty() {
        let count = days
            .strip_suffix(['D', 'd'])
            .and_then(|count| count.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        total = TimeDelta::try_days(count)
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(overflow)?;
    }

    let mut rest = time.unwrap_or("");
    while !rest.is_empty() {
        let end = rest.find(|c: char| c.is_ascii_alphabetic()).ok_or_else(invalid)?;
        let (number, unit) = (&rest[..end], rest[end..=end].to_ascii_uppercase());
        rest = &rest[end + 1..];

        let part = match unit.as_str() {
            "H" => TimeDelta::try_hours(number.parse().map_err(|_| invalid())?),
            "M" => TimeDelta::try_minutes(number.parse().map_err(|_| invalid())?),
            "S" => seconds(number).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(overflow)?;
    }

    Ok(if negative { -total } else { total })
}

/// `Some(None)` when the seconds overflow, `None` when they do not parse.
fn seconds(number: &str) -> Option<Option<TimeDelta>> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let nanos: i64 = format!("{fraction:0<9}").parse().ok()?;
    let nanos = if number.starts_with('-') { -nanos } else { nanos };
    Some(TimeDelta::try_seconds(whole).and_then(|secs| secs.checked_add(&TimeDelta::nanoseconds(nanos))))
}

fn missing(expression: &str) -> BunyanError {
    let key = match parse_placeholder(expression) {
        Ok(Some(placeholder)) => placeholder.key.to_string(),
        _ => expression.to_string(),
    };
    BunyanError::MissingProperty { key }
}

impl Default for PropertyResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut converters: Vec<_> = self.converters.values().map(|(name, _)| *name).collect();
        converters.sort_unstable();
        f.debug_struct("PropertyResolver")
            .field("properties", &self.properties.len())
            .field("converters", &converters)
            .finish()
    }
}
