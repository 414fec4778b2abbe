//! Layered document metadata with typed lookup.
//!
//! ## Scope chain
//!
//! A [`Metadata`] value is one layer of key → value entries plus an optional
//! parent layer. Lookup walks outward until a key is found:
//!
//! ```text
//! document layer      title = "Hello"        ← checked first
//!   └─ pipeline layer layout = "post"
//!       └─ settings   site_title = "My Site"
//!           └─ defaults                       ← checked last
//! ```
//!
//! Layers are immutable and shared through `Arc`, so cloning a document with
//! an overlay only allocates the overlay.
//!
//! ## Typed lookup
//!
//! Values are stored untyped as [`Value`] (a JSON value). [`Metadata::get`]
//! resolves a requested type in this order:
//!
//! 1. explicit converters registered for `T` on [`TypeConverters`], in
//!    registration order
//! 2. the stored value deserializes directly into `T`
//! 3. built-in coercions between strings, numbers, booleans and
//!    single-element lists (`"42"` → `42`, `3` → `"3"`, `"a"` → `["a"]`)
//!
//! If nothing succeeds the lookup fails with a [`ConversionError`] naming the
//! key, the stored type and the requested type.

use serde::de::DeserializeOwned;
use serde_json::Number;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// An untyped metadata value.
pub type Value = serde_json::Value;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot convert metadata '{key}' from {source_type} to {target_type}")]
pub struct ConversionError {
    pub key: String,
    pub source_type: &'static str,
    pub target_type: &'static str,
}

type ConvertFn = dyn Fn(&Value) -> Option<Box<dyn Any>> + Send + Sync;

/// Registry of explicit conversions, consulted before the built-in ones.
#[derive(Default)]
pub struct TypeConverters {
    explicit: HashMap<TypeId, Vec<Box<ConvertFn>>>,
}

impl TypeConverters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversion into `T`. Converters for the same target run
    /// in registration order; the first `Some` wins.
    pub fn register<T, F>(&mut self, convert: F) -> &mut Self
    where
        T: 'static,
        F: Fn(&Value) -> Option<T> + Send + Sync + 'static,
    {
        self.explicit
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Box::new(move |v| convert(v).map(|t| Box::new(t) as Box<dyn Any>)));
        self
    }

    /// Convert `value` into `T`: registered converters for `T` first, then
    /// plain deserialization, then the built-in coercions.
    pub fn convert<T>(&self, key: &str, value: &Value) -> Result<T, ConversionError>
    where
        T: DeserializeOwned + 'static,
    {
        if let Some(converters) = self.explicit.get(&TypeId::of::<T>()) {
            for convert in converters {
                if let Some(converted) = convert(value).and_then(|b| b.downcast::<T>().ok()) {
                    return Ok(*converted);
                }
            }
        }

        if let Ok(direct) = serde_json::from_value::<T>(value.clone()) {
            return Ok(direct);
        }

        for candidate in coercions(value) {
            if let Ok(converted) = serde_json::from_value::<T>(candidate) {
                return Ok(converted);
            }
        }

        Err(ConversionError {
            key: key.to_string(),
            source_type: type_name(value),
            target_type: std::any::type_name::<T>(),
        })
    }
}

impl fmt::Debug for TypeConverters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeConverters")
            .field("targets", &self.explicit.len())
            .finish()
    }
}

/// Human-readable name of a value's JSON type.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

fn as_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(Value::Number(i.into()))
            } else if let Ok(u) = s.parse::<u64>() {
                Some(Value::Number(u.into()))
            } else {
                s.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
            }
        }
        Value::Bool(b) => Some(Value::Number(u8::from(*b).into())),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(Value::Bool(true)),
            "false" | "no" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
        _ => None,
    }
}

/// Candidate re-shapings of `value`, tried in order after a direct
/// deserialization fails.
fn coercions(value: &Value) -> Vec<Value> {
    let scalar: [fn(&Value) -> Option<Value>; 3] = [as_number, as_bool, as_string];
    let mut out = Vec::new();
    match value {
        Value::Array(items) => {
            if let [single] = items.as_slice() {
                out.push(single.clone());
                out.extend(scalar.iter().filter_map(|f| f(single)));
            }
            for f in scalar {
                if let Some(mapped) = items.iter().map(f).collect::<Option<Vec<_>>>() {
                    out.push(Value::Array(mapped));
                }
            }
        }
        Value::Null | Value::Object(_) => {}
        _ => {
            out.extend(scalar.iter().filter_map(|f| f(value)));
            out.push(Value::Array(vec![value.clone()]));
            out.extend(
                scalar
                    .iter()
                    .filter_map(|f| f(value))
                    .map(|v| Value::Array(vec![v])),
            );
        }
    }
    out
}

struct Layer {
    entries: Vec<(String, Value)>,
    parent: Option<Metadata>,
    converters: Arc<TypeConverters>,
}

/// One immutable layer of metadata over an optional parent.
#[derive(Clone)]
pub struct Metadata {
    layer: Arc<Layer>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self::with_converters(Arc::new(TypeConverters::new()))
    }
}

impl Metadata {
    /// An empty root layer with only the built-in conversions.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty root layer sharing `converters` with every descendant.
    pub fn with_converters(converters: Arc<TypeConverters>) -> Self {
        Self {
            layer: Arc::new(Layer {
                entries: Vec::new(),
                parent: None,
                converters,
            }),
        }
    }

    /// A root layer holding `entries`.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new().child(entries)
    }

    /// A new layer over `self`. Later duplicates of a key in `entries`
    /// replace earlier ones.
    pub fn child<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>) -> Metadata
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut local: Vec<(String, Value)> = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            let value = value.into();
            match local.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => local.push((key, value)),
            }
        }
        Metadata {
            layer: Arc::new(Layer {
                entries: local,
                parent: Some(self.clone()),
                converters: Arc::clone(&self.layer.converters),
            }),
        }
    }

    pub fn converters(&self) -> &Arc<TypeConverters> {
        &self.layer.converters
    }

    pub fn parent(&self) -> Option<&Metadata> {
        self.layer.parent.as_ref()
    }

    /// Entries defined on this layer only.
    pub fn local_entries(&self) -> &[(String, Value)] {
        &self.layer.entries
    }

    /// Raw value lookup through the scope chain.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        let mut current = Some(self);
        while let Some(layer) = current {
            if let Some((_, value)) = layer.layer.entries.iter().find(|(k, _)| k == key) {
                return Some(value);
            }
            current = layer.parent();
        }
        None
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Typed lookup. `Ok(None)` when the key is absent anywhere in the chain.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>, ConversionError>
    where
        T: DeserializeOwned + 'static,
    {
        match self.get_value(key) {
            Some(value) => self.layer.converters.convert(key, value).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T, ConversionError>
    where
        T: DeserializeOwned + 'static,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Lenient string lookup: any scalar renders as a string.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get::<String>(key).ok().flatten()
    }

    /// Every visible entry, outermost layer first, each key once with its
    /// innermost value. Keys keep the position where they first appeared.
    pub fn flatten(&self) -> Vec<(String, Value)> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(layer) = current {
            chain.push(layer);
            current = layer.parent();
        }
        let mut flat: Vec<(String, Value)> = Vec::new();
        for layer in chain.into_iter().rev() {
            for (key, value) in &layer.layer.entries {
                match flat.iter_mut().find(|(k, _)| k == key) {
                    Some(slot) => slot.1 = value.clone(),
                    None => flat.push((key.clone(), value.clone())),
                }
            }
        }
        flat
    }

    pub fn keys(&self) -> Vec<String> {
        self.flatten().into_iter().map(|(k, _)| k).collect()
    }

    pub fn len(&self) -> usize {
        self.flatten().len()
    }

    pub fn is_empty(&self) -> bool {
        let mut current = Some(self);
        while let Some(layer) = current {
            if !layer.layer.entries.is_empty() {
                return false;
            }
            current = layer.parent();
        }
        true
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.flatten()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain() -> Metadata {
        let defaults = Metadata::from_entries([("theme", json!("plain")), ("per_page", json!(10))]);
        let settings = defaults.child([("site_title", json!("My Site")), ("theme", json!("dark"))]);
        settings.child([("title", json!("Hello"))])
    }

    #[test]
    fn lookup_walks_scope_chain() {
        let meta = chain();
        assert_eq!(meta.get_value("title"), Some(&json!("Hello")));
        assert_eq!(meta.get_value("site_title"), Some(&json!("My Site")));
        assert_eq!(meta.get_value("theme"), Some(&json!("dark")));
        assert_eq!(meta.get_value("per_page"), Some(&json!(10)));
        assert_eq!(meta.get_value("missing"), None);
    }

    #[test]
    fn inner_layers_shadow_outer_layers() {
        let meta = chain().child([("site_title", "Override")]);
        assert_eq!(meta.get_string("site_title").as_deref(), Some("Override"));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let meta = Metadata::from_entries([("Title", "a")]);
        assert!(meta.contains_key("Title"));
        assert!(!meta.contains_key("title"));
    }

    #[test]
    fn duplicate_keys_in_one_layer_keep_last() {
        let meta = Metadata::from_entries([("k", 1), ("k", 2)]);
        assert_eq!(meta.local_entries().len(), 1);
        assert_eq!(meta.get::<i64>("k").unwrap(), Some(2));
    }

    #[test]
    fn typed_get_direct() {
        let meta = chain();
        assert_eq!(meta.get::<u32>("per_page").unwrap(), Some(10));
        assert_eq!(meta.get::<String>("title").unwrap().as_deref(), Some("Hello"));
        assert_eq!(meta.get::<u32>("missing").unwrap(), None);
    }

    #[test]
    fn builtin_coercions() {
        let meta = Metadata::from_entries([
            ("count", json!("42")),
            ("ratio", json!(" 1.5 ")),
            ("flag", json!("yes")),
            ("num", json!(7)),
            ("tag", json!("rust")),
            ("one", json!(["solo"])),
            ("nums", json!([1, 2])),
        ]);
        assert_eq!(meta.get::<i32>("count").unwrap(), Some(42));
        assert_eq!(meta.get::<f64>("ratio").unwrap(), Some(1.5));
        assert_eq!(meta.get::<bool>("flag").unwrap(), Some(true));
        assert_eq!(meta.get::<String>("num").unwrap().as_deref(), Some("7"));
        assert_eq!(meta.get::<Vec<String>>("tag").unwrap(), Some(vec!["rust".to_string()]));
        assert_eq!(meta.get::<String>("one").unwrap().as_deref(), Some("solo"));
        assert_eq!(
            meta.get::<Vec<String>>("nums").unwrap(),
            Some(vec!["1".to_string(), "2".to_string()])
        );
    }

    #[test]
    fn failed_conversion_names_types() {
        let meta = Metadata::from_entries([("title", json!("Hello"))]);
        let err = meta.get::<u32>("title").unwrap_err();
        assert_eq!(err.key, "title");
        assert_eq!(err.source_type, "string");
        assert_eq!(err.target_type, "u32");
        assert!(err.to_string().contains("from string to u32"));
    }

    #[test]
    fn explicit_converters_take_precedence_over_builtins() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Slug(String);

        let mut converters = TypeConverters::new();
        converters.register::<i64, _>(|v| v.as_str().filter(|s| *s == "many").map(|_| 1000));
        converters.register::<Slug, _>(|v| {
            v.as_str().map(|s| Slug(s.to_lowercase().replace(' ', "-")))
        });
        let root = Metadata::with_converters(Arc::new(converters));
        let meta = root.child([("n", json!("many")), ("title", json!("Hello World"))]);

        assert_eq!(meta.get::<i64>("n").unwrap(), Some(1000));
        assert_eq!(meta.get::<Slug>("title").unwrap(), Some(Slug("hello-world".into())));
    }

    #[test]
    fn explicit_converter_wins_even_when_value_deserializes() {
        let mut converters = TypeConverters::new();
        converters.register::<i64, _>(|v| v.as_i64().filter(|n| *n < 0).map(|_| 0));
        let meta = Metadata::with_converters(Arc::new(converters))
            .child([("neg", json!(-5)), ("pos", json!(7))]);

        assert_eq!(meta.get::<i64>("neg").unwrap(), Some(0));
        // a converter returning None falls through to plain deserialization
        assert_eq!(meta.get::<i64>("pos").unwrap(), Some(7));
    }

    #[test]
    fn flatten_orders_outer_first_and_shadows() {
        let meta = chain();
        let keys = meta.keys();
        assert_eq!(keys, vec!["theme", "per_page", "site_title", "title"]);
        let flat = meta.flatten();
        assert_eq!(flat[0], ("theme".to_string(), json!("dark")));
        assert_eq!(meta.len(), 4);
        assert!(!meta.is_empty());
        assert!(Metadata::new().child(Vec::<(String, Value)>::new()).is_empty());
    }
}
