//! Generation Context - scoped name/value bindings
//!
//! Values are JSON values. Lookups use dot paths (`customer.address.city`),
//! where a numeric segment also indexes into a list. Missing paths are not
//! errors: they resolve to nothing and render as an empty string.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::{Deref, DerefMut};

/// Binding name that receives the current key inside a loop iteration
pub const INDEX_BINDING: &str = "index";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Resolves a dot path. A leading `$` is ignored.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let path = path.strip_prefix('$').unwrap_or(path);
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut value = self.values.get(first)?;
        for part in parts {
            value = match value {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if value.is_null() {
            None
        } else {
            Some(value)
        }
    }

    /// Like [`Context::lookup`], but yields `Value::Null` for missing paths
    pub fn resolve(&self, path: &str) -> Value {
        self.lookup(path).cloned().unwrap_or(Value::Null)
    }

    /// Pushes bindings for the lifetime of the returned guard.
    ///
    /// Prior values (or their absence) are restored when the guard drops,
    /// including when the scope is left through `?` or a panic.
    pub fn scope<I, K>(&mut self, bindings: I) -> Scope<'_>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut saved = vec![];
        for (name, value) in bindings {
            let name = name.into();
            let previous = self.values.insert(name.clone(), value);
            saved.push((name, previous));
        }
        Scope {
            context: self,
            saved,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// Guard returned by [`Context::scope`]
pub struct Scope<'a> {
    context: &'a mut Context,
    saved: Vec<(String, Option<Value>)>,
}

impl Deref for Scope<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.context
    }
}

impl DerefMut for Scope<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.context
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        // Reverse order, so a name bound twice ends at its original value
        while let Some((name, previous)) = self.saved.pop() {
            match previous {
                Some(value) => {
                    self.context.values.insert(name, value);
                }
                None => {
                    self.context.values.shift_remove(&name);
                }
            }
        }
    }
}

/// Renders a value as tag output
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// True for values that render as an empty string
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Iteration pairs of a loop collection: `(key, item)`.
///
/// Lists yield numeric keys, maps yield their string keys. Anything else is
/// not iterable and yields nothing.
pub fn collection_items(value: Option<&Value>) -> Vec<(Value, Value)> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (Value::from(index), item.clone()))
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, item)| (Value::String(key.clone()), item.clone()))
            .collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: Value) -> Context {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_lookup_nested_paths() {
        let ctx = context(json!({
            "customer": {"name": "Ada", "orders": [{"id": 7}, {"id": 9}]}
        }));
        assert_eq!(ctx.lookup("customer.name"), Some(&json!("Ada")));
        assert_eq!(ctx.lookup("$customer.orders.1.id"), Some(&json!(9)));
        assert_eq!(ctx.lookup("customer.missing"), None);
        assert_eq!(ctx.lookup("customer.name.first"), None);
        assert_eq!(ctx.resolve("nothing.here"), Value::Null);
    }

    #[test]
    fn test_scope_restores_previous_binding() {
        let mut ctx = context(json!({"item": "outer"}));
        {
            let scope = ctx.scope([("item", json!("inner")), (INDEX_BINDING, json!(3))]);
            assert_eq!(scope.get("item"), Some(&json!("inner")));
            assert_eq!(scope.get(INDEX_BINDING), Some(&json!(3)));
        }
        assert_eq!(ctx.get("item"), Some(&json!("outer")));
        assert_eq!(ctx.get(INDEX_BINDING), None);
    }

    #[test]
    fn test_nested_scopes_with_same_name() {
        let mut ctx = Context::new();
        {
            let mut outer = ctx.scope([("it", json!(1))]);
            {
                let inner = outer.scope([("it", json!(2))]);
                assert_eq!(inner.get("it"), Some(&json!(2)));
            }
            assert_eq!(outer.get("it"), Some(&json!(1)));
        }
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_scope_restored_on_error_path() {
        fn failing(ctx: &mut Context) -> Result<(), String> {
            let _scope = ctx.scope([("tmp", json!("x"))]);
            Err("boom".to_string())
        }

        let mut ctx = Context::new();
        assert!(failing(&mut ctx).is_err());
        assert_eq!(ctx.get("tmp"), None);
    }

    #[test]
    fn test_binding_index_as_loop_name() {
        let mut ctx = context(json!({"index": "keep"}));
        {
            let _scope = ctx.scope([("index", json!("value")), ("index", json!(0))]);
        }
        assert_eq!(ctx.get("index"), Some(&json!("keep")));
    }

    #[test]
    fn test_collection_items() {
        let list = json!(["a", "b"]);
        assert_eq!(
            collection_items(Some(&list)),
            vec![(json!(0), json!("a")), (json!(1), json!("b"))]
        );

        let map = json!({"x": 1, "y": 2});
        let keys: Vec<_> = collection_items(Some(&map)).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![json!("x"), json!("y")]);

        assert!(collection_items(Some(&json!("scalar"))).is_empty());
        assert!(collection_items(None).is_empty());
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!(null)), "");
        assert_eq!(value_to_string(&json!("x")), "x");
        assert_eq!(value_to_string(&json!(1234.5)), "1234.5");
        assert_eq!(value_to_string(&json!(2)), "2");
        assert_eq!(value_to_string(&json!([1, 2])), "[1,2]");
    }
}
