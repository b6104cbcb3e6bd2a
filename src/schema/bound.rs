//! Bound objects
//!
//! A `BoundObject` owns a coerced data tree together with the schema node it
//! was cast against and the per-cast hook table. Reads apply recorded `get`
//! transforms. Writes are validated, then the enclosing parent subtree is
//! re-cast and only the written key is replaced; a rejected write leaves the
//! data untouched.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::cast::{cast_tree, HookTable};
use super::errors::{SchemaError, SchemaErrorKind, SchemaResult};
use super::tree::{NodeKind, SchemaNode};
use super::types::{is_container, parse_index, type_of, KeyPath, ModelNode};
use super::validator::{validate, ValidateOptions};
use crate::observability::Event;

/// A data tree bound to its schema node
#[derive(Debug, Clone)]
pub struct BoundObject {
    node: SchemaNode,
    data: Value,
    hooks: HookTable,
}

impl BoundObject {
    pub(crate) fn new(node: SchemaNode, data: Value, hooks: HookTable) -> Self {
        Self { node, data, hooks }
    }

    /// Schema node this object is bound to
    pub fn schema(&self) -> &SchemaNode {
        &self.node
    }

    /// Stored data, without `get` transforms
    pub fn raw(&self) -> &Value {
        &self.data
    }

    pub fn into_raw(self) -> Value {
        self.data
    }

    /// Hook table recorded by the cast that produced this object
    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    /// Reads a direct child, applying its `get` transform.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_path([key])
    }

    /// Reads the value at a relative path, applying its `get` transform.
    pub fn get_path<I, S>(&self, path: I) -> Option<Value>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let relative: KeyPath = path.into_iter().map(|s| s.as_ref().to_string()).collect();
        let stored = lookup(&self.data, &relative)?;
        let absolute = self.node.key_path().join(&relative);
        Some(project(stored, &absolute, &self.hooks))
    }

    /// Whole tree as a reader sees it, every `get` transform applied
    pub fn to_value(&self) -> Value {
        project(&self.data, self.node.key_path(), &self.hooks)
    }

    pub fn set(&mut self, key: &str, value: Value) -> SchemaResult<()> {
        self.set_path([key], value)
    }

    /// Writes `value` at a relative path.
    ///
    /// Fails with INVALID_PATH when the path does not resolve in the schema,
    /// or with the first violation raised while re-casting the parent. On
    /// failure the stored data and hook table are unchanged.
    pub fn set_path<I, S>(&mut self, path: I, value: Value) -> SchemaResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let relative: KeyPath = path.into_iter().map(|s| s.as_ref().to_string()).collect();
        let absolute = self.node.key_path().join(&relative);

        match self.write(&relative, value) {
            Ok(()) => {
                tracing::debug!(event = %Event::BoundWrite, key_path = %absolute, "write accepted");
                Ok(())
            }
            Err(e) => {
                tracing::debug!(
                    event = %Event::BoundWriteRejected,
                    key_path = %absolute,
                    kind = e.kind().code(),
                    "{}",
                    e.message()
                );
                Err(e)
            }
        }
    }

    /// Returns a handle that reads and writes below `path`.
    pub fn at_mut<I, S>(&mut self, path: I) -> BoundMut<'_>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        BoundMut {
            bound: self,
            base: path.into_iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Re-casts `data` against the bound node and replaces the whole tree.
    ///
    /// A bound object always holds a container: non-container data fails TYPE.
    pub fn replace(&mut self, data: Value) -> SchemaResult<()> {
        if !is_container(&data) {
            return Err(SchemaError::new(
                SchemaErrorKind::Type,
                self.node.key_path().clone(),
                format!(
                    "Invalid type '{}' for bound object, should be type 'object'",
                    type_of(&data)
                ),
            ));
        }

        let (coerced, hooks) = cast_tree(&data, &self.node)?;
        self.data = coerced;
        self.hooks = hooks;
        Ok(())
    }

    fn write(&mut self, relative: &KeyPath, value: Value) -> SchemaResult<()> {
        let Some(key) = relative.last() else {
            return self.replace(value);
        };
        let target_path = self.node.key_path().join(relative);

        let target = self
            .node
            .resolve_path(relative.iter())
            .ok_or_else(|| SchemaError::invalid_path(target_path.clone()))?;

        validate(&value, &target, ValidateOptions::default())?;

        let parent = target.parent();
        let parent_relative = relative.parent();

        let mut working = match lookup(&self.data, &parent_relative) {
            Some(existing) if is_container(existing) => existing.clone(),
            _ => empty_container(&parent),
        };
        insert_child(&mut working, key, value, &target_path)?;

        let (coerced, hooks) = cast_tree(&working, &parent)?;
        let fresh = lookup(&coerced, &KeyPath::from(vec![key])).cloned();

        let container = container_at(&mut self.data, &parent_relative, &self.node)
            .ok_or_else(|| SchemaError::invalid_path(target_path.clone()))?;
        match fresh {
            Some(fresh) => insert_child(container, key, fresh, &target_path)?,
            None => remove_child(container, key),
        }

        self.hooks.replace_subtree(&target_path, hooks);
        Ok(())
    }
}

impl Serialize for BoundObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Mutable view of a bound object below a fixed relative path
pub struct BoundMut<'a> {
    bound: &'a mut BoundObject,
    base: KeyPath,
}

impl BoundMut<'_> {
    pub fn key_path(&self) -> KeyPath {
        self.bound.node.key_path().join(&self.base)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.bound.get_path(self.base.child(key).iter())
    }

    pub fn set(&mut self, key: &str, value: Value) -> SchemaResult<()> {
        self.bound.set_path(self.base.child(key).iter(), value)
    }

    pub fn at_mut(&mut self, key: &str) -> BoundMut<'_> {
        BoundMut {
            base: self.base.child(key),
            bound: &mut *self.bound,
        }
    }
}

fn lookup<'v>(data: &'v Value, relative: &KeyPath) -> Option<&'v Value> {
    relative.iter().try_fold(data, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => items.get(parse_index(key)?),
        _ => None,
    })
}

/// Applies recorded `get` transforms to a stored subtree.
fn project(stored: &Value, key_path: &KeyPath, hooks: &HookTable) -> Value {
    if let Some(get) = hooks.getter(key_path) {
        return get.apply(stored);
    }
    match stored {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), project(v, &key_path.child(k.as_str()), hooks)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| project(v, &key_path.child(i.to_string()), hooks))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn empty_container(node: &SchemaNode) -> Value {
    match node.model() {
        ModelNode::DynamicMap(map) if map.list => Value::Array(Vec::new()),
        _ => Value::Object(Map::new()),
    }
}

/// Walks to the container at `relative`, creating missing containers on the way.
fn container_at<'v>(
    data: &'v mut Value,
    relative: &KeyPath,
    node: &SchemaNode,
) -> Option<&'v mut Value> {
    let mut current = data;
    let mut node = node.clone();
    for key in relative.iter() {
        node = node.resolve(key)?;
        if node.kind() == NodeKind::Value {
            return None;
        }
        let empty = empty_container(&node);
        current = match current {
            Value::Object(map) => map.entry(key.to_string()).or_insert(empty),
            Value::Array(items) => {
                let index = parse_index(key)?;
                if index == items.len() {
                    items.push(empty);
                }
                items.get_mut(index)?
            }
            _ => return None,
        };
        if !is_container(current) {
            *current = empty_container(&node);
        }
    }
    Some(current)
}

fn insert_child(
    container: &mut Value,
    key: &str,
    value: Value,
    key_path: &KeyPath,
) -> SchemaResult<()> {
    match container {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        Value::Array(items) => match parse_index(key) {
            Some(index) if index < items.len() => {
                items[index] = value;
                Ok(())
            }
            Some(index) if index == items.len() => {
                items.push(value);
                Ok(())
            }
            _ => Err(SchemaError::invalid_path(key_path.clone())),
        },
        _ => Err(SchemaError::invalid_path(key_path.clone())),
    }
}

fn remove_child(container: &mut Value, key: &str) {
    match container {
        Value::Object(map) => {
            map.shift_remove(key);
        }
        Value::Array(items) => {
            if let Some(slot) = parse_index(key).and_then(|i| items.get_mut(i)) {
                *slot = Value::Null;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::errors::SchemaErrorKind;
    use crate::schema::tree::Schema;
    use serde_json::json;

    fn user_schema() -> Schema {
        Schema::builder(json!({
            "info": {
                "name": {"type": "String", "required": true, "trim": true},
                "handle": {"type": "String", "lowercase": true},
                "email": {"type": "String", "get": "mask"}
            },
            "friends": {"string": {"since": "number"}},
            "tags": ["string"]
        }))
        .transform("mask", |_| json!("***"))
        .build()
        .unwrap()
    }

    fn bound(schema: &Schema, data: Value) -> BoundObject {
        schema.cast(data).unwrap().into_bound().unwrap()
    }

    #[test]
    fn test_reads_apply_getters() {
        let schema = user_schema();
        let obj = bound(
            &schema,
            json!({"info": {"name": "Jo", "email": "jo@example.com"}}),
        );
        assert_eq!(obj.get_path(["info", "email"]), Some(json!("***")));
        assert_eq!(obj.raw()["info"]["email"], json!("jo@example.com"));
        assert_eq!(obj.to_value()["info"]["email"], json!("***"));
        assert_eq!(obj.get_path(["info", "handle"]), None);
    }

    #[test]
    fn test_write_coerces_value() {
        let schema = user_schema();
        let mut obj = bound(&schema, json!({"info": {"name": "Jo"}}));
        obj.set_path(["info", "handle"], json!("JoJo")).unwrap();
        assert_eq!(obj.raw()["info"]["handle"], json!("jojo"));
    }

    #[test]
    fn test_rejected_write_leaves_data_unchanged() {
        let schema = user_schema();
        let mut obj = bound(&schema, json!({"info": {"name": "Jo"}}));
        let before = obj.raw().clone();

        let err = obj.set_path(["info", "handle"], json!(5)).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Type);
        assert_eq!(obj.raw(), &before);

        let err = obj.set_path(["info", "nope"], json!("x")).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::InvalidPath);
        assert_eq!(err.key_path(), &KeyPath::from(vec!["info", "nope"]));
        assert_eq!(obj.raw(), &before);
    }

    #[test]
    fn test_required_enforced_on_write() {
        let schema = user_schema();
        let mut obj = bound(&schema, json!({"info": {"name": "Jo"}}));
        let err = obj.set_path(["info", "name"], json!("")).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Required);
        assert_eq!(obj.raw()["info"]["name"], json!("Jo"));
    }

    #[test]
    fn test_required_write_not_rescued_by_default() {
        let schema = Schema::new(json!({
            "nick": {"type": "string", "required": true, "default": "anon"}
        }))
        .unwrap();
        let mut obj = bound(&schema, json!({"nick": "jo"}));

        let err = obj.set("nick", json!("")).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Required);
        assert_eq!(obj.raw(), &json!({"nick": "jo"}));
    }

    #[test]
    fn test_replace_keeps_a_container() {
        let schema = user_schema();
        let mut obj = bound(&schema, json!({"info": {"name": "Jo"}}));

        for data in [json!(null), json!(""), json!("x"), json!(3)] {
            let err = obj.replace(data).unwrap_err();
            assert_eq!(err.kind(), SchemaErrorKind::Type);
        }
        let err = obj
            .set_path(std::iter::empty::<&str>(), json!(null))
            .unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Type);

        assert_eq!(obj.raw(), &json!({"info": {"name": "Jo"}}));
        obj.set_path(["friends", "amy", "since"], json!(1)).unwrap();
    }

    #[test]
    fn test_non_canonical_index_rejected() {
        let schema = user_schema();
        let mut obj = bound(&schema, json!({"info": {"name": "Jo"}, "tags": ["a", "b"]}));
        let before = obj.raw().clone();

        for key in ["01", "+1", " 1"] {
            let err = obj.set_path(["tags", key], json!("z")).unwrap_err();
            assert_eq!(err.kind(), SchemaErrorKind::InvalidPath);
            assert_eq!(obj.get_path(["tags", key]), None);
        }
        assert_eq!(obj.raw(), &before);
    }

    #[test]
    fn test_dynamic_child_write_creates_parent() {
        let schema = user_schema();
        let mut obj = bound(&schema, json!({"info": {"name": "Jo"}}));
        obj.at_mut(["friends", "amy"]).set("since", json!(2020)).unwrap();
        assert_eq!(obj.raw()["friends"]["amy"], json!({"since": 2020}));
    }

    #[test]
    fn test_list_append_and_replace() {
        let schema = user_schema();
        let mut obj = bound(&schema, json!({"info": {"name": "Jo"}, "tags": ["a"]}));
        obj.set_path(["tags", "1"], json!("b")).unwrap();
        obj.set_path(["tags", "0"], json!("z")).unwrap();
        assert_eq!(obj.raw()["tags"], json!(["z", "b"]));

        let err = obj.set_path(["tags", "5"], json!("c")).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::InvalidPath);
    }

    #[test]
    fn test_write_container_value() {
        let schema = user_schema();
        let mut obj = bound(&schema, json!({"info": {"name": "Jo"}}));
        obj.set("info", json!({"name": "  Ann ", "handle": "ANN"})).unwrap();
        assert_eq!(obj.raw()["info"], json!({"name": "Ann", "handle": "ann"}));
    }

    #[test]
    fn test_replace_whole_tree() {
        let schema = user_schema();
        let mut obj = bound(&schema, json!({"info": {"name": "Jo"}}));
        obj.replace(json!({"info": {"name": "Bo", "email": "b@x"}})).unwrap();
        assert_eq!(obj.get_path(["info", "name"]), Some(json!("Bo")));
        assert_eq!(obj.get_path(["info", "email"]), Some(json!("***")));

        assert!(obj.replace(json!({"info": {}})).is_err());
        assert_eq!(obj.raw()["info"]["name"], json!("Bo"));
    }

    #[test]
    fn test_getter_dropped_after_clearing_value() {
        let schema = user_schema();
        let mut obj = bound(
            &schema,
            json!({"info": {"name": "Jo", "email": "jo@example.com"}}),
        );
        obj.set_path(["info", "email"], json!("")).unwrap();
        assert_eq!(obj.get_path(["info", "email"]), Some(json!("")));
    }

    #[test]
    fn test_serializes_projected_tree() {
        let schema = user_schema();
        let obj = bound(&schema, json!({"info": {"name": "Jo", "email": "e"}}));
        let text = serde_json::to_string(&obj).unwrap();
        assert_eq!(text, r#"{"info":{"name":"Jo","email":"***"}}"#);
    }
}
