//! Schema tree materialization and key-path resolution
//!
//! A `SchemaNode` is a cheap handle: a shared pointer into the normalized
//! model plus the node's key path. Children are resolved on demand from
//! the model, so dynamic-map children exist for any key without being
//! enumerated. Parents are never stored; `parent()` re-resolves the parent
//! path from the tree root.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use super::cast::{self, Cast};
use super::errors::{SchemaError, SchemaResult};
use super::normalizer::{Normalizer, RESERVED_NAMES};
use super::types::{parse_index, KeyPath, ModelNode, PrimitiveKind, Transform, ValueSchema};
use super::validator::{self, ValidateOptions};
use crate::observability::{self, Event};

/// Extension method bound to every schema node
pub type Method = Arc<dyn Fn(&SchemaNode) -> Value + Send + Sync>;

/// Shared state of one materialized tree
struct Tree {
    root: ModelNode,
    methods: BTreeMap<String, Method>,
}

/// Variant of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Leaf with a primitive kind and constraint set
    Value,
    /// Literal nested fields
    Object,
    /// Any number of keys sharing one child template
    DynamicMap,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Value => "value",
            NodeKind::Object => "object",
            NodeKind::DynamicMap => "dynamic",
        }
    }
}

/// Builder for a schema tree with transforms and extension methods.
pub struct SchemaBuilder {
    model: Value,
    transforms: HashMap<String, Transform>,
    methods: BTreeMap<String, Method>,
}

impl SchemaBuilder {
    /// Registers a transform that descriptors reference by name in `get`/`set`.
    pub fn transform<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(func));
        self
    }

    /// Registers an extension method callable on every node.
    ///
    /// The method name becomes reserved: models may not use it as a field name.
    pub fn method<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&SchemaNode) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(func));
        self
    }

    /// Normalizes the model and materializes the tree root.
    pub fn build(self) -> SchemaResult<Schema> {
        if let Some(name) = self
            .methods
            .keys()
            .find(|name| RESERVED_NAMES.contains(&name.as_str()))
        {
            return Err(SchemaError::invalid_schema(
                KeyPath::root(),
                format!("Extension method '{}' clashes with a reserved accessor", name),
            ));
        }

        let normalizer = Normalizer::new(
            self.methods.keys().map(String::as_str),
            Some(&self.transforms),
        );
        let root = normalizer
            .normalize_root(&self.model, &KeyPath::root())
            .map_err(|e| {
                observability::model_rejected(&e);
                e
            })?;

        let tree = Arc::new(Tree {
            root: root.clone(),
            methods: self.methods,
        });
        let root = SchemaNode {
            tree,
            key_path: KeyPath::root(),
            model: root,
        };

        tracing::debug!(
            event = %Event::SchemaBuilt,
            root_kind = root.kind().as_str(),
            methods = root.tree.methods.len(),
            "schema tree materialized"
        );

        Ok(Schema { root })
    }
}

/// A materialized schema tree
#[derive(Clone, Debug)]
pub struct Schema {
    root: SchemaNode,
}

impl Schema {
    /// Builds a schema from a model with no transforms or extension methods.
    pub fn new(model: Value) -> SchemaResult<Self> {
        Self::builder(model).build()
    }

    pub fn builder(model: Value) -> SchemaBuilder {
        SchemaBuilder {
            model,
            transforms: HashMap::new(),
            methods: BTreeMap::new(),
        }
    }

    /// Returns the root node (key path `[]`)
    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// Resolves the node at `path` from the root
    pub fn node<I, S>(&self, path: I) -> Option<SchemaNode>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.root.resolve_path(path)
    }

    pub fn validate<'d>(&self, data: &'d Value) -> SchemaResult<&'d Value> {
        self.root.validate(data)
    }

    pub fn validate_with<'d>(
        &self,
        data: &'d Value,
        options: ValidateOptions,
    ) -> SchemaResult<&'d Value> {
        self.root.validate_with(data, options)
    }

    pub fn cast(&self, data: Value) -> SchemaResult<Cast> {
        self.root.cast(data)
    }
}

/// Addressable node of a schema tree
#[derive(Clone)]
pub struct SchemaNode {
    tree: Arc<Tree>,
    key_path: KeyPath,
    model: ModelNode,
}

impl SchemaNode {
    /// Returns the ordered keys from the tree root to this node
    pub fn key_path(&self) -> &KeyPath {
        &self.key_path
    }

    /// Returns the terminal key, `None` for the root
    pub fn key(&self) -> Option<&str> {
        self.key_path.last()
    }

    pub fn is_root(&self) -> bool {
        self.key_path.is_empty()
    }

    pub fn kind(&self) -> NodeKind {
        match &self.model {
            ModelNode::Value(_) => NodeKind::Value,
            ModelNode::Object(_) => NodeKind::Object,
            ModelNode::DynamicMap(_) => NodeKind::DynamicMap,
        }
    }

    /// Returns the constraint set of a Value node
    pub fn value_schema(&self) -> Option<&ValueSchema> {
        match &self.model {
            ModelNode::Value(schema) => Some(schema),
            _ => None,
        }
    }

    /// Returns the literal field names of an Object node, in declaration order
    pub fn field_names(&self) -> Vec<&str> {
        match &self.model {
            ModelNode::Object(object) => object.fields.iter().map(|(k, _)| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the key kind of a DynamicMap node
    pub fn dynamic_key_kind(&self) -> Option<PrimitiveKind> {
        match &self.model {
            ModelNode::DynamicMap(map) => Some(map.key_kind),
            _ => None,
        }
    }

    /// Instantiates the shared child template of a DynamicMap node at `key`.
    ///
    /// Returns `None` for Object and Value nodes, even when `key` is a declared field.
    pub fn dynamic_child(&self, key: &str) -> Option<SchemaNode> {
        match &self.model {
            ModelNode::DynamicMap(_) => self.resolve(key),
            _ => None,
        }
    }

    /// Returns the tree root
    pub fn root(&self) -> SchemaNode {
        SchemaNode {
            tree: Arc::clone(&self.tree),
            key_path: KeyPath::root(),
            model: self.tree.root.clone(),
        }
    }

    /// Returns the enclosing node, or the root when called on the root.
    pub fn parent(&self) -> SchemaNode {
        let root = self.root();
        let parent = root.resolve_path(self.key_path.parent().iter());
        parent.unwrap_or(root)
    }

    /// Resolves the child at `key`.
    ///
    /// Object nodes resolve only declared fields. DynamicMap nodes synthesize
    /// a child from their shared template for any key (list maps only for
    /// decimal indices). Value nodes have no children.
    pub fn resolve(&self, key: &str) -> Option<SchemaNode> {
        let child = match &self.model {
            ModelNode::Value(_) => return None,
            ModelNode::Object(object) => object.get(key)?.clone(),
            ModelNode::DynamicMap(map) => {
                if map.list && parse_index(key).is_none() {
                    return None;
                }
                map.child.clone()
            }
        };

        Some(SchemaNode {
            tree: Arc::clone(&self.tree),
            key_path: self.key_path.child(key),
            model: child,
        })
    }

    /// Resolves a relative key path, stepping through DynamicMap nodes.
    pub fn resolve_path<I, S>(&self, path: I) -> Option<SchemaNode>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        path.into_iter()
            .try_fold(self.clone(), |node, key| node.resolve(key.as_ref()))
    }

    /// Validates `data` against this node, enforcing `required`.
    pub fn validate<'d>(&self, data: &'d Value) -> SchemaResult<&'d Value> {
        self.validate_with(data, ValidateOptions::default())
    }

    pub fn validate_with<'d>(
        &self,
        data: &'d Value,
        options: ValidateOptions,
    ) -> SchemaResult<&'d Value> {
        validator::validate(data, self, options)
    }

    /// Validates and coerces `data`. Containers come back bound.
    pub fn cast(&self, data: Value) -> SchemaResult<Cast> {
        cast::cast(data, self)
    }

    /// Invokes the extension method `name` with this node as receiver.
    pub fn call(&self, name: &str) -> Option<Value> {
        let method = self.tree.methods.get(name)?;
        Some(method(self))
    }

    /// Names of the registered extension methods
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.tree.methods.keys().map(String::as_str)
    }

    /// Schema nodes are not data: every write is rejected.
    pub fn set_property(&self, key: &str, _value: Value) -> SchemaResult<()> {
        Err(SchemaError::immutable(self.key_path.child(key)))
    }

    /// Structural equality: same terminal key and same own property names.
    pub fn is_schema_equal(&self, other: &SchemaNode) -> bool {
        self.key() == other.key() && self.own_property_names() == other.own_property_names()
    }

    fn own_property_names(&self) -> BTreeSet<String> {
        match &self.model {
            ModelNode::Value(schema) => ["#value", "type", "typeof"]
                .into_iter()
                .map(str::to_string)
                .chain(schema.declared.iter().cloned())
                .collect(),
            ModelNode::Object(object) => std::iter::once("#object".to_string())
                .chain(object.fields.iter().map(|(k, _)| k.clone()))
                .collect(),
            ModelNode::DynamicMap(_) => BTreeSet::from(["#dynamic".to_string()]),
        }
    }

    /// Serializable description of this node and its subtree.
    pub fn describe(&self) -> Value {
        let mut out = describe_model(&self.model);
        if let Value::Object(map) = &mut out {
            map.insert(
                "keyPath".into(),
                serde_json::to_value(&self.key_path).unwrap_or(Value::Null),
            );
        }
        out
    }

    pub(crate) fn model(&self) -> &ModelNode {
        &self.model
    }
}

impl PartialEq for SchemaNode {
    fn eq(&self, other: &Self) -> bool {
        self.is_schema_equal(other)
    }
}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaNode")
            .field("key_path", &self.key_path)
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

fn describe_model(model: &ModelNode) -> Value {
    match model {
        ModelNode::Value(schema) => json!({
            "kind": "value",
            "schema": schema.describe(),
        }),
        ModelNode::Object(object) => {
            let fields: serde_json::Map<String, Value> = object
                .fields
                .iter()
                .map(|(k, child)| (k.clone(), describe_model(child)))
                .collect();
            json!({ "kind": "object", "fields": fields })
        }
        ModelNode::DynamicMap(map) => json!({
            "kind": "dynamic",
            "key": map.key_kind.type_name(),
            "list": map.list,
            "child": describe_model(&map.child),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::errors::SchemaErrorKind;

    fn simple_user() -> Schema {
        Schema::new(json!({
            "info": {
                "name": "String",
                "dob": "number",
                "email": "string",
                "verified": "Boolean"
            },
            "friends": {
                "string": {
                    "timestamp": "Number",
                    "deleted": "Boolean"
                }
            }
        }))
        .unwrap()
    }

    fn path(keys: &[&str]) -> KeyPath {
        KeyPath::from(keys.to_vec())
    }

    #[test]
    fn test_key_paths() {
        let user = simple_user();
        assert!(user.root().key_path().is_empty());
        assert_eq!(user.node(["info"]).unwrap().key_path(), &path(&["info"]));
        assert_eq!(
            user.node(["info", "dob"]).unwrap().key_path(),
            &path(&["info", "dob"])
        );
        assert_eq!(
            user.node(["friends", "userA", "timestamp"]).unwrap().key_path(),
            &path(&["friends", "userA", "timestamp"])
        );
    }

    #[test]
    fn test_node_kinds() {
        let user = simple_user();
        assert_eq!(user.root().kind(), NodeKind::Object);
        assert_eq!(user.node(["friends"]).unwrap().kind(), NodeKind::DynamicMap);
        assert_eq!(
            user.node(["friends", "x"]).unwrap().kind(),
            NodeKind::Object
        );
        let dob = user.node(["info", "dob"]).unwrap();
        assert_eq!(dob.kind(), NodeKind::Value);
        assert_eq!(dob.value_schema().unwrap().type_of(), "number");
        assert!(!dob.value_schema().unwrap().required);
    }

    #[test]
    fn test_unknown_paths_do_not_resolve() {
        let user = simple_user();
        assert!(user.node(["info", "blah"]).is_none());
        assert!(user.node(["info", "dob", "deeper"]).is_none());
        assert!(user.node(["friends", "x", "nope"]).is_none());
        assert!(user.root().dynamic_child("info").is_none());
        assert_eq!(
            user.node(["friends"]).unwrap().dynamic_child("x").unwrap().field_names(),
            vec!["timestamp", "deleted"]
        );
    }

    #[test]
    fn test_parent_relationships() {
        let user = simple_user();
        let root = user.root();
        let info = user.node(["info"]).unwrap();
        let name = user.node(["info", "name"]).unwrap();

        assert!(root.is_schema_equal(&info.parent()));
        assert!(name.parent().is_schema_equal(&info));
        assert!(!info.parent().is_schema_equal(&info));
        assert!(user.node(["friends"]).unwrap().parent().is_schema_equal(root));
        assert!(root.parent().is_root());

        let timestamp = user.node(["friends", "userA", "timestamp"]).unwrap();
        assert_eq!(timestamp.parent(), user.node(["friends", "userA"]).unwrap());
        assert_ne!(
            user.node(["friends", "userA"]).unwrap(),
            user.node(["friends", "userB"]).unwrap()
        );
    }

    #[test]
    fn test_list_shorthand_resolves_indices_only() {
        let schema = Schema::new(json!({"tags": ["string"]})).unwrap();
        assert_eq!(schema.node(["tags", "0"]).unwrap().kind(), NodeKind::Value);
        assert!(schema.node(["tags", "first"]).is_none());
        assert!(schema.node(["tags", "01"]).is_none());
        assert!(schema.node(["tags", "+1"]).is_none());
        assert!(schema.node(["tags", "10"]).is_some());
    }

    #[test]
    fn test_schema_nodes_are_immutable() {
        let user = simple_user();
        let err = user
            .node(["info"])
            .unwrap()
            .set_property("name", json!("x"))
            .unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::Set);
        assert_eq!(err.key_path(), &path(&["info", "name"]));
    }

    #[test]
    fn test_extension_methods() {
        let schema = Schema::builder(json!({"hello": "string", "world": "number"}))
            .method("dotKeyPath", |node| json!(node.key_path().to_delimited(".")))
            .method("bar", |_| json!(123))
            .build()
            .unwrap();

        assert_eq!(schema.root().call("dotKeyPath"), Some(json!("")));
        assert_eq!(
            schema.node(["hello"]).unwrap().call("dotKeyPath"),
            Some(json!("hello"))
        );
        assert_eq!(schema.root().call("bar"), Some(json!(123)));
        assert_eq!(schema.root().call("missing"), None);
    }

    #[test]
    fn test_extension_method_clashes() {
        let err = Schema::builder(json!({"hello": "string"}))
            .method("hello", |_| json!(null))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::InvalidSchema);

        let err = Schema::builder(json!({"hello": "string"}))
            .method("parent", |_| json!(null))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::InvalidSchema);
    }

    #[test]
    fn test_describe() {
        let schema = Schema::new(json!({"friends": {"string": "boolean"}})).unwrap();
        let described = schema.node(["friends"]).unwrap().describe();
        assert_eq!(described["kind"], "dynamic");
        assert_eq!(described["child"]["schema"]["type"], "boolean");
        assert_eq!(described["keyPath"], json!(["friends"]));
    }

    #[test]
    fn test_schema_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();
        assert_send_sync::<SchemaNode>();
    }
}
