//! Node instances.
//!
//! A node is created by its kind's construction protocol and stays in the
//! *building* state while defaults and the builder block run. Sealing
//! freezes its name; attributes and relations remain writable.

use crate::kind::{Accessor, Kind, NAME_ATTRIBUTE};
use crate::relation::{Related, RelationSpec};
use crate::value::{Thunk, Value};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use trellis_core::{DslError, DslResult};

struct NodeInner {
    kind: Kind,
    attrs: RefCell<IndexMap<String, Value>>,
    links: RefCell<IndexMap<String, Related>>,
    back_refs: RefCell<IndexMap<String, Weak<NodeInner>>>,
    sealed: Cell<bool>,
}

/// Handle to a node instance
///
/// Two handles are equal when their nodes have the same kind and name.
/// Use [`Node::ptr_eq`] to compare object identity.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl Node {
    pub(crate) fn building(kind: Kind) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                kind,
                attrs: RefCell::new(IndexMap::new()),
                links: RefCell::new(IndexMap::new()),
                back_refs: RefCell::new(IndexMap::new()),
                sealed: Cell::new(false),
            }),
        }
    }

    /// Kind of this node
    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// Name of this node; empty while building until one is assigned
    #[must_use]
    pub fn name(&self) -> String {
        self.inner
            .attrs
            .borrow()
            .get(NAME_ATTRIBUTE)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    }

    pub(crate) fn has_name(&self) -> bool {
        self.inner.attrs.borrow().contains_key(NAME_ATTRIBUTE)
    }

    /// Whether construction has finished
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.get()
    }

    pub(crate) fn seal(&self) {
        self.inner.sealed.set(true);
    }

    /// Whether both handles refer to the same object
    #[must_use]
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn require_attribute(&self, attr: &str) -> DslResult<()> {
        match self.kind().accessor(attr) {
            Some(Accessor::Attribute) => Ok(()),
            _ => Err(DslError::unknown_accessor(self.kind().name(), attr)),
        }
    }

    /// Read an attribute; `None` if it was never set
    ///
    /// # Errors
    ///
    /// Returns error if `attr` is not an attribute of this node's kind
    pub fn get(&self, attr: &str) -> DslResult<Option<Value>> {
        self.require_attribute(attr)?;
        Ok(self.inner.attrs.borrow().get(attr).cloned())
    }

    /// Set an attribute and return the new value
    ///
    /// # Errors
    ///
    /// Returns error if `attr` is not an attribute, or when setting the name
    /// of a sealed node or setting the name to a non-string
    pub fn set(&self, attr: &str, value: impl Into<Value>) -> DslResult<Value> {
        self.require_attribute(attr)?;
        let value = value.into();
        if attr == NAME_ATTRIBUTE {
            if self.is_sealed() {
                return Err(DslError::FrozenName {
                    kind: self.kind().name().to_string(),
                    name: self.name(),
                });
            }
            if value.as_str().is_none() {
                return Err(DslError::TypeMismatch {
                    kind: self.kind().name().to_string(),
                    accessor: attr.to_string(),
                    expected: "string".to_string(),
                });
            }
        }
        self.inner
            .attrs
            .borrow_mut()
            .insert(attr.to_string(), value.clone());
        Ok(value)
    }

    /// Store a closure in an attribute; reading returns the closure, not its result
    ///
    /// # Errors
    ///
    /// Returns error if `attr` is not an attribute
    pub fn set_deferred(&self, attr: &str, f: impl Fn() -> Value + 'static) -> DslResult<Value> {
        self.set(attr, Value::Thunk(Thunk::new(f)))
    }

    /// Read a reverse relation: the node that linked this one
    ///
    /// # Errors
    ///
    /// Returns error if `name` is not a reverse relation of this node's kind
    pub fn reverse(&self, name: &str) -> DslResult<Option<Node>> {
        match self.kind().accessor(name) {
            Some(Accessor::Reverse(_)) => Ok(self
                .inner
                .back_refs
                .borrow()
                .get(name)
                .and_then(Weak::upgrade)
                .map(|inner| Node { inner })),
            _ => Err(DslError::unknown_accessor(self.kind().name(), name)),
        }
    }

    pub(crate) fn set_back_ref(&self, name: &str, parent: &Node) {
        self.inner
            .back_refs
            .borrow_mut()
            .insert(name.to_string(), Rc::downgrade(&parent.inner));
    }

    pub(crate) fn stored(&self, spec: &RelationSpec) -> Related {
        self.inner
            .links
            .borrow()
            .get(&spec.name)
            .cloned()
            .unwrap_or_else(|| Related::empty(spec.cardinality))
    }

    pub(crate) fn store_link(&self, spec: &RelationSpec, child: Node) {
        let mut links = self.inner.links.borrow_mut();
        let slot = links
            .entry(spec.name.clone())
            .or_insert_with(|| Related::empty(spec.cardinality));
        match slot {
            Related::Many(nodes) => nodes.push(child),
            Related::One(node) => *node = Some(child),
        }
    }

    /// Apply one attribute or relation value during construction
    pub(crate) fn assign(&self, name: &str, value: Value) -> DslResult<()> {
        match self.kind().accessor(name) {
            Some(Accessor::Attribute) => self.set(name, value).map(|_| ()),
            Some(Accessor::Relation(spec)) => self.assign_relation(&spec, value),
            Some(Accessor::Reverse(_)) => Err(DslError::ReadOnlyAccessor {
                kind: self.kind().name().to_string(),
                accessor: name.to_string(),
            }),
            None => Err(DslError::unknown_accessor(self.kind().name(), name)),
        }
    }

    /// Whether the named attribute, relation or reverse relation holds a value
    #[must_use]
    pub fn is_present(&self, name: &str) -> bool {
        match self.kind().accessor(name) {
            Some(Accessor::Attribute) => self.inner.attrs.borrow().contains_key(name),
            Some(Accessor::Relation(spec)) => !self.stored(&spec).is_empty(),
            Some(Accessor::Reverse(_)) => self
                .inner
                .back_refs
                .borrow()
                .get(name)
                .is_some_and(|parent| parent.strong_count() > 0),
            None => false,
        }
    }

    /// Require every named slot to hold a value before running `operation`
    ///
    /// # Errors
    ///
    /// Returns [`DslError::MissingRequiredAttribute`] naming the first absent slot
    pub fn ensure_present(&self, operation: &str, names: &[&str]) -> DslResult<()> {
        match names.iter().find(|name| !self.is_present(name)) {
            Some(missing) => Err(DslError::MissingRequiredAttribute {
                kind: self.kind().name().to_string(),
                operation: operation.to_string(),
                attribute: (*missing).to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Attributes and forward relations as an ordered map
    #[must_use]
    pub fn to_map(&self) -> IndexMap<String, Value> {
        let mut map = self.inner.attrs.borrow().clone();
        for (name, related) in self.inner.links.borrow().iter() {
            if let Some(value) = related.to_value() {
                map.insert(name.clone(), value);
            }
        }
        map
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.name() == other.name()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().name().hash(state);
        self.name().hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind().name())
            .field("name", &self.name())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        for (name, value) in self.inner.attrs.borrow().iter() {
            fields.push(format!("{} = {}", name, value));
        }
        for (name, related) in self.inner.links.borrow().iter() {
            let names: Vec<String> = related.nodes().iter().map(Node::name).collect();
            match related {
                Related::One(_) => fields.push(format!("{} -> {}", name, names.join(""))),
                Related::Many(_) => fields.push(format!("{} -> [{}]", name, names.join(", "))),
            }
        }
        for (name, parent) in self.inner.back_refs.borrow().iter() {
            if let Some(inner) = parent.upgrade() {
                fields.push(format!("{} <- {}", name, Node { inner }.name()));
            }
        }
        write!(f, "{} ({})", self.kind().name(), fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::relation::RelationOptions;
    use crate::schema::Schema;

    fn test_kind(schema: &Schema) -> Kind {
        let kind = schema.define_kind("TestClass").unwrap();
        kind.declare_attribute("chips").unwrap();
        kind
    }

    #[test]
    fn test_get_unset() {
        let schema = Schema::new();
        let tony = test_kind(&schema).create(attrs! { "name" => "Tony" }).unwrap();
        assert_eq!(tony.get("chips").unwrap(), None);
    }

    #[test]
    fn test_set_then_get() {
        let schema = Schema::new();
        let tony = test_kind(&schema).create(attrs! { "name" => "Tony" }).unwrap();
        assert_eq!(tony.set("chips", "bbq").unwrap(), Value::from("bbq"));
        assert_eq!(tony.get("chips").unwrap(), Some(Value::from("bbq")));

        tony.set("chips", "lays").unwrap();
        assert_eq!(tony.get("chips").unwrap(), Some(Value::from("lays")));
    }

    #[test]
    fn test_set_deferred_stores_closure() {
        let schema = Schema::new();
        let tony = test_kind(&schema).create(attrs! {}).unwrap();
        tony.set_deferred("chips", || Value::from("test")).unwrap();

        let stored = tony.get("chips").unwrap().unwrap();
        let thunk = stored.as_thunk().unwrap();
        assert_eq!(thunk.call(), Value::from("test"));
    }

    #[test]
    fn test_unknown_attribute() {
        let schema = Schema::new();
        let tony = test_kind(&schema).create(attrs! {}).unwrap();
        assert!(matches!(
            tony.get("salsa"),
            Err(DslError::UnknownAccessor { .. })
        ));
        assert!(tony.set("salsa", "verde").is_err());
    }

    #[test]
    fn test_name_frozen_after_construction() {
        let schema = Schema::new();
        let tony = test_kind(&schema).create(attrs! { "name" => "Tony" }).unwrap();
        assert!(tony.is_sealed());
        assert!(matches!(
            tony.set("name", "Tina"),
            Err(DslError::FrozenName { .. })
        ));
        assert_eq!(tony.name(), "Tony");
    }

    #[test]
    fn test_name_must_be_string() {
        let schema = Schema::new();
        let kind = test_kind(&schema);
        assert!(matches!(
            kind.create(attrs! { "name" => 7 }),
            Err(DslError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_equality_by_kind_and_name() {
        let schema = Schema::new();
        let kind = test_kind(&schema);
        let other = schema.define_kind("Other").unwrap();

        let a = kind.create(attrs! { "name" => "same", "chips" => "lays" }).unwrap();
        let b = kind.create(attrs! { "name" => "same", "chips" => "ruffles" }).unwrap();
        let c = other.create(attrs! { "name" => "same" }).unwrap();

        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a, c);
    }

    #[test]
    fn test_ensure_present() {
        let schema = Schema::new();
        let included = schema.define_kind("IncludedClass").unwrap();
        let kind = test_kind(&schema);
        kind.declare_relation("meta", &included, RelationOptions::single())
            .unwrap();
        let tony = kind.create(attrs! { "name" => "Tony" }).unwrap();

        assert!(tony.ensure_present("deploy", &["name"]).is_ok());
        let err = tony.ensure_present("deploy", &["name", "meta", "chips"]).unwrap_err();
        assert_eq!(
            err,
            DslError::MissingRequiredAttribute {
                kind: "TestClass".to_string(),
                operation: "deploy".to_string(),
                attribute: "meta".to_string(),
            }
        );

        tony.child("meta", |_| Ok(())).unwrap();
        tony.set("chips", "lays").unwrap();
        assert!(tony.ensure_present("deploy", &["name", "meta", "chips"]).is_ok());
        assert!(tony.ensure_present("deploy", &["undeclared"]).is_err());
    }

    #[test]
    fn test_ensure_present_reverse() {
        let schema = Schema::new();
        let ocean = schema.define_kind("Ocean").unwrap();
        let sea = schema.define_kind("Sea").unwrap();
        sea.declare_relation("ocean", &ocean, RelationOptions::single())
            .unwrap();

        let lonely = ocean.create(attrs! {}).unwrap();
        assert!(lonely.ensure_present("drain", &["sea"]).is_err());

        let baltic = sea.create(attrs! { "name" => "Baltic" }).unwrap();
        baltic.link("ocean", &lonely.name()).unwrap();
        assert!(lonely.ensure_present("drain", &["sea"]).is_ok());
    }

    #[test]
    fn test_reverse_is_read_only() {
        let schema = Schema::new();
        let ocean = schema.define_kind("Ocean").unwrap();
        let sea = schema.define_kind("Sea").unwrap();
        sea.declare_relation("ocean", &ocean, RelationOptions::single())
            .unwrap();

        let baltic = sea.create(attrs! { "name" => "Baltic" }).unwrap();
        assert!(matches!(
            ocean.create(attrs! { "sea" => baltic }),
            Err(DslError::ReadOnlyAccessor { .. })
        ));
        assert!(ocean.lookup("Ocean_0").is_none());
        assert!(matches!(
            ocean.create(attrs! {}).unwrap().reverse("depth"),
            Err(DslError::UnknownAccessor { .. })
        ));
    }

    #[test]
    fn test_to_map_and_display() {
        let schema = Schema::new();
        let ocean = schema.define_kind("Ocean").unwrap();
        ocean.declare_attribute("depth").unwrap();
        let sea = schema.define_kind("Sea").unwrap();
        sea.declare_relation("ocean", &ocean, RelationOptions::single())
            .unwrap();

        let baltic = sea.create(attrs! { "name" => "Baltic" }).unwrap();
        let related = baltic
            .child("ocean", |o| o.set("depth", 459).map(|_| ()))
            .unwrap();
        let child = related.one().unwrap();

        let map = baltic.to_map();
        assert_eq!(map.get("name"), Some(&Value::from("Baltic")));
        assert_eq!(map.get("ocean"), Some(&Value::from(child)));

        assert_eq!(baltic.to_string(), "Sea (name = Baltic, ocean -> Baltic_Ocean)");
        assert_eq!(
            child.to_string(),
            "Ocean (name = Baltic_Ocean, depth = 459, sea <- Baltic)"
        );
    }

    #[test]
    fn test_back_ref_does_not_keep_parent_alive() {
        let schema = Schema::new();
        let ocean = schema.define_kind("Ocean").unwrap();
        let sea = schema.define_kind("Sea").unwrap();
        sea.declare_relation("ocean", &ocean, RelationOptions::single())
            .unwrap();

        let child = {
            let parent = Node::building(sea.clone());
            parent.set("name", "Ghost").unwrap();
            let related = parent.child("ocean", |_| Ok(())).unwrap();
            related.one().unwrap().clone()
        };
        assert_eq!(child.reverse("sea").unwrap(), None);
    }
}
