//! Node kinds: attribute, relation and default declarations.
//!
//! A kind is the schema of one category of node. Accessors are not
//! generated per name; each kind keeps a table of declared accessors and the
//! node methods dispatch through [`Kind::accessor`], which walks the parent
//! chain. Defaults are merged on read from the same chain, so declaring a
//! default on a subkind never touches its parent's table.

use crate::node::Node;
use crate::registry::Registry;
use crate::relation::{Cardinality, RelationOptions, RelationSpec, ReverseSpec};
use crate::schema::Context;
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use trellis_core::{demodulize, first_free_name, underscore, DslError, DslResult, Logger};

/// Attribute every kind declares
pub const NAME_ATTRIBUTE: &str = "name";

/// Default value of an attribute
#[derive(Clone)]
pub enum DefaultValue {
    /// Fixed value, copied into every new instance
    Value(Value),
    /// Computed for each new instance from the partially-built node
    Computed(Rc<dyn Fn(&Node) -> Value>),
}

impl DefaultValue {
    /// The fixed value, if this default is not computed
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Computed(_) => None,
        }
    }

    /// Produce the value for `node`
    pub(crate) fn resolve(&self, node: &Node) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Computed(f) => f(node),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<Value> for DefaultValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// What a name resolves to on a kind
#[derive(Debug, Clone)]
pub(crate) enum Accessor {
    Attribute,
    Relation(RelationSpec),
    Reverse(ReverseSpec),
}

impl Accessor {
    fn describe(&self) -> &'static str {
        match self {
            Self::Attribute => "attribute",
            Self::Relation(_) => "relation",
            Self::Reverse(_) => "reverse relation",
        }
    }
}

struct KindInner {
    name: String,
    parent: Option<Kind>,
    context: Rc<Context>,
    attributes: RefCell<IndexSet<String>>,
    relations: RefCell<IndexMap<String, RelationSpec>>,
    reverses: RefCell<IndexMap<String, ReverseSpec>>,
    defaults: RefCell<IndexMap<String, DefaultValue>>,
    registry: Registry,
}

/// Handle to a node kind
///
/// Handles are cheap to clone; two handles are equal when they refer to the
/// same kind.
#[derive(Clone)]
pub struct Kind {
    inner: Rc<KindInner>,
}

impl Kind {
    pub(crate) fn new(name: &str, parent: Option<Kind>, context: Rc<Context>) -> Self {
        let mut attributes = IndexSet::new();
        if parent.is_none() {
            attributes.insert(NAME_ATTRIBUTE.to_string());
        }
        Self {
            inner: Rc::new(KindInner {
                name: name.to_string(),
                parent,
                context,
                attributes: RefCell::new(attributes),
                relations: RefCell::new(IndexMap::new()),
                reverses: RefCell::new(IndexMap::new()),
                defaults: RefCell::new(IndexMap::new()),
                registry: Registry::new(),
            }),
        }
    }

    /// Full kind name, possibly a module path such as `Deploy::Docker`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Kind name without its module path
    #[must_use]
    pub fn demodulized_name(&self) -> &str {
        demodulize(&self.inner.name)
    }

    /// Kind this one inherits from
    #[must_use]
    pub fn parent(&self) -> Option<&Kind> {
        self.inner.parent.as_ref()
    }

    /// Whether this kind is `other` or inherits from it
    #[must_use]
    pub fn is_kind_of(&self, other: &Kind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    pub(crate) fn context(&self) -> &Context {
        &self.inner.context
    }

    pub(crate) fn shares_context(&self, context: &Rc<Context>) -> bool {
        Rc::ptr_eq(&self.inner.context, context)
    }

    pub(crate) fn logger(&self) -> &Logger {
        &self.inner.context.logger
    }

    /// Whether the schema that defined this kind is still alive
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.context.is_attached()
    }

    pub(crate) fn ensure_attached(&self) -> DslResult<()> {
        if self.is_attached() {
            Ok(())
        } else {
            Err(DslError::configuration(self.name(), "schema dropped"))
        }
    }

    /// Resolve an accessor name against this kind and its ancestors
    pub(crate) fn accessor(&self, name: &str) -> Option<Accessor> {
        if self.inner.attributes.borrow().contains(name) {
            return Some(Accessor::Attribute);
        }
        if let Some(spec) = self.inner.relations.borrow().get(name) {
            return Some(Accessor::Relation(spec.clone()));
        }
        if let Some(spec) = self.inner.reverses.borrow().get(name) {
            return Some(Accessor::Reverse(spec.clone()));
        }
        self.inner.parent.as_ref().and_then(|parent| parent.accessor(name))
    }

    /// Look up a forward relation by name
    pub(crate) fn relation(&self, name: &str) -> DslResult<RelationSpec> {
        self.ensure_attached()?;
        match self.accessor(name) {
            Some(Accessor::Relation(spec)) => Ok(spec),
            _ => Err(DslError::unknown_accessor(self.name(), name)),
        }
    }

    /// Whether `name` is an attribute, relation or reverse relation of this
    /// kind. A detached kind responds to nothing.
    #[must_use]
    pub fn responds_to(&self, name: &str) -> bool {
        self.is_attached() && self.accessor(name).is_some()
    }

    /// Declared attribute names, inherited ones first
    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = self
            .inner
            .parent
            .as_ref()
            .map(Kind::attribute_names)
            .unwrap_or_default();
        names.extend(self.inner.attributes.borrow().iter().cloned());
        names
    }

    /// Declared forward relation names, inherited ones first
    #[must_use]
    pub fn relation_names(&self) -> Vec<String> {
        let mut names = self
            .inner
            .parent
            .as_ref()
            .map(Kind::relation_names)
            .unwrap_or_default();
        names.extend(self.inner.relations.borrow().keys().cloned());
        names
    }

    /// Declare an attribute. Declaring an existing attribute again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if the name is empty or already used by a relation, or
    /// if the schema was dropped
    pub fn declare_attribute(&self, name: &str) -> DslResult<()> {
        self.ensure_attached()?;
        if name.is_empty() {
            return Err(DslError::configuration(self.name(), "attribute name must not be empty"));
        }
        match self.accessor(name) {
            Some(Accessor::Attribute) => Ok(()),
            Some(other) => Err(DslError::configuration(
                self.name(),
                format!("{} is already declared as a {}", name, other.describe()),
            )),
            None => {
                self.inner.attributes.borrow_mut().insert(name.to_string());
                Ok(())
            }
        }
    }

    /// Declare several attributes
    ///
    /// # Errors
    ///
    /// Returns the first declaration error
    pub fn declare_attributes<I, S>(&self, names: I) -> DslResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .try_for_each(|name| self.declare_attribute(name.as_ref()))
    }

    /// Declare a relation from this kind to `target`
    ///
    /// Adds the forward accessor `name` here and a read-only reverse accessor
    /// on `target`. The reverse name defaults to the snake-cased, demodulized
    /// name of this kind.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `target` belongs to another schema, or
    /// if either accessor name is already taken on its kind, or if the schema
    /// was dropped
    pub fn declare_relation(
        &self,
        name: &str,
        target: &Kind,
        options: RelationOptions,
    ) -> DslResult<()> {
        self.ensure_attached()?;
        if !target.shares_context(&self.inner.context) {
            return Err(DslError::configuration(
                self.name(),
                format!(
                    "relation {} requires a kind of this schema, {} is not one",
                    name,
                    target.name()
                ),
            ));
        }
        if name.is_empty() {
            return Err(DslError::configuration(self.name(), "relation name must not be empty"));
        }
        if let Some(existing) = self.accessor(name) {
            return Err(DslError::configuration(
                self.name(),
                format!("{} is already declared as a {}", name, existing.describe()),
            ));
        }

        let reverse_name = options
            .reverse_name
            .unwrap_or_else(|| underscore(self.demodulized_name()));
        match target.accessor(&reverse_name) {
            None => {}
            // Two relations from the same kind share the back-reference slot.
            Some(Accessor::Reverse(spec)) if spec.source == self.name() => {}
            Some(existing) => {
                return Err(DslError::configuration(
                    self.name(),
                    format!(
                        "reverse accessor {} of relation {} is already declared on {} as a {}",
                        reverse_name,
                        name,
                        target.name(),
                        existing.describe()
                    ),
                ));
            }
        }

        let spec = RelationSpec {
            name: name.to_string(),
            target: target.clone(),
            cardinality: options.cardinality,
            reverse_name: reverse_name.clone(),
        };
        self.inner
            .relations
            .borrow_mut()
            .insert(name.to_string(), spec);
        target.inner.reverses.borrow_mut().insert(
            reverse_name.clone(),
            ReverseSpec {
                name: reverse_name.clone(),
                source: self.name().to_string(),
            },
        );

        let arity = match options.cardinality {
            Cardinality::Single => "one",
            Cardinality::Many => "many",
        };
        self.logger().debug(format!(
            "declared relation {}#{} -> {} {} (reverse {})",
            self.name(),
            name,
            arity,
            target.name(),
            reverse_name
        ));
        Ok(())
    }

    /// Declare a fixed default for an attribute or relation
    ///
    /// # Errors
    ///
    /// Returns error if `name` is not a settable accessor of this kind, or if
    /// the schema was dropped
    pub fn declare_default(&self, name: &str, value: impl Into<Value>) -> DslResult<()> {
        self.insert_default(name, DefaultValue::Value(value.into()))
    }

    /// Declare a default computed for every new instance
    ///
    /// The closure receives the partially-built node, after every fixed
    /// default and caller-supplied value has been applied, along with computed
    /// defaults declared before this one. A caller-supplied value for `name`
    /// skips the closure.
    ///
    /// # Errors
    ///
    /// Returns error if `name` is not a settable accessor of this kind, or if
    /// the schema was dropped
    pub fn declare_default_with(
        &self,
        name: &str,
        f: impl Fn(&Node) -> Value + 'static,
    ) -> DslResult<()> {
        self.insert_default(name, DefaultValue::Computed(Rc::new(f)))
    }

    fn insert_default(&self, name: &str, default: DefaultValue) -> DslResult<()> {
        self.ensure_attached()?;
        match self.accessor(name) {
            Some(Accessor::Attribute) | Some(Accessor::Relation(_)) => {
                self.inner
                    .defaults
                    .borrow_mut()
                    .insert(name.to_string(), default);
                Ok(())
            }
            Some(Accessor::Reverse(_)) => Err(DslError::configuration(
                self.name(),
                format!("cannot declare a default for reverse relation {}", name),
            )),
            None => Err(DslError::configuration(
                self.name(),
                format!("cannot declare a default for undeclared {}", name),
            )),
        }
    }

    /// Defaults of this kind merged over those of its ancestors
    ///
    /// Returns a fresh map; the kinds' own tables are never modified.
    #[must_use]
    pub fn defaults(&self) -> IndexMap<String, DefaultValue> {
        let mut merged = self
            .inner
            .parent
            .as_ref()
            .map(Kind::defaults)
            .unwrap_or_default();
        for (name, default) in self.inner.defaults.borrow().iter() {
            merged.insert(name.clone(), default.clone());
        }
        merged
    }

    /// Registry of this kind's instances
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Get an instance by name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Node> {
        self.inner.registry.get(name)
    }

    /// Copy of the name to instance mapping, in registration order
    #[must_use]
    pub fn instances(&self) -> IndexMap<String, Node> {
        self.inner.registry.snapshot()
    }

    /// First `<Kind>_<n>` not yet registered, counting from 0
    #[must_use]
    pub fn generate_unique_name(&self) -> String {
        first_free_name(self.demodulized_name(), |name| self.inner.registry.contains(name))
    }

    /// Release instances, relations and defaults so that kinds and nodes
    /// referring to each other can be freed
    pub(crate) fn teardown(&self) {
        self.inner.registry.clear();
        self.inner.reverses.borrow_mut().clear();
        let relations: Vec<RelationSpec> =
            self.inner.relations.borrow_mut().drain(..).map(|(_, s)| s).collect();
        drop(relations);
        let defaults: Vec<DefaultValue> =
            self.inner.defaults.borrow_mut().drain(..).map(|(_, d)| d).collect();
        drop(defaults);
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Kind {}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kind")
            .field("name", &self.inner.name)
            .field("parent", &self.parent().map(Kind::name))
            .finish()
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}
