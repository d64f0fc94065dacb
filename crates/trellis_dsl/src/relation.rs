//! Relations between kinds and the forward accessor dispatch.
//!
//! A forward accessor call takes an optional lookup name and an optional
//! builder block:
//!
//! | name | block | effect                                               |
//! |------|-------|------------------------------------------------------|
//! | -    | -     | read the stored value(s)                             |
//! | yes  | yes   | build a child with that name and link it             |
//! | -    | yes   | build a child named `<parent>_<TargetKind>`, link it |
//! | yes  | -     | look the name up in the target registry, link a hit  |
//!
//! Linking sets single relations and appends to many relations, and points
//! the child's reverse accessor back at the parent. A lookup miss is not an
//! error; the stored value is returned unchanged.

use crate::construct::Block;
use crate::kind::{Kind, NAME_ATTRIBUTE};
use crate::node::Node;
use crate::schema::AutoNaming;
use crate::value::{Attrs, Value};
use trellis_core::{first_free_name, DslError, DslResult};

/// How many instances a relation holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cardinality {
    /// At most one; linking replaces
    #[default]
    Single,
    /// A list; linking appends
    Many,
}

/// Options for [`Kind::declare_relation`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelationOptions {
    /// Cardinality of the forward accessor
    pub cardinality: Cardinality,
    /// Name of the reverse accessor on the target kind
    pub reverse_name: Option<String>,
}

impl RelationOptions {
    /// Single-valued relation
    #[must_use]
    pub fn single() -> Self {
        Self::default()
    }

    /// Collection-valued relation
    #[must_use]
    pub fn many() -> Self {
        Self {
            cardinality: Cardinality::Many,
            reverse_name: None,
        }
    }

    /// Override the reverse accessor name
    #[must_use]
    pub fn with_reverse_name(mut self, name: impl Into<String>) -> Self {
        self.reverse_name = Some(name.into());
        self
    }
}

/// A declared forward relation
#[derive(Debug, Clone)]
pub struct RelationSpec {
    /// Forward accessor name
    pub name: String,
    /// Kind of the linked instances
    pub target: Kind,
    /// Single or many
    pub cardinality: Cardinality,
    /// Reverse accessor name on the target
    pub reverse_name: String,
}

/// A reverse accessor installed on a target kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseSpec {
    /// Reverse accessor name
    pub name: String,
    /// Name of the kind declaring the forward relation
    pub source: String,
}

/// Value(s) stored under a forward relation
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Single relation, possibly unset
    One(Option<Node>),
    /// Many relation, in link order
    Many(Vec<Node>),
}

impl Related {
    pub(crate) fn empty(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::Single => Self::One(None),
            Cardinality::Many => Self::Many(Vec::new()),
        }
    }

    /// Linked instances as a slice
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        match self {
            Self::One(Some(node)) => std::slice::from_ref(node),
            Self::One(None) => &[],
            Self::Many(nodes) => nodes,
        }
    }

    /// The instance of a single relation
    #[must_use]
    pub fn one(&self) -> Option<&Node> {
        match self {
            Self::One(node) => node.as_ref(),
            Self::Many(_) => None,
        }
    }

    /// First linked instance
    #[must_use]
    pub fn first(&self) -> Option<&Node> {
        self.nodes().first()
    }

    /// Most recently linked instance
    #[must_use]
    pub fn last(&self) -> Option<&Node> {
        self.nodes().last()
    }

    /// Number of linked instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    /// Whether nothing is linked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }

    /// Convert into a [`Value`]; `None` when nothing is linked to a single relation
    #[must_use]
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::One(node) => node.clone().map(Value::Node),
            Self::Many(nodes) => Some(Value::List(nodes.iter().map(Value::from).collect())),
        }
    }
}

fn named(name: &str) -> Attrs {
    let mut attrs = Attrs::new();
    attrs.insert(NAME_ATTRIBUTE.to_string(), Value::from(name));
    attrs
}

impl Node {
    /// Forward accessor dispatch
    ///
    /// # Errors
    ///
    /// Returns error if `relation` is not a forward relation of this node's
    /// kind, or if building a child fails
    pub fn relate(
        &self,
        relation: &str,
        symbol: Option<&str>,
        block: Option<Block<'_>>,
    ) -> DslResult<Related> {
        let spec = self.kind().relation(relation)?;
        self.relate_with(&spec, symbol, block)
    }

    /// Read the stored value(s) of a relation
    ///
    /// # Errors
    ///
    /// Returns error if `relation` is not a forward relation
    pub fn related(&self, relation: &str) -> DslResult<Related> {
        self.relate(relation, None, None)
    }

    /// Link the registered target instance called `symbol`, if there is one
    ///
    /// # Errors
    ///
    /// Returns error if `relation` is not a forward relation
    pub fn link(&self, relation: &str, symbol: &str) -> DslResult<Related> {
        self.relate(relation, Some(symbol), None)
    }

    /// Build a child named `<this name>_<TargetKind>` and link it
    ///
    /// # Errors
    ///
    /// Returns error if `relation` is not a forward relation or the block fails
    pub fn child<'a>(
        &self,
        relation: &str,
        f: impl FnOnce(&Node) -> DslResult<()> + 'a,
    ) -> DslResult<Related> {
        self.relate(relation, None, Some(Box::new(f)))
    }

    /// Build a child called `symbol` and link it
    ///
    /// # Errors
    ///
    /// Returns error if `relation` is not a forward relation or the block fails
    pub fn child_named<'a>(
        &self,
        relation: &str,
        symbol: &str,
        f: impl FnOnce(&Node) -> DslResult<()> + 'a,
    ) -> DslResult<Related> {
        self.relate(relation, Some(symbol), Some(Box::new(f)))
    }

    fn relate_with(
        &self,
        spec: &RelationSpec,
        symbol: Option<&str>,
        block: Option<Block<'_>>,
    ) -> DslResult<Related> {
        let found = match (symbol, block) {
            (None, None) => None,
            (Some(symbol), Some(block)) => Some(spec.target.construct(named(symbol), Some(block))?),
            (None, Some(block)) => {
                let name = self.auto_child_name(spec);
                Some(spec.target.construct(named(&name), Some(block))?)
            }
            (Some(symbol), None) => {
                let found = spec.target.lookup(symbol);
                if found.is_none() {
                    self.kind().logger().debug(format!(
                        "{}#{}: no {} named {}",
                        self.kind().name(),
                        spec.name,
                        spec.target.name(),
                        symbol
                    ));
                }
                found
            }
        };

        if let Some(child) = found {
            self.attach(spec, child);
        }
        Ok(self.stored(spec))
    }

    fn auto_child_name(&self, spec: &RelationSpec) -> String {
        let base = format!("{}_{}", self.name(), spec.target.name());
        match (spec.cardinality, self.kind().context().config.auto_naming) {
            (Cardinality::Many, AutoNaming::Indexed) => {
                first_free_name(&base, |name| spec.target.registry().contains(name))
            }
            _ => base,
        }
    }

    /// Store `child` under the relation and set its back-reference
    pub(crate) fn attach(&self, spec: &RelationSpec, child: Node) {
        self.kind().logger().debug(format!(
            "linked {} {} #{} -> {}",
            self.kind().name(),
            self.name(),
            spec.name,
            child.name()
        ));
        child.set_back_ref(&spec.reverse_name, self);
        self.store_link(spec, child);
    }

    /// Apply a value given for a relation in the initial attributes
    ///
    /// Nodes are linked directly, strings are looked up by name, and lists
    /// are applied element by element on many relations.
    pub(crate) fn assign_relation(&self, spec: &RelationSpec, value: Value) -> DslResult<()> {
        match value {
            Value::Node(node) => {
                if !node.kind().is_kind_of(&spec.target) {
                    return Err(self.relation_mismatch(spec));
                }
                self.attach(spec, node);
                Ok(())
            }
            Value::Str(symbol) => self.relate_with(spec, Some(&symbol), None).map(|_| ()),
            Value::List(items) if spec.cardinality == Cardinality::Many => items
                .into_iter()
                .try_for_each(|item| self.assign_relation(spec, item)),
            _ => Err(self.relation_mismatch(spec)),
        }
    }

    fn relation_mismatch(&self, spec: &RelationSpec) -> DslError {
        let expected = match spec.cardinality {
            Cardinality::Single => format!("{} instance or name", spec.target.name()),
            Cardinality::Many => format!("{} instance, name or list", spec.target.name()),
        };
        DslError::TypeMismatch {
            kind: self.kind().name().to_string(),
            accessor: spec.name.clone(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::schema::{Schema, SchemaConfig};

    struct Fixture {
        _schema: Schema,
        included: Kind,
        test: Kind,
        array: Kind,
    }

    fn fixture_with(config: SchemaConfig) -> Fixture {
        let schema = Schema::with_config(config);
        let included = schema.define_kind("IncludedClass").unwrap();
        included.declare_attribute("ocean").unwrap();

        let test = schema.define_kind("TestClass").unwrap();
        test.declare_attribute("chips").unwrap();
        test.declare_relation("meta", &included, RelationOptions::single())
            .unwrap();

        let array = schema.define_kind("ArrayClass").unwrap();
        array
            .declare_relation("attr", &included, RelationOptions::many())
            .unwrap();

        Fixture {
            _schema: schema,
            included,
            test,
            array,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(SchemaConfig::default())
    }

    fn ocean(node: &Node) -> Option<Value> {
        node.get("ocean").unwrap()
    }

    #[test]
    fn test_symbol_and_block_builds_named_child() {
        let fx = fixture();
        let tony = fx.test.create(attrs! { "name" => "Tony" }).unwrap();
        tony.child_named("meta", "yolo", |meta| {
            meta.set("ocean", "Indian")?;
            Ok(())
        })
        .unwrap();

        let related = tony.related("meta").unwrap();
        let meta = related.one().unwrap();
        assert_eq!(meta.name(), "yolo");
        assert_eq!(ocean(meta), Some(Value::from("Indian")));
        assert_eq!(fx.included.lookup("yolo").as_ref(), Some(meta));
    }

    #[test]
    fn test_symbol_without_block_looks_up() {
        let fx = fixture();
        fx.included
            .construct(
                attrs! { "name" => "test_name" },
                Some(Box::new(|n: &Node| n.set("ocean", "Pacific").map(|_| ()))),
            )
            .unwrap();

        let tony = fx.test.create(attrs! { "name" => "Tony" }).unwrap();
        let related = tony.link("meta", "test_name").unwrap();
        assert_eq!(ocean(related.one().unwrap()), Some(Value::from("Pacific")));
    }

    #[test]
    fn test_block_without_symbol_generates_name() {
        let fx = fixture();
        let tony = fx.test.create(attrs! { "name" => "Tony" }).unwrap();
        tony.child("meta", |meta| {
            meta.set("ocean", "Atlantic")?;
            Ok(())
        })
        .unwrap();

        let related = tony.related("meta").unwrap();
        let meta = related.one().unwrap();
        assert_eq!(meta.name(), "Tony_IncludedClass");
        assert_eq!(ocean(meta), Some(Value::from("Atlantic")));
    }

    #[test]
    fn test_no_symbol_no_block_reads() {
        let fx = fixture();
        let tony = fx.test.create(attrs! { "name" => "Tony" }).unwrap();
        assert_eq!(tony.related("meta").unwrap(), Related::One(None));

        let built = tony
            .child_named("meta", "test", |meta| {
                meta.set("ocean", "Arctic")?;
                Ok(())
            })
            .unwrap();
        assert_eq!(tony.related("meta").unwrap(), built);
        assert_eq!(tony.related("meta").unwrap(), tony.related("meta").unwrap());
    }

    #[test]
    fn test_lookup_miss_leaves_value() {
        let fx = fixture();
        let tony = fx.test.create(attrs! { "name" => "Tony" }).unwrap();
        assert_eq!(tony.link("meta", "nowhere").unwrap(), Related::One(None));

        tony.child_named("meta", "here", |_| Ok(())).unwrap();
        let before = tony.related("meta").unwrap();
        assert_eq!(tony.link("meta", "nowhere").unwrap(), before);
        assert_eq!(tony.related("meta").unwrap(), before);
    }

    #[test]
    fn test_single_relation_replaces() {
        let fx = fixture();
        let tony = fx.test.create(attrs! { "name" => "Tony" }).unwrap();
        let first = tony.child("meta", |m| m.set("ocean", "one").map(|_| ())).unwrap();
        let first = first.one().unwrap().clone();
        let second = tony.child("meta", |m| m.set("ocean", "two").map(|_| ())).unwrap();
        let second = second.one().unwrap().clone();

        assert_eq!(first.name(), "Tony_IncludedClass");
        assert_eq!(second.name(), "Tony_IncludedClass");
        assert!(!first.ptr_eq(&second));
        assert!(tony.related("meta").unwrap().one().unwrap().ptr_eq(&second));
        assert!(fx.included.lookup("Tony_IncludedClass").unwrap().ptr_eq(&second));
        // The replaced child is still a complete instance.
        assert_eq!(ocean(&first), Some(Value::from("one")));
    }

    #[test]
    fn test_many_relation_appends() {
        let fx = fixture();
        let list = fx.array.create(attrs! {}).unwrap();
        list.child_named("attr", "yolo", |n| n.set("ocean", "Indian").map(|_| ()))
            .unwrap();
        let related = list.related("attr").unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(ocean(related.first().unwrap()), Some(Value::from("Indian")));

        fx.included
            .construct(
                attrs! { "name" => "test_name" },
                Some(Box::new(|n: &Node| n.set("ocean", "Pacific").map(|_| ()))),
            )
            .unwrap();
        let related = list.link("attr", "test_name").unwrap();
        assert_eq!(related.len(), 2);
        assert_eq!(ocean(related.last().unwrap()), Some(Value::from("Pacific")));
    }

    #[test]
    fn test_many_relation_generated_names_shared() {
        let fx = fixture();
        let list = fx.array.create(attrs! {}).unwrap();
        assert_eq!(list.name(), "ArrayClass_0");

        list.child("attr", |n| n.set("ocean", "Atlantic").map(|_| ()))
            .unwrap();
        list.child("attr", |n| n.set("ocean", "Southern").map(|_| ()))
            .unwrap();

        let related = list.related("attr").unwrap();
        assert_eq!(related.len(), 2);
        assert_eq!(related.nodes()[0].name(), "ArrayClass_0_IncludedClass");
        assert_eq!(related.nodes()[1].name(), "ArrayClass_0_IncludedClass");
        assert_eq!(fx.included.registry().len(), 1);
        assert!(fx
            .included
            .lookup("ArrayClass_0_IncludedClass")
            .unwrap()
            .ptr_eq(&related.nodes()[1]));
    }

    #[test]
    fn test_many_relation_generated_names_indexed() {
        let fx = fixture_with(SchemaConfig::default().with_auto_naming(AutoNaming::Indexed));
        let list = fx.array.create(attrs! { "name" => "list" }).unwrap();
        for _ in 0..3 {
            list.child("attr", |_| Ok(())).unwrap();
        }

        let names: Vec<String> = list
            .related("attr")
            .unwrap()
            .nodes()
            .iter()
            .map(Node::name)
            .collect();
        assert_eq!(
            names,
            vec!["list_IncludedClass_0", "list_IncludedClass_1", "list_IncludedClass_2"]
        );
        assert_eq!(fx.included.registry().len(), 3);
    }

    #[test]
    fn test_reverse_accessor() {
        let fx = fixture();
        let tony = fx.test.create(attrs! { "name" => "Tony" }).unwrap();
        let related = tony.child("meta", |_| Ok(())).unwrap();
        let meta = related.one().unwrap();
        assert_eq!(meta.reverse("test_class").unwrap(), Some(tony.clone()));
        assert_eq!(meta.reverse("array_class").unwrap(), None);

        let list = fx.array.create(attrs! {}).unwrap();
        let related = list.link("attr", meta.name().as_str()).unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(meta.reverse("array_class").unwrap(), Some(list));
    }

    #[test]
    fn test_unknown_relation() {
        let fx = fixture();
        let tony = fx.test.create(attrs! {}).unwrap();
        assert!(matches!(
            tony.related("chips"),
            Err(DslError::UnknownAccessor { .. })
        ));
        assert!(tony.related("nothing").is_err());
    }

    #[test]
    fn test_failing_block_links_nothing() {
        let fx = fixture();
        let tony = fx.test.create(attrs! { "name" => "Tony" }).unwrap();
        let result = tony.child_named("meta", "broken", |meta| {
            meta.set("salinity", 35)?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(tony.related("meta").unwrap(), Related::One(None));
        assert!(fx.included.lookup("broken").is_none());
    }

    #[test]
    fn test_relation_from_initial_attrs() {
        let fx = fixture();
        let pacific = fx.included.create(attrs! { "name" => "Pacific" }).unwrap();
        let indian = fx.included.create(attrs! { "name" => "Indian" }).unwrap();

        let tony = fx
            .test
            .create(attrs! { "name" => "Tony", "meta" => pacific.clone() })
            .unwrap();
        assert_eq!(tony.related("meta").unwrap().one(), Some(&pacific));
        assert_eq!(pacific.reverse("test_class").unwrap(), Some(tony));

        let list = fx
            .array
            .create(attrs! { "attr" => vec!["Indian", "nowhere", "Pacific"] })
            .unwrap();
        let related = list.related("attr").unwrap();
        assert_eq!(related.nodes(), &[indian, pacific][..]);
    }

    #[test]
    fn test_relation_from_initial_attrs_type_checked() {
        let fx = fixture();
        let other = fx.test.create(attrs! { "name" => "other" }).unwrap();
        assert!(matches!(
            fx.test.create(attrs! { "meta" => other }),
            Err(DslError::TypeMismatch { .. })
        ));
        assert!(matches!(
            fx.test.create(attrs! { "meta" => 42 }),
            Err(DslError::TypeMismatch { .. })
        ));
        assert!(matches!(
            fx.test.create(attrs! { "meta" => vec!["a"] }),
            Err(DslError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_related_helpers() {
        let empty = Related::empty(Cardinality::Many);
        assert!(empty.is_empty());
        assert_eq!(empty.to_value(), Some(Value::List(Vec::new())));
        assert_eq!(Related::empty(Cardinality::Single).to_value(), None);
        assert_eq!(Related::One(None).first(), None);
    }

    proptest::proptest! {
        #[test]
        fn prop_many_relation_preserves_order(count in 0usize..12) {
            let fx = fixture_with(SchemaConfig {
                logging: false,
                ..SchemaConfig::default()
            });
            let list = fx.array.create(attrs! { "name" => "list" }).unwrap();
            for i in 0..count {
                let depth = i as i64;
                list.child("attr", move |n| n.set("ocean", depth).map(|_| ())).unwrap();
            }

            let related = list.related("attr").unwrap();
            proptest::prop_assert_eq!(related.len(), count);
            for (i, node) in related.nodes().iter().enumerate() {
                proptest::prop_assert_eq!(ocean(node), Some(Value::from(i as i64)));
            }
        }
    }
}
