//! Values held by attribute slots.
//!
//! Plain values are owned data, so cloning a [`Value`] copies them. Nodes and
//! deferred thunks are handles: cloning shares the referenced node or closure.
//! The construction protocol relies on this to copy defaults per instance
//! while keeping node defaults as references.

use crate::node::Node;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;
use trellis_core::{DslError, DslResult};

/// Initial attributes passed to a construction
pub type Attrs = IndexMap<String, Value>;

/// A deferred value stored by a block-form setter
///
/// The slot holds the closure itself; callers run it with [`Thunk::call`].
#[derive(Clone)]
pub struct Thunk(Rc<dyn Fn() -> Value>);

impl Thunk {
    /// Wrap a closure
    pub fn new(f: impl Fn() -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Evaluate the closure
    #[must_use]
    pub fn call(&self) -> Value {
        (self.0)()
    }

    /// Whether two thunks wrap the same closure
    #[must_use]
    pub fn ptr_eq(&self, other: &Thunk) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Thunk(..)")
    }
}

/// Attribute value
#[derive(Debug, Clone)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String or symbol
    Str(String),
    /// Ordered list
    List(Vec<Value>),
    /// Ordered map
    Map(IndexMap<String, Value>),
    /// Reference to a node instance
    Node(Node),
    /// Deferred closure
    Thunk(Thunk),
}

impl Value {
    /// Short name of the variant, used in error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Node(_) => "node",
            Self::Thunk(_) => "thunk",
        }
    }

    /// String content, if this is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float content
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Boolean content
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// List content
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Map content
    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Referenced node
    #[must_use]
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Deferred closure
    #[must_use]
    pub fn as_thunk(&self) -> Option<&Thunk> {
        match self {
            Self::Thunk(thunk) => Some(thunk),
            _ => None,
        }
    }

    /// Whether this value refers to a node instance
    #[must_use]
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    /// Convert a JSON value; `null` (and `null` entries inside arrays and
    /// objects) become absent
    ///
    /// # Errors
    ///
    /// Returns error for integers that do not fit in an `i64`
    pub fn from_json(json: serde_json::Value) -> DslResult<Option<Value>> {
        let value = match json {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None if n.is_u64() => {
                    return Err(DslError::InvalidAttributes {
                        reason: format!("integer {} does not fit in i64", n),
                    });
                }
                None => match n.as_f64() {
                    Some(f) => Self::Float(f),
                    None => return Ok(None),
                },
            },
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(value) = Self::from_json(item)? {
                        list.push(value);
                    }
                }
                Self::List(list)
            }
            serde_json::Value::Object(map) => Self::Map(json_entries(map)?),
        };
        Ok(Some(value))
    }
}

fn json_entries(
    map: serde_json::Map<String, serde_json::Value>,
) -> DslResult<IndexMap<String, Value>> {
    let mut entries = IndexMap::with_capacity(map.len());
    for (key, json) in map {
        if let Some(value) = Value::from_json(json)? {
            entries.insert(key, value);
        }
    }
    Ok(entries)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => a == b,
            (Self::Thunk(a), Self::Thunk(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            Self::Node(node) => write!(f, "{}({})", node.kind().name(), node.name()),
            Self::Thunk(_) => f.write_str("<deferred>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        Self::Node(node.clone())
    }
}

impl From<Thunk> for Value {
    fn from(thunk: Thunk) -> Self {
        Self::Thunk(thunk)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Read initial attributes from a JSON object
///
/// # Errors
///
/// Returns error if the input is not valid JSON or not an object
pub fn attrs_from_json(input: &str) -> DslResult<Attrs> {
    let json: serde_json::Value =
        serde_json::from_str(input).map_err(|e| DslError::InvalidAttributes {
            reason: e.to_string(),
        })?;
    match json {
        serde_json::Value::Object(map) => json_entries(map),
        other => Err(DslError::InvalidAttributes {
            reason: format!("expected an object, got {}", json_type(&other)),
        }),
    }
}

fn json_type(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Build an [`Attrs`] map from `key => value` pairs
///
/// ```
/// use trellis_dsl::attrs;
///
/// let attrs = attrs! { "name" => "Baltic", "depth" => 459 };
/// assert_eq!(attrs.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::Attrs::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut attrs = $crate::Attrs::new();
        $(attrs.insert(::std::string::String::from($key), $crate::Value::from($value));)+
        attrs
    }};
}
