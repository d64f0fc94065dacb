//! TRELLIS DSL Engine
//!
//! Declarative builder for named node graphs. Kinds declare attributes,
//! relations to other kinds and default values; nodes are built with nested
//! builder blocks and registered by name in their kind's registry.
//!
//! ```
//! use trellis_dsl::{RelationOptions, Schema, Value};
//!
//! let schema = Schema::new();
//! let ocean = schema.define_kind("Ocean")?;
//! ocean.declare_attribute("depth")?;
//! let sea = schema.define_kind("Sea")?;
//! sea.declare_relation("ocean", &ocean, RelationOptions::single())?;
//!
//! let baltic = sea.build_named("Baltic", |s| {
//!     s.child("ocean", |o| {
//!         o.set("depth", 459)?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! })?;
//!
//! let related = baltic.related("ocean")?;
//! let child = related.one().expect("linked");
//! assert_eq!(child.name(), "Baltic_Ocean");
//! assert_eq!(child.get("depth")?, Some(Value::from(459)));
//! assert_eq!(child.reverse("sea")?, Some(baltic));
//! # Ok::<(), trellis_dsl::DslError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod construct;
pub mod kind;
pub mod node;
pub mod registry;
pub mod relation;
pub mod schema;
pub mod value;

pub use construct::{block, Block};
pub use kind::{DefaultValue, Kind, NAME_ATTRIBUTE};
pub use node::Node;
pub use registry::Registry;
pub use relation::{Cardinality, Related, RelationOptions, RelationSpec, ReverseSpec};
pub use schema::{AutoNaming, Schema, SchemaConfig};
pub use value::{attrs_from_json, Attrs, Thunk, Value};

pub use trellis_core::{DslError, DslResult, Level, Logger};
