//! Schemas: the set of kinds a build works with.
//!
//! A [`Schema`] owns every kind defined through it, together with the logger
//! and configuration those kinds share. Each kind keeps its own instance
//! registry. Dropping the last schema handle clears those registries and
//! detaches the kinds: declaring on or constructing from a detached kind
//! returns a configuration error.

use crate::kind::Kind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use trellis_core::{DslError, DslResult, Logger};

/// How children appended to a many relation are named when no name is given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoNaming {
    /// Every child is named `<parent>_<Kind>`; the target registry keeps the latest
    #[default]
    Shared,
    /// Children are named `<parent>_<Kind>_<n>` with the first free `n`
    Indexed,
}

/// Schema configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Naming of block-built children of many relations
    pub auto_naming: AutoNaming,
    /// Prefix of the schema logger
    pub log_prefix: String,
    /// Print the calling location in log lines
    pub print_caller: bool,
    /// Whether the schema logger writes anything
    pub logging: bool,
}

impl SchemaConfig {
    /// Read a configuration from JSON; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the input is not a valid configuration
    pub fn from_json(input: &str) -> DslResult<Self> {
        serde_json::from_str(input).map_err(|e| DslError::InvalidConfig {
            reason: e.to_string(),
        })
    }

    /// Set the auto-naming policy
    #[must_use]
    pub fn with_auto_naming(mut self, auto_naming: AutoNaming) -> Self {
        self.auto_naming = auto_naming;
        self
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            auto_naming: AutoNaming::Shared,
            log_prefix: "trellis".to_string(),
            print_caller: true,
            logging: true,
        }
    }
}

/// State shared by every kind of a schema
#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) config: SchemaConfig,
    pub(crate) logger: Logger,
    attached: Cell<bool>,
}

impl Context {
    fn new(config: SchemaConfig, logger: Logger) -> Self {
        Self {
            config,
            logger,
            attached: Cell::new(true),
        }
    }

    /// Whether the owning schema is still alive
    pub(crate) fn is_attached(&self) -> bool {
        self.attached.get()
    }
}

struct SchemaInner {
    context: Rc<Context>,
    kinds: RefCell<IndexMap<String, Kind>>,
}

impl Drop for SchemaInner {
    fn drop(&mut self) {
        self.context.attached.set(false);
        for kind in self.kinds.borrow().values() {
            kind.teardown();
        }
    }
}

/// A set of kinds sharing configuration and logging
#[derive(Clone)]
pub struct Schema {
    inner: Rc<SchemaInner>,
}

impl Schema {
    /// Create a schema with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SchemaConfig::default())
    }

    /// Create a schema logging through `tracing` with the given configuration
    #[must_use]
    pub fn with_config(config: SchemaConfig) -> Self {
        let logger = Logger::new(config.log_prefix.clone());
        Self::with_logger(config, logger)
    }

    /// Create a schema logging through the given logger
    #[must_use]
    pub fn with_logger(config: SchemaConfig, logger: Logger) -> Self {
        let logger = logger.with_print_caller(config.print_caller);
        if !config.logging {
            logger.disable();
        }
        Self {
            inner: Rc::new(SchemaInner {
                context: Rc::new(Context::new(config, logger)),
                kinds: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Schema configuration
    #[must_use]
    pub fn config(&self) -> &SchemaConfig {
        &self.inner.context.config
    }

    /// Schema logger
    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.inner.context.logger
    }

    /// Define a root kind. Every kind has a `name` attribute.
    ///
    /// # Errors
    ///
    /// Returns error if a kind with this name already exists
    pub fn define_kind(&self, name: &str) -> DslResult<Kind> {
        self.insert_kind(name, None)
    }

    /// Define a kind inheriting accessors and defaults from `parent`
    ///
    /// # Errors
    ///
    /// Returns error if the name is taken or the parent belongs to another schema
    pub fn define_subkind(&self, name: &str, parent: &Kind) -> DslResult<Kind> {
        if !self.owns(parent) {
            return Err(DslError::configuration(
                name,
                format!("parent kind {} belongs to another schema", parent.name()),
            ));
        }
        self.insert_kind(name, Some(parent.clone()))
    }

    fn insert_kind(&self, name: &str, parent: Option<Kind>) -> DslResult<Kind> {
        if name.is_empty() {
            return Err(DslError::configuration(name, "kind name must not be empty"));
        }
        if self.inner.kinds.borrow().contains_key(name) {
            return Err(DslError::configuration(name, "kind already defined"));
        }

        let kind = Kind::new(name, parent, Rc::clone(&self.inner.context));
        self.inner
            .kinds
            .borrow_mut()
            .insert(name.to_string(), kind.clone());

        let logger = self.logger();
        match kind.parent() {
            Some(parent) => logger.debug(format!("defined kind {} < {}", name, parent.name())),
            None => logger.debug(format!("defined kind {}", name)),
        }
        Ok(kind)
    }

    /// Get a kind by name
    #[must_use]
    pub fn kind(&self, name: &str) -> Option<Kind> {
        self.inner.kinds.borrow().get(name).cloned()
    }

    /// Names of all kinds in definition order
    #[must_use]
    pub fn kind_names(&self) -> Vec<String> {
        self.inner.kinds.borrow().keys().cloned().collect()
    }

    /// Whether `kind` was defined through this schema
    #[must_use]
    pub fn owns(&self, kind: &Kind) -> bool {
        kind.shares_context(&self.inner.context)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("config", self.config())
            .field("kinds", &self.kind_names())
            .finish()
    }
}
