//! Node construction protocol.
//!
//! Construction runs in a fixed order:
//!
//! 1. apply the kind's fixed defaults the caller did not override,
//! 2. apply the caller's initial attributes,
//! 3. resolve computed defaults the caller did not override, so they can
//!    read everything set so far,
//! 4. run the builder block against the node,
//! 5. generate a name if none was set,
//! 6. seal the node, freezing its name,
//! 7. register it in the kind's registry.
//!
//! Every value goes through its attribute or relation setter.
//!
//! The node is only registered once every step succeeded, so a failing block
//! never leaves a half-built instance in a registry.

use crate::kind::{DefaultValue, Kind, NAME_ATTRIBUTE};
use crate::node::Node;
use crate::value::{Attrs, Value};
use trellis_core::DslResult;

/// Builder block run against a node under construction
pub type Block<'a> = Box<dyn FnOnce(&Node) -> DslResult<()> + 'a>;

/// Box a closure as a [`Block`]
pub fn block<'a>(f: impl FnOnce(&Node) -> DslResult<()> + 'a) -> Block<'a> {
    Box::new(f)
}

impl Kind {
    /// Construct and register a node
    ///
    /// # Errors
    ///
    /// Returns error if the schema was dropped, if an initial attribute or
    /// default names an unknown or read-only accessor or has the wrong type,
    /// or if the block fails. The node is not registered in that case.
    pub fn construct(&self, attrs: Attrs, block: Option<Block<'_>>) -> DslResult<Node> {
        self.ensure_attached()?;
        let node = Node::building(self.clone());

        let mut computed = Vec::new();
        for (name, default) in self.defaults() {
            if attrs.contains_key(&name) {
                continue;
            }
            match default {
                DefaultValue::Value(value) => node.assign(&name, value)?,
                DefaultValue::Computed(_) => computed.push((name, default)),
            }
        }
        for (name, value) in attrs {
            node.assign(&name, value)?;
        }
        for (name, default) in computed {
            let value = default.resolve(&node);
            node.assign(&name, value)?;
        }

        if let Some(block) = block {
            block(&node)?;
        }

        if !node.has_name() {
            let generated = self.generate_unique_name();
            node.set(NAME_ATTRIBUTE, Value::from(generated))?;
        }
        node.seal();

        let name = node.name();
        let logger = self.logger();
        if self.registry().put(name.clone(), node.clone()).is_some() {
            logger.debug(format!("replaced {} {}", self.name(), name));
        } else {
            logger.debug(format!("registered {} {}", self.name(), name));
        }
        Ok(node)
    }

    /// Construct a node from initial attributes alone
    ///
    /// # Errors
    ///
    /// See [`Kind::construct`]
    pub fn create(&self, attrs: Attrs) -> DslResult<Node> {
        self.construct(attrs, None)
    }

    /// Construct a node from a builder block alone
    ///
    /// # Errors
    ///
    /// See [`Kind::construct`]
    pub fn build<'a>(&self, f: impl FnOnce(&Node) -> DslResult<()> + 'a) -> DslResult<Node> {
        self.construct(Attrs::new(), Some(block(f)))
    }

    /// Construct a named node with a builder block
    ///
    /// # Errors
    ///
    /// See [`Kind::construct`]
    pub fn build_named<'a>(
        &self,
        name: &str,
        f: impl FnOnce(&Node) -> DslResult<()> + 'a,
    ) -> DslResult<Node> {
        let mut attrs = Attrs::new();
        attrs.insert(NAME_ATTRIBUTE.to_string(), Value::from(name));
        self.construct(attrs, Some(block(f)))
    }
}
