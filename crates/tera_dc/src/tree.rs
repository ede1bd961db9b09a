//! Materialization of the element table into a nested [`Node`] tree.

use crate::document::{Node, Value};
use crate::error::Result;
use crate::read::DataCenter;
use crate::types::{AttributeRecord, AttributeValue, ElementRecord};

/// Resolves element records into [`Node`]s
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'a> {
    dc: &'a DataCenter,
}

impl<'a> Materializer<'a> {
    pub fn new(dc: &'a DataCenter) -> Self {
        Materializer { dc }
    }

    /// Build the subtree rooted at `element`
    ///
    /// Attributes are resolved first, then children are appended to a list keyed by their
    /// name in table order. On duplicate keys the last write wins.
    pub fn build(&self, element: &ElementRecord) -> Result<Node> {
        let mut node = Node::new();

        for attribute in self.dc.attributes(element)? {
            let key = self.dc.get_name(attribute.name_index)?;
            node.insert_value(key, self.value(attribute)?);
        }

        for child in self.dc.children(element)? {
            let key = self.dc.get_name(child.name_index)?;
            node.push_child(key, self.build(child)?);
        }

        Ok(node)
    }

    /// Resolve an attribute's value, looking strings up in the Strings pool
    pub fn value(&self, attribute: &AttributeRecord) -> Result<Value> {
        Ok(match attribute.value()? {
            AttributeValue::Integer(v) => Value::Integer(v),
            AttributeValue::Float(v) => Value::Float(v),
            AttributeValue::Boolean(v) => Value::Boolean(v),
            AttributeValue::String(address) => {
                Value::String(self.dc.get_string(address)?.to_owned())
            }
        })
    }
}
