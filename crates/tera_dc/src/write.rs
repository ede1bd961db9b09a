//! Types for writing DataCenter tables
//!

use std::collections::VecDeque;

use bon::Builder;
use flate2::Compression;
use tracing::{debug, instrument};

use crate::document::{Node, Value};
use crate::error::{Error, Result};
use crate::pool::{StringPoolBuilder, NAME_BUCKETS, STRING_BUCKETS};
use crate::read::{DataCenter, PLACEHOLDER, ROOT};
use crate::region::{RegionBuilder, MAX_PAGE_CAPACITY};
use crate::types::{Address, AttributeRecord, AttributeValue, DataCenterHeader, ElementRecord};

/// Options for how the tables and the container should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct WriterOptions {
    /// Records per Elements page
    #[builder(default = MAX_PAGE_CAPACITY)]
    pub element_page_capacity: usize,

    /// Records per Attributes page
    #[builder(default = MAX_PAGE_CAPACITY)]
    pub attribute_page_capacity: usize,

    /// UTF-16 code units per Names and Strings page
    #[builder(default = MAX_PAGE_CAPACITY)]
    pub char_page_capacity: usize,

    /// zlib level used when sealing the container
    #[builder(default)]
    pub compression: Compression,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions::builder().build()
    }
}

/// Parts of a table stream that are carried over verbatim
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub header: DataCenterHeader,
    pub extension: Vec<[u8; 8]>,
    pub footer: u32,
}

impl Envelope {
    /// Take the opaque parts of an existing DataCenter
    pub fn of(dc: &DataCenter) -> Self {
        Envelope {
            header: *dc.header(),
            extension: dc.extension().to_vec(),
            footer: dc.footer(),
        }
    }
}

/// Lays a [`Node`] tree out into DataCenter tables
///
/// Elements are placed breadth-first: the root takes [`ROOT`] and every node's children are
/// reserved as one run before any of them is visited, so each run is contiguous in a
/// single page. Names are interned in order of first appearance, string values are
/// deduplicated.
///
/// ```
/// # fn doit() -> tera_dc::error::Result<()>
/// # {
/// use tera_dc::document::{Node, Value};
/// use tera_dc::write::{Envelope, TableWriter, WriterOptions};
///
/// let mut skill = Node::new();
/// skill.insert_value("id", Value::Integer(1));
///
/// let mut root = Node::new();
/// root.push_child("Skill", skill);
///
/// let dc = TableWriter::new(WriterOptions::default()).write(&Envelope::default(), "__root__", &root)?;
/// assert_eq!(dc.children(dc.root()?)?.len(), 1);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TableWriter {
    options: WriterOptions,
}

impl TableWriter {
    pub fn new(options: WriterOptions) -> Self {
        TableWriter { options }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Build the tables for `root`, stored under the element name `root_name`
    pub fn write(&self, envelope: &Envelope, root_name: &str, root: &Node) -> Result<DataCenter> {
        self.write_root(envelope, root_name, root.values(), root.all_children())
    }

    /// Build the tables for a root given as loose attributes and children
    #[instrument(skip_all, fields(root = root_name), err)]
    pub fn write_root<'a>(
        &self,
        envelope: &Envelope,
        root_name: &'a str,
        attributes: impl IntoIterator<Item = (&'a str, &'a Value)>,
        children: impl IntoIterator<Item = (&'a str, &'a Node)>,
    ) -> Result<DataCenter> {
        let mut layout = Layout::new(&self.options)?;
        let mut queue = VecDeque::new();

        let slot = layout.elements.reserve(1)?;
        debug_assert_eq!(slot, ROOT);
        layout.place(
            slot,
            root_name,
            attributes,
            children.into_iter().collect(),
            &mut queue,
        )?;

        while let Some((slot, name, node)) = queue.pop_front() {
            layout.place(
                slot,
                name,
                node.values(),
                node.all_children().collect(),
                &mut queue,
            )?;
        }

        layout.finish(envelope)
    }
}

type Queue<'a> = VecDeque<(Address, &'a str, &'a Node)>;

fn run_length(len: usize, owner: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        Error::malformed(format!(
            "{owner} holds {len} entries, a run is limited to {}",
            u16::MAX
        ))
    })
}

struct Layout {
    elements: RegionBuilder<ElementRecord>,
    attributes: RegionBuilder<AttributeRecord>,
    names: StringPoolBuilder,
    strings: StringPoolBuilder,
}

impl Layout {
    fn new(options: &WriterOptions) -> Result<Self> {
        Ok(Layout {
            elements: RegionBuilder::new(options.element_page_capacity)?,
            attributes: RegionBuilder::new(options.attribute_page_capacity)?,
            names: StringPoolBuilder::new(options.char_page_capacity)?,
            strings: StringPoolBuilder::new(options.char_page_capacity)?,
        })
    }

    /// Fill the element reserved at `slot` and reserve its child run
    fn place<'a>(
        &mut self,
        slot: Address,
        name: &'a str,
        attributes: impl IntoIterator<Item = (&'a str, &'a Value)>,
        children: Vec<(&'a str, &'a Node)>,
        queue: &mut Queue<'a>,
    ) -> Result<()> {
        let name_index = self.name(name)?;

        let attributes = attributes
            .into_iter()
            .map(|(key, value)| self.attribute(key, value))
            .collect::<Result<Vec<_>>>()?;
        let attribute_count = run_length(attributes.len(), name)?;
        let attributes = if attributes.is_empty() {
            Address::default()
        } else {
            self.attributes.push_run(attributes)?
        };

        let children_count = run_length(children.len(), name)?;
        let first_child = if children.is_empty() {
            Address::default()
        } else {
            self.elements.reserve(children.len())?
        };
        for (i, (key, child)) in children.into_iter().enumerate() {
            let address = Address::new(first_child.page, first_child.offset + i as u16);
            queue.push_back((address, key, child));
        }

        self.elements.set(
            slot,
            ElementRecord {
                name_index,
                extension: 0,
                attribute_count,
                children_count,
                attributes,
                children: first_child,
            },
        )
    }

    fn name(&mut self, name: &str) -> Result<u16> {
        if name == PLACEHOLDER {
            return Ok(0);
        }

        let (id, _) = self.names.insert(name)?;
        u16::try_from(id).map_err(|_| {
            Error::malformed(format!("more than {} distinct names", u16::MAX))
        })
    }

    fn attribute(&mut self, key: &str, value: &Value) -> Result<AttributeRecord> {
        let name_index = self.name(key)?;
        let value = match value {
            Value::Integer(v) => AttributeValue::Integer(*v),
            Value::Float(v) => AttributeValue::Float(*v),
            Value::Boolean(v) => AttributeValue::Boolean(*v),
            Value::String(v) => AttributeValue::String(self.strings.insert(v)?.1),
        };
        Ok(AttributeRecord::new(name_index, value))
    }

    fn finish(self, envelope: &Envelope) -> Result<DataCenter> {
        let dc = DataCenter::from_parts(
            envelope.header,
            envelope.extension.clone(),
            self.attributes.finish(),
            self.elements.finish(),
            self.strings.finish(STRING_BUCKETS),
            self.names.finish(NAME_BUCKETS),
            envelope.footer,
        )?;

        debug!(
            elements = dc.elements().len(),
            attributes = dc.attribute_region().len(),
            names = dc.names().len(),
            strings = dc.strings().len(),
            "laid out tables"
        );
        Ok(dc)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::document::{Node, Value};
    use crate::error::{Error, Result};
    use crate::read::{DataCenter, PLACEHOLDER};
    use crate::tree::Materializer;
    use crate::types::{Address, AttributeValue};
    use crate::write::{Envelope, TableWriter, WriterOptions};

    fn item(id: i32) -> Node {
        let mut node = Node::new();
        node.insert_value("id", Value::Integer(id));
        node.insert_value("name", Value::String("sword".into()));
        node
    }

    fn sample() -> Node {
        let mut inventory = Node::new();
        inventory.insert_value("weight", Value::Float(2.5));
        inventory.insert_value("locked", Value::Boolean(false));
        for id in 0..3 {
            inventory.push_child("Item", item(id));
        }
        inventory.push_child(PLACEHOLDER, Node::new());

        let mut root = Node::new();
        root.insert_value("version", Value::Integer(6));
        root.push_child("Inventory", inventory);
        root.push_child("Item", item(9));
        root
    }

    fn write(options: WriterOptions, root: &Node) -> Result<DataCenter> {
        TableWriter::new(options).write(&Envelope::default(), "__root__", root)
    }

    #[traced_test]
    #[test]
    fn materializes_back() -> Result<()> {
        let root = sample();
        let dc = write(WriterOptions::default(), &root)?;

        assert_eq!(dc.get_name(dc.root()?.name_index)?, "__root__");
        assert_eq!(Materializer::new(&dc).build(dc.root()?)?, root);

        Ok(())
    }

    #[test]
    fn breadth_first_layout() -> Result<()> {
        let dc = write(WriterOptions::default(), &sample())?;

        let root = dc.root()?;
        assert_eq!(root.children, Address::new(0, 1));
        assert_eq!(root.children_count, 2);

        let inventory = &dc.children(root)?[0];
        assert_eq!(inventory.children, Address::new(0, 3));
        assert_eq!(inventory.children_count, 4);
        assert_eq!(dc.children(inventory)?[3].name_index, 0);

        Ok(())
    }

    #[test]
    fn small_pages() -> Result<()> {
        let root = sample();
        let options = WriterOptions::builder()
            .element_page_capacity(4)
            .attribute_page_capacity(2)
            .char_page_capacity(16)
            .build();
        let dc = write(options, &root)?;

        assert!(dc.elements().pages().len() > 1);
        assert!(dc.attribute_region().pages().len() > 1);
        assert_eq!(Materializer::new(&dc).build(dc.root()?)?, root);

        let reparsed = DataCenter::parse(&dc.to_bytes()?)?;
        assert_eq!(Materializer::new(&reparsed).build(reparsed.root()?)?, root);

        Ok(())
    }

    #[test]
    fn strings_are_deduplicated() -> Result<()> {
        let dc = write(WriterOptions::default(), &sample())?;
        assert_eq!(dc.strings().len(), 1);

        let inventory = &dc.children(dc.root()?)?[0];
        for child in dc.children(inventory)?.iter().filter(|c| c.attribute_count > 0) {
            assert_eq!(
                dc.attributes(child)?[1].value()?,
                AttributeValue::String(Address::new(0, 0))
            );
        }

        Ok(())
    }

    #[test]
    fn run_larger_than_page() {
        let options = WriterOptions::builder().element_page_capacity(2).build();
        assert!(matches!(
            write(options, &sample()),
            Err(Error::MalformedTable(_))
        ));
    }

    #[test]
    fn string_larger_than_page() {
        let mut root = Node::new();
        root.insert_value("text", Value::String("x".repeat(64)));

        let options = WriterOptions::builder().char_page_capacity(32).build();
        assert!(matches!(write(options, &root), Err(Error::MalformedTable(_))));
    }

    #[test]
    fn nul_in_string() {
        let mut root = Node::new();
        root.insert_value("text", Value::String("a\0b".into()));
        assert!(matches!(
            write(WriterOptions::default(), &root),
            Err(Error::MalformedTable(_))
        ));
    }
}
