//! Rebuilding a container from an edited document.

use std::path::Path;

use tracing::{info, instrument};

use crate::crypto::{self, FramingHeader, KeyMaterial, TracingInspector};
use crate::document::{Document, Value};
use crate::error::Result;
use crate::read::DataCenter;
use crate::tree::Materializer;
use crate::write::{Envelope, TableWriter, WriterOptions};

/// Name given to the root element when no original container is available
pub const DEFAULT_ROOT_NAME: &str = "__root__";

/// What a repacked container inherits from the original one
///
/// A [`Document`] only holds the root's children, so the root element itself and the opaque
/// parts of the container come from here.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerTemplate {
    pub framing: FramingHeader,
    pub envelope: Envelope,
    pub root_name: String,
    pub root_attributes: Vec<(String, Value)>,
}

impl Default for ContainerTemplate {
    fn default() -> Self {
        ContainerTemplate {
            framing: FramingHeader::default(),
            envelope: Envelope::default(),
            root_name: DEFAULT_ROOT_NAME.to_owned(),
            root_attributes: Vec::new(),
        }
    }
}

impl ContainerTemplate {
    /// Capture the template of a decoded container
    pub fn of(framing: FramingHeader, dc: &DataCenter) -> Result<Self> {
        let root = dc.root()?;
        let materializer = Materializer::new(dc);

        let root_attributes = dc
            .attributes(root)?
            .iter()
            .map(|attribute| {
                Ok((
                    dc.get_name(attribute.name_index)?.to_owned(),
                    materializer.value(attribute)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ContainerTemplate {
            framing,
            envelope: Envelope::of(dc),
            root_name: dc.get_name(root.name_index)?.to_owned(),
            root_attributes,
        })
    }
}

/// Encodes a [`Document`] back into container bytes
///
/// ```no_run
/// # fn doit() -> tera_dc::error::Result<()>
/// # {
/// use tera_dc::{export, KeyMaterial, Repacker};
///
/// let keys = KeyMaterial::from_hex(
///     "00112233445566778899aabbccddeeff",
///     "ffeeddccbbaa99887766554433221100",
/// )?;
/// let repacker = Repacker::open("DataCenter_Final_EUR.dat", keys)?;
///
/// let document = export::read_document("out/EUR")?;
/// std::fs::write("DataCenter_Final_EUR.dat.repacked", repacker.repack(&document)?)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Repacker {
    keys: KeyMaterial,
    template: ContainerTemplate,
    writer: TableWriter,
}

impl Repacker {
    /// A repacker that does not inherit anything from an original container
    pub fn new(keys: KeyMaterial, template: ContainerTemplate) -> Self {
        Repacker {
            keys,
            template,
            writer: TableWriter::default(),
        }
    }

    /// Read and decode the original container at `path`
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>, keys: KeyMaterial) -> Result<Self> {
        let container = std::fs::read(path.as_ref())?;
        Self::from_container(&container, keys)
    }

    /// Decode the original container
    pub fn from_container(container: &[u8], keys: KeyMaterial) -> Result<Self> {
        let opened = crypto::open(container, &keys, &mut TracingInspector)?;
        let dc = DataCenter::parse(&opened.tables)?;
        let template = ContainerTemplate::of(opened.header, &dc)?;
        Ok(Self::new(keys, template))
    }

    pub fn with_options(mut self, options: WriterOptions) -> Self {
        self.writer = TableWriter::new(options);
        self
    }

    pub fn template(&self) -> &ContainerTemplate {
        &self.template
    }

    /// Lay out the tables for `document`
    pub fn tables(&self, document: &Document) -> Result<DataCenter> {
        self.writer.write_root(
            &self.template.envelope,
            &self.template.root_name,
            self.template
                .root_attributes
                .iter()
                .map(|(key, value)| (key.as_str(), value)),
            document
                .iter()
                .flat_map(|(name, unit)| unit.nodes().iter().map(move |node| (name, node))),
        )
    }

    /// Produce container bytes for `document`
    #[instrument(skip_all, fields(units = document.len()), err)]
    pub fn repack(&self, document: &Document) -> Result<Vec<u8>> {
        let tables = self.tables(document)?.to_bytes()?;
        let container = crypto::seal(
            self.template.framing,
            &tables,
            &self.keys,
            self.writer.options().compression,
        )?;

        info!(size = container.len(), "repacked container");
        Ok(container)
    }
}
