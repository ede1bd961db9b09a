//! Types for reading DataCenter tables
//!

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use binrw::{BinRead, BinWrite};
use std::collections::HashSet;
use std::io::{Cursor, Seek};
use tracing::{debug, instrument};

use crate::{
    crypto::{self, Inspector, KeyMaterial, TracingInspector},
    error::{Error, ReferenceKind, Result},
    pool::{StringPool, NAME_BUCKETS, STRING_BUCKETS},
    region::{read_list, write_list, Region},
    types::{Address, AttributeRecord, AttributeValue, DataCenterHeader, ElementRecord},
};

/// The root-of-roots element, first record of the first Elements page
///
/// Its children are the top-level units of the document.
pub const ROOT: Address = Address { page: 0, offset: 0 };

/// Key used for elements and attributes whose `name_index` is zero
pub const PLACEHOLDER: &str = "__placeholder__";

/// In-memory view over the four DataCenter tables
///
/// Every reference held by a record is checked when the tables are parsed, so runs and
/// records reachable from [`ROOT`] can be resolved without further bounds errors.
///
/// ```no_run
/// fn count_units(container: &[u8]) -> tera_dc::error::Result<usize> {
///     let keys = tera_dc::KeyMaterial::from_hex(
///         "00112233445566778899aabbccddeeff",
///         "ffeeddccbbaa99887766554433221100",
///     )?;
///     let dc = tera_dc::DataCenter::open(container, &keys)?;
///
///     Ok(dc.children(dc.root()?)?.len())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DataCenter {
    header: DataCenterHeader,
    extension: Vec<[u8; 8]>,
    attributes: Region<AttributeRecord>,
    elements: Region<ElementRecord>,
    strings: StringPool,
    names: StringPool,
    footer: u32,
}

impl DataCenter {
    /// Decrypt, inflate and parse a container, reporting buffers to [`TracingInspector`]
    pub fn open(container: &[u8], keys: &KeyMaterial) -> Result<DataCenter> {
        Self::open_with(container, keys, &mut TracingInspector)
    }

    /// Decrypt, inflate and parse a container, reporting buffers to `inspector`
    pub fn open_with(
        container: &[u8],
        keys: &KeyMaterial,
        inspector: &mut dyn Inspector,
    ) -> Result<DataCenter> {
        let opened = crypto::open(container, keys, inspector)?;
        Self::parse(&opened.tables)
    }

    /// Parse the decompressed table stream
    #[instrument(skip_all, fields(size = data.len()), err)]
    pub fn parse(data: &[u8]) -> Result<DataCenter> {
        let mut reader = Cursor::new(data);
        let dc = Self::read_tables(&mut reader).map_err(|e| match e {
            Error::IOError(e) => Error::malformed(e),
            e => e,
        })?;

        if reader.position() != data.len() as u64 {
            return Err(Error::malformed(format!(
                "{} trailing bytes after the footer",
                data.len() as u64 - reader.position()
            )));
        }

        dc.validate()?;
        debug!(
            elements = dc.elements.len(),
            attributes = dc.attributes.len(),
            names = dc.names.len(),
            strings = dc.strings.len(),
            "parsed tables"
        );

        Ok(dc)
    }

    /// Assemble a DataCenter from freshly built tables
    pub(crate) fn from_parts(
        header: DataCenterHeader,
        extension: Vec<[u8; 8]>,
        attributes: Region<AttributeRecord>,
        elements: Region<ElementRecord>,
        strings: StringPool,
        names: StringPool,
        footer: u32,
    ) -> Result<DataCenter> {
        let dc = DataCenter {
            header,
            extension,
            attributes,
            elements,
            strings,
            names,
            footer,
        };
        dc.validate()?;
        Ok(dc)
    }

    fn read_tables(reader: &mut Cursor<&[u8]>) -> Result<DataCenter> {
        let header = DataCenterHeader::read(reader)?;
        let extension = read_list::<[u8; 8], _>(reader)?;
        let attributes = Region::read(reader)?;
        let elements = Region::read(reader)?;
        let strings = StringPool::read(reader, STRING_BUCKETS)?;
        let names = StringPool::read(reader, NAME_BUCKETS)?;
        let footer = reader.read_u32::<LittleEndian>()?;

        Ok(DataCenter {
            header,
            extension,
            attributes,
            elements,
            strings,
            names,
            footer,
        })
    }

    /// Serialize the tables back into a decompressed table stream
    #[instrument(skip_all, err)]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Cursor::new(Vec::new());
        self.header.write(&mut writer)?;
        write_list(&self.extension, &mut writer)?;
        self.attributes.write(&mut writer)?;
        self.elements.write(&mut writer)?;
        self.strings.write(&mut writer)?;
        self.names.write(&mut writer)?;
        writer.write_u32::<LittleEndian>(self.footer)?;

        debug!(size = writer.stream_position()?, "serialized tables");
        Ok(writer.into_inner())
    }

    fn validate(&self) -> Result<()> {
        if self.elements.get(ROOT).is_none() {
            return Err(Error::malformed("the elements table holds no root element"));
        }

        for page in self.elements.pages() {
            for element in page.records() {
                self.check_name_index(element.name_index)?;
                if self
                    .attributes
                    .run(element.attributes, element.attribute_count)
                    .is_none()
                {
                    return Err(Error::malformed(format!(
                        "attribute run {} +{} leaves its page",
                        element.attributes, element.attribute_count
                    )));
                }
                if self
                    .elements
                    .run(element.children, element.children_count)
                    .is_none()
                {
                    return Err(Error::malformed(format!(
                        "child run {} +{} leaves its page",
                        element.children, element.children_count
                    )));
                }
            }
        }

        for page in self.attributes.pages() {
            for attribute in page.records() {
                self.check_name_index(attribute.name_index)?;
                if let AttributeValue::String(address) = attribute.value()? {
                    if !self.strings.contains(address) {
                        return Err(Error::malformed(format!(
                            "string value {address} is outside the strings pool"
                        )));
                    }
                }
            }
        }

        self.check_tree()
    }

    /// Every element reachable from [`ROOT`] must be reached exactly once
    fn check_tree(&self) -> Result<()> {
        let mut visited = HashSet::from([ROOT]);
        let mut pending = vec![ROOT];

        while let Some(address) = pending.pop() {
            let Some(element) = self.elements.get(address) else {
                continue;
            };
            for i in 0..element.children_count {
                let offset = element.children.offset.checked_add(i).ok_or_else(|| {
                    Error::malformed(format!(
                        "child run {} runs past offset {}",
                        element.children,
                        u16::MAX
                    ))
                })?;
                let child = Address::new(element.children.page, offset);
                if !visited.insert(child) {
                    return Err(Error::malformed(format!(
                        "element {child} is reached more than once from the root"
                    )));
                }
                pending.push(child);
            }
        }

        Ok(())
    }

    fn check_name_index(&self, name_index: u16) -> Result<()> {
        if name_index as usize > self.names.len() {
            return Err(Error::malformed(format!(
                "name index {name_index} is past the {} known names",
                self.names.len()
            )));
        }
        Ok(())
    }

    /// The root-of-roots element
    pub fn root(&self) -> Result<&ElementRecord> {
        self.element(ROOT)
            .ok_or_else(|| Error::malformed("the elements table holds no root element"))
    }

    /// Get an element record
    pub fn element(&self, address: Address) -> Option<&ElementRecord> {
        self.elements.get(address)
    }

    /// Get an attribute record
    pub fn attribute(&self, address: Address) -> Option<&AttributeRecord> {
        self.attributes.get(address)
    }

    /// The contiguous run of children of `element`
    pub fn children(&self, element: &ElementRecord) -> Result<&[ElementRecord]> {
        self.elements
            .run(element.children, element.children_count)
            .ok_or_else(|| {
                Error::malformed(format!(
                    "child run {} +{} leaves its page",
                    element.children, element.children_count
                ))
            })
    }

    /// The contiguous run of attributes of `element`
    pub fn attributes(&self, element: &ElementRecord) -> Result<&[AttributeRecord]> {
        self.attributes
            .run(element.attributes, element.attribute_count)
            .ok_or_else(|| {
                Error::malformed(format!(
                    "attribute run {} +{} leaves its page",
                    element.attributes, element.attribute_count
                ))
            })
    }

    /// Resolve a `name_index` through the name address table
    pub fn get_name(&self, name_index: u16) -> Result<&str> {
        if name_index == 0 {
            return Ok(PLACEHOLDER);
        }

        self.name_address(name_index)
            .and_then(|address| self.names.get(address))
            .ok_or_else(|| Error::UnresolvedReference {
                kind: ReferenceKind::Name,
                reference: name_index.to_string(),
            })
    }

    /// Address of a name in the Names pool, `None` for the placeholder
    pub fn name_address(&self, name_index: u16) -> Option<Address> {
        name_index
            .checked_sub(1)
            .and_then(|index| self.names.address(index as usize))
    }

    /// Resolve a string value
    pub fn get_string(&self, address: Address) -> Result<&str> {
        self.strings
            .get(address)
            .ok_or_else(|| Error::UnresolvedReference {
                kind: ReferenceKind::String,
                reference: address.to_string(),
            })
    }

    pub fn header(&self) -> &DataCenterHeader {
        &self.header
    }

    /// Opaque region following the header
    pub fn extension(&self) -> &[[u8; 8]] {
        &self.extension
    }

    pub fn footer(&self) -> u32 {
        self.footer
    }

    pub fn elements(&self) -> &Region<ElementRecord> {
        &self.elements
    }

    pub fn attribute_region(&self) -> &Region<AttributeRecord> {
        &self.attributes
    }

    pub fn names(&self) -> &StringPool {
        &self.names
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }
}
