//! Base types for structure of the DataCenter tables.

use binrw::{BinRead, BinWrite};
use derive_more::{Constructor, Display};

use crate::error::{Error, Result};

/// Reference into a paged table
///
/// Every cross-table reference in the format is a page index and an offset into that page.
#[derive(
    BinRead,
    BinWrite,
    Constructor,
    Display,
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[brw(little)]
#[display("{page},{offset}")]
pub struct Address {
    /// Index of the page inside the region
    pub page: u16,

    /// Index of the record inside the page
    pub offset: u16,
}

/// DataCenter table header
///
/// Carried over unchanged when a container is repacked.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct DataCenterHeader {
    /// Format version, `6` for all known containers
    pub version: u32,

    /// Fields of unknown purpose, always zero in known containers
    pub reserved: [u32; 4],

    /// Version of the client the container was built for
    pub client_version: u32,
}

pub(crate) const TYPE_INTEGER: u16 = 1;
pub(crate) const TYPE_FLOAT: u16 = 2;
pub(crate) const TYPE_STRING: u16 = 3;
pub(crate) const EXTENDED_BOOLEAN: u16 = 1;

/// A decoded attribute value
///
/// Strings are not stored inline, they reference the Strings pool.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AttributeValue {
    Integer(i32),
    Float(f32),
    Boolean(bool),
    String(Address),
}

/// Attribute record
///
/// The low two bits of `type_info` select the value type, the remaining bits extend it.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct AttributeRecord {
    /// `0` for the placeholder name, otherwise one past the index into the name address table
    pub name_index: u16,

    /// Value type code and extension bits
    pub type_info: u16,

    /// Raw value, interpreted according to `type_info`
    pub value: u32,
}

impl AttributeRecord {
    pub fn new(name_index: u16, value: AttributeValue) -> Self {
        let (type_info, value) = match value {
            AttributeValue::Integer(v) => (TYPE_INTEGER, v as u32),
            AttributeValue::Float(v) => (TYPE_FLOAT, v.to_bits()),
            AttributeValue::Boolean(v) => (TYPE_INTEGER | EXTENDED_BOOLEAN << 2, v as u32),
            AttributeValue::String(address) => (
                TYPE_STRING,
                address.page as u32 | (address.offset as u32) << 16,
            ),
        };

        AttributeRecord {
            name_index,
            type_info,
            value,
        }
    }

    /// Decode the value according to the type code
    pub fn value(&self) -> Result<AttributeValue> {
        match self.type_info & 3 {
            TYPE_INTEGER if self.type_info >> 2 == EXTENDED_BOOLEAN => {
                Ok(AttributeValue::Boolean(self.value != 0))
            }
            TYPE_INTEGER => Ok(AttributeValue::Integer(self.value as i32)),
            TYPE_FLOAT => Ok(AttributeValue::Float(f32::from_bits(self.value))),
            TYPE_STRING => Ok(AttributeValue::String(Address::new(
                self.value as u16,
                (self.value >> 16) as u16,
            ))),
            code => Err(Error::malformed(format!(
                "unknown attribute type code {code}"
            ))),
        }
    }
}

/// Element record
///
/// Children and attributes are contiguous runs starting at `children` and `attributes`.
/// The start references are meaningless when the matching count is zero.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct ElementRecord {
    /// `0` for the placeholder name, otherwise one past the index into the name address table
    pub name_index: u16,

    /// Unknown, carried through
    pub extension: u16,

    /// Number of attributes in the run
    pub attribute_count: u16,

    /// Number of children in the run
    pub children_count: u16,

    /// First attribute of the run
    pub attributes: Address,

    /// First child of the run
    pub children: Address,
}

/// String pool bucket entry
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct StringEntry {
    /// A [`crc::CRC_32_BZIP2`] checksum of the UTF-16LE string
    pub hash: u32,

    /// Length in code units, including the terminator
    pub length: u32,

    /// One past the index into the pool's address table
    pub id: u32,

    /// Location of the first code unit
    pub address: Address,
}
