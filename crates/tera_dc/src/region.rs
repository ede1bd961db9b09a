//! Paged record storage shared by every DataCenter table.

use std::io::{Read, Seek, Write};

use binrw::{BinRead, BinWrite};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::trace;

use crate::error::{Error, Result};
use crate::types::Address;

/// Largest number of records a page can hold while every offset still fits a `u16`
pub const MAX_PAGE_CAPACITY: usize = 0x10000;

/// One page of a [`Region`]
///
/// Pages are stored with a fixed capacity of which only the first `len` records are in use.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    capacity: usize,
    records: Vec<T>,
}

impl<T> Page<T> {
    /// Number of record slots reserved on disk for this page
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records in use
    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A table stored as a list of pages, addressed by [`Address`]
#[derive(Debug, Clone, PartialEq)]
pub struct Region<T> {
    pages: Vec<Page<T>>,
}

impl<T> Default for Region<T> {
    fn default() -> Self {
        Self { pages: Vec::new() }
    }
}

impl<T> Region<T> {
    pub fn pages(&self) -> &[Page<T>] {
        &self.pages
    }

    /// Total number of records in use across all pages
    pub fn len(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a single record
    pub fn get(&self, address: Address) -> Option<&T> {
        self.pages
            .get(address.page as usize)?
            .records
            .get(address.offset as usize)
    }

    /// Get `count` consecutive records starting at `start`
    ///
    /// Runs never cross a page boundary. An empty run is always valid, whatever its start.
    pub fn run(&self, start: Address, count: u16) -> Option<&[T]> {
        if count == 0 {
            return Some(&[]);
        }

        let begin = start.offset as usize;
        self.pages
            .get(start.page as usize)?
            .records
            .get(begin..begin + count as usize)
    }

    /// Whether `address` points at a record in use
    pub fn contains(&self, address: Address) -> bool {
        self.get(address).is_some()
    }
}

impl<T> Region<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    pub(crate) fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let page_count = reader.read_u32::<LittleEndian>()?;
        trace!(page_count, "reading region");

        let mut pages = Vec::new();
        for _ in 0..page_count {
            let capacity = reader.read_u32::<LittleEndian>()? as usize;
            let used = reader.read_u32::<LittleEndian>()? as usize;
            if used > capacity {
                return Err(Error::malformed(format!(
                    "page uses {used} records but only holds {capacity}"
                )));
            }

            // Unused slots still occupy space on disk
            let mut records = Vec::new();
            for _ in 0..capacity {
                records.push(T::read_le(reader)?);
            }
            records.truncate(used);

            pages.push(Page { capacity, records });
        }

        Ok(Region { pages })
    }
}

impl<T> Region<T>
where
    T: for<'a> BinWrite<Args<'a> = ()> + Default,
{
    pub(crate) fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.pages.len() as u32)?;
        for page in &self.pages {
            writer.write_u32::<LittleEndian>(page.capacity as u32)?;
            writer.write_u32::<LittleEndian>(page.records.len() as u32)?;
            for record in &page.records {
                record.write_le(writer)?;
            }

            let padding = T::default();
            for _ in page.records.len()..page.capacity {
                padding.write_le(writer)?;
            }
        }
        Ok(())
    }
}

/// Read a count prefixed list of records
pub(crate) fn read_list<T, R>(reader: &mut R) -> Result<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()>,
    R: Read + Seek,
{
    let count = reader.read_u32::<LittleEndian>()?;
    (0..count)
        .map(|_| T::read_le(reader).map_err(Error::from))
        .collect()
}

/// Write a count prefixed list of records
pub(crate) fn write_list<T, W>(records: &[T], writer: &mut W) -> Result<()>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
    W: Write + Seek,
{
    writer.write_u32::<LittleEndian>(records.len() as u32)?;
    for record in records {
        record.write_le(writer)?;
    }
    Ok(())
}

/// Lays records out into fixed capacity pages
///
/// Every reserved run is contiguous inside a single page, a run that does not fit the
/// remainder of the current page opens a new one.
#[derive(Debug)]
pub(crate) struct RegionBuilder<T> {
    capacity: usize,
    pages: Vec<Page<T>>,
}

impl<T: Default + Clone> RegionBuilder<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_PAGE_CAPACITY {
            return Err(Error::malformed(format!(
                "page capacity must be between 1 and {MAX_PAGE_CAPACITY}, got {capacity}"
            )));
        }

        Ok(RegionBuilder {
            capacity,
            pages: Vec::new(),
        })
    }

    /// Reserve `count` default initialized records and return the address of the first one
    pub fn reserve(&mut self, count: usize) -> Result<Address> {
        if count > self.capacity {
            return Err(Error::malformed(format!(
                "a run of {count} records does not fit a page of {}",
                self.capacity
            )));
        }

        let fits = self
            .pages
            .last()
            .is_some_and(|page| page.records.len() + count <= self.capacity);
        if !fits {
            if self.pages.len() > u16::MAX as usize {
                return Err(Error::malformed("region ran out of pages"));
            }
            self.pages.push(Page {
                capacity: self.capacity,
                records: Vec::new(),
            });
        }

        let page_index = self.pages.len() - 1;
        let page = &mut self.pages[page_index];
        let offset = page.records.len();
        page.records.resize(offset + count, T::default());

        Ok(Address::new(page_index as u16, offset as u16))
    }

    /// Overwrite a previously reserved record
    pub fn set(&mut self, address: Address, record: T) -> Result<()> {
        let slot = self
            .pages
            .get_mut(address.page as usize)
            .and_then(|page| page.records.get_mut(address.offset as usize))
            .ok_or_else(|| Error::malformed(format!("{address} was never reserved")))?;
        *slot = record;
        Ok(())
    }

    /// Append `records` as one contiguous run
    pub fn push_run(&mut self, records: Vec<T>) -> Result<Address> {
        let start = self.reserve(records.len())?;
        let page = &mut self.pages[start.page as usize];
        let begin = start.offset as usize;
        page.records[begin..begin + records.len()].clone_from_slice(&records);
        Ok(start)
    }

    /// Finish the layout, the resulting region always holds at least one page
    pub fn finish(mut self) -> Region<T> {
        if self.pages.is_empty() {
            self.pages.push(Page {
                capacity: self.capacity,
                records: Vec::new(),
            });
        }
        Region { pages: self.pages }
    }
}
