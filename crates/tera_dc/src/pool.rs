//! De-duplicated UTF-16 string storage for names and attribute values.

use std::collections::HashMap;
use std::io::{Read, Seek, Write};

use widestring::{U16Str, U16String};

use crate::error::{Error, Result};
use crate::region::{read_list, write_list, Region, RegionBuilder};
use crate::types::{Address, StringEntry};

/// Number of hash buckets in the Strings pool
pub const STRING_BUCKETS: usize = 1024;

/// Number of hash buckets in the Names pool
pub const NAME_BUCKETS: usize = 512;

const HASHER: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_BZIP2);

/// A paged pool of NUL terminated UTF-16 strings
///
/// Strings are looked up by the [`Address`] of their first code unit. The address table
/// gives every string a stable index, which the Names pool uses as `name_index - 1`.
#[derive(Debug, Clone)]
pub struct StringPool {
    chars: Region<u16>,
    buckets: Vec<Vec<StringEntry>>,
    addresses: Vec<Address>,
    strings: HashMap<Address, String>,
}

impl StringPool {
    pub(crate) fn read<R: Read + Seek>(reader: &mut R, bucket_count: usize) -> Result<Self> {
        let chars = Region::<u16>::read(reader)?;
        let buckets = (0..bucket_count)
            .map(|_| read_list::<StringEntry, _>(reader))
            .collect::<Result<Vec<_>>>()?;
        let addresses = read_list::<Address, _>(reader)?;

        let mut strings = HashMap::with_capacity(addresses.len());
        let referenced = addresses
            .iter()
            .copied()
            .chain(buckets.iter().flatten().map(|entry| entry.address));
        for address in referenced {
            if !strings.contains_key(&address) {
                strings.insert(address, Self::decode_at(&chars, address)?);
            }
        }

        Ok(StringPool {
            chars,
            buckets,
            addresses,
            strings,
        })
    }

    pub(crate) fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        self.chars.write(writer)?;
        for bucket in &self.buckets {
            write_list(bucket, writer)?;
        }
        write_list(&self.addresses, writer)
    }

    fn decode_at(chars: &Region<u16>, address: Address) -> Result<String> {
        let page = chars
            .pages()
            .get(address.page as usize)
            .filter(|page| (address.offset as usize) < page.len())
            .ok_or_else(|| Error::malformed(format!("string {address} is outside the pool")))?;

        let units = &page.records()[address.offset as usize..];
        let end = units
            .iter()
            .position(|&unit| unit == 0)
            .ok_or_else(|| Error::malformed(format!("string {address} is not terminated")))?;

        U16Str::from_slice(&units[..end])
            .to_string()
            .map_err(|e| Error::malformed(format!("string {address}: {e}")))
    }

    /// Look up the string starting at `address`
    pub fn get(&self, address: Address) -> Option<&str> {
        self.strings.get(&address).map(String::as_str)
    }

    /// Whether `address` points inside the pool's character pages
    pub fn contains(&self, address: Address) -> bool {
        self.chars.contains(address)
    }

    /// Address of the string with the given zero based index
    pub fn address(&self, index: usize) -> Option<Address> {
        self.addresses.get(index).copied()
    }

    /// The address table, in index order
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn buckets(&self) -> &[Vec<StringEntry>] {
        &self.buckets
    }

    /// Number of strings in the address table
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Iterate over every resolvable string and its address
    pub fn iter(&self) -> impl Iterator<Item = (Address, &str)> {
        self.strings
            .iter()
            .map(|(address, value)| (*address, value.as_str()))
    }
}

/// Interns strings into a new [`StringPool`]
#[derive(Debug)]
pub(crate) struct StringPoolBuilder {
    chars: RegionBuilder<u16>,
    entries: Vec<StringEntry>,
    addresses: Vec<Address>,
    index: HashMap<String, (u32, Address)>,
}

impl StringPoolBuilder {
    pub fn new(page_capacity: usize) -> Result<Self> {
        Ok(StringPoolBuilder {
            chars: RegionBuilder::new(page_capacity)?,
            entries: Vec::new(),
            addresses: Vec::new(),
            index: HashMap::new(),
        })
    }

    /// Add `value` unless it is already pooled, returning its id and address
    ///
    /// Ids start at 1.
    pub fn insert(&mut self, value: &str) -> Result<(u32, Address)> {
        if let Some(&interned) = self.index.get(value) {
            return Ok(interned);
        }

        let mut units = U16String::from_str(value).into_vec();
        if units.contains(&0) {
            return Err(Error::malformed(format!(
                "string {value:?} contains a NUL character"
            )));
        }

        let bytes = units
            .iter()
            .flat_map(|unit| unit.to_le_bytes())
            .collect::<Vec<_>>();
        units.push(0);

        let length = units.len() as u32;
        let address = self.chars.push_run(units)?;
        self.addresses.push(address);
        let id = self.addresses.len() as u32;

        self.entries.push(StringEntry {
            hash: HASHER.checksum(&bytes),
            length,
            id,
            address,
        });
        self.index.insert(value.to_owned(), (id, address));

        Ok((id, address))
    }

    pub fn finish(self, bucket_count: usize) -> StringPool {
        let mut buckets = vec![Vec::new(); bucket_count];
        for entry in self.entries {
            buckets[entry.hash as usize % bucket_count].push(entry);
        }

        let strings = self
            .index
            .into_iter()
            .map(|(value, (_, address))| (address, value))
            .collect();

        StringPool {
            chars: self.chars.finish(),
            buckets,
            addresses: self.addresses,
            strings,
        }
    }
}
