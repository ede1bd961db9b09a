//! This library handles decoding and re-encoding **DataCenter** containers used by *TERA*.
//!
//! # DataCenter Container Format Documentation
//!
//! A DataCenter (`DataCenter_Final_<LANG>.dat`) stores the game's data tables as one large
//! hierarchical document. The document is flattened into four paged tables whose records
//! reference each other by `(page, offset)` pairs, compressed with zlib and encrypted.
//!
//! ## Container Framing
//!
//! | Layer      | Description                                                           |
//! |------------|-----------------------------------------------------------------------|
//! | Encryption | AES-128 in CFB mode (128 bit segments), no padding, 16 byte key and iv |
//! | Header     | 4 opaque bytes, carried over when repacking                           |
//! | Payload    | zlib stream, its first two bytes are always `78 9C`                   |
//!
//! There is no checksum: a decrypted buffer whose bytes 4 and 5 are not `78 9C` means the
//! key or iv does not belong to the container.
//!
//! ## Table Stream
//!
//! The inflated payload holds the following, all integers little-endian:
//!
//! | Field      | Type                        | Description                                 |
//! |------------|-----------------------------|---------------------------------------------|
//! | Header     | 6 × `u32`                   | version, 4 reserved values, client version  |
//! | Extension  | count `u32`, `[u8; 8]`s     | opaque, carried over when repacking         |
//! | Attributes | Region of attribute records | 8 bytes each                                |
//! | Elements   | Region of element records   | 16 bytes each                               |
//! | Strings    | String pool, 1024 buckets   | attribute string values                     |
//! | Names      | String pool, 512 buckets    | element and attribute names                 |
//! | Footer     | `u32`                       | always zero                                 |
//!
//! ### Regions
//!
//! A region is a page count followed by the pages. Each page starts with its capacity and the
//! number of used records, then holds `capacity` records of which only the first `used` are
//! live. An [`Address`](types::Address) is a `u16` page index followed by a `u16` offset.
//!
//! ### Records
//!
//! | Record    | Fields                                                                      |
//! |-----------|-----------------------------------------------------------------------------|
//! | Element   | name index, extension, attribute count, child count, first attribute, first child |
//! | Attribute | name index, type info (`u16`), value (`u32`)                                |
//!
//! The low two bits of an attribute's type info select the type:
//!
//! - `1`: 32 bit integer, or a boolean when the remaining bits are `1`
//! - `2`: 32 bit float
//! - `3`: string, the value holds the address in the Strings pool (page in the low half)
//!
//! Children and attributes of an element are contiguous runs inside a single page. A name
//! index of `0` stands for the placeholder name `__placeholder__`, any other value is one past
//! an index into the Names pool's address table.
//!
//! ### String Pools
//!
//! | Field     | Description                                                            |
//! |-----------|------------------------------------------------------------------------|
//! | Chars     | Region of UTF-16 code units, every string NUL terminated                |
//! | Buckets   | hash buckets of (CRC-32/BZIP2 hash, length, id, address) entries        |
//! | Addresses | count `u32`, addresses, indexed by `id - 1`                             |
//!
//! ## Document
//!
//! The first element of the Elements table is the root. Its children are the top-level units
//! of the document, see [`partition`]. Each element materializes into a [`Node`] mapping
//! attribute names to values and child names to lists of children.

pub mod compression;
pub mod crypto;
pub mod document;
pub mod error;
pub mod export;
pub mod partition;
pub mod pool;
pub mod read;
pub mod region;
pub mod repack;
pub mod tree;
pub mod types;
pub mod write;

pub use crypto::KeyMaterial;
pub use document::{Document, Field, Node, Unit, Value};
pub use partition::partition;
pub use read::DataCenter;
pub use repack::Repacker;
pub use write::{TableWriter, WriterOptions};
