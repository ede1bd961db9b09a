//! Payload compression and decompression handling.

use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::instrument;

use crate::error::{Error, Result};

/// zlib header every container payload starts with, read as a little endian `u16`
pub const ZLIB_SIGNATURE: u16 = 0x9c78;

/// Inflate a zlib stream
#[instrument(skip_all, fields(size = data.len()), err)]
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(Error::CorruptContainer)?;
    Ok(output)
}

/// Deflate `data` into a zlib stream that carries [`ZLIB_SIGNATURE`]
///
/// The level bits of the zlib header vary with `level`, but readers of the container
/// expect the default ones. They are informational only, so they get pinned.
#[instrument(skip_all, fields(size = data.len()), err)]
pub fn deflate(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(data)?;
    let mut output = encoder.finish()?;

    output[..2].copy_from_slice(&ZLIB_SIGNATURE.to_le_bytes());
    Ok(output)
}
