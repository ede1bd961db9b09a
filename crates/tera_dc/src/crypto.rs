//! Container encryption framing.
//!
//! A container is `AES-128-CFB(header || zlib(tables))` where `header` is four opaque bytes.
//! There is no checksum: the zlib signature right after the header is the only way to tell a
//! wrong key from a corrupt file.

use aes::Aes128;
use byteorder::{ByteOrder, LittleEndian};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use derive_more::Display;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::compression::{self, ZLIB_SIGNATURE};
use crate::error::{Error, Result};

type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;
type Aes128CfbEnc = cfb_mode::Encryptor<Aes128>;

/// Size of the key and of the iv, in bytes
pub const KEY_LEN: usize = 16;

/// Size of the opaque header preceding the zlib stream
pub const FRAMING_HEADER_LEN: usize = 4;

/// Fixed-size array for secrets, with zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct KeyBytes([u8; KEY_LEN]);

impl KeyBytes {
    fn from_hex(encoded: &str, what: &'static str) -> Result<Self> {
        let mut decoded =
            hex::decode(encoded.trim()).map_err(|_| Error::InvalidKeyMaterial(what))?;

        let result = <[u8; KEY_LEN]>::try_from(decoded.as_slice())
            .map(KeyBytes)
            .map_err(|_| Error::InvalidKeyMaterial(what));
        decoded.zeroize();
        result
    }
}

/// The key and iv a container is encrypted with
#[derive(Clone)]
pub struct KeyMaterial {
    key: KeyBytes,
    iv: KeyBytes,
}

// Safe Debug impl that doesn't expose key material
impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

impl KeyMaterial {
    pub fn new(key: [u8; KEY_LEN], iv: [u8; KEY_LEN]) -> Self {
        KeyMaterial {
            key: KeyBytes(key),
            iv: KeyBytes(iv),
        }
    }

    /// Parse a key and an iv given as 32 hexadecimal characters each
    pub fn from_hex(key: &str, iv: &str) -> Result<Self> {
        Ok(KeyMaterial {
            key: KeyBytes::from_hex(key, "key must be 16 bytes of hex")?,
            iv: KeyBytes::from_hex(iv, "iv must be 16 bytes of hex")?,
        })
    }

    fn decrypt(&self, buffer: &mut [u8]) {
        Aes128CfbDec::new(&self.key.0.into(), &self.iv.0.into()).decrypt(buffer);
    }

    fn encrypt(&self, buffer: &mut [u8]) {
        Aes128CfbEnc::new(&self.key.0.into(), &self.iv.0.into()).encrypt(buffer);
    }
}

/// The four bytes preceding the zlib stream, kept so a repacked container carries them too
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FramingHeader(pub [u8; FRAMING_HEADER_LEN]);

/// Buffers reported to an [`Inspector`]
#[derive(Display, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Buffer {
    #[display("original")]
    Original,

    #[display("decrypted")]
    Decrypted,

    #[display("decompressed")]
    Decompressed,
}

/// Observes the buffers produced while opening a container
///
/// Inspectors only look, they can neither fail nor change the outcome of a decode.
pub trait Inspector {
    fn inspect(&mut self, buffer: Buffer, data: &[u8]);
}

impl<F: FnMut(Buffer, &[u8])> Inspector for F {
    fn inspect(&mut self, buffer: Buffer, data: &[u8]) {
        self(buffer, data)
    }
}

/// Ignores every buffer
#[derive(Debug, Default, Copy, Clone)]
pub struct NoInspector;

impl Inspector for NoInspector {
    fn inspect(&mut self, _buffer: Buffer, _data: &[u8]) {}
}

/// Logs the size and SHA-256 digest of every buffer at debug level
#[derive(Debug, Default, Copy, Clone)]
pub struct TracingInspector;

impl Inspector for TracingInspector {
    fn inspect(&mut self, buffer: Buffer, data: &[u8]) {
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                size = data.len(),
                sha256 = %hex::encode(Sha256::digest(data)),
                "{buffer} buffer"
            );
        }
    }
}

/// A decrypted and inflated container
#[derive(Debug, Clone)]
pub struct Opened {
    pub header: FramingHeader,
    pub tables: Vec<u8>,
}

/// Decrypt a container, check its signature and inflate the table stream
#[instrument(skip_all, fields(size = container.len()), err)]
pub fn open(container: &[u8], keys: &KeyMaterial, inspector: &mut dyn Inspector) -> Result<Opened> {
    inspector.inspect(Buffer::Original, container);

    let mut decrypted = container.to_vec();
    keys.decrypt(&mut decrypted);
    inspector.inspect(Buffer::Decrypted, &decrypted);

    if decrypted.len() < FRAMING_HEADER_LEN + 2
        || LittleEndian::read_u16(&decrypted[FRAMING_HEADER_LEN..]) != ZLIB_SIGNATURE
    {
        return Err(Error::KeyMismatch);
    }

    let mut header = FramingHeader::default();
    header.0.copy_from_slice(&decrypted[..FRAMING_HEADER_LEN]);

    let tables = compression::inflate(&decrypted[FRAMING_HEADER_LEN..])?;
    inspector.inspect(Buffer::Decompressed, &tables);

    Ok(Opened { header, tables })
}

/// Deflate a table stream, prefix `header` and encrypt the result
#[instrument(skip_all, fields(size = tables.len()), err)]
pub fn seal(
    header: FramingHeader,
    tables: &[u8],
    keys: &KeyMaterial,
    level: Compression,
) -> Result<Vec<u8>> {
    let compressed = compression::deflate(tables, level)?;

    let mut container = Vec::with_capacity(FRAMING_HEADER_LEN + compressed.len());
    container.extend_from_slice(&header.0);
    container.extend_from_slice(&compressed);
    keys.encrypt(&mut container);

    debug!(size = container.len(), "sealed container");
    Ok(container)
}
