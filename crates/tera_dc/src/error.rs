//! Error types that can be emitted from this library

use derive_more::Display;
use miette::Diagnostic;
use thiserror::Error;

/// The part of the pipeline an [`Error`] was raised from
#[derive(Display, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Decryption, signature check and inflate
    #[display("framing")]
    Framing,

    /// Parsing or building the paged tables
    #[display("table")]
    Table,

    /// Resolving names and strings while building the document
    #[display("materialization")]
    Materialization,

    /// Reading or writing files
    #[display("io")]
    Io,
}

/// Which pool an unresolved reference pointed into
#[derive(Display, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    #[display("name")]
    Name,

    #[display("string")]
    String,
}

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`serde_json::Error`]
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// key or iv is not 16 raw bytes
    #[error("invalid key material: {0}")]
    #[diagnostic(
        code(tera_dc::framing::invalid_key_material),
        help("keys and ivs are given as 32 hexadecimal characters")
    )]
    InvalidKeyMaterial(&'static str),

    /// the decrypted buffer does not carry the zlib signature
    #[error("decrypted container does not start a zlib stream")]
    #[diagnostic(
        code(tera_dc::framing::key_mismatch),
        help("the key or iv most likely does not belong to this container")
    )]
    KeyMismatch,

    /// the payload passed the signature check but could not be inflated
    #[error("unable to inflate the container payload")]
    #[diagnostic(code(tera_dc::framing::corrupt_container))]
    CorruptContainer(#[source] std::io::Error),

    /// the table region is truncated or holds out of range references
    #[error("malformed table: {0}")]
    #[diagnostic(code(tera_dc::table::malformed))]
    MalformedTable(String),

    /// a name or string lookup missed
    #[error("unresolved {kind} reference {reference}")]
    #[diagnostic(
        code(tera_dc::materialization::unresolved_reference),
        help("the container may be of an unsupported variant")
    )]
    UnresolvedReference {
        kind: ReferenceKind,
        reference: String,
    },

    /// unit names are used as file names and must stay inside the output directory
    #[error("unit name {0:?} can not be used as a file name")]
    #[diagnostic(code(tera_dc::io::invalid_unit_name))]
    InvalidUnitName(String),
}

impl Error {
    pub(crate) fn malformed(message: impl ToString) -> Self {
        Error::MalformedTable(message.to_string())
    }

    /// Returns the stage of the pipeline this error was raised from
    pub fn stage(&self) -> Stage {
        match self {
            Error::InvalidKeyMaterial(_) | Error::KeyMismatch | Error::CorruptContainer(_) => {
                Stage::Framing
            }
            Error::MalformedTable(_) => Stage::Table,
            Error::UnresolvedReference { .. } => Stage::Materialization,
            Error::IOError(_) | Error::JsonError(_) | Error::InvalidUnitName(_) => Stage::Io,
        }
    }
}

impl From<binrw::Error> for Error {
    fn from(value: binrw::Error) -> Self {
        Error::malformed(value)
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
