use std::path::{Path, PathBuf};

use clap::Args;
use miette::Result;
use tera_dc::KeyMaterial;
use walkdir::WalkDir;

pub mod repack;
pub mod unpack;

#[derive(clap::Subcommand)]
pub enum DcCommands {
    /// Decode containers into directories of JSON files
    Unpack(unpack::UnpackArgs),
    /// Encode a directory of JSON files back into a container
    Repack(repack::RepackArgs),
}

impl DcCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            DcCommands::Unpack(unpack) => unpack.handle(),
            DcCommands::Repack(repack) => repack.handle(),
        }
    }
}

/// Where containers live and how they are encrypted
#[derive(Args)]
pub struct ContainerArgs {
    /// Directory holding the DataCenter_Final_<LANG>.dat containers
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Container key as 32 hexadecimal characters
    #[arg(long, env = "TERA_DC_KEY", value_name = "HEX", hide_env_values = true)]
    key: String,

    /// Container iv as 32 hexadecimal characters
    #[arg(long, env = "TERA_DC_IV", value_name = "HEX", hide_env_values = true)]
    iv: String,
}

impl ContainerArgs {
    pub fn keys(&self) -> Result<KeyMaterial> {
        Ok(KeyMaterial::from_hex(&self.key, &self.iv)?)
    }

    pub fn container_path(&self, lang: &str) -> PathBuf {
        self.directory.join(format!("DataCenter_Final_{lang}.dat"))
    }

    /// Default location of an unpacked container
    pub fn unpacked_dir(&self, lang: &str) -> PathBuf {
        self.directory.join("out").join(lang)
    }
}

/// Locales end up in file names, so only plain identifiers are accepted
pub fn parse_lang(lang: &str) -> std::result::Result<String, String> {
    if !lang.is_empty() && lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(lang.to_owned())
    } else {
        Err(format!("{lang:?} is not a locale identifier such as EUR or USA"))
    }
}

pub fn is_non_empty_dir(path: &Path) -> bool {
    WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .next()
        .is_some()
}
