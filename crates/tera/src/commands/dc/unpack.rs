use clap::Args;
use itertools::Itertools;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::path::PathBuf;
use tera_dc::{export, partition, DataCenter, KeyMaterial};
use tracing::info;

use super::{is_non_empty_dir, parse_lang, ContainerArgs};

#[derive(Args)]
pub struct UnpackArgs {
    #[command(flatten)]
    container: ContainerArgs,

    /// Locale of a container to unpack, may be given several times
    #[arg(short, long = "lang", value_name = "LANG", required = true, value_parser = parse_lang)]
    langs: Vec<String>,

    /// Directory receiving one subdirectory per locale [default: <DIR>/out]
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Allow writing into a non-empty directory
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl UnpackArgs {
    pub fn handle(&self) -> Result<()> {
        let keys = self.container.keys()?;
        let keys = &keys;

        std::thread::scope(|scope| {
            let handles = self
                .langs
                .iter()
                .unique()
                .map(|lang| (lang, scope.spawn(move || self.unpack(lang, keys))))
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|(lang, handle)| {
                    handle
                        .join()
                        .map_err(|_| miette!("unpacking {lang} panicked"))?
                        .context(format!("unpacking {lang}"))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(())
    }

    fn output_dir(&self, lang: &str) -> PathBuf {
        match &self.output {
            Some(output) => output.join(lang),
            None => self.container.unpacked_dir(lang),
        }
    }

    fn unpack(&self, lang: &str, keys: &KeyMaterial) -> Result<()> {
        let path = self.container.container_path(lang);
        let output = self.output_dir(lang);

        if !self.overwrite && is_non_empty_dir(&output) {
            return Err(miette!(
                help = "pass --overwrite to replace its contents",
                "{} is not empty",
                output.display()
            ));
        }

        info!("reading {}", path.display());
        let data = std::fs::read(&path)
            .into_diagnostic()
            .context(format!("path: {}", path.display()))?;

        let dc = DataCenter::open(&data, keys)?;
        let document = partition(&dc)?;

        info!("writing {} units to {}", document.len(), output.display());
        export::write_document(&output, &document, self.overwrite)?;

        Ok(())
    }
}
