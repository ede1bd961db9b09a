use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, io::Write, path::PathBuf};
use tera_dc::{export, Repacker};
use tracing::info;

use super::{parse_lang, ContainerArgs};

#[derive(Args)]
pub struct RepackArgs {
    #[command(flatten)]
    container: ContainerArgs,

    /// Locale of the container to rebuild
    #[arg(short, long, value_name = "LANG", value_parser = parse_lang)]
    lang: String,

    /// Directory holding the unpacked document [default: <DIR>/out/<LANG>]
    #[arg(short, long, value_name = "DIR")]
    input: Option<PathBuf>,

    /// Target container [default: the original container with `.repacked` appended]
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl RepackArgs {
    pub fn handle(&self) -> Result<()> {
        let original = self.container.container_path(&self.lang);
        let input = self
            .input
            .clone()
            .unwrap_or_else(|| self.container.unpacked_dir(&self.lang));
        let output = self.output.clone().unwrap_or_else(|| {
            let mut name = original.clone().into_os_string();
            name.push(".repacked");
            PathBuf::from(name)
        });

        info!("reading {}", original.display());
        let repacker = Repacker::open(&original, self.container.keys()?)
            .context(format!("path: {}", original.display()))?;

        info!("reading {}", input.display());
        let document = export::read_document(&input)
            .context(format!("reading document from {}", input.display()))?;

        let container = repacker.repack(&document)?;

        info!("writing {}", output.display());
        let mut out = if !self.overwrite {
            File::create_new(&output)
                .into_diagnostic()
                .context(format!("creating {}", output.display()))?
        } else {
            File::create(&output)
                .into_diagnostic()
                .context(format!("creating {}", output.display()))?
        };
        out.write_all(&container).into_diagnostic()?;

        Ok(())
    }
}
