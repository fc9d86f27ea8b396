use clap::Args;
use miette::{Context, Result};
use std::path::PathBuf;
use tmod_archive::Archive;
use tmod_convert::{pipeline::write_tree, Pipeline};
use tracing::info;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input TMOD file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Write entries as they are stored, without converting them
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Number of worker threads
    #[arg(long, value_name = "COUNT")]
    threads: Option<usize>,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let tmod = Archive::open(&self.file)?;
        info!(
            "extracting {} {} into {}",
            tmod.name(),
            tmod.version(),
            self.directory.display()
        );

        let pipeline = if self.raw {
            Pipeline::new()
        } else {
            Pipeline::standard(tmod.mod_loader_version())
        };
        let files = pipeline
            .with_threads(self.threads)
            .extract(tmod)
            .context(format!("extracting {}", self.file.display()))?;

        write_tree(&self.directory, &files, self.overwrite)
            .context(format!("writing {}", self.directory.display()))?;

        info!("wrote {} files", files.len());
        Ok(())
    }
}
