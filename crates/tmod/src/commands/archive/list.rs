use clap::Args;
use itertools::Itertools;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{fs::File, io::BufReader, path::PathBuf};
use tmod_archive::{CompressionMethod, TmodArchive};

#[derive(Args)]
pub struct ListArgs {
    /// An input TMOD file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Sort entries by path instead of table order
    #[arg(long, default_value_t = false)]
    sorted: bool,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let tmod = TmodArchive::new(BufReader::new(f))?;

        println!(
            "{} {} (tModLoader {})",
            tmod.name().bold(),
            tmod.version(),
            tmod.mod_loader_version().dimmed()
        );

        let entries = if self.sorted {
            tmod.entries().sorted_by(|a, b| a.path.cmp(&b.path)).collect_vec()
        } else {
            tmod.entries().collect_vec()
        };

        for entry in entries {
            let stored = match entry.compression_method() {
                CompressionMethod::Deflate => entry.stored_size.green().to_string(),
                CompressionMethod::None => entry.stored_size.dimmed().to_string(),
            };
            println!("{:>10} {:>10}  {}", entry.uncompressed_size, stored, entry.path);
        }

        let total = tmod.decompressed_size().unwrap_or_default();
        println!("{} entries, {} bytes", tmod.len(), total);

        Ok(())
    }
}
