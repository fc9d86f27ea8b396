use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{fs::File, io::BufReader, path::PathBuf};
use tmod_archive::TmodArchive;
use tracing::{error, info};

#[derive(Args)]
pub struct VerifyArgs {
    /// An input TMOD file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl VerifyArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let mut tmod = TmodArchive::new(BufReader::new(f))?;

        let hash_matches = tmod.verify_hash()?;

        let mut failed = 0;
        for i in 0..tmod.len() {
            if let Err(e) = tmod.read_entry(i) {
                error!("{}: {e}", tmod.name_for_index(i).unwrap_or_default());
                failed += 1;
            }
        }

        if hash_matches {
            println!("hash {}", "ok".green());
        } else {
            println!("hash {}", "mismatch".yellow());
        }

        if failed > 0 {
            return Err(miette!("{failed} of {} entries are damaged", tmod.len()));
        }

        info!("{} entries ok", tmod.len());
        Ok(())
    }
}
