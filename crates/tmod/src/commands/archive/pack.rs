use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
};
use tmod_archive::CompressionPolicy;
use tmod_convert::{info::BuildProperties, EditableFile, Pipeline};
use tracing::info;
use walkdir::WalkDir;

/// Loader version written when none is given
const DEFAULT_TML_VERSION: &str = "2022.9.47.0";

#[derive(Args)]
#[command(disable_version_flag = true)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target TMOD file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Mod name, defaults to the name of the input directory
    #[arg(long)]
    name: Option<String>,

    /// Mod version, defaults to the version in build.txt
    #[arg(long)]
    version: Option<String>,

    /// tModLoader version the archive is built for
    #[arg(long, value_name = "VERSION", default_value = DEFAULT_TML_VERSION)]
    tml_version: String,

    /// Store every entry uncompressed
    #[arg(long, default_value_t = false)]
    no_compress: bool,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Number of worker threads
    #[arg(long, value_name = "COUNT")]
    threads: Option<usize>,
}

impl PackArgs {
    fn read_files(&self) -> Result<Vec<EditableFile>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.directory).sort_by_file_name() {
            let entry = entry.into_diagnostic()?;
            if entry.file_type().is_dir() {
                continue;
            }

            let name = entry
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;
            let path = name
                .to_str()
                .ok_or(miette!("unable to convert {} to a string", name.display()))?;

            let data = fs::read(entry.path())
                .into_diagnostic()
                .context(format!("reading {}", entry.path().display()))?;
            files.push(EditableFile::new(path.replace('\\', "/"), data));
        }

        Ok(files)
    }

    fn mod_name(&self) -> Result<String> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }

        self.directory
            .canonicalize()
            .into_diagnostic()?
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or(miette!("unable to name the mod, pass --name"))
    }

    fn mod_version(&self, files: &[EditableFile]) -> Result<String> {
        if let Some(version) = &self.version {
            return Ok(version.clone());
        }

        match files.iter().find(|f| f.path == "build.txt") {
            Some(build) => {
                let text = String::from_utf8_lossy(&build.data);
                Ok(BuildProperties::parse(&text)?.version)
            }
            None => Ok(BuildProperties::default().version),
        }
    }

    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.file.display());

        let files = self.read_files()?;
        if files.is_empty() {
            return Err(miette!("directory is empty"));
        }

        let name = self.mod_name()?;
        let version = self.mod_version(&files)?;

        let compression = if self.no_compress {
            CompressionPolicy::never()
        } else {
            CompressionPolicy::tmodloader()
        };

        let tmod = Pipeline::standard(&self.tml_version)
            .with_compression(compression)
            .with_threads(self.threads)
            .pack(&self.tml_version, &name, &version, files)
            .context(format!("packing {}", self.directory.display()))?;

        let out = if !self.overwrite {
            File::create_new(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        } else {
            File::create(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        };

        let mut out = tmod
            .write(BufWriter::new(out))
            .context("finalizing tmod file")?;
        out.flush().into_diagnostic()?;

        info!("packed {} {} with {} entries", name, version, tmod.len());
        Ok(())
    }
}
