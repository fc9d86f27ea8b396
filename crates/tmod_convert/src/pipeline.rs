//! Batch extraction and packing of whole archives.

use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tmod_archive::error::Error as ArchiveError;
use tmod_archive::types::normalize_path;
use tmod_archive::{Archive, CompressionPolicy};
use tracing::{debug, info, instrument, warn, Span};

use crate::converter::{select, Converter, EditableFile};
use crate::error::{Error, Result};
use crate::info::{BuildTxtPacker, InfoExtractor};
use crate::rawimg::{PngPacker, RawImgExtractor};

/// Ordered extractors and packers
///
/// The first converter that accepts a file is used, files nobody accepts are passed through. A
/// failed conversion is logged and the file is passed through as well.
#[derive(Debug)]
pub struct Pipeline {
    extractors: Vec<Box<dyn Converter>>,
    packers: Vec<Box<dyn Converter>>,
    compression: CompressionPolicy,
    threads: Option<usize>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new()
    }
}

impl Pipeline {
    /// A pipeline without converters, every file is passed through
    pub fn new() -> Self {
        Pipeline {
            extractors: Vec::new(),
            packers: Vec::new(),
            compression: CompressionPolicy::default(),
            threads: None,
        }
    }

    /// The built-in conversions, packing `Info` for `mod_loader_version`
    pub fn standard(mod_loader_version: &str) -> Self {
        Pipeline::new()
            .with_extractor(InfoExtractor)
            .with_extractor(RawImgExtractor)
            .with_packer(BuildTxtPacker::new(mod_loader_version))
            .with_packer(PngPacker)
    }

    /// Append an extractor, it is tried after every extractor added before
    pub fn with_extractor(mut self, extractor: impl Converter + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Append a packer, it is tried after every packer added before
    pub fn with_packer(mut self, packer: impl Converter + 'static) -> Self {
        self.packers.push(Box::new(packer));
        self
    }

    /// Policy for entries created by [`Pipeline::pack`]
    pub fn with_compression(mut self, compression: CompressionPolicy) -> Self {
        self.compression = compression;
        self
    }

    /// Number of worker threads, the global pool is used when unset
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn extractors(&self) -> &[Box<dyn Converter>] {
        &self.extractors
    }

    pub fn packers(&self) -> &[Box<dyn Converter>] {
        &self.packers
    }

    pub fn compression(&self) -> &CompressionPolicy {
        &self.compression
    }

    /// Convert a single stored entry
    pub fn extract_file(&self, path: &str, data: &[u8]) -> EditableFile {
        convert_or_passthrough(&self.extractors, path, data)
    }

    /// Convert a single editable file
    pub fn pack_file(&self, path: &str, data: &[u8]) -> EditableFile {
        convert_or_passthrough(&self.packers, path, data)
    }

    /// Decompress and convert every entry, in table order
    ///
    /// Entries are processed in parallel. The first decompression failure aborts the whole run, as
    /// do two entries converting to the same path.
    #[instrument(skip_all, fields(name = archive.name(), entries = archive.len()), err)]
    pub fn extract(&self, archive: Archive) -> Result<Vec<EditableFile>> {
        let entries = archive.into_entries().collect::<Vec<_>>();
        let span = Span::current();

        let files = self.install(|| {
            entries
                .into_par_iter()
                .map(|entry| {
                    let _guard = span.enter();
                    let path = entry.path().to_owned();
                    let data = entry.into_data()?;
                    Ok(self.extract_file(&path, &data))
                })
                .collect::<Result<Vec<_>>>()
        })??;

        ensure_unique(&files)?;
        Ok(files)
    }

    /// Convert and compress every file into a new archive, keeping the order of `files`
    #[instrument(skip_all, fields(name = name, files = files.len()), err)]
    pub fn pack(
        &self,
        mod_loader_version: &str,
        name: &str,
        version: &str,
        files: Vec<EditableFile>,
    ) -> Result<Archive> {
        let span = Span::current();
        let packed = self.install(|| {
            files
                .into_par_iter()
                .map(|file| {
                    let _guard = span.enter();
                    let packed = self.pack_file(&file.path, &file.data);
                    let uncompressed_size = packed.data.len() as u64;
                    let stored = self.compression.apply(packed.data)?;
                    Ok((packed.path, uncompressed_size, stored))
                })
                .collect::<Result<Vec<_>>>()
        })??;

        let mut archive = Archive::new(mod_loader_version, name, version);
        for (path, uncompressed_size, stored) in packed {
            let path = normalize_path(&path);
            if archive.contains(&path) {
                return Err(ArchiveError::DuplicateEntry(path).into());
            }
            archive.insert_stored(&path, uncompressed_size, stored)?;
        }

        info!(entries = archive.len(), "packed archive");
        Ok(archive)
    }

    fn install<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        match self.threads {
            Some(threads) => Ok(rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?
                .install(op)),
            None => Ok(op()),
        }
    }
}

fn convert_or_passthrough(
    converters: &[Box<dyn Converter>],
    path: &str,
    data: &[u8],
) -> EditableFile {
    let converter = select(converters, path, data);
    match converter.convert(path, data) {
        Ok(file) => {
            debug!(converter = converter.name(), from = path, to = %file.path, "converted");
            file
        }
        Err(e) => {
            warn!(converter = converter.name(), path, "conversion failed, keeping the file as is: {e}");
            EditableFile::new(path, data)
        }
    }
}

/// Fail on the first path that more than one file would be written to
fn ensure_unique(files: &[EditableFile]) -> Result<()> {
    let mut seen = HashSet::with_capacity(files.len());
    match files.iter().find(|file| !seen.insert(file.path.as_str())) {
        Some(file) => Err(ArchiveError::DuplicateEntry(file.path.clone()).into()),
        None => Ok(()),
    }
}

/// Resolve `path` below `root`, refusing anything that would leave it
pub fn target_path(root: &Path, path: &str) -> Result<PathBuf> {
    let relative = Path::new(path);
    let escapes = relative.components().any(|component| {
        !matches!(component, Component::Normal(_) | Component::CurDir)
    });
    if path.is_empty() || escapes {
        return Err(Error::UnsafePath(path.to_owned()));
    }

    Ok(root.join(relative))
}

/// Write files below `root`, in parallel
///
/// Without `overwrite` an existing file is an error and is left untouched. Nothing is written when
/// two files share a path.
#[instrument(skip(files), fields(files = files.len()), err)]
pub fn write_tree(root: &Path, files: &[EditableFile], overwrite: bool) -> Result<()> {
    ensure_unique(files)?;

    let span = Span::current();
    files.par_iter().try_for_each(|file| {
        let _guard = span.enter();
        let target = target_path(root, &file.path)?;
        if let Some(parent) = target.parent() {
            // concurrent creation of the same directory is fine
            fs::create_dir_all(parent)?;
        }

        let mut out = if overwrite {
            File::create(&target)?
        } else {
            File::create_new(&target).map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => Error::AlreadyExists(target.display().to_string()),
                _ => Error::IOError(e),
            })?
        };
        out.write_all(&file.data)?;

        debug!("wrote {}", target.display());
        Ok(())
    })
}
