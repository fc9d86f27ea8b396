//! Types for writing TMOD archives
//!

use binrw::BinWrite;
use bon::Builder;
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::fmt::Debug;
use std::io::{self, Cursor, Write};
use std::mem;
use tracing::{debug, instrument, Level};

use crate::compression::CompressionPolicy;
use crate::error::{Error, Result};
use crate::types::{
    normalize_path, TmodHeader, TmodManifest, TmodRecord, HASH_LENGTH, SIGNATURE_LENGTH,
};

/// How the header hash is produced when finishing an archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashPolicy {
    /// SHA-1 of the written body
    #[default]
    Recompute,

    /// Write the given hash as it is, even if it no longer matches the body
    Preserve([u8; HASH_LENGTH]),
}

/// Options for how the TMOD file should be written
#[derive(Debug, Clone, Builder)]
pub struct TmodWriterOptions {
    /// Version of tModLoader the archive targets
    #[builder(into)]
    pub mod_loader_version: String,

    /// Internal name of the mod
    #[builder(into)]
    pub name: String,

    /// Version of the mod
    #[builder(into)]
    pub version: String,

    /// Decides which entries added with [`TmodWriter::start_file`] are compressed
    #[builder(default)]
    pub compression: CompressionPolicy,

    #[builder(default)]
    pub hash: HashPolicy,

    #[builder(default = [0; SIGNATURE_LENGTH])]
    pub signature: [u8; SIGNATURE_LENGTH],
}

/// TMOD archive generator
///
/// The whole body is kept in memory until [`TmodWriter::finish`], since the hash and the data
/// length precede it.
///
/// ```
/// # fn doit() -> tmod_archive::error::Result<()>
/// # {
/// # use tmod_archive::TmodWriter;
/// use std::io::Write;
/// use tmod_archive::write::TmodWriterOptions;
///
/// let mut tmod = TmodWriter::new(Vec::new(), TmodWriterOptions::builder()
///            .mod_loader_version("2022.9.47.0")
///            .name("ExampleMod")
///            .version("1.0")
///            .build());
///
/// tmod.start_file("hello_world.txt")?;
/// tmod.write_all(b"Hello, World!")?;
///
/// // Apply the changes you've made.
/// let bytes = tmod.finish()?;
/// assert_eq!(&bytes[..4], b"TMOD");
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct TmodWriter<W: Write> {
    inner: W,
    options: TmodWriterOptions,
    current: Option<(String, Vec<u8>)>,
    names: HashSet<String>,
    records: Vec<TmodRecord>,
    data_block: Vec<u8>,
}

impl<W: Write> TmodWriter<W> {
    /// Initializes the archive.
    ///
    /// Before writing to this object, the [`TmodWriter::start_file`] function should be called.
    pub fn new(inner: W, options: TmodWriterOptions) -> TmodWriter<W> {
        TmodWriter {
            inner,
            options,
            current: None,
            names: HashSet::new(),
            records: Vec::new(),
            data_block: Vec::new(),
        }
    }

    /// Returns true if a file is currently open for writing.
    pub const fn is_writing_file(&self) -> bool {
        self.current.is_some()
    }

    /// Number of entries written so far, including an open one
    pub fn len(&self) -> usize {
        self.records.len() + usize::from(self.current.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a new file, the compression is decided by the policy once it is finished.
    #[instrument(skip(self, name), err)]
    pub fn start_file(&mut self, name: impl ToString) -> Result<()> {
        if self.current.is_some() {
            self.finish_file()?;
        }

        let name = self.claim_name(&name.to_string())?;
        self.current = Some((name, Vec::new()));

        Ok(())
    }

    /// Finish the open file and store it according to the compression policy
    #[instrument(skip(self), err)]
    pub fn finish_file(&mut self) -> Result<()> {
        let Some((name, data)) = self.current.take() else {
            return Ok(());
        };

        let uncompressed_size = data.len() as u64;
        let stored = self.options.compression.apply(data)?;
        self.push_record(name, uncompressed_size, &stored)
    }

    /// Add a whole file at once
    pub fn add_file(&mut self, name: impl ToString, data: impl Into<Vec<u8>>) -> Result<()> {
        self.start_file(name)?;
        if let Some((_, buffer)) = self.current.as_mut() {
            *buffer = data.into();
        }
        self.finish_file()
    }

    /// Add an entry whose stored bytes are already final
    ///
    /// `stored` is written as it is, the entry counts as compressed when its length differs from
    /// `uncompressed_size`.
    #[instrument(skip(self, name, stored), fields(stored = stored.len()), err)]
    pub fn add_stored(
        &mut self,
        name: impl ToString,
        uncompressed_size: u64,
        stored: &[u8],
    ) -> Result<()> {
        let name = normalize_path(&name.to_string());
        self.add_stored_verbatim(name, uncompressed_size, stored)
    }

    /// Add an entry like [`TmodWriter::add_stored`], keeping `name` exactly as given
    ///
    /// Used for entries read from an existing table, whose paths must not change.
    #[instrument(skip(self, name, stored), fields(stored = stored.len()), err)]
    pub fn add_stored_verbatim(
        &mut self,
        name: impl ToString,
        uncompressed_size: u64,
        stored: &[u8],
    ) -> Result<()> {
        if self.current.is_some() {
            self.finish_file()?;
        }

        let name = self.reserve_name(name.to_string())?;
        if stored.len() as u64 > uncompressed_size {
            return Err(Error::InvalidEntryTable(format!(
                "{name} would be stored with {} bytes but only has {uncompressed_size}",
                stored.len()
            )));
        }
        self.push_record(name, uncompressed_size, stored)
    }

    /// Finish the last file and write the whole archive
    ///
    /// This will return the writer, but one should normally not append any data to the end of the file.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        self.finish_file()?;

        let entry_count = i32::try_from(self.records.len())
            .map_err(|_| Error::CustomError("too many entries for one archive".to_owned()))?;
        let manifest = TmodManifest {
            name: mem::take(&mut self.options.name),
            version: mem::take(&mut self.options.version),
            entry_count,
        };

        let mut body = Cursor::new(Vec::with_capacity(self.data_block.len()));
        manifest.write(&mut body)?;
        for record in &self.records {
            record.write(&mut body)?;
        }
        body.write_all(&self.data_block)?;
        let body = body.into_inner();

        let hash = match self.options.hash {
            HashPolicy::Recompute => Sha1::digest(&body).into(),
            HashPolicy::Preserve(hash) => hash,
        };
        let data_length = u32::try_from(body.len())
            .map_err(|_| Error::CustomError("archive body exceeds 4 GiB".to_owned()))?;

        let header = TmodHeader {
            mod_loader_version: mem::take(&mut self.options.mod_loader_version),
            hash,
            signature: self.options.signature,
            data_length,
        };
        let mut head = Cursor::new(Vec::with_capacity(header.size() as usize));
        header.write(&mut head)?;

        self.inner.write_all(head.get_ref())?;
        self.inner.write_all(&body)?;

        debug!(
            entries = self.records.len(),
            size = header.size() + body.len() as u64,
            "wrote tmod archive"
        );

        Ok(self.inner)
    }

    fn claim_name(&mut self, name: &str) -> Result<String> {
        self.reserve_name(normalize_path(name))
    }

    fn reserve_name(&mut self, name: String) -> Result<String> {
        if !self.names.insert(name.clone()) {
            return Err(Error::DuplicateEntry(name));
        }
        Ok(name)
    }

    fn push_record(&mut self, path: String, uncompressed_size: u64, stored: &[u8]) -> Result<()> {
        let too_large = || Error::EntryTooLarge(path.clone());
        let length = i32::try_from(uncompressed_size).map_err(|_| too_large())?;
        let compressed_length = i32::try_from(stored.len()).map_err(|_| too_large())?;

        self.data_block.write_all(stored)?;
        self.records.push(TmodRecord {
            path,
            length,
            compressed_length,
        });

        Ok(())
    }
}

impl<W: Write> Write for TmodWriter<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size=buf.len()) )]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some((_, data)) = self.current.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "No file has been started",
            ));
        };
        data.extend_from_slice(buf);
        Ok(buf.len())
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
