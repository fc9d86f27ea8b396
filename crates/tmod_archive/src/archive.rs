//! In-memory model of a whole TMOD archive
//!
//! [`Archive`] owns the stored bytes of every entry. Compressed entries are only inflated when
//! their data is requested, so reading an archive to list or copy it never decompresses anything.

use indexmap::IndexMap;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, instrument};

use crate::compression::{decompress, CompressionMethod, CompressionPolicy};
use crate::error::{Error, FileNotFoundError, Result};
use crate::read::TmodArchive;
use crate::types::{normalize_path, EntryMetadata, HASH_LENGTH, SIGNATURE_LENGTH};
use crate::write::{HashPolicy, TmodWriter, TmodWriterOptions};

/// Decompressed bytes of an entry, if they have been produced yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    #[default]
    NotLoaded,
    Loaded(Vec<u8>),
}

/// A single entry of an [`Archive`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    metadata: EntryMetadata,
    stored: Vec<u8>,
    payload: Payload,
}

impl Entry {
    fn new(path: Box<str>, uncompressed_size: u64, stored: Vec<u8>) -> Self {
        Entry {
            metadata: EntryMetadata {
                path,
                uncompressed_size,
                stored_size: stored.len() as u64,
            },
            stored,
            payload: Payload::NotLoaded,
        }
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    pub fn path(&self) -> &str {
        &self.metadata.path
    }

    /// The bytes as they appear in the archive
    pub fn stored(&self) -> &[u8] {
        &self.stored
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Whether [`Entry::data`] can be served without decompressing
    pub fn is_loaded(&self) -> bool {
        !self.metadata.is_compressed() || matches!(self.payload, Payload::Loaded(_))
    }

    /// Decompress the entry once and keep the result
    pub fn materialize(&mut self) -> Result<&[u8]> {
        if self.metadata.compression_method() == CompressionMethod::None {
            return Ok(&self.stored);
        }

        match self.payload {
            Payload::Loaded(ref data) => Ok(data),
            Payload::NotLoaded => {
                self.payload = Payload::Loaded(self.inflate()?);
                self.materialize()
            }
        }
    }

    /// The uncompressed bytes, decompressing on the fly when they are not loaded
    pub fn data(&self) -> Result<Cow<'_, [u8]>> {
        match (&self.payload, self.metadata.compression_method()) {
            (_, CompressionMethod::None) => Ok(Cow::Borrowed(&self.stored)),
            (Payload::Loaded(data), _) => Ok(Cow::Borrowed(data)),
            (Payload::NotLoaded, CompressionMethod::Deflate) => Ok(Cow::Owned(self.inflate()?)),
        }
    }

    /// Consume the entry and return its uncompressed bytes
    pub fn into_data(self) -> Result<Vec<u8>> {
        match (self.payload, self.metadata.compression_method()) {
            (_, CompressionMethod::None) => Ok(self.stored),
            (Payload::Loaded(data), _) => Ok(data),
            (Payload::NotLoaded, CompressionMethod::Deflate) => {
                decompress(&self.stored, self.metadata.uncompressed_size as usize)
            }
        }
    }

    fn inflate(&self) -> Result<Vec<u8>> {
        decompress(&self.stored, self.metadata.uncompressed_size as usize).map_err(|e| match e {
            Error::DecompressionFailed(reason) => {
                Error::DecompressionFailed(format!("{}: {reason}", self.metadata.path))
            }
            e => e,
        })
    }
}

/// A TMOD archive held in memory
///
/// Entries keep their table order, which is also the order their payloads are written in. An
/// archive that was read and never changed is written back byte for byte, including its hash.
///
/// ```
/// # fn doit() -> tmod_archive::error::Result<()> {
/// use tmod_archive::{Archive, CompressionPolicy};
///
/// let mut archive = Archive::new("2022.9.47.0", "ExampleMod", "1.0");
/// archive.insert("a.txt", b"hello".to_vec(), &CompressionPolicy::default())?;
///
/// let bytes = archive.to_bytes()?;
/// let read = Archive::read(std::io::Cursor::new(&bytes))?;
/// assert_eq!(read.get("a.txt").unwrap().data()?.as_ref(), b"hello");
/// assert_eq!(read.to_bytes()?, bytes);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Archive {
    mod_loader_version: String,
    name: String,
    version: String,
    hash: [u8; HASH_LENGTH],
    signature: [u8; SIGNATURE_LENGTH],
    entries: IndexMap<Box<str>, Entry>,
    modified: bool,
}

impl Archive {
    /// Create an empty archive
    pub fn new(
        mod_loader_version: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Archive {
            mod_loader_version: mod_loader_version.into(),
            name: name.into(),
            version: version.into(),
            hash: [0; HASH_LENGTH],
            signature: [0; SIGNATURE_LENGTH],
            entries: IndexMap::new(),
            modified: true,
        }
    }

    /// Read an archive, keeping compressed entries compressed until they are used
    #[instrument(skip_all, err)]
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut tmod = TmodArchive::new(reader)?;

        let mut entries = IndexMap::with_capacity(tmod.len());
        for index in 0..tmod.len() {
            let stored = tmod.read_stored(index)?;
            let metadata = tmod.metadata(index)?;
            let entry = Entry::new(metadata.path.clone(), metadata.uncompressed_size, stored);
            entries.insert(entry.metadata.path.clone(), entry);
        }

        let header = tmod.header();
        let manifest = tmod.manifest();
        debug!(name = %manifest.name, entries = entries.len(), "read tmod archive");

        Ok(Archive {
            mod_loader_version: header.mod_loader_version.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            hash: header.hash,
            signature: header.signature,
            entries,
            modified: false,
        })
    }

    /// Read an archive and decompress every entry right away
    pub fn read_eager<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = Self::read(reader)?;
        for entry in archive.entries.values_mut() {
            entry.materialize()?;
        }
        Ok(archive)
    }

    /// Read the archive stored at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(FileNotFoundError::Path(
                path.display().to_string(),
            )),
            _ => Error::IOError(e),
        })?;

        Self::read(BufReader::new(file))
    }

    pub fn mod_loader_version(&self) -> &str {
        &self.mod_loader_version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Hash read from the source archive, zero for new archives
    pub fn hash(&self) -> &[u8; HASH_LENGTH] {
        &self.hash
    }

    pub fn set_mod_loader_version(&mut self, mod_loader_version: impl Into<String>) {
        self.mod_loader_version = mod_loader_version.into();
        self.modified = true;
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.modified = true;
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
        self.modified = true;
    }

    /// Whether anything changed since the archive was read
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_ref())
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Entry> {
        self.entries.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Add or replace an entry, storing it as `policy` decides
    ///
    /// A replaced entry keeps its position in the table.
    #[instrument(skip(self, data, policy), fields(size = data.len()), err)]
    pub fn insert(&mut self, path: &str, data: Vec<u8>, policy: &CompressionPolicy) -> Result<()> {
        let uncompressed_size = data.len() as u64;
        let stored = policy.apply(data)?;
        self.insert_stored(path, uncompressed_size, stored)
    }

    /// Add or replace an entry whose stored bytes are already final
    pub fn insert_stored(
        &mut self,
        path: &str,
        uncompressed_size: u64,
        stored: Vec<u8>,
    ) -> Result<()> {
        let path: Box<str> = normalize_path(path).into();
        if stored.len() as u64 > uncompressed_size {
            return Err(Error::InvalidEntryTable(format!(
                "{path} would be stored with {} bytes but only has {uncompressed_size}",
                stored.len()
            )));
        }
        if uncompressed_size > i32::MAX as u64 {
            return Err(Error::EntryTooLarge(path.into()));
        }

        let entry = Entry::new(path.clone(), uncompressed_size, stored);
        self.entries.insert(path, entry);
        self.modified = true;

        Ok(())
    }

    /// Remove an entry, keeping the order of the others
    pub fn remove(&mut self, path: &str) -> Option<Entry> {
        let entry = self.entries.shift_remove(path)?;
        self.modified = true;
        Some(entry)
    }

    /// Consume the archive and return its entries in table order
    pub fn into_entries(self) -> impl Iterator<Item = Entry> {
        self.entries.into_values()
    }

    /// Write the archive
    ///
    /// Stored bytes are written as they are. The hash is recomputed unless the archive is
    /// unmodified, in which case the original hash is kept.
    #[instrument(skip_all, err)]
    pub fn write<W: Write>(&self, writer: W) -> Result<W> {
        let hash = if self.modified {
            HashPolicy::Recompute
        } else {
            HashPolicy::Preserve(self.hash)
        };

        let options = TmodWriterOptions::builder()
            .mod_loader_version(self.mod_loader_version.clone())
            .name(self.name.clone())
            .version(self.version.clone())
            .hash(hash)
            .signature(self.signature)
            .build();

        let mut tmod = TmodWriter::new(writer, options);
        for entry in self.entries.values() {
            tmod.add_stored_verbatim(entry.path(), entry.metadata.uncompressed_size, &entry.stored)?;
        }
        tmod.finish()
    }

    /// Write the archive into a new buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.write(Vec::new())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::archive::{Archive, Payload};
    use crate::compression::CompressionPolicy;
    use crate::error::{Error, Result};

    fn sample() -> Result<Archive> {
        let mut archive = Archive::new("2022.9.47.0", "Sample", "0.1");
        archive.insert("a.txt", b"hello".to_vec(), &CompressionPolicy::default())?;
        archive.insert("b.bin", vec![b'A'; 10_000], &CompressionPolicy::default())?;
        Ok(archive)
    }

    #[test]
    fn lazy_materialization() -> Result<()> {
        let bytes = sample()?.to_bytes()?;
        let mut archive = Archive::read(Cursor::new(bytes))?;

        let entry = archive.get_mut("b.bin").ok_or(Error::UnexpectedEndOfStream)?;
        assert!(entry.metadata().is_compressed());
        assert!(!entry.is_loaded());
        assert_eq!(entry.payload(), &Payload::NotLoaded);

        assert_eq!(entry.data()?.len(), 10_000);
        assert!(!entry.is_loaded());

        assert_eq!(entry.materialize()?, vec![b'A'; 10_000].as_slice());
        assert!(entry.is_loaded());
        assert!(matches!(entry.payload(), Payload::Loaded(data) if data.len() == 10_000));

        // a second call is served from the loaded payload
        assert_eq!(entry.materialize()?.len(), 10_000);

        // raw entries are always available
        let raw = archive.get("a.txt").ok_or(Error::UnexpectedEndOfStream)?;
        assert!(raw.is_loaded());
        assert_eq!(raw.data()?.as_ref(), b"hello");

        Ok(())
    }

    #[test]
    fn eager_read_loads_everything() -> Result<()> {
        let bytes = sample()?.to_bytes()?;
        let archive = Archive::read_eager(Cursor::new(bytes))?;

        assert!(archive.entries().all(|entry| entry.is_loaded()));

        Ok(())
    }

    #[test]
    fn unmodified_archive_round_trips() -> Result<()> {
        let mut bytes = sample()?.to_bytes()?;
        // a stale hash survives an unmodified round trip
        bytes[20] ^= 0xFF;

        let archive = Archive::read(Cursor::new(&bytes))?;
        assert!(!archive.is_modified());
        assert_eq!(archive.to_bytes()?, bytes);

        Ok(())
    }

    #[test]
    fn modified_archive_recomputes_hash() -> Result<()> {
        let bytes = sample()?.to_bytes()?;

        let mut archive = Archive::read(Cursor::new(&bytes))?;
        let removed = archive.remove("a.txt").ok_or(Error::UnexpectedEndOfStream)?;
        assert_eq!(removed.into_data()?, b"hello");
        assert!(archive.is_modified());

        let rewritten = Archive::read(Cursor::new(archive.to_bytes()?))?;
        assert_ne!(rewritten.hash(), archive.hash());
        assert_eq!(rewritten.file_names().collect::<Vec<_>>(), vec!["b.bin"]);

        Ok(())
    }

    #[test]
    fn replace_keeps_position() -> Result<()> {
        let mut archive = sample()?;
        archive.insert("a.txt", b"bye".to_vec(), &CompressionPolicy::never())?;

        assert_eq!(archive.file_names().collect::<Vec<_>>(), vec!["a.txt", "b.bin"]);
        assert_eq!(
            archive.get("a.txt").ok_or(Error::UnexpectedEndOfStream)?.data()?.as_ref(),
            b"bye"
        );

        Ok(())
    }

    #[test]
    fn open_missing_file() {
        assert!(matches!(
            Archive::open("/definitely/not/here.tmod"),
            Err(Error::FileNotFound(_))
        ));
    }
}
