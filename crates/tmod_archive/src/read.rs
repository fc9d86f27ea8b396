//! Types for reading TMOD archives
//!

use binrw::BinRead;
use indexmap::IndexMap;
use sha1::{Digest, Sha1};
use std::{
    fmt::{self, Debug},
    io::{self, Read, Seek, SeekFrom},
    sync::Arc,
};
use tracing::{debug, instrument, warn};

use crate::{
    compression::{decompress, CompressionMethod, TmodBlockReader},
    error::{Error, FileNotFoundError, Result},
    types::{EntryMetadata, TmodHeader, TmodManifest, TmodRecord, HASH_LENGTH},
};

/// Upper bound for preallocating the entry table, the count itself is untrusted
const MAX_PREALLOCATED_ENTRIES: usize = 4096;

/// A struct for reading an entry from a TMOD file
pub struct TmodFile<'a, R: Read + Seek> {
    data: &'a TmodFileData,
    reader: TmodBlockReader<'a, R>,
}

impl<'a, R: Read + Seek> Debug for TmodFile<'a, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TmodFile({:#?})", self.data)
    }
}

/// Methods for retrieving information on TMOD file entries
impl<'a, R: Read + Seek> TmodFile<'a, R> {
    /// Get the path of the entry
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`). Carelessly writing to these paths
    /// allows an attacker to craft a TMOD archive that will overwrite critical
    /// files.
    ///
    pub fn name(&self) -> &str {
        &self.data.metadata.path
    }

    /// Get the size of the entry, in bytes, in the archive
    pub fn compressed_size(&self) -> u64 {
        self.data.metadata.stored_size
    }

    /// Get the size of the entry, in bytes, when uncompressed
    pub fn size(&self) -> u64 {
        self.data.metadata.uncompressed_size
    }

    /// Get the starting offset of the stored bytes
    pub fn data_start(&self) -> u64 {
        self.data.data_start
    }

    /// Get the compression method used for this entry
    pub fn compression_method(&self) -> CompressionMethod {
        self.data.metadata.compression_method()
    }
}

impl<R: Read + Seek> Read for TmodFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Location and sizes of a single entry
#[derive(Debug, Clone, Default)]
pub struct TmodFileData {
    /// Path and sizes as stored in the entry table
    pub metadata: EntryMetadata,
    /// Specifies where the stored bytes of the entry start
    pub data_start: u64,
}

#[derive(Debug)]
pub(crate) struct Shared {
    header: TmodHeader,
    manifest: TmodManifest,
    /// Offset of the first byte covered by the data length and the hash
    body_start: u64,
    /// Offset directly after the last payload
    body_end: u64,
    files: IndexMap<Box<str>, TmodFileData>,
}

/// TMOD archive reader
///
/// Only the header and the entry table are read when opening, payloads are read on demand.
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_tmod_contents(reader: impl Read + Seek) -> tmod_archive::error::Result<()> {
///     let mut tmod = tmod_archive::TmodArchive::new(reader)?;
///
///     for i in 0..tmod.len() {
///         let mut file = tmod.by_index(i)?;
///         println!("Filename: {}", file.name());
///         std::io::copy(&mut file, &mut std::io::stdout())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct TmodArchive<R> {
    reader: R,
    shared: Arc<Shared>,
}

impl<R> TmodArchive<R> {
    /// Total size of the files in the archive, if it can be known. Doesn't include metadata.
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for file in self.shared.files.values() {
            total = total.checked_add(file.metadata.uncompressed_size as u128)?;
        }
        Some(total)
    }

    pub fn header(&self) -> &TmodHeader {
        &self.shared.header
    }

    pub fn manifest(&self) -> &TmodManifest {
        &self.shared.manifest
    }

    /// Version of tModLoader the archive was built with
    pub fn mod_loader_version(&self) -> &str {
        &self.shared.header.mod_loader_version
    }

    /// Internal name of the mod
    pub fn name(&self) -> &str {
        &self.shared.manifest.name
    }

    /// Version of the mod
    pub fn version(&self) -> &str {
        &self.shared.manifest.version
    }

    /// Hash stored in the header
    pub fn hash(&self) -> &[u8; HASH_LENGTH] {
        &self.shared.header.hash
    }

    /// Metadata of every entry in table order
    pub fn entries(&self) -> impl Iterator<Item = &EntryMetadata> {
        self.shared.files.values().map(|file| &file.metadata)
    }

    /// Metadata of a single entry
    pub fn metadata(&self, index: usize) -> Result<&EntryMetadata> {
        self.file_data(index).map(|file| &file.metadata)
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn file_data(&self, index: usize) -> Result<&TmodFileData> {
        self.shared
            .files
            .get_index(index)
            .map(|(_, data)| data)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(index)))
    }
}

impl<R: Read + Seek> TmodArchive<R> {
    /// Read a TMOD archive collecting the entries it contains.
    #[instrument(skip_all, err)]
    pub fn new(mut reader: R) -> Result<TmodArchive<R>> {
        let shared = Self::get_metadata(&mut reader)?;
        debug!(
            name = %shared.manifest.name,
            version = %shared.manifest.version,
            entries = shared.files.len(),
            "opened tmod archive"
        );

        Ok(TmodArchive {
            reader,
            shared: shared.into(),
        })
    }

    /// Number of entries contained in this TMOD.
    pub fn len(&self) -> usize {
        self.shared.files.len()
    }

    /// Whether this TMOD archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over all the entry paths in this archive.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.shared.files.keys().map(|s| s.as_ref())
    }

    /// Get the index of a file entry by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.shared.files.get_index_of(name)
    }

    /// Get the name of a file entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.shared
            .files
            .get_index(index)
            .map(|(name, _)| name.as_ref())
    }

    /// Search for a file entry by name
    pub fn by_name(&mut self, name: &str) -> Result<TmodFile<'_, R>> {
        let Some(index) = self.shared.files.get_index_of(name) else {
            return Err(Error::FileNotFound(FileNotFoundError::Name(
                name.to_owned(),
            )));
        };
        self.by_index(index)
    }

    /// Get a contained file by index as a streaming reader
    pub fn by_index(&mut self, file_number: usize) -> Result<TmodFile<'_, R>> {
        let (_, data) = self
            .shared
            .files
            .get_index(file_number)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(file_number)))?;

        Ok(TmodFile {
            data,
            reader: TmodBlockReader::new(
                &mut self.reader,
                data.data_start,
                data.metadata.stored_size,
                data.metadata.compression_method(),
            )?,
        })
    }

    /// Read the bytes of an entry exactly as they are stored
    pub fn read_stored(&mut self, index: usize) -> Result<Vec<u8>> {
        let data = self.file_data(index)?.clone();

        let stream_len = self.reader.seek(SeekFrom::End(0))?;
        let available = stream_len.saturating_sub(data.data_start);
        if available < data.metadata.stored_size {
            return Err(Error::TruncatedPayload {
                path: data.metadata.path.to_string(),
                expected: data.metadata.stored_size,
                available,
            });
        }

        self.reader.seek(SeekFrom::Start(data.data_start))?;
        let mut stored = vec![0u8; data.metadata.stored_size as usize];
        self.reader.read_exact(&mut stored)?;

        Ok(stored)
    }

    /// Read and decompress an entry into a buffer of exactly its uncompressed size
    #[instrument(skip(self), err)]
    pub fn read_entry(&mut self, index: usize) -> Result<Vec<u8>> {
        let stored = self.read_stored(index)?;
        let metadata = &self.file_data(index)?.metadata;

        match metadata.compression_method() {
            CompressionMethod::None => Ok(stored),
            CompressionMethod::Deflate => decompress(&stored, metadata.uncompressed_size as usize)
                .map_err(|e| match e {
                    Error::DecompressionFailed(reason) => Error::DecompressionFailed(format!(
                        "{}: {reason}",
                        metadata.path
                    )),
                    e => e,
                }),
        }
    }

    /// SHA-1 of everything covered by the data length
    pub fn compute_hash(&mut self) -> Result<[u8; HASH_LENGTH]> {
        self.reader.seek(SeekFrom::Start(self.shared.body_start))?;

        let mut hasher = Sha1::new();
        let mut body = (&mut self.reader).take(self.shared.body_end - self.shared.body_start);
        io::copy(&mut body, &mut hasher)?;

        Ok(hasher.finalize().into())
    }

    /// Recompute the hash and compare it with the stored one
    ///
    /// A mismatch is reported but never treated as an error.
    #[instrument(skip(self), err)]
    pub fn verify_hash(&mut self) -> Result<bool> {
        let actual = self.compute_hash()?;
        let matches = actual == self.shared.header.hash;
        if !matches {
            warn!(name = %self.shared.manifest.name, "stored hash does not match the archive contents");
        }
        Ok(matches)
    }

    fn get_records(reader: &mut R, manifest: &TmodManifest) -> Result<Vec<TmodRecord>> {
        let count = usize::try_from(manifest.entry_count).map_err(|_| {
            Error::InvalidEntryTable(format!("negative entry count {}", manifest.entry_count))
        })?;

        let mut records = Vec::with_capacity(count.min(MAX_PREALLOCATED_ENTRIES));
        for row in 0..count {
            let record = TmodRecord::read(reader).map_err(|e| {
                Error::InvalidEntryTable(format!("row {row} of {count} is unreadable: {e}"))
            })?;

            if record.length < 0 || record.compressed_length < 0 {
                return Err(Error::InvalidEntryTable(format!(
                    "{} has a negative length",
                    record.path
                )));
            }
            if record.compressed_length > record.length {
                return Err(Error::InvalidEntryTable(format!(
                    "{} is stored with {} bytes but only has {}",
                    record.path, record.compressed_length, record.length
                )));
            }

            records.push(record);
        }

        Ok(records)
    }

    fn get_metadata(reader: &mut R) -> Result<Shared> {
        let header = TmodHeader::read(reader).map_err(|e| Error::InvalidHeader(e.to_string()))?;
        if header.is_legacy() {
            return Err(Error::UnsupportedLegacyFormat(header.mod_loader_version));
        }

        let body_start = reader.stream_position()?;
        let manifest =
            TmodManifest::read(reader).map_err(|e| Error::InvalidHeader(e.to_string()))?;

        let records = Self::get_records(reader, &manifest)?;

        let mut data_start = reader.stream_position()?;
        let mut files = IndexMap::with_capacity(records.len());
        for record in records {
            let file = TmodFileData {
                metadata: EntryMetadata {
                    path: record.path.into(),
                    uncompressed_size: record.length as u64,
                    stored_size: record.compressed_length as u64,
                },
                data_start,
            };
            data_start += file.metadata.stored_size;

            if files.contains_key(&file.metadata.path) {
                return Err(Error::InvalidEntryTable(format!(
                    "{} is listed more than once",
                    file.metadata.path
                )));
            }
            files.insert(file.metadata.path.clone(), file);
        }
        let body_end = data_start;

        let stream_len = reader.seek(SeekFrom::End(0))?;
        if let Some(file) = files
            .values()
            .find(|file| file.data_start + file.metadata.stored_size > stream_len)
        {
            return Err(Error::TruncatedPayload {
                path: file.metadata.path.to_string(),
                expected: file.metadata.stored_size,
                available: stream_len.saturating_sub(file.data_start),
            });
        }

        if body_end - body_start != header.data_length as u64 {
            warn!(
                declared = header.data_length,
                actual = body_end - body_start,
                "data length does not match the archive layout"
            );
        }

        Ok(Shared {
            header,
            manifest,
            body_start,
            body_end,
            files,
        })
    }
}
