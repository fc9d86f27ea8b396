//! Base types for structure of TMOD file.

use binrw::{BinRead, BinWrite};

use crate::binary::{parse_var_string, string_size, write_var_string};
use crate::compression::CompressionMethod;

/// Length of the SHA-1 content hash
pub const HASH_LENGTH: usize = 20;

/// Length of the unused mod browser signature
pub const SIGNATURE_LENGTH: usize = 256;

/// Size of the magic, hash, signature and data length fields, everything but the loader version
pub const FIXED_HEADER_LENGTH: u64 = 4 + HASH_LENGTH as u64 + SIGNATURE_LENGTH as u64 + 4;

/// The first loader version that compresses single entries instead of the whole body
pub const FIRST_MODERN_VERSION: [u32; 4] = [0, 11, 0, 0];

/// TMOD file header
///
/// Always starts with "TMOD". Everything after `data_length` is covered by both the hash and the
/// data length. All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq)]
#[brw(magic = b"TMOD", little)]
pub struct TmodHeader {
    /// Version of tModLoader the archive was built with
    #[br(parse_with = parse_var_string)]
    #[bw(write_with = write_var_string)]
    pub mod_loader_version: String,

    /// SHA-1 of everything following the data length
    pub hash: [u8; HASH_LENGTH],

    /// Mod browser signature, ignored by every loader since 1.3
    pub signature: [u8; SIGNATURE_LENGTH],

    /// Number of bytes following this field
    pub data_length: u32,
}

impl Default for TmodHeader {
    fn default() -> Self {
        Self {
            mod_loader_version: String::new(),
            hash: [0; HASH_LENGTH],
            signature: [0; SIGNATURE_LENGTH],
            data_length: 0,
        }
    }
}

impl TmodHeader {
    /// Serialized size of this header
    pub fn size(&self) -> u64 {
        FIXED_HEADER_LENGTH + string_size(&self.mod_loader_version)
    }

    /// Whether the archive predates per entry compression
    pub fn is_legacy(&self) -> bool {
        is_legacy_version(&self.mod_loader_version)
    }
}

/// Identity of the mod, directly following the header
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq)]
#[brw(little)]
pub struct TmodManifest {
    /// Internal name of the mod
    #[br(parse_with = parse_var_string)]
    #[bw(write_with = write_var_string)]
    pub name: String,

    /// Version of the mod
    #[br(parse_with = parse_var_string)]
    #[bw(write_with = write_var_string)]
    pub version: String,

    /// Number of rows in the entry table
    pub entry_count: i32,
}

impl TmodManifest {
    /// Serialized size of this manifest
    pub fn size(&self) -> u64 {
        string_size(&self.name) + string_size(&self.version) + 4
    }
}

/// TMOD entry table row
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq)]
#[brw(little)]
pub struct TmodRecord {
    /// Path of the entry inside the archive
    #[br(parse_with = parse_var_string)]
    #[bw(write_with = write_var_string)]
    pub path: String,

    /// The size of the entry before compression
    pub length: i32,

    /// The size of the entry in the archive
    pub compressed_length: i32,
}

impl TmodRecord {
    /// Serialized size of this row
    pub fn size(&self) -> u64 {
        string_size(&self.path) + 8
    }
}

/// Sizes of an entry, shared by the lazy reader and the in-memory archive
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Forward slash separated path of the entry
    pub path: Box<str>,

    /// Size of the entry when extracted
    pub uncompressed_size: u64,

    /// Size of the entry in the archive
    pub stored_size: u64,
}

impl EntryMetadata {
    pub fn is_compressed(&self) -> bool {
        self.uncompressed_size != self.stored_size
    }

    pub fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::from_sizes(self.uncompressed_size, self.stored_size)
    }
}

/// Parse a dotted version with up to four numeric components
pub fn parse_version(version: &str) -> Option<[u32; 4]> {
    let mut parts = [0u32; 4];
    let mut count = 0;
    for part in version.trim().split('.') {
        if count == parts.len() {
            return None;
        }
        parts[count] = part.parse().ok()?;
        count += 1;
    }
    (count >= 2).then_some(parts)
}

/// Whether `version` names a loader older than [`FIRST_MODERN_VERSION`]
///
/// Unparsable versions are treated as modern.
pub fn is_legacy_version(version: &str) -> bool {
    parse_version(version).is_some_and(|v| v < FIRST_MODERN_VERSION)
}

/// Normalize a path for use as an entry name
pub fn normalize_path(path: &str) -> String {
    path.trim().replace('\\', "/")
}
