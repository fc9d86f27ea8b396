//! This library handles reading from and creating **TMOD** archives used by *tModLoader*.
//!
//! # TMOD Archive Format Documentation
//!
//! A TMOD file bundles the compiled assembly and every resource of a mod into a single archive.
//! TMOD files are typically identified with the `.tmod` extension.
//!
//! ## File Structure
//!
//! A TMOD file consists of a header, a manifest, a table of entries and finally the entry payloads.
//!
//! | Field              | Size                  | Description                                              |
//! |--------------------|-----------------------|----------------------------------------------------------|
//! | Magic number       | 4 bytes               | `0x444F4D54` ("TMOD")                                    |
//! | Loader version     | variable              | 7-bit length prefixed UTF-8 string                       |
//! | Hash               | 20 bytes              | SHA-1 of everything following the data length field     |
//! | Signature          | 256 bytes             | Mod browser signature, unused and usually zeroed         |
//! | Data length        | 4 bytes               | Number of bytes following this field                     |
//! | Name               | variable              | Internal name of the mod                                 |
//! | Version            | variable              | Version of the mod                                       |
//! | Entry count        | 4 bytes               | Number of entries in the table                           |
//!
//! ### Strings
//!
//! Strings are stored as a length in bytes followed by the UTF-8 data. The length is written seven
//! bits at a time starting with the least significant group, the high bit of every byte is set when
//! another byte follows.
//!
//! ### Entry Table
//!
//! The entry table follows the manifest and contains one row per entry:
//!
//! | Field              | Size                  | Description                                              |
//! |--------------------|-----------------------|----------------------------------------------------------|
//! | Path               | variable              | Forward slash separated path, unique in the archive      |
//! | Length             | 4 bytes               | Size of the entry when uncompressed                      |
//! | Compressed Length  | 4 bytes               | Size of the entry in the archive                         |
//!
//! ### Payloads
//!
//! The payloads directly follow the table in the same order, without any padding. An entry whose
//! compressed length differs from its length is stored as a raw DEFLATE stream, otherwise the bytes
//! are stored as they are.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.tmod`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - Archives written by loaders older than `0.11.0.0` compress the whole body instead of single
//!   entries and are not supported.
//!

pub mod archive;
pub mod binary;
pub mod checksum;
pub mod compression;
pub mod error;
pub mod read;
pub mod types;
pub mod write;

pub use archive::Archive;
pub use compression::{CompressionMethod, CompressionPolicy};
pub use read::TmodArchive;
pub use write::TmodWriter;
