//! Conversion between the stored and the editable form of **TMOD** archive entries.
//!
//! Archives keep some resources in machine oriented encodings. Extracting an archive turns them
//! into files that can be edited with common tools, packing a directory reverses that.
//!
//! | Stored form | Editable form | Extractor                     | Packer                        |
//! |-------------|---------------|-------------------------------|-------------------------------|
//! | `*.rawimg`  | `*.png`       | [`rawimg::RawImgExtractor`]   | [`rawimg::PngPacker`]         |
//! | `Info`      | `build.txt`   | [`info::InfoExtractor`]       | [`info::BuildTxtPacker`]      |
//!
//! ## Raw images
//!
//! | Field   | Size                   | Description                                          |
//! |---------|------------------------|------------------------------------------------------|
//! | Version | 4 bytes                | Always `1`                                           |
//! | Width   | 4 bytes                | Width in pixels                                      |
//! | Height  | 4 bytes                | Height in pixels                                     |
//! | Pixels  | width * height * 4     | RGBA, a pixel with zero alpha is stored as all zero  |
//!
//! ## Build properties
//!
//! The `Info` entry is a list of 7-bit length prefixed tags, each followed by a value whose
//! encoding depends on the tag, and terminated by an empty tag.
//!
//! Converters are tried in order and the first one that accepts an entry wins, entries no
//! converter accepts are passed through unchanged. See [`Pipeline`].
//!

pub mod converter;
pub mod error;
pub mod info;
pub mod pipeline;
pub mod rawimg;

pub use converter::{Converter, EditableFile, Passthrough};
pub use pipeline::Pipeline;
