//! The converter capability and first-match selection.

use std::fmt::{self, Debug};

use crate::error::Result;

/// A file as it is written to or read from the editable tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditableFile {
    /// Forward slash separated path, relative to the tree or archive root
    pub path: String,
    pub data: Vec<u8>,
}

impl EditableFile {
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        EditableFile {
            path: path.into(),
            data: data.into(),
        }
    }
}

/// Turns one file form into another
///
/// Extractors and packers share this shape. Neither has to be the exact inverse of the other.
pub trait Converter: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &'static str;

    /// Whether this converter handles the file
    fn should_convert(&self, path: &str, data: &[u8]) -> bool;

    fn convert(&self, path: &str, data: &[u8]) -> Result<EditableFile>;
}

impl Debug for dyn Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Converter({})", self.name())
    }
}

/// Accepts every file and leaves it unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

static PASSTHROUGH: Passthrough = Passthrough;

impl Converter for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn should_convert(&self, _path: &str, _data: &[u8]) -> bool {
        true
    }

    fn convert(&self, path: &str, data: &[u8]) -> Result<EditableFile> {
        Ok(EditableFile::new(path, data))
    }
}

/// The first converter accepting the file, [`Passthrough`] when none does
pub fn select<'a>(converters: &'a [Box<dyn Converter>], path: &str, data: &[u8]) -> &'a dyn Converter {
    converters
        .iter()
        .map(|c| c.as_ref())
        .find(|c| c.should_convert(path, data))
        .unwrap_or(&PASSTHROUGH)
}

/// Last component of a forward slash separated path
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Replace the extension of the last component of `path`, or append one
pub fn with_extension(path: &str, extension: &str) -> String {
    let name = file_name(path);
    let stem_len = match name.rfind('.') {
        Some(0) | None => name.len(),
        Some(index) => index,
    };
    let stem_end = path.len() - name.len() + stem_len;
    format!("{}.{extension}", &path[..stem_end])
}

/// Whether the last component of `path` has the extension, compared ignoring case
pub fn has_extension(path: &str, extension: &str) -> bool {
    let name = file_name(path);
    match name.rfind('.') {
        Some(index) if index > 0 => name[index + 1..].eq_ignore_ascii_case(extension),
        _ => false,
    }
}
