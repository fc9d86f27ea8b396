//! Build properties, stored as the `Info` entry and edited as `build.txt`.

use derive_more::Display;
use std::io::Cursor;
use std::str::FromStr;
use tmod_archive::binary::{ByteReader, ByteWriter};
use tmod_archive::types::parse_version;
use tracing::{debug, instrument};

use crate::converter::{Converter, EditableFile};
use crate::error::{Error, Result};

/// Name of the stored entry
pub const INFO_FILE_NAME: &str = "Info";

/// Name of the editable file
pub const BUILD_FILE_NAME: &str = "build.txt";

/// Which side of a multiplayer game needs the mod
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModSide {
    #[default]
    Both,
    Client,
    Server,
    NoSync,
}

impl ModSide {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(ModSide::Both),
            1 => Some(ModSide::Client),
            2 => Some(ModSide::Server),
            3 => Some(ModSide::NoSync),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            ModSide::Both => 0,
            ModSide::Client => 1,
            ModSide::Server => 2,
            ModSide::NoSync => 3,
        }
    }
}

impl FromStr for ModSide {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        [ModSide::Both, ModSide::Client, ModSide::Server, ModSide::NoSync]
            .into_iter()
            .find(|side| side.to_string().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                Error::InvalidBuildFile(format!(
                    "side \"{value}\" does not match: Both, Client, Server, NoSync"
                ))
            })
    }
}

/// How the value following a stored tag is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    /// Strings terminated by an empty string
    List,
    /// Presence means `true`
    Flag,
    /// Presence means `false`, the tag carries a leading `!`
    NegatedFlag,
    /// A single byte
    Side,
    /// A string that is not rendered since the archive carries it as `description.txt`
    Description,
    String,
}

fn tag_kind(tag: &str) -> Option<TagKind> {
    Some(match tag {
        "dllReferences" | "modReferences" | "weakReferences" | "sortAfter" | "sortBefore" => {
            TagKind::List
        }
        "noCompile" | "includeSource" | "includePDB" | "beta" | "translationMod" => TagKind::Flag,
        "!hideCode" | "!hideResources" | "!playableOnPreview" => TagKind::NegatedFlag,
        "side" => TagKind::Side,
        "description" => TagKind::Description,
        "author" | "version" | "displayName" | "homepage" | "buildVersion" | "languageVersion"
        | "eacPath" => TagKind::String,
        _ => return None,
    })
}

/// Render the stored tags as `key = value` lines, in stored order
///
/// Unknown tags are skipped.
pub fn render_info(data: &[u8]) -> tmod_archive::error::Result<String> {
    let mut reader = ByteReader::new(Cursor::new(data));
    let mut output = String::new();

    loop {
        let tag = reader.read_string()?;
        if tag.is_empty() {
            break;
        }

        let Some(kind) = tag_kind(&tag) else {
            debug!(tag = %tag, "skipping unknown build property");
            continue;
        };

        let (key, value) = match kind {
            TagKind::List => {
                let mut items = Vec::new();
                loop {
                    let item = reader.read_string()?;
                    if item.is_empty() {
                        break;
                    }
                    items.push(item);
                }
                (tag.as_str(), Some(items.join(", ")))
            }
            TagKind::Flag => (tag.as_str(), Some("true".to_owned())),
            TagKind::NegatedFlag => (&tag[1..], Some("false".to_owned())),
            TagKind::Side => (
                tag.as_str(),
                ModSide::from_byte(reader.read_u8()?).map(|side| side.to_string()),
            ),
            TagKind::Description => {
                reader.read_string()?;
                (tag.as_str(), None)
            }
            TagKind::String => (tag.as_str(), Some(reader.read_string()?)),
        };

        if let Some(value) = value {
            output.push_str(&format!("{key} = {value}\n"));
        }
    }

    Ok(output)
}

/// Everything `build.txt` configures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildProperties {
    pub dll_references: Vec<String>,
    /// Mod references, optionally with a version as `Name@1.0`
    pub mod_references: Vec<String>,
    pub weak_references: Vec<String>,
    pub sort_after: Vec<String>,
    pub sort_before: Vec<String>,
    /// File masks excluded from the build, never stored
    pub build_ignores: Vec<String>,
    pub author: String,
    pub version: String,
    pub display_name: String,
    pub homepage: String,
    pub description: String,
    pub no_compile: bool,
    pub hide_code: bool,
    pub hide_resources: bool,
    pub include_source: bool,
    pub eac_path: String,
    pub side: ModSide,
}

impl Default for BuildProperties {
    fn default() -> Self {
        BuildProperties {
            dll_references: Vec::new(),
            mod_references: Vec::new(),
            weak_references: Vec::new(),
            sort_after: Vec::new(),
            sort_before: Vec::new(),
            build_ignores: Vec::new(),
            author: String::new(),
            version: "1.0.0.0".to_owned(),
            display_name: String::new(),
            homepage: String::new(),
            description: String::new(),
            no_compile: false,
            hide_code: false,
            hide_resources: false,
            include_source: false,
            eac_path: String::new(),
            side: ModSide::Both,
        }
    }
}

fn read_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn read_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

impl BuildProperties {
    /// Parse `key = value` lines
    ///
    /// Blank lines, lines with an empty value and unknown keys are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut props = BuildProperties::default();

        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::InvalidBuildFile(format!(
                    "line {} has no '=': {line}",
                    number + 1
                )));
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                continue;
            }

            props.set(key, value)?;
        }

        Ok(props)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "dllReferences" => self.dll_references = read_list(value),
            "modReferences" => self.mod_references = read_list(value),
            "weakReferences" => self.weak_references = read_list(value),
            "sortBefore" => self.sort_before = read_list(value),
            "sortAfter" => self.sort_after = read_list(value),
            "buildIgnore" => {
                self.build_ignores = read_list(value)
                    .into_iter()
                    .map(|mask| mask.replace('\\', "/"))
                    .collect()
            }
            "author" => self.author = value.to_owned(),
            "version" => {
                if parse_version(value).is_none() {
                    return Err(Error::InvalidBuildFile(format!(
                        "version \"{value}\" is not a valid version"
                    )));
                }
                self.version = value.to_owned();
            }
            "displayName" => self.display_name = value.to_owned(),
            "homepage" => self.homepage = value.to_owned(),
            "description" => self.description = value.to_owned(),
            "eacPath" => self.eac_path = value.to_owned(),
            "noCompile" => self.no_compile = read_bool(value),
            "hideCode" => self.hide_code = read_bool(value),
            "hideResources" => self.hide_resources = read_bool(value),
            "includeSource" => self.include_source = read_bool(value),
            "side" => self.side = value.parse()?,
            _ => debug!(key, "ignoring unknown build property"),
        }

        Ok(())
    }

    /// Serialize to the stored tag form
    pub fn to_bytes(&self, build_version: &str) -> tmod_archive::error::Result<Vec<u8>> {
        let mut writer = ByteWriter::new(Vec::new());

        let lists = [
            ("dllReferences", &self.dll_references),
            ("modReferences", &self.mod_references),
            ("weakReferences", &self.weak_references),
            ("sortAfter", &self.sort_after),
            ("sortBefore", &self.sort_before),
        ];
        for (tag, items) in lists {
            if items.is_empty() {
                continue;
            }
            writer.write_string(tag)?;
            for item in items {
                writer.write_string(item)?;
            }
            writer.write_string("")?;
        }

        if !self.author.is_empty() {
            writer.write_string("author")?;
            writer.write_string(&self.author)?;
        }

        writer.write_string("version")?;
        writer.write_string(&self.version)?;

        let optional = [
            ("displayName", &self.display_name),
            ("homepage", &self.homepage),
            ("description", &self.description),
        ];
        for (tag, value) in optional {
            if !value.is_empty() {
                writer.write_string(tag)?;
                writer.write_string(value)?;
            }
        }

        if self.no_compile {
            writer.write_string("noCompile")?;
        }
        if !self.hide_code {
            writer.write_string("!hideCode")?;
        }
        if !self.hide_resources {
            writer.write_string("!hideResources")?;
        }
        if self.include_source {
            writer.write_string("includeSource")?;
        }

        if !self.eac_path.is_empty() {
            writer.write_string("eacPath")?;
            writer.write_string(&self.eac_path)?;
        }

        if self.side != ModSide::Both {
            writer.write_string("side")?;
            writer.write_u8(self.side.as_byte())?;
        }

        writer.write_string("buildVersion")?;
        writer.write_string(build_version)?;

        writer.write_string("")?;
        Ok(writer.into_inner())
    }
}

/// Turns the root `Info` entry into `build.txt`
#[derive(Debug, Clone, Copy, Default)]
pub struct InfoExtractor;

impl Converter for InfoExtractor {
    fn name(&self) -> &'static str {
        "info"
    }

    fn should_convert(&self, path: &str, _data: &[u8]) -> bool {
        path == INFO_FILE_NAME
    }

    #[instrument(skip(self, data), fields(size = data.len()), err)]
    fn convert(&self, path: &str, data: &[u8]) -> Result<EditableFile> {
        let text = render_info(data).map_err(|e| Error::conversion(path, e))?;
        Ok(EditableFile::new(BUILD_FILE_NAME, text))
    }
}

/// Turns the root `build.txt` into the `Info` entry
#[derive(Debug, Clone)]
pub struct BuildTxtPacker {
    build_version: String,
}

impl BuildTxtPacker {
    /// `build_version` is the tModLoader version the archive is built for
    pub fn new(build_version: impl Into<String>) -> Self {
        BuildTxtPacker {
            build_version: build_version.into(),
        }
    }
}

impl Converter for BuildTxtPacker {
    fn name(&self) -> &'static str {
        "build.txt"
    }

    fn should_convert(&self, path: &str, _data: &[u8]) -> bool {
        path == BUILD_FILE_NAME
    }

    #[instrument(skip(self, data), fields(size = data.len()), err)]
    fn convert(&self, path: &str, data: &[u8]) -> Result<EditableFile> {
        let text = std::str::from_utf8(data).map_err(|e| Error::conversion(path, e))?;
        let props = BuildProperties::parse(text).map_err(|e| Error::conversion(path, e))?;
        let info = props
            .to_bytes(&self.build_version)
            .map_err(|e| Error::conversion(path, e))?;

        Ok(EditableFile::new(INFO_FILE_NAME, info))
    }
}
