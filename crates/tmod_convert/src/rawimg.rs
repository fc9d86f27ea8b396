//! Raw image dumps and their PNG counterpart.

use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder, ImageFormat, RgbaImage};
use std::io::Cursor;
use tmod_archive::binary::{ByteReader, ByteWriter};
use tracing::instrument;

use crate::converter::{file_name, has_extension, with_extension, Converter, EditableFile};
use crate::error::{Error, Result};

/// The only raw image version in use
pub const RAWIMG_VERSION: i32 = 1;

/// Size of the version, width and height fields
pub const RAWIMG_HEADER_LENGTH: usize = 12;

/// The mod icon is shipped as a real PNG and never packed
pub const ICON_FILE_NAME: &str = "icon.png";

/// A decoded raw image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    width: u32,
    height: u32,
    /// RGBA pixels, row by row
    pixels: Vec<u8>,
}

impl RawImage {
    /// Wrap `pixels`, clearing the color of every fully transparent pixel
    pub fn new(width: u32, height: u32, mut pixels: Vec<u8>) -> Option<Self> {
        if Some(pixels.len()) != pixel_bytes(width, height) {
            return None;
        }

        canonicalize(&mut pixels);
        Some(RawImage {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Parse the stored form
    ///
    /// Bytes after the last pixel are ignored.
    pub fn parse(data: &[u8]) -> tmod_archive::error::Result<Self> {
        use tmod_archive::error::Error as ArchiveError;

        let mut reader = ByteReader::new(Cursor::new(data));
        let version = reader.read_i32()?;
        if version != RAWIMG_VERSION {
            return Err(ArchiveError::CustomError(format!(
                "unsupported raw image version {version}"
            )));
        }

        let width = reader.read_i32()?;
        let height = reader.read_i32()?;
        let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
            return Err(ArchiveError::CustomError(format!(
                "invalid raw image size {width}x{height}"
            )));
        };
        let count = pixel_bytes(width, height).ok_or_else(|| {
            ArchiveError::CustomError(format!("raw image of {width}x{height} is too large"))
        })?;

        let pixels = reader.read_bytes(count)?;
        RawImage::new(width, height, pixels).ok_or(ArchiveError::UnexpectedEndOfStream)
    }

    /// Serialize to the stored form
    pub fn to_bytes(&self) -> tmod_archive::error::Result<Vec<u8>> {
        let mut writer = ByteWriter::new(Vec::with_capacity(RAWIMG_HEADER_LENGTH + self.pixels.len()));
        writer.write_i32(RAWIMG_VERSION)?;
        writer.write_i32(self.width as i32)?;
        writer.write_i32(self.height as i32)?;
        writer.write_bytes(&self.pixels)?;
        Ok(writer.into_inner())
    }

    /// Decode a PNG of any color type
    pub fn from_png(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory_with_format(data, ImageFormat::Png)?.to_rgba8();
        let (width, height) = image.dimensions();

        let mut pixels = image.into_raw();
        canonicalize(&mut pixels);
        Ok(RawImage {
            width,
            height,
            pixels,
        })
    }

    /// Encode as an RGBA PNG
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let image = RgbaImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or_else(
            || Error::conversion("rawimg", "pixel buffer does not match the image size"),
        )?;

        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer).write_image(
            &image,
            self.width,
            self.height,
            ExtendedColorType::Rgba8,
        )?;
        Ok(buffer)
    }
}

fn pixel_bytes(width: u32, height: u32) -> Option<usize> {
    (width as usize).checked_mul(height as usize)?.checked_mul(4)
}

/// Zero the color of every pixel whose alpha is zero
pub fn canonicalize(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        if pixel[3] == 0 {
            pixel.fill(0);
        }
    }
}

/// Turns `.rawimg` entries into `.png` files
#[derive(Debug, Clone, Copy, Default)]
pub struct RawImgExtractor;

impl Converter for RawImgExtractor {
    fn name(&self) -> &'static str {
        "rawimg"
    }

    fn should_convert(&self, path: &str, _data: &[u8]) -> bool {
        has_extension(path, "rawimg")
    }

    #[instrument(skip(self, data), fields(size = data.len()), err)]
    fn convert(&self, path: &str, data: &[u8]) -> Result<EditableFile> {
        let image = RawImage::parse(data).map_err(|e| Error::conversion(path, e))?;
        let png = image.to_png().map_err(|e| Error::conversion(path, e))?;

        Ok(EditableFile::new(with_extension(path, "png"), png))
    }
}

/// Turns `.png` files, except the mod icon, into `.rawimg` entries
#[derive(Debug, Clone, Copy, Default)]
pub struct PngPacker;

impl Converter for PngPacker {
    fn name(&self) -> &'static str {
        "png"
    }

    fn should_convert(&self, path: &str, _data: &[u8]) -> bool {
        has_extension(path, "png") && file_name(path) != ICON_FILE_NAME
    }

    #[instrument(skip(self, data), fields(size = data.len()), err)]
    fn convert(&self, path: &str, data: &[u8]) -> Result<EditableFile> {
        let image = RawImage::from_png(data).map_err(|e| Error::conversion(path, e))?;
        let rawimg = image.to_bytes().map_err(|e| Error::conversion(path, e))?;

        Ok(EditableFile::new(with_extension(path, "rawimg"), rawimg))
    }
}

#[cfg(test)]
mod test {
    use image::{ImageFormat, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    use crate::converter::Converter;
    use crate::error::{Error, Result};
    use crate::rawimg::{PngPacker, RawImage, RawImgExtractor};

    fn rawimg(width: i32, height: i32, pixels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        bytes.extend_from_slice(pixels);
        bytes
    }

    #[test]
    fn parse_canonicalizes_transparent_pixels() -> Result<()> {
        #[rustfmt::skip]
        let input = rawimg(2, 1, &[
            10, 20, 30, 0,
            40, 50, 60, 255,
        ]);

        let image = RawImage::parse(&input)?;
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 1);
        assert_eq!(image.pixels(), &[0, 0, 0, 0, 40, 50, 60, 255]);

        Ok(())
    }

    #[test]
    fn transparent_pixel_extracts_to_zero() -> Result<()> {
        let input = rawimg(1, 1, &[10, 20, 30, 0]);

        assert!(RawImgExtractor.should_convert("icon.rawimg", &input));
        let file = RawImgExtractor.convert("icon.rawimg", &input)?;
        assert_eq!(file.path, "icon.png");

        let png = image::load_from_memory_with_format(&file.data, ImageFormat::Png)?.to_rgba8();
        assert_eq!(png.dimensions(), (1, 1));
        assert_eq!(png.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));

        Ok(())
    }

    #[test]
    fn short_buffer_fails() {
        let input = rawimg(2, 2, &[1, 2, 3, 4]);

        assert!(matches!(
            RawImgExtractor.convert("a.rawimg", &input),
            Err(Error::ConversionFailed { .. })
        ));
        assert!(matches!(
            RawImgExtractor.convert("a.rawimg", &[0x01, 0x00]),
            Err(Error::ConversionFailed { .. })
        ));
    }

    #[test]
    fn unknown_version_fails() {
        let mut input = rawimg(1, 1, &[1, 2, 3, 4]);
        input[0] = 2;

        assert!(matches!(
            RawImgExtractor.convert("a.rawimg", &input),
            Err(Error::ConversionFailed { .. })
        ));
    }

    #[test]
    fn png_packs_to_rawimg() -> Result<()> {
        let mut image = RgbaImage::new(2, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([9, 9, 9, 0]));
        image.put_pixel(0, 1, Rgba([0, 255, 0, 128]));
        image.put_pixel(1, 1, Rgba([0, 0, 255, 255]));

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        assert!(PngPacker.should_convert("Items/Sword.png", &png));
        assert!(!PngPacker.should_convert("icon.png", &png));
        assert!(!PngPacker.should_convert("Items/Sword.rawimg", &png));

        let file = PngPacker.convert("Items/Sword.png", &png)?;
        assert_eq!(file.path, "Items/Sword.rawimg");

        #[rustfmt::skip]
        let expected = rawimg(2, 2, &[
            255, 0, 0, 255,
            0, 0, 0, 0,
            0, 255, 0, 128,
            0, 0, 255, 255,
        ]);
        assert_eq!(file.data, expected);

        // and back again
        let extracted = RawImgExtractor.convert(&file.path, &file.data)?;
        assert_eq!(extracted.path, "Items/Sword.png");
        assert_eq!(RawImage::from_png(&extracted.data)?.to_bytes()?, expected);

        Ok(())
    }

    #[test]
    fn invalid_png_fails() {
        assert!(matches!(
            PngPacker.convert("a.png", b"not a png"),
            Err(Error::ConversionFailed { .. })
        ));
    }
}
