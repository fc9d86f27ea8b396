//! Entry compression and decompression handling.

use std::io::{self, Read, Seek, Write};

use bon::Builder;
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression, Decompress, FlushDecompress, Status};
use tracing::instrument;

use crate::error::{Error, Result};

/// Identifies how an entry's payload is stored inside the TMOD file
///
/// The format has no explicit field for this, an entry is compressed exactly when its stored size
/// differs from its uncompressed size.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None,

    /// Raw DEFLATE stream without zlib or gzip framing
    Deflate,
}

impl CompressionMethod {
    pub fn from_sizes(uncompressed_size: u64, stored_size: u64) -> Self {
        if uncompressed_size == stored_size {
            CompressionMethod::None
        } else {
            CompressionMethod::Deflate
        }
    }
}

/// Compress `raw` into a raw DEFLATE stream
///
/// The caller decides whether the result is worth keeping, see [`CompressionPolicy`].
pub fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

/// Inflate `compressed` into a buffer of exactly `uncompressed_size` bytes
///
/// Fails unless the stream ends after producing exactly that many bytes.
pub fn decompress(compressed: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    let mut output = vec![0u8; uncompressed_size];
    let mut inflater = Decompress::new(false);

    let status = inflater
        .decompress(compressed, &mut output, FlushDecompress::Finish)
        .map_err(|e| Error::DecompressionFailed(e.to_string()))?;

    let written = inflater.total_out();
    if status != Status::StreamEnd {
        return Err(Error::DecompressionFailed(format!(
            "stream did not end after {written} of {uncompressed_size} bytes"
        )));
    }
    if written != uncompressed_size as u64 {
        return Err(Error::DecompressionFailed(format!(
            "expected {uncompressed_size} bytes but the stream produced {written}"
        )));
    }

    Ok(output)
}

/// Decides whether a new entry is stored compressed
///
/// A compressed copy is kept only when it is strictly smaller than `raw * tradeoff`, never when it
/// is at least as large as the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct CompressionPolicy {
    /// Whether compression is attempted at all
    #[builder(default = true)]
    pub enabled: bool,

    /// Entries smaller than this are always stored raw
    #[builder(default)]
    pub minimum_size: u64,

    /// Required ratio between compressed and raw size
    #[builder(default = 1.0)]
    pub tradeoff: f64,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        CompressionPolicy {
            enabled: true,
            minimum_size: 0,
            tradeoff: 1.0,
        }
    }
}

impl CompressionPolicy {
    /// Minimum entry size tModLoader compresses
    pub const TMODLOADER_MINIMUM_SIZE: u64 = 1 << 10;

    /// Compression ratio tModLoader requires before keeping a compressed entry
    pub const TMODLOADER_TRADEOFF: f64 = 0.9;

    /// The thresholds tModLoader uses when building archives
    pub fn tmodloader() -> Self {
        CompressionPolicy {
            enabled: true,
            minimum_size: Self::TMODLOADER_MINIMUM_SIZE,
            tradeoff: Self::TMODLOADER_TRADEOFF,
        }
    }

    /// Store every entry raw
    pub fn never() -> Self {
        CompressionPolicy {
            enabled: false,
            ..Default::default()
        }
    }

    /// Produce the bytes to store for `raw`, which are either `raw` itself or a smaller DEFLATE
    /// stream of it
    #[instrument(skip_all, fields(size = raw.len()), err)]
    pub fn apply(&self, raw: Vec<u8>) -> Result<Vec<u8>> {
        if !self.enabled || (raw.len() as u64) < self.minimum_size || raw.is_empty() {
            return Ok(raw);
        }

        let compressed = compress(&raw)?;
        let worth_it = compressed.len() < raw.len()
            && (compressed.len() as f64) < raw.len() as f64 * self.tradeoff;

        Ok(if worth_it { compressed } else { raw })
    }
}

/// Streaming reader over a single entry's payload
pub(crate) enum TmodBlockReader<'a, R: Read + Seek> {
    Raw(io::Take<&'a mut R>),
    Compressed(Box<DeflateDecoder<io::Take<&'a mut R>>>),
}

impl<'a, R: Read + Seek> TmodBlockReader<'a, R> {
    #[instrument(skip(reader))]
    pub fn new(
        reader: &'a mut R,
        start: u64,
        limit: u64,
        compression: CompressionMethod,
    ) -> Result<Self> {
        reader.seek(io::SeekFrom::Start(start))?;

        let limit_reader = reader.take(limit);
        Ok(match compression {
            CompressionMethod::None => TmodBlockReader::Raw(limit_reader),
            CompressionMethod::Deflate => {
                TmodBlockReader::Compressed(Box::new(DeflateDecoder::new(limit_reader)))
            }
        })
    }
}

impl<R: Read + Seek> Read for TmodBlockReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            TmodBlockReader::Raw(r) => r.read(buf),
            TmodBlockReader::Compressed(r) => r.read(buf),
        }
    }

    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            TmodBlockReader::Raw(r) => r.read_to_end(buf),
            TmodBlockReader::Compressed(r) => r.read_to_end(buf),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::compression::{compress, decompress, CompressionMethod, CompressionPolicy};
    use crate::error::{Error, Result};

    #[test]
    fn method_from_sizes() {
        assert_eq!(CompressionMethod::from_sizes(5, 5), CompressionMethod::None);
        assert_eq!(CompressionMethod::from_sizes(0, 0), CompressionMethod::None);
        assert_eq!(
            CompressionMethod::from_sizes(10_000, 30),
            CompressionMethod::Deflate
        );
    }

    #[test]
    fn decompress_to_declared_size() -> Result<()> {
        let raw = vec![b'A'; 10_000];
        let compressed = compress(&raw)?;
        assert!(compressed.len() < raw.len());

        let output = decompress(&compressed, raw.len())?;
        assert_eq!(output.len(), raw.len());
        assert_eq!(output, raw);

        Ok(())
    }

    #[test]
    fn decompress_known_stream() -> Result<()> {
        // "Hello World" deflated without a zlib header
        #[rustfmt::skip]
        let compressed = [
            0xF3, 0x48, 0xCD, 0xC9, 0xC9, 0x57, 0x08, 0xCF, 0x2F, 0xCA, 0x49, 0x01, 0x00,
        ];

        assert_eq!(decompress(&compressed, 11)?, b"Hello World");

        Ok(())
    }

    #[test]
    fn truncated_stream_fails() -> Result<()> {
        let raw: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 251) as u8).collect();
        let compressed = compress(&raw)?;

        let truncated = &compressed[..compressed.len() / 2];
        assert!(matches!(
            decompress(truncated, raw.len()),
            Err(Error::DecompressionFailed(_))
        ));

        Ok(())
    }

    #[test]
    fn wrong_declared_size_fails() -> Result<()> {
        let raw = vec![b'B'; 2048];
        let compressed = compress(&raw)?;

        assert!(matches!(
            decompress(&compressed, raw.len() - 1),
            Err(Error::DecompressionFailed(_))
        ));
        assert!(matches!(
            decompress(&compressed, raw.len() + 1),
            Err(Error::DecompressionFailed(_))
        ));

        Ok(())
    }

    #[test]
    fn policy_keeps_raw_when_compression_does_not_help() -> Result<()> {
        let stored = CompressionPolicy::default().apply(b"hello".to_vec())?;
        assert_eq!(stored, b"hello");

        Ok(())
    }

    #[test]
    fn policy_compresses_repetitive_data() -> Result<()> {
        let raw = vec![b'A'; 10_000];
        let stored = CompressionPolicy::default().apply(raw.clone())?;
        assert!(stored.len() < raw.len());
        assert_eq!(decompress(&stored, raw.len())?, raw);

        Ok(())
    }

    #[test]
    fn policy_thresholds() -> Result<()> {
        let small = vec![b'A'; 512];
        assert_eq!(CompressionPolicy::tmodloader().apply(small.clone())?, small);
        assert!(CompressionPolicy::default().apply(small.clone())?.len() < small.len());

        let large = vec![b'A'; 4096];
        assert_eq!(CompressionPolicy::never().apply(large.clone())?, large);

        let strict = CompressionPolicy::builder().tradeoff(0.0).build();
        assert_eq!(strict.apply(large.clone())?, large);

        Ok(())
    }
}
