//! Running Adler-32 and CRC-32 accumulators.
//!
//! Both follow the zlib/gzip definitions, so feeding the same bytes in any number of chunks yields
//! the same value as a single call.

use crc::{Crc, Digest, CRC_32_ISO_HDLC};

static CRC_32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Adler-32 as used by zlib streams, seeded with `1`
#[derive(Clone)]
pub struct Adler32 {
    state: adler2::Adler32,
}

impl Adler32 {
    pub const SEED: u32 = 1;

    pub fn new() -> Self {
        Adler32 {
            state: adler2::Adler32::new(),
        }
    }

    /// The accumulated value, [`Adler32::SEED`] when nothing was appended yet
    pub fn hash(&self) -> u32 {
        self.state.checksum()
    }

    pub fn append(&mut self, input: &[u8]) {
        self.state.write_slice(input);
    }

    /// Reset to the seed and append `input`
    pub fn compute(&mut self, input: &[u8]) -> u32 {
        self.state = adler2::Adler32::new();
        self.append(input);
        self.hash()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Adler32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Adler32({:#010X})", self.hash())
    }
}

/// CRC-32 as used by gzip and zip, seeded with `0`
#[derive(Clone)]
pub struct Crc32 {
    digest: Digest<'static, u32>,
}

impl Crc32 {
    pub const SEED: u32 = 0;

    pub fn new() -> Self {
        Crc32 {
            digest: CRC_32.digest(),
        }
    }

    /// The accumulated value, [`Crc32::SEED`] when nothing was appended yet
    pub fn hash(&self) -> u32 {
        self.digest.clone().finalize()
    }

    pub fn append(&mut self, input: &[u8]) {
        self.digest.update(input);
    }

    /// Reset to the seed and append `input`
    pub fn compute(&mut self, input: &[u8]) -> u32 {
        self.digest = CRC_32.digest();
        self.append(input);
        self.hash()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Crc32({:#010X})", self.hash())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::checksum::{Adler32, Crc32};

    const WIKIPEDIA: &[u8] = b"Wikipedia";
    const FOX: &[u8] = b"The quick brown fox jumps over the lazy dog";

    #[test]
    fn adler32_seed() {
        assert_eq!(Adler32::new().hash(), 1);
        assert_eq!(Adler32::new().compute(&[]), 1);
    }

    #[test]
    fn adler32_known_values() {
        assert_eq!(Adler32::new().compute(WIKIPEDIA), 0x11E60398);
        assert_eq!(Adler32::new().compute(FOX), 0x5BDC0FDA);
    }

    #[test]
    fn adler32_chunking() {
        let mut whole = Adler32::new();
        whole.append(FOX);

        let mut chunked = Adler32::new();
        for chunk in FOX.chunks(7) {
            chunked.append(chunk);
        }

        assert_eq!(whole.hash(), chunked.hash());

        // compute discards whatever was accumulated before
        assert_eq!(chunked.compute(WIKIPEDIA), Adler32::new().compute(WIKIPEDIA));
    }

    #[test]
    fn crc32_seed() {
        assert_eq!(Crc32::new().hash(), 0);
        assert_eq!(Crc32::new().compute(&[]), 0);
    }

    #[test]
    fn crc32_known_values() {
        assert_eq!(Crc32::new().compute(b"123456789"), 0xCBF43926);
        assert_eq!(Crc32::new().compute(FOX), 0x414FA339);
    }

    #[test]
    fn crc32_chunking() {
        let mut whole = Crc32::new();
        whole.append(FOX);

        let mut chunked = Crc32::new();
        let (left, right) = FOX.split_at(10);
        chunked.append(left);
        chunked.append(right);

        assert_eq!(whole.hash(), chunked.hash());
        assert_eq!(chunked.compute(FOX), whole.hash());
    }
}
