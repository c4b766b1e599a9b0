//! Zlib framing for sample payloads.
//!
//! When an archive is written with compression, every stored payload is
//! `[uncompressed_size: u64 LE][zlib stream]`. The archive flags record
//! this, so reading never has to guess.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Compress a payload at `level` (clamped to 0..=9).
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(8 + data.len() / 2);
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    let mut encoder = ZlibEncoder::new(out, Compression::new(level.min(9)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inverse of [`compress`]. A size prefix that disagrees with the stream
/// is a malformed archive.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let (prefix, stream) = data
        .split_first_chunk::<8>()
        .ok_or_else(|| Error::malformed("compressed payload shorter than its size prefix"))?;
    let declared = u64::from_le_bytes(*prefix);
    let expected = usize::try_from(declared)
        .map_err(|_| Error::malformed(format!("compressed payload claims {declared} bytes")))?;

    // One byte past the declared size is enough to detect a longer stream.
    let mut out = Vec::with_capacity(expected.min(stream.len().saturating_mul(64)));
    ZlibDecoder::new(stream)
        .take(declared.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| Error::malformed(format!("zlib payload: {e}")))?;
    if out.len() != expected {
        return Err(Error::malformed(format!(
            "compressed payload expanded to {} bytes, header says {}",
            out.len(),
            expected
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let original = b"Hello, World! This is some test data that should compress well when repeated. ".repeat(100);
        let compressed = compress(&original, 6).unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_empty_and_level_zero() {
        assert_eq!(decompress(&compress(b"", 9).unwrap()).unwrap(), b"");
        let stored = compress(b"Short data", 0).unwrap();
        assert_eq!(decompress(&stored).unwrap(), b"Short data");
    }

    #[test]
    fn test_corrupt_payloads() {
        assert!(matches!(decompress(b"abc"), Err(Error::MalformedArchive(_))));

        let mut bad = compress(b"payload payload payload", 6).unwrap();
        bad[0] = bad[0].wrapping_add(1);
        assert!(matches!(decompress(&bad), Err(Error::MalformedArchive(_))));
    }

    #[test]
    fn test_expansion_stops_past_declared_size() {
        let mut short = compress(&vec![7u8; 1 << 20], 9).unwrap();
        short[..8].copy_from_slice(&16u64.to_le_bytes());
        match decompress(&short) {
            Err(Error::MalformedArchive(msg)) => assert!(msg.contains("17 bytes"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
