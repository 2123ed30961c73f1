//! Chunked package compression.
//!
//! The summary stays uncompressed. Everything after it is cut into chunks:
//! the rest of the header first, then export payloads merged in file order
//! until a chunk would exceed the configured maximum. Each chunk is
//! compressed on its own so a loader can inflate them independently.

use std::io::{Seek, SeekFrom, Write};

use tracing::{debug, info};

use crate::error::{LinkError, LinkResult};
use crate::summary::{CompressedChunk, PackageSummary};

/// Compression flag stored in the summary for zstd chunks.
pub const COMPRESS_ZSTD: u32 = 0x01;

/// Byte codec used for individual chunks.
pub trait CompressionCodec {
    /// Value stored in the summary's compression flags.
    fn flags(&self) -> u32;

    fn compress(&self, data: &[u8]) -> LinkResult<Vec<u8>>;

    fn decompress(&self, data: &[u8], uncompressed_size: usize) -> LinkResult<Vec<u8>>;
}

/// zstd frames, one per chunk.
#[derive(Clone, Copy, Debug)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(3)
    }
}

impl CompressionCodec for ZstdCodec {
    fn flags(&self) -> u32 {
        COMPRESS_ZSTD
    }

    fn compress(&self, data: &[u8]) -> LinkResult<Vec<u8>> {
        zstd::encode_all(data, self.level).map_err(|e| LinkError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], uncompressed_size: usize) -> LinkResult<Vec<u8>> {
        let out = zstd::decode_all(data).map_err(|e| LinkError::Compression(e.to_string()))?;
        if out.len() != uncompressed_size {
            return Err(LinkError::Compression(format!(
                "chunk inflated to {} bytes, expected {uncompressed_size}",
                out.len()
            )));
        }
        Ok(out)
    }
}

/// Codec for the compression flags found in a summary.
pub fn codec_for_flags(flags: u32) -> LinkResult<Box<dyn CompressionCodec>> {
    match flags {
        COMPRESS_ZSTD => Ok(Box::new(ZstdCodec::default())),
        other => Err(LinkError::Compression(format!(
            "unknown compression flags {other:#x}"
        ))),
    }
}

/// Merges consecutive byte ranges into chunks of bounded uncompressed size.
#[derive(Debug)]
pub struct ChunkPlanner {
    max_chunk_size: u32,
    chunks: Vec<CompressedChunk>,
    current: CompressedChunk,
}

impl ChunkPlanner {
    /// Start with an initial range of `initial_size` bytes at `start_offset`.
    pub fn new(start_offset: u32, initial_size: u32, max_chunk_size: u32) -> Self {
        Self {
            max_chunk_size,
            chunks: Vec::new(),
            current: CompressedChunk {
                uncompressed_offset: start_offset,
                uncompressed_size: initial_size,
                ..Default::default()
            },
        }
    }

    /// Append the next range, opening a new chunk if this one would grow too large.
    pub fn add(&mut self, size: u32) {
        if self.current.uncompressed_size.saturating_add(size) > self.max_chunk_size {
            self.start_chunk(size);
        } else {
            self.current.uncompressed_size += size;
        }
    }

    fn start_chunk(&mut self, size: u32) {
        let offset = self.current.uncompressed_end();
        if self.current.uncompressed_size > 0 {
            self.chunks.push(self.current);
        }
        self.current = CompressedChunk {
            uncompressed_offset: offset,
            uncompressed_size: size,
            ..Default::default()
        };
    }

    pub fn finish(mut self) -> Vec<CompressedChunk> {
        self.start_chunk(0);
        self.chunks
    }
}

/// Plan the chunk table for an uncompressed package image.
pub fn plan_chunks(
    summary_len: u32,
    total_header_size: u32,
    export_sizes: impl IntoIterator<Item = u32>,
    max_chunk_size: u32,
) -> Vec<CompressedChunk> {
    let mut planner = ChunkPlanner::new(
        summary_len,
        total_header_size.saturating_sub(summary_len),
        max_chunk_size,
    );
    for size in export_sizes {
        planner.add(size);
    }
    planner.finish()
}

/// Write the chunk-compressed form of `image` to `out`.
///
/// The summary is written once with only the uncompressed chunk fields, the
/// chunks are compressed behind it, and the summary is rewritten in place
/// with the final compressed offsets and sizes.
pub fn compress_package<W: Write + Seek>(
    image: &[u8],
    export_sizes: &[u32],
    codec: &dyn CompressionCodec,
    max_chunk_size: u32,
    out: &mut W,
) -> LinkResult<PackageSummary> {
    let (mut summary, summary_len) = PackageSummary::from_bytes(image)?;
    if summary.is_compressed() {
        return Err(LinkError::Compression("package is already compressed".into()));
    }

    let chunks = plan_chunks(
        summary_len as u32,
        summary.total_header_size,
        export_sizes.iter().copied(),
        max_chunk_size,
    );
    let covered = chunks.last().map_or(summary_len as u32, |c| c.uncompressed_end());
    if covered as usize != image.len() {
        return Err(LinkError::Corrupt {
            offset: covered as u64,
            reason: format!("chunks cover {covered} of {} bytes", image.len()),
        });
    }

    summary.compression_flags = codec.flags();
    summary.compressed_chunks = chunks;
    let placeholder = summary.to_bytes();
    out.seek(SeekFrom::Start(0))?;
    out.write_all(&placeholder)?;

    let mut position = placeholder.len() as u32;
    for chunk in &mut summary.compressed_chunks {
        let start = chunk.uncompressed_offset as usize;
        let end = chunk.uncompressed_end() as usize;
        let compressed = codec.compress(&image[start..end])?;
        out.write_all(&compressed)?;
        chunk.compressed_offset = position;
        chunk.compressed_size = compressed.len() as u32;
        position += chunk.compressed_size;
    }

    let final_header = summary.to_bytes();
    debug_assert_eq!(final_header.len(), placeholder.len());
    out.seek(SeekFrom::Start(0))?;
    out.write_all(&final_header)?;
    out.flush()?;

    info!(
        chunks = summary.compressed_chunks.len(),
        uncompressed = image.len(),
        compressed = position,
        "compressed package"
    );
    Ok(summary)
}

/// Rebuild the uncompressed image of a package. Uncompressed input is
/// returned as is.
pub fn decompress_package(data: &[u8]) -> LinkResult<Vec<u8>> {
    let (summary, _) = PackageSummary::from_bytes(data)?;
    if !summary.is_compressed() {
        return Ok(data.to_vec());
    }
    let codec = codec_for_flags(summary.compression_flags)?;

    let plain = PackageSummary {
        compression_flags: 0,
        compressed_chunks: Vec::new(),
        ..summary.clone()
    };
    let mut image = plain.to_bytes();
    for (index, chunk) in summary.compressed_chunks.iter().enumerate() {
        if chunk.uncompressed_offset as usize != image.len() {
            return Err(LinkError::Corrupt {
                offset: chunk.uncompressed_offset as u64,
                reason: format!("chunk {index} does not continue at {}", image.len()),
            });
        }
        let start = chunk.compressed_offset as usize;
        let end = start + chunk.compressed_size as usize;
        let Some(compressed) = data.get(start..end) else {
            return Err(LinkError::Corrupt {
                offset: start as u64,
                reason: format!("chunk {index} extends past end of file"),
            });
        };
        let inflated = codec.decompress(compressed, chunk.uncompressed_size as usize)?;
        image.extend_from_slice(&inflated);
    }
    debug!(
        chunks = summary.compressed_chunks.len(),
        size = image.len(),
        "decompressed package"
    );
    Ok(image)
}
