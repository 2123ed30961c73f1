use serde::Serialize;
use ulink_object::{Guid, PackageFlags};

use crate::error::{LinkError, LinkResult};
use crate::wire::{Decoder, Encoder};

/// First four bytes of every package.
pub const PACKAGE_FILE_TAG: u32 = 0x9E2A83C1;

/// Current package format version.
pub const PACKAGE_FILE_VERSION: u32 = 1;

/// Counts recorded for one save generation of a package.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GenerationInfo {
    pub export_count: u32,
    pub name_count: u32,
    pub net_object_count: u32,
}

/// One compressed block of a chunk-compressed package.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompressedChunk {
    pub uncompressed_offset: u32,
    pub uncompressed_size: u32,
    pub compressed_offset: u32,
    pub compressed_size: u32,
}

impl CompressedChunk {
    pub fn uncompressed_end(&self) -> u32 {
        self.uncompressed_offset + self.uncompressed_size
    }
}

/// Fixed header at offset 0 of a package file.
///
/// The encoded size depends only on the folder name, the generation count
/// and the chunk count, so a summary can be written as a placeholder and
/// overwritten in place once offsets are known.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub file_version: u32,
    pub engine_version: u32,
    /// Offset of the first export payload.
    pub total_header_size: u32,
    pub folder_name: String,
    pub package_flags: u32,
    pub name_count: u32,
    pub name_offset: u32,
    pub import_count: u32,
    pub import_offset: u32,
    pub export_count: u32,
    pub export_offset: u32,
    pub depends_offset: u32,
    pub import_export_guids_offset: u32,
    pub import_guids_count: u32,
    pub export_guids_count: u32,
    /// 0 when the package has no thumbnails.
    pub thumbnail_table_offset: u32,
    pub guid: Guid,
    pub generations: Vec<GenerationInfo>,
    /// CRC32 of the upper-cased base filename.
    pub package_source: u32,
    pub compression_flags: u32,
    pub compressed_chunks: Vec<CompressedChunk>,
}

impl PackageSummary {
    pub fn new(engine_version: u32) -> Self {
        Self {
            file_version: PACKAGE_FILE_VERSION,
            engine_version,
            ..Default::default()
        }
    }

    pub fn flags(&self) -> PackageFlags {
        PackageFlags::from_bits(self.package_flags)
    }

    pub fn is_compressed(&self) -> bool {
        self.compression_flags != 0 || !self.compressed_chunks.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.u32(PACKAGE_FILE_TAG)
            .u32(self.file_version)
            .u32(self.engine_version)
            .u32(self.total_header_size)
            .str(&self.folder_name)
            .u32(self.package_flags)
            .u32(self.name_count)
            .u32(self.name_offset)
            .u32(self.import_count)
            .u32(self.import_offset)
            .u32(self.export_count)
            .u32(self.export_offset)
            .u32(self.depends_offset)
            .u32(self.import_export_guids_offset)
            .u32(self.import_guids_count)
            .u32(self.export_guids_count)
            .u32(self.thumbnail_table_offset)
            .guid(&self.guid);
        enc.u32(self.generations.len() as u32);
        for generation in &self.generations {
            enc.u32(generation.export_count)
                .u32(generation.name_count)
                .u32(generation.net_object_count);
        }
        enc.u32(self.package_source).u32(self.compression_flags);
        enc.u32(self.compressed_chunks.len() as u32);
        for chunk in &self.compressed_chunks {
            enc.u32(chunk.uncompressed_offset)
                .u32(chunk.uncompressed_size)
                .u32(chunk.compressed_offset)
                .u32(chunk.compressed_size);
        }
        enc.into_bytes()
    }

    /// Parse a summary from the start of `data`, returning it and its encoded length.
    pub fn from_bytes(data: &[u8]) -> LinkResult<(Self, usize)> {
        let mut dec = Decoder::new(data);
        let tag = dec.u32()?;
        if tag != PACKAGE_FILE_TAG {
            return Err(LinkError::InvalidMagic {
                expected: PACKAGE_FILE_TAG,
                actual: tag,
            });
        }
        let file_version = dec.u32()?;
        if file_version == 0 || file_version > PACKAGE_FILE_VERSION {
            return Err(LinkError::UnsupportedVersion(file_version));
        }

        let mut summary = Self {
            file_version,
            engine_version: dec.u32()?,
            total_header_size: dec.u32()?,
            folder_name: dec.str()?,
            package_flags: dec.u32()?,
            name_count: dec.u32()?,
            name_offset: dec.u32()?,
            import_count: dec.u32()?,
            import_offset: dec.u32()?,
            export_count: dec.u32()?,
            export_offset: dec.u32()?,
            depends_offset: dec.u32()?,
            import_export_guids_offset: dec.u32()?,
            import_guids_count: dec.u32()?,
            export_guids_count: dec.u32()?,
            thumbnail_table_offset: dec.u32()?,
            guid: dec.guid()?,
            ..Default::default()
        };

        let generations = dec.count(12, "generation")?;
        for _ in 0..generations {
            summary.generations.push(GenerationInfo {
                export_count: dec.u32()?,
                name_count: dec.u32()?,
                net_object_count: dec.u32()?,
            });
        }
        summary.package_source = dec.u32()?;
        summary.compression_flags = dec.u32()?;
        let chunks = dec.count(16, "compressed chunk")?;
        for _ in 0..chunks {
            summary.compressed_chunks.push(CompressedChunk {
                uncompressed_offset: dec.u32()?,
                uncompressed_size: dec.u32()?,
                compressed_offset: dec.u32()?,
                compressed_size: dec.u32()?,
            });
        }
        Ok((summary, dec.position()))
    }
}

/// Package source identifier: CRC32 of the upper-cased base filename.
pub fn package_source(base_filename: &str) -> u32 {
    crc32fast::hash(base_filename.to_uppercase().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PackageSummary {
        PackageSummary {
            folder_name: "Maps".into(),
            name_count: 12,
            name_offset: 120,
            guid: Guid::new(),
            generations: vec![GenerationInfo {
                export_count: 3,
                name_count: 12,
                net_object_count: 3,
            }],
            package_source: package_source("Game"),
            ..PackageSummary::new(4)
        }
    }

    #[test]
    fn summary_parses_what_it_wrote() {
        let summary = sample();
        let bytes = summary.to_bytes();
        let (parsed, len) = PackageSummary::from_bytes(&bytes).unwrap();
        assert_eq!(len, bytes.len());
        assert_eq!(parsed, summary);
    }

    #[test]
    fn offsets_do_not_change_encoded_size() {
        let mut summary = sample();
        let before = summary.to_bytes().len();
        summary.total_header_size = u32::MAX;
        summary.export_offset = 99_999;
        summary.generations[0].net_object_count = 77;
        assert_eq!(summary.to_bytes().len(), before);
    }

    #[test]
    fn bad_tag_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[0] = 0;
        assert!(matches!(
            PackageSummary::from_bytes(&bytes),
            Err(LinkError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[4..8].copy_from_slice(&99u32.to_be_bytes());
        assert!(matches!(
            PackageSummary::from_bytes(&bytes),
            Err(LinkError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn package_source_ignores_case() {
        assert_eq!(package_source("Game"), package_source("GAME"));
        assert_ne!(package_source("Game"), package_source("Other"));
    }
}
