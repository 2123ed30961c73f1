//! Thumbnail data blocks and their table of contents.

use serde::Serialize;
use ulink_object::{ObjectGraph, ObjectHandle};

use crate::context::SaveContext;
use crate::error::{LinkError, LinkResult};
use crate::wire::{len_u32, Decoder, Encoder};

/// One table-of-contents entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ThumbnailEntry {
    pub class_name: String,
    /// Path of the object inside the package.
    pub object_path: String,
    /// File offset of the data block.
    pub offset: u32,
}

/// Encode the thumbnails of every exported object of `package`, as they
/// will appear at file offset `start`. Returns the bytes and the table of
/// contents offset, or `None` when there is nothing to write.
pub(crate) fn encode_thumbnails(
    graph: &ObjectGraph,
    ctx: &SaveContext,
    package: ObjectHandle,
    start: u32,
) -> LinkResult<Option<(Vec<u8>, u32)>> {
    let Some(data) = graph.package_data(package) else {
        return Ok(None);
    };
    let thumbnails = &data.thumbnails;
    let saved: Vec<_> = thumbnails
        .iter()
        .filter(|t| ctx.is_export(t.object))
        .collect();
    if saved.is_empty() {
        return Ok(None);
    }

    let mut enc = Encoder::new();
    let mut entries = Vec::with_capacity(saved.len());
    for thumbnail in &saved {
        entries.push(ThumbnailEntry {
            class_name: graph.class_name(thumbnail.object).to_string(),
            object_path: graph.path_name(thumbnail.object, Some(package)),
            offset: offset_after(start, enc.len())?,
        });
        enc.u32(thumbnail.width)
            .u32(thumbnail.height)
            .count(thumbnail.image.len(), "thumbnail image")?
            .bytes(&thumbnail.image);
    }

    let toc_offset = offset_after(start, enc.len())?;
    enc.count(entries.len(), "thumbnail table")?;
    for entry in &entries {
        enc.str(&entry.class_name)
            .str(&entry.object_path)
            .u32(entry.offset);
    }
    Ok(Some((enc.into_bytes(), toc_offset)))
}

fn offset_after(start: u32, written: usize) -> LinkResult<u32> {
    len_u32(written, "thumbnail data")?
        .checked_add(start)
        .ok_or_else(|| LinkError::Corrupt {
            offset: u64::from(start),
            reason: "thumbnail data exceeds 4 GiB".into(),
        })
}

/// Parse the table of contents at `offset`.
pub(crate) fn decode_thumbnail_table(data: &[u8], offset: u32) -> LinkResult<Vec<ThumbnailEntry>> {
    let mut dec = Decoder::at(data, offset)?;
    let count = dec.count(12, "thumbnail")?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(ThumbnailEntry {
            class_name: dec.str()?,
            object_path: dec.str()?,
            offset: dec.u32()?,
        });
    }
    Ok(entries)
}

/// Width, height and image bytes of the data block at `offset`.
pub(crate) fn decode_thumbnail(data: &[u8], offset: u32) -> LinkResult<(u32, u32, Vec<u8>)> {
    let mut dec = Decoder::at(data, offset)?;
    let width = dec.u32()?;
    let height = dec.u32()?;
    let len = dec.u32()? as usize;
    Ok((width, height, dec.bytes(len)?.to_vec()))
}
