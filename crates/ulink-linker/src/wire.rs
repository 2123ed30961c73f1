//! Big-endian primitives shared by the package writer and reader.

use ulink_object::Guid;

use crate::error::{LinkError, LinkResult};
use crate::index::PackageIndex;

/// `len` as a 32-bit element count or size.
pub(crate) fn len_u32(len: usize, what: &str) -> LinkResult<u32> {
    u32::try_from(len).map_err(|_| LinkError::Corrupt {
        offset: 0,
        reason: format!("{what} length {len} does not fit in 32 bits"),
    })
}

/// Append-only encoder over a byte buffer.
#[derive(Debug, Default)]
pub(crate) struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Write `len` as a u32 count.
    pub fn count(&mut self, len: usize, what: &str) -> LinkResult<&mut Self> {
        Ok(self.u32(len_u32(len, what)?))
    }

    pub fn index(&mut self, value: PackageIndex) -> &mut Self {
        self.i32(value.raw())
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn guid(&mut self, value: &Guid) -> &mut Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor over package bytes.
pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], offset: u32) -> LinkResult<Self> {
        let pos = offset as usize;
        if pos > data.len() {
            return Err(LinkError::Corrupt {
                offset: offset as u64,
                reason: format!("offset past end of {} byte package", data.len()),
            });
        }
        Ok(Self { data, pos })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize, what: &str) -> LinkResult<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(LinkError::Corrupt {
                offset: self.pos as u64,
                reason: format!("truncated {what}"),
            }),
        }
    }

    fn array<const N: usize>(&mut self, what: &str) -> LinkResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> LinkResult<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn u32(&mut self) -> LinkResult<u32> {
        self.array("u32").map(u32::from_be_bytes)
    }

    pub fn i32(&mut self) -> LinkResult<i32> {
        self.array("i32").map(i32::from_be_bytes)
    }

    pub fn u64(&mut self) -> LinkResult<u64> {
        self.array("u64").map(u64::from_be_bytes)
    }

    pub fn index(&mut self) -> LinkResult<PackageIndex> {
        self.i32().map(PackageIndex::from_raw)
    }

    pub fn str(&mut self) -> LinkResult<String> {
        let offset = self.pos;
        let len = self.u32()? as usize;
        let bytes = self.take(len, "string")?;
        String::from_utf8(bytes.to_vec()).map_err(|_| LinkError::Corrupt {
            offset: offset as u64,
            reason: "string is not UTF-8".into(),
        })
    }

    pub fn guid(&mut self) -> LinkResult<Guid> {
        self.array::<16>("guid").map(Guid::from_bytes)
    }

    pub fn bytes(&mut self, len: usize) -> LinkResult<&'a [u8]> {
        self.take(len, "byte block")
    }

    /// Element count about to be read, rejected if it cannot fit in the
    /// remaining bytes at `min_size` bytes per element.
    pub fn count(&mut self, min_size: usize, what: &str) -> LinkResult<usize> {
        let offset = self.pos;
        let count = self.u32()? as usize;
        let remaining = self.data.len() - self.pos;
        if count.saturating_mul(min_size.max(1)) > remaining {
            return Err(LinkError::Corrupt {
                offset: offset as u64,
                reason: format!("{what} count {count} exceeds package size"),
            });
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_counts_are_rejected() {
        assert_eq!(len_u32(12, "names").unwrap(), 12);
        let err = len_u32(u32::MAX as usize + 1, "depends").unwrap_err();
        assert!(matches!(err, LinkError::Corrupt { reason, .. } if reason.contains("depends")));

        let mut enc = Encoder::new();
        enc.count(3, "imports").unwrap().u8(1);
        assert_eq!(enc.into_bytes(), vec![0, 0, 0, 3, 1]);
    }

    #[test]
    fn encode_then_decode_mixed() {
        let guid = Guid::new();
        let mut enc = Encoder::new();
        enc.u32(7).i32(-2).u64(1 << 40).str("Core").guid(&guid).u8(9);
        let bytes = enc.into_bytes();
        assert_eq!(&bytes[..4], &[0, 0, 0, 7]);

        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.u32().unwrap(), 7);
        assert_eq!(dec.i32().unwrap(), -2);
        assert_eq!(dec.u64().unwrap(), 1 << 40);
        assert_eq!(dec.str().unwrap(), "Core");
        assert_eq!(dec.guid().unwrap(), guid);
        assert_eq!(dec.u8().unwrap(), 9);
        assert_eq!(dec.position(), bytes.len());
    }

    #[test]
    fn truncated_read_reports_offset() {
        let mut dec = Decoder::new(&[0, 0, 1]);
        let err = dec.u32().unwrap_err();
        assert!(matches!(err, LinkError::Corrupt { offset: 0, .. }));
    }

    #[test]
    fn oversized_count_is_rejected() {
        let bytes = 1000u32.to_be_bytes();
        let mut dec = Decoder::new(&bytes);
        assert!(matches!(dec.count(4, "name"), Err(LinkError::Corrupt { .. })));
    }

    #[test]
    fn seek_past_end_is_rejected() {
        assert!(Decoder::at(&[1, 2], 3).is_err());
        assert!(Decoder::at(&[1, 2], 2).is_ok());
    }
}
