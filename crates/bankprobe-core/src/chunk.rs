use crate::error::{FormatError, Result};
use crate::view::ByteView;

/// Size of a chunk header: 4-byte tag + big-endian u32 size.
pub const CHUNK_HEADER_SIZE: u64 = 8;

/// A chunk located by [`ChunkWalker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// 4-byte ASCII tag.
    pub tag: [u8; 4],
    /// Absolute offset of the chunk header.
    pub offset: u64,
    /// Chunk size, header included.
    pub size: u64,
}

impl Chunk {
    /// Absolute offset of the chunk payload (after the 8-byte header).
    pub fn data_offset(&self) -> u64 {
        self.offset + CHUNK_HEADER_SIZE
    }

    /// Absolute offset of the next chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Sequential scanner over `[tag][size][payload]` chunks where `size` counts
/// the header too.
///
/// Unknown chunks are skipped. The walker is an iterator, so a caller that
/// needs to inspect a match and keep going just calls [`find`](Self::find)
/// again.
pub struct ChunkWalker<'a> {
    view: &'a dyn ByteView,
    pos: u64,
    end: u64,
    failed: bool,
}

impl<'a> ChunkWalker<'a> {
    /// Walk chunks in `[start, end)`. `end` is clamped to the view size.
    pub fn new(view: &'a dyn ByteView, start: u64, end: u64) -> Self {
        Self {
            view,
            pos: start,
            end: end.min(view.size()),
            failed: false,
        }
    }

    /// Walk from `start` to the end of the view.
    pub fn from_offset(view: &'a dyn ByteView, start: u64) -> Self {
        Self::new(view, start, view.size())
    }

    /// Advance to the next chunk tagged `tag`.
    pub fn find(&mut self, tag: &[u8; 4]) -> Result<Chunk> {
        for chunk in self.by_ref() {
            let chunk = chunk?;
            if &chunk.tag == tag {
                return Ok(chunk);
            }
        }
        Err(FormatError::NotFound {
            tag: String::from_utf8_lossy(tag).into_owned(),
        })
    }

    fn read_chunk(&self) -> Result<Chunk> {
        let container_size = self.view.size();
        let out_of_bounds = |size| FormatError::ChunkOutOfBounds {
            offset: self.pos,
            size,
            container_size,
        };

        if self.pos + CHUNK_HEADER_SIZE > container_size {
            return Err(out_of_bounds(CHUNK_HEADER_SIZE));
        }
        let tag = self.view.read_tag(self.pos)?;
        let size = u64::from(self.view.read_u32_be(self.pos + 4)?);

        // A chunk smaller than its own header would never advance.
        if size < CHUNK_HEADER_SIZE || self.pos + size > container_size {
            return Err(out_of_bounds(size));
        }

        Ok(Chunk {
            tag,
            offset: self.pos,
            size,
        })
    }
}

impl Iterator for ChunkWalker<'_> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.end {
            return None;
        }
        match self.read_chunk() {
            Ok(chunk) => {
                self.pos = chunk.end();
                Some(Ok(chunk))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(payload.len() as u32 + 8).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn finds_tag_after_unknown_chunks() {
        let mut data = chunk(b"FILL", &[0; 4]);
        data.extend(chunk(b"XTRA", &[1, 2, 3]));
        data.extend(chunk(b"SNDS", &[9; 8]));

        let mut walker = ChunkWalker::from_offset(&data, 0);
        let found = walker.find(b"SNDS").unwrap();
        assert_eq!(found.offset, 12 + 11);
        assert_eq!(found.size, 16);
        assert_eq!(found.data_offset(), found.offset + 8);
        assert_eq!(&found.tag, b"SNDS");
    }

    #[test]
    fn resumes_after_match() {
        let mut data = chunk(b"SNDS", &[1]);
        data.extend(chunk(b"SNDS", &[2]));

        let mut walker = ChunkWalker::from_offset(&data, 0);
        let first = walker.find(b"SNDS").unwrap();
        let second = walker.find(b"SNDS").unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 9);
        assert!(matches!(
            walker.find(b"SNDS"),
            Err(FormatError::NotFound { .. })
        ));
    }

    #[test]
    fn missing_tag_is_not_found() {
        let data = chunk(b"FILL", &[0; 4]);
        let err = ChunkWalker::from_offset(&data, 0).find(b"SHDR").unwrap_err();
        assert_eq!(
            err,
            FormatError::NotFound {
                tag: "SHDR".into()
            }
        );
    }

    #[test]
    fn oversized_chunk_is_out_of_bounds() {
        let mut data = b"FILL".to_vec();
        data.extend_from_slice(&0x1000u32.to_be_bytes());
        data.extend_from_slice(&[0; 8]);

        let err = ChunkWalker::from_offset(&data, 0).find(b"SNDS").unwrap_err();
        assert_eq!(
            err,
            FormatError::ChunkOutOfBounds {
                offset: 0,
                size: 0x1000,
                container_size: 16
            }
        );
    }

    #[test]
    fn zero_size_chunk_does_not_spin() {
        let mut data = b"FILL".to_vec();
        data.extend_from_slice(&0u32.to_be_bytes());
        let mut walker = ChunkWalker::from_offset(&data, 0);
        assert!(matches!(
            walker.next(),
            Some(Err(FormatError::ChunkOutOfBounds { .. }))
        ));
        assert!(walker.next().is_none());
    }

    #[test]
    fn sub_region_limits_the_scan() {
        let mut data = chunk(b"FILL", &[]);
        data.extend(chunk(b"SNDS", &[]));
        let err = ChunkWalker::new(&data, 0, 8).find(b"SNDS").unwrap_err();
        assert!(matches!(err, FormatError::NotFound { .. }));
    }
}
