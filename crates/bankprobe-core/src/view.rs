use crate::error::{FormatError, Result};

/// Byte order of multi-byte header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "snake_case"))]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        }
    }

    pub fn u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// Random-access, read-only view over a container.
///
/// Hosts implement [`size`](ByteView::size) and [`read_at`](ByteView::read_at);
/// the fixed-width readers are built on top of them. Every read is checked
/// against the view size and fails with [`FormatError::OutOfRange`] instead of
/// returning short data.
pub trait ByteView {
    /// Total size of the container in bytes.
    fn size(&self) -> u64;

    /// Fill `buf` with the bytes at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// File name hint (used for extension checks), if the host knows one.
    fn name(&self) -> Option<&str> {
        None
    }

    fn read_u8(&self, offset: u64) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_at(offset, &mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&self, offset: u64, order: ByteOrder) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_at(offset, &mut buf)?;
        Ok(order.u16(buf))
    }

    fn read_u32(&self, offset: u64, order: ByteOrder) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_at(offset, &mut buf)?;
        Ok(order.u32(buf))
    }

    fn read_u32_be(&self, offset: u64) -> Result<u32> {
        self.read_u32(offset, ByteOrder::Big)
    }

    /// Read a 4-byte ASCII tag.
    fn read_tag(&self, offset: u64) -> Result<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read a NUL-terminated string of at most `max_len` bytes.
    ///
    /// Stops at the first NUL, at `max_len`, or at the end of the view,
    /// whichever comes first. Returns `None` when the bytes are not
    /// printable ASCII, since such names are never real cue names.
    fn read_cstring(&self, offset: u64, max_len: usize) -> Result<Option<String>> {
        if offset >= self.size() {
            return Err(FormatError::OutOfRange {
                offset,
                len: 1,
                size: self.size(),
            });
        }
        let available = (self.size() - offset).min(max_len as u64) as usize;
        let mut buf = vec![0u8; available];
        self.read_at(offset, &mut buf)?;

        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        buf.truncate(end);
        if buf.iter().any(|&b| !(0x20..0x7F).contains(&b)) {
            return Ok(None);
        }
        // Printable ASCII is valid UTF-8.
        Ok(String::from_utf8(buf).ok())
    }
}

fn read_slice(data: &[u8], offset: u64, buf: &mut [u8]) -> Result<()> {
    let size = data.len() as u64;
    let end = offset.checked_add(buf.len() as u64);
    match end {
        Some(end) if end <= size => {
            let start = offset as usize;
            buf.copy_from_slice(&data[start..start + buf.len()]);
            Ok(())
        }
        _ => Err(FormatError::OutOfRange {
            offset,
            len: buf.len(),
            size,
        }),
    }
}

impl ByteView for [u8] {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        read_slice(self, offset, buf)
    }
}

impl ByteView for &[u8] {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        read_slice(self, offset, buf)
    }
}

impl ByteView for Vec<u8> {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        read_slice(self, offset, buf)
    }
}

/// In-memory container carrying its file name, for resolvers that check
/// extensions.
#[derive(Debug, Clone)]
pub struct NamedBytes {
    name: String,
    data: Vec<u8>,
}

impl NamedBytes {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

impl ByteView for NamedBytes {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        read_slice(&self.data, offset, buf)
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Case-insensitive extension check against a view's name hint.
///
/// Views without a name pass, so hosts that only have bytes can still
/// resolve by magic.
pub fn has_extension(view: &dyn ByteView, ext: &str) -> bool {
    let Some(name) = view.name() else {
        return true;
    };
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
