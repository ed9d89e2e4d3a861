use thiserror::Error;

/// Errors produced while resolving a container into a stream descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Magic or extension mismatch. The caller should try the next resolver.
    #[error("not a {format} container")]
    NotRecognized { format: &'static str },

    /// Offsets or sizes that contradict each other or the container size.
    #[error("malformed {context} header: {message}")]
    MalformedHeader {
        context: &'static str,
        message: String,
    },

    #[error(
        "chunk at {offset:#x} with size {size:#x} runs past end of container ({container_size:#x})"
    )]
    ChunkOutOfBounds {
        offset: u64,
        size: u64,
        container_size: u64,
    },

    #[error("chunk '{tag}' not found")]
    NotFound { tag: String },

    /// Recognized container carrying a codec this crate does not describe.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("unsupported cue layout: flag {flag:#04x} at offset {offset:#x}")]
    UnsupportedCueLayout { flag: u8, offset: u64 },

    #[error("stream index {index} out of range (container has {count} streams)")]
    IndexOutOfRange { index: u32, count: u32 },

    #[error("bank has no payload segment")]
    MissingPayload,

    /// More than one wavebank could own the bank, and nothing in the
    /// index file says which.
    #[error("cannot pick a wavebank: {wavebanks} wavebanks for a bank of {streams} streams")]
    AmbiguousWavebank { wavebanks: usize, streams: u32 },

    /// A read fell outside the byte view.
    #[error("read of {len} bytes at {offset:#x} is out of range (size {size:#x})")]
    OutOfRange { offset: u64, len: usize, size: u64 },
}

impl FormatError {
    pub fn malformed(context: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedHeader {
            context,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FormatError>;
