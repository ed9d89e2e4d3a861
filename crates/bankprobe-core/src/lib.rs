//! Shared pieces for the bankprobe format readers.
//!
//! Format crates resolve a container into a [`StreamDescriptor`]: codec,
//! channel layout, sample counts, loop points and the byte range of the
//! stream. No audio is decoded here; the descriptor is what a decoder needs
//! to start.

pub mod chunk;
pub mod descriptor;
pub mod error;
pub mod samples;
pub mod view;
pub mod xma;

pub use chunk::{Chunk, ChunkWalker};
pub use descriptor::{CodecKind, CodecSetup, StreamDescriptor, MAX_STREAM_NAME};
pub use error::{FormatError, Result};
pub use view::{ByteOrder, ByteView, NamedBytes};
