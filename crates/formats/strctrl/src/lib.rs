//! 3DO stream files (`.str`).
//!
//! A `CTRL` chunk at offset 0 holds the offset of the first data chunk.
//! Chunks follow in any order; the audio format sits in an `SNDS` chunk
//! whose payload starts with an `SHDR` sub-header. Audio blocks are spread
//! through the rest of the file, so the stream range is the whole file and
//! block walking is left to the decoder's layout engine.

use bankprobe_core::view::has_extension;
use bankprobe_core::{
    ByteOrder, ByteView, ChunkWalker, CodecKind, CodecSetup, FormatError, Result,
    StreamDescriptor,
};
use tracing::debug;

const MAGIC: &[u8; 4] = b"CTRL";
const SOUND_CHUNK: &[u8; 4] = b"SNDS";
const SOUND_HEADER: &[u8; 4] = b"SHDR";
const SDX2: &[u8; 4] = b"SDX2";

/// Offset of the sub-tag inside an `SNDS` chunk.
const SUBTAG_AT: u64 = 0x10;

/// `SHDR` fields, relative to the sub-tag.
const FRAME_SIZE_AT: u64 = 0x18;
const SAMPLE_RATE_AT: u64 = 0x1c;
const CHANNELS_AT: u64 = 0x20;
const CODEC_AT: u64 = 0x24;
const FRAME_COUNT_AT: u64 = 0x2c;

/// Resolve the single audio stream of a `.str` file.
pub fn resolve_chunked(container: &dyn ByteView) -> Result<StreamDescriptor> {
    if !has_extension(container, "str") {
        return Err(FormatError::NotRecognized { format: "str" });
    }
    if container.size() < 8 || &container.read_tag(0)? != MAGIC {
        return Err(FormatError::NotRecognized { format: "str" });
    }

    let first_chunk = u64::from(container.read_u32_be(0x04)?);
    let shdr = find_sound_header(container, first_chunk).map_err(|err| match err {
        FormatError::ChunkOutOfBounds {
            offset,
            size,
            container_size,
        } => FormatError::malformed(
            "str",
            format!("chunk at {offset:#x} of size {size:#x} runs past {container_size:#x}"),
        ),
        other => other,
    })?;
    debug!(offset = shdr, "found SHDR");

    let read = |at: u64| {
        container
            .read_u32_be(shdr + at)
            .map_err(|_| FormatError::malformed("str", format!("SHDR field {at:#x} past end of file")))
    };

    let codec = container
        .read_tag(shdr + CODEC_AT)
        .map_err(|_| FormatError::malformed("str", "SHDR codec past end of file"))?;
    if &codec != SDX2 {
        return Err(FormatError::UnsupportedCodec(
            String::from_utf8_lossy(&codec).into_owned(),
        ));
    }

    let channels = read(CHANNELS_AT)?;
    let channel_count = u16::try_from(channels)
        .map_err(|_| FormatError::malformed("str", format!("{channels} channels")))?;
    let frame_size = read(FRAME_SIZE_AT)?;
    let frame_count = read(FRAME_COUNT_AT)?;

    let descriptor = StreamDescriptor {
        codec: CodecKind::Sdx2,
        channel_count,
        sample_rate: read(SAMPLE_RATE_AT)?,
        num_samples: u64::from(frame_count) * u64::from(frame_size),
        loop_enabled: false,
        loop_start_sample: 0,
        loop_end_sample: 0,
        data_offset: 0,
        data_size: container.size(),
        block_align: u32::from(channel_count),
        interleave_unit: 1,
        byte_order: ByteOrder::Big,
        stream_count: 1,
        setup: CodecSetup::None,
        stream_name: None,
    };
    descriptor.validate(container.size())?;
    Ok(descriptor)
}

/// Absolute offset of the `SHDR` sub-tag of the first `SNDS` chunk that has
/// one. Other `SNDS` chunks carry audio blocks and are skipped.
fn find_sound_header(container: &dyn ByteView, start: u64) -> Result<u64> {
    let mut walker = ChunkWalker::from_offset(container, start);
    loop {
        let chunk = match walker.find(SOUND_CHUNK) {
            Ok(chunk) => chunk,
            Err(FormatError::NotFound { .. }) => {
                return Err(FormatError::NotFound {
                    tag: "SHDR".to_owned(),
                })
            }
            Err(err) => return Err(err),
        };
        if chunk.size < SUBTAG_AT + 4 {
            continue;
        }
        let subtag_at = chunk.offset + SUBTAG_AT;
        if &container.read_tag(subtag_at)? == SOUND_HEADER {
            return Ok(subtag_at);
        }
    }
}
