//! XMA loop-point recovery.
//!
//! Banks store XMA loop points as bit offsets of frames inside the raw
//! stream plus a subframe index, not as samples. Turning them into samples
//! means walking the packet/frame structure and counting frames until the
//! loop bit offsets are reached.

use tracing::debug;

use crate::error::{FormatError, Result};
use crate::view::ByteView;

/// XMA packets are always 2048 bytes.
pub const XMA_PACKET_SIZE: u64 = 2048;
pub const XMA_SAMPLES_PER_FRAME: u64 = 512;
pub const XMA_SAMPLES_PER_SUBFRAME: u64 = 128;

const PACKET_HEADER_BITS: u64 = 32;
const FRAME_SIZE_BITS: u32 = 15;
/// Frame size value that marks the end of frames in a packet.
const END_OF_PACKET: u64 = 0x7FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmaVersion {
    Xma1,
    Xma2,
}

impl XmaVersion {
    /// Packets to skip after the current one (multi-stream interleave).
    fn packet_skip(self, header: u32) -> u64 {
        let (skip, none) = match self {
            Self::Xma1 => (header & 0x7FF, 0x7FF),
            Self::Xma2 => (header & 0xFF, 0xFF),
        };
        if skip == none {
            0
        } else {
            u64::from(skip)
        }
    }
}

/// Loop region as stored by a bank: bit offsets relative to the stream start,
/// and 1-based subframe indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmaLoopRegion {
    pub start_bit: u64,
    pub end_bit: u64,
    pub start_subframe: u64,
    pub end_subframe: u64,
}

impl XmaLoopRegion {
    /// Unpack a byte-granular bank loop region: the start field holds the
    /// start bit offset, the end field packs `end_bit:28 | end_sub:2 | start_sub:2`.
    /// Subframes are stored minus one.
    pub fn from_packed(loop_start: u32, loop_end: u32) -> Self {
        Self {
            start_bit: u64::from(loop_start),
            end_bit: u64::from(loop_end >> 4),
            end_subframe: u64::from((loop_end >> 2) & 0x3) + 1,
            start_subframe: u64::from(loop_end & 0x3) + 1,
        }
    }
}

/// Result of a frame scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XmaScan {
    pub frames: u64,
    pub loop_start_sample: u64,
    pub loop_end_sample: u64,
}

/// Read `bits` bits (at most 25) at an absolute big-endian bit offset.
fn read_bits_be(view: &dyn ByteView, bit_offset: u64, bits: u32) -> Result<u64> {
    let shift_in = (bit_offset % 8) as u32;
    let mut buf = [0u8; 4];
    let needed = (shift_in + bits).div_ceil(8) as usize;
    view.read_at(bit_offset / 8, &mut buf[..needed])?;
    let word = u64::from(u32::from_be_bytes(buf));
    Ok((word >> (32 - shift_in - bits)) & ((1 << bits) - 1))
}

/// Walk the XMA stream at `[data_offset, data_offset + data_size)` and map
/// the loop region onto samples.
///
/// Loop frames are matched on the bit offset of the frame start, relative
/// to the stream start and counting packet headers. A loop point that never
/// lines up with a frame resolves to sample 0 of that point, as the bank
/// tools do.
pub fn scan_loop(
    view: &dyn ByteView,
    version: XmaVersion,
    data_offset: u64,
    data_size: u64,
    region: XmaLoopRegion,
) -> Result<XmaScan> {
    let stream_start_b = data_offset * 8;
    let end = (data_offset + data_size).min(view.size());
    let packet_size_b = XMA_PACKET_SIZE * 8;

    let mut scan = XmaScan::default();
    let mut loop_start_frame = None;
    let mut loop_end_frame = None;
    let mut offset = data_offset;

    while offset + 4 <= end {
        let header = view.read_u32_be(offset)?;
        let first_frame_b = u64::from((header >> 11) & 0x7FFF);

        let mut packet_offset_b = PACKET_HEADER_BITS + first_frame_b;
        while packet_offset_b < packet_size_b {
            let frame_b = offset * 8 + packet_offset_b;
            // Frame size field must be readable inside the stream.
            if (frame_b + u64::from(FRAME_SIZE_BITS)).div_ceil(8) > end {
                break;
            }
            let frame_size_b = read_bits_be(view, frame_b, FRAME_SIZE_BITS)?;
            if frame_size_b == END_OF_PACKET {
                break;
            }
            if frame_size_b <= u64::from(FRAME_SIZE_BITS) {
                return Err(FormatError::malformed(
                    "xma",
                    format!("frame of {frame_size_b} bits at bit {frame_b:#x}"),
                ));
            }

            let relative_b = frame_b - stream_start_b;
            if relative_b == region.start_bit {
                loop_start_frame = Some(scan.frames);
            }
            if relative_b == region.end_bit {
                loop_end_frame = Some(scan.frames);
            }

            scan.frames += 1;
            packet_offset_b += frame_size_b;
        }

        offset += XMA_PACKET_SIZE * (1 + version.packet_skip(header));
    }

    if loop_start_frame.is_none() || loop_end_frame.is_none() {
        debug!(
            start_bit = region.start_bit,
            end_bit = region.end_bit,
            frames = scan.frames,
            "xma loop point did not land on a frame start"
        );
    }

    scan.loop_start_sample = loop_start_frame.unwrap_or(0) * XMA_SAMPLES_PER_FRAME
        + region.start_subframe * XMA_SAMPLES_PER_SUBFRAME;
    scan.loop_end_sample = loop_end_frame.unwrap_or(0) * XMA_SAMPLES_PER_FRAME
        + region.end_subframe * XMA_SAMPLES_PER_SUBFRAME;
    Ok(scan)
}
