//! Byte-count to sample-count conversions, one per codec family.
//!
//! All functions are total: a zero channel count or block size yields 0
//! rather than dividing by zero. Callers validate channel counts before
//! trusting the result.

/// Samples an encoder primes XMA streams with. Added to looping XMA streams
/// because bank loop points count these samples while the frame count
/// does not (64 + 512).
pub const XMA_LOOP_PADDING: u64 = 576;

/// Samples per ATRAC3 frame.
pub const ATRAC3_FRAME_SAMPLES: u64 = 1024;

/// Per-channel block size of Xbox IMA ADPCM.
pub const XBOX_ADPCM_CHANNEL_BLOCK: u32 = 0x24;

/// Offset added to the bank's MS ADPCM alignment byte to get the per-channel
/// block size.
pub const MS_ADPCM_ALIGN_OFFSET: u32 = 22;

/// Uncompressed PCM.
pub fn pcm_bytes_to_samples(bytes: u64, channels: u16, bits_per_sample: u16) -> u64 {
    let frame = u64::from(channels) * u64::from(bits_per_sample / 8);
    if frame == 0 {
        return 0;
    }
    bytes / frame
}

/// MS IMA style 4-bit ADPCM: each block carries a 4-byte header per channel
/// holding one sample, then two samples per byte.
pub fn ms_ima_bytes_to_samples(bytes: u64, block_align: u32, channels: u16) -> u64 {
    if block_align == 0 || channels == 0 {
        return 0;
    }
    let block_align = u64::from(block_align);
    let channels = u64::from(channels);
    let header = 4 * channels;
    let per_block = |size: u64| size.saturating_sub(header) * 2 / channels + 1;

    let full = (bytes / block_align) * per_block(block_align);
    let rest = bytes % block_align;
    let partial = if rest >= header { per_block(rest) } else { 0 };
    full + partial
}

/// Microsoft ADPCM: 7-byte block header per channel with two samples in it.
pub fn msadpcm_bytes_to_samples(bytes: u64, block_size: u32, channels: u16) -> u64 {
    if block_size == 0 || channels == 0 {
        return 0;
    }
    let block_size = u64::from(block_size);
    let channels = u64::from(channels);
    let overhead = 6 * channels;
    let per_block = |size: u64| size.saturating_sub(overhead) * 2 / channels;

    let full = (bytes / block_size) * per_block(block_size);
    let rest = bytes % block_size;
    let partial = if rest > 0 { per_block(rest) } else { 0 };
    full + partial
}

/// ATRAC3 with `full_block_align` bytes per frame across all channels.
pub fn atrac3_bytes_to_samples(bytes: u64, full_block_align: u32) -> u64 {
    if full_block_align == 0 {
        return 0;
    }
    bytes / u64::from(full_block_align) * ATRAC3_FRAME_SAMPLES
}
