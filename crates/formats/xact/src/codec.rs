//! Codec identity, vendor fixups and sample counts for a bank entry.

use bankprobe_core::samples::{
    self, MS_ADPCM_ALIGN_OFFSET, XBOX_ADPCM_CHANNEL_BLOCK, XMA_LOOP_PADDING,
};
use bankprobe_core::xma::{self, XmaLoopRegion, XmaVersion};
use bankprobe_core::{ByteView, CodecKind, CodecSetup, FormatError, Result};
use tracing::warn;

use crate::header::{BankRecord, EntryFlags};
use crate::tier::{FormatFields, LoopUnits, Tier, XactCodec, TECHLAND_VERSION};

/// Block alignments that mark a Techland ATRAC3 stream behind an XMA2 tag.
pub const ATRAC3_HIJACK_ALIGNS: [u32; 3] = [0x60, 0x98, 0xC0];

/// XACT writes XMA2 streams in 64 KiB blocks.
pub const XMA2_BLOCK_SIZE: u32 = 0x10000;

const WMA_AVG_BPS: [u32; 7] = [12000, 24000, 4000, 6000, 8000, 20000, 2500];
const WMA_BLOCK_ALIGN: [u32; 17] = [
    929, 1487, 1280, 2230, 8917, 8192, 4459, 5945, 2304, 1536, 1485, 1008, 2731, 4096, 6827, 5462,
    1280,
];

/// Stream properties after codec derivation and sample math.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedStream {
    pub codec: CodecKind,
    pub channels: u16,
    pub sample_rate: u32,
    pub num_samples: u64,
    pub loop_enabled: bool,
    pub loop_start_sample: u64,
    pub loop_end_sample: u64,
    pub stream_offset: u64,
    pub stream_size: u64,
    pub block_align: u32,
    pub interleave_unit: u32,
    pub setup: CodecSetup,
}

/// Map a tier's format-word tag to a codec, before vendor fixups.
pub fn nominal_codec(record: &BankRecord, fields: &FormatFields) -> Result<XactCodec> {
    record.layout.codec_for_tag(fields.tag).ok_or_else(|| {
        FormatError::UnsupportedCodec(format!(
            "tag {} in bank version {}",
            fields.tag, record.version
        ))
    })
}

/// Techland reused the XMA2 tag for ATRAC3 in their PS3 banks. The only
/// tell is one of the standard ATRAC3 frame sizes in the alignment byte.
pub fn is_atrac3_hijack(raw_version: u32, codec: XactCodec, block_align: u32) -> bool {
    raw_version == TECHLAND_VERSION
        && codec == XactCodec::Xma2
        && ATRAC3_HIJACK_ALIGNS.contains(&block_align)
}

/// Work state threaded through the fixup steps.
struct Working {
    codec: XactCodec,
    channels: u16,
    num_samples: u64,
    stream_size: u64,
    loop_start: u64,
    loop_length: u64,
    loop_start_sample: u64,
    loop_end_sample: u64,
}

/// Resolve codec, sample counts and loop points for the record's entry.
pub fn derive(view: &dyn ByteView, record: &BankRecord) -> Result<DerivedStream> {
    let fields = record.format_fields();
    if fields.channels == 0 {
        return Err(FormatError::malformed("xwb", "entry has zero channels"));
    }
    if fields.sample_rate == 0 {
        return Err(FormatError::malformed("xwb", "entry has zero sample rate"));
    }

    let entry = &record.entry;
    let tier = record.layout.tier;
    let byte_loops = record.layout.entry.loop_units == LoopUnits::Bytes;

    let mut w = Working {
        codec: nominal_codec(record, &fields)?,
        channels: fields.channels as u16,
        num_samples: u64::from(entry.num_samples),
        stream_size: entry.stream_size,
        loop_start: u64::from(entry.loop_start),
        loop_length: u64::from(entry.loop_length),
        loop_start_sample: entry.loop_start_sample,
        loop_end_sample: entry.loop_end_sample,
    };

    if is_atrac3_hijack(record.raw_version, w.codec, fields.block_align) {
        w.codec = XactCodec::Atrac3;
        // The info word sample count uses a different layout for these; the
        // frame count is reliable.
        w.num_samples = samples::atrac3_bytes_to_samples(
            w.stream_size,
            fields.block_align * u32::from(w.channels),
        );
    }

    // Oddworld's Ogg extension: size field is decoded PCM bytes, loop length
    // field is the real Ogg size, and there are no loops.
    if w.codec == XactCodec::Ogg {
        w.num_samples = w.stream_size / (2 * u64::from(w.channels));
        w.stream_size = w.loop_length;
        w.loop_start = 0;
        w.loop_length = 0;
    }

    // Sample tiers leave the byte loop start at 0, so any nonzero loop end
    // counts, including an empty loop at a nonzero start.
    let loop_enabled = (w.loop_length > 0 || w.loop_end_sample > w.loop_start)
        && !entry.flags.contains(EntryFlags::IGNORE_LOOP);

    apply_sample_math(view, record, &fields, &mut w, loop_enabled, byte_loops)?;

    let mut derived = DerivedStream {
        codec: codec_kind(w.codec, &fields),
        channels: w.channels,
        sample_rate: fields.sample_rate,
        num_samples: w.num_samples,
        loop_enabled,
        loop_start_sample: if loop_enabled { w.loop_start_sample } else { 0 },
        loop_end_sample: if loop_enabled { w.loop_end_sample } else { 0 },
        stream_offset: entry.stream_offset,
        stream_size: w.stream_size,
        block_align: 0,
        interleave_unit: 0,
        setup: CodecSetup::None,
    };
    fill_layout(&mut derived, w.codec, &fields)?;
    clamp_loop(&mut derived, tier);
    Ok(derived)
}

fn apply_sample_math(
    view: &dyn ByteView,
    record: &BankRecord,
    fields: &FormatFields,
    w: &mut Working,
    loop_enabled: bool,
    byte_loops: bool,
) -> Result<()> {
    let tier = record.layout.tier;
    let loop_end_bytes = w.loop_start + w.loop_length;

    match w.codec {
        XactCodec::Pcm if tier <= Tier::Xact22 => {
            let bits = pcm_bits(fields);
            w.num_samples = samples::pcm_bytes_to_samples(w.stream_size, w.channels, bits);
            if loop_enabled && byte_loops {
                w.loop_start_sample = samples::pcm_bytes_to_samples(w.loop_start, w.channels, bits);
                w.loop_end_sample = samples::pcm_bytes_to_samples(loop_end_bytes, w.channels, bits);
            }
        }
        XactCodec::XboxAdpcm => {
            let block_align = XBOX_ADPCM_CHANNEL_BLOCK * u32::from(w.channels);
            w.num_samples = samples::ms_ima_bytes_to_samples(w.stream_size, block_align, w.channels);
            if loop_enabled && byte_loops {
                w.loop_start_sample =
                    samples::ms_ima_bytes_to_samples(w.loop_start, block_align, w.channels);
                w.loop_end_sample =
                    samples::ms_ima_bytes_to_samples(loop_end_bytes, block_align, w.channels);
            }
        }
        XactCodec::MsAdpcm if loop_enabled && byte_loops => {
            let block_size = msadpcm_block_size(fields, w.channels);
            w.loop_start_sample =
                samples::msadpcm_bytes_to_samples(w.loop_start, block_size, w.channels);
            w.loop_end_sample =
                samples::msadpcm_bytes_to_samples(loop_end_bytes, block_size, w.channels);
        }
        XactCodec::Xma1 | XactCodec::Xma2 if loop_enabled => {
            if byte_loops {
                // Loop fields hold frame bit offsets in the raw XMA stream.
                let version = if w.codec == XactCodec::Xma1 {
                    XmaVersion::Xma1
                } else {
                    XmaVersion::Xma2
                };
                let region = XmaLoopRegion::from_packed(
                    record.entry.loop_start,
                    record.entry.loop_length,
                );
                let scan = xma::scan_loop(
                    view,
                    version,
                    record.entry.stream_offset,
                    w.stream_size,
                    region,
                )?;
                w.loop_start_sample = scan.loop_start_sample;
                w.loop_end_sample = scan.loop_end_sample;
            }
            // Bank loop points count encoder priming samples; pad the total
            // so the loop end stays reachable.
            w.num_samples += XMA_LOOP_PADDING;
        }
        _ => {}
    }
    Ok(())
}

fn pcm_bits(fields: &FormatFields) -> u16 {
    if fields.bits_per_sample == 0 {
        8
    } else {
        16
    }
}

fn msadpcm_block_size(fields: &FormatFields, channels: u16) -> u32 {
    (fields.block_align + MS_ADPCM_ALIGN_OFFSET) * u32::from(channels)
}

fn codec_kind(codec: XactCodec, fields: &FormatFields) -> CodecKind {
    match codec {
        XactCodec::Pcm if fields.bits_per_sample == 0 => CodecKind::Pcm8,
        XactCodec::Pcm => CodecKind::Pcm16,
        XactCodec::XboxAdpcm => CodecKind::XboxAdpcm,
        XactCodec::MsAdpcm => CodecKind::MsAdpcm,
        XactCodec::Xma1 => CodecKind::Xma1,
        XactCodec::Xma2 => CodecKind::Xma2,
        XactCodec::Wma => CodecKind::Wma,
        XactCodec::Xwma => CodecKind::Xwma,
        XactCodec::Atrac3 => CodecKind::Atrac3,
        XactCodec::Ogg => CodecKind::VendorOgg,
    }
}

/// Frame sizes, interleave and decoder setup per codec.
fn fill_layout(d: &mut DerivedStream, codec: XactCodec, fields: &FormatFields) -> Result<()> {
    let channels = u32::from(d.channels);
    let interleaved = d.channels > 1;

    match codec {
        XactCodec::Pcm => {
            let bytes = u32::from(pcm_bits(fields) / 8);
            d.block_align = bytes * channels;
            d.interleave_unit = if interleaved { bytes } else { 0 };
        }
        XactCodec::XboxAdpcm => {
            d.block_align = XBOX_ADPCM_CHANNEL_BLOCK * channels;
        }
        XactCodec::MsAdpcm => {
            d.block_align = msadpcm_block_size(fields, d.channels);
        }
        XactCodec::Xma1 => {
            d.block_align = fields.block_align;
        }
        XactCodec::Xma2 => {
            d.block_align = fields.block_align;
            d.setup = CodecSetup::Xma2 {
                block_size: XMA2_BLOCK_SIZE,
                block_count: d.stream_size.div_ceil(u64::from(XMA2_BLOCK_SIZE)) as u32,
            };
        }
        XactCodec::Xwma => {
            // Upper 3 bits index the byte rate, lower 5 bits the block size.
            let bps_index = (fields.block_align >> 5) as usize;
            let block_index = (fields.block_align & 0x1F) as usize;
            let (Some(&avg_bytes_per_second), Some(&block_align)) =
                (WMA_AVG_BPS.get(bps_index), WMA_BLOCK_ALIGN.get(block_index))
            else {
                return Err(FormatError::UnsupportedCodec(format!(
                    "xWMA alignment byte {:#04x}",
                    fields.block_align
                )));
            };
            d.block_align = block_align;
            d.setup = CodecSetup::Xwma {
                avg_bytes_per_second,
                block_align,
                pro: fields.bits_per_sample != 0,
            };
        }
        XactCodec::Atrac3 => {
            d.block_align = fields.block_align * channels;
            d.setup = CodecSetup::Atrac3 {
                joint_stereo: fields.block_align == 0x60,
            };
        }
        XactCodec::Wma | XactCodec::Ogg => {}
    }
    Ok(())
}

/// Keep `loop_start <= loop_end <= num_samples`. Headers from some rips
/// (and the XMA padding heuristics) can put loop ends past the stream.
fn clamp_loop(d: &mut DerivedStream, tier: Tier) {
    if !d.loop_enabled {
        return;
    }
    if d.loop_end_sample > d.num_samples || d.loop_start_sample > d.loop_end_sample {
        warn!(
            ?tier,
            loop_start = d.loop_start_sample,
            loop_end = d.loop_end_sample,
            num_samples = d.num_samples,
            "clamping loop region to stream length"
        );
        d.loop_end_sample = d.loop_end_sample.min(d.num_samples);
        d.loop_start_sample = d.loop_start_sample.min(d.loop_end_sample);
    }
}
