//! Version tiers of the wave bank format.
//!
//! Every layout difference between header revisions is data in [`TIERS`]:
//! where the segment table lives, how entries are laid out, and how the
//! packed format word splits into fields. Dispatch is a scan of that table
//! by version ordinal.

/// Crackdown shipped banks with this version; they are laid out like
/// version 41.
pub const CRACKDOWN_VERSION: u32 = 0x87;
/// Version written by Techland's tools. Laid out like the newest tier, and
/// the marker for their ATRAC3 hijack.
pub const TECHLAND_VERSION: u32 = 0x10000;

/// Header revision family, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// XACT 1.0 (v1): no segment table, fixed entry list at 0x50.
    Xact10,
    /// XACT 1.1 (v2-3): four segments, plain flags word.
    Xact11,
    /// XACT 2.0 (v4-34): five segments, XMA1.
    Xact20,
    /// XACT 2.1 (v35-38): XMA2, loop regions still in bytes.
    Xact21,
    /// XACT 2.2 (v39-41): loop regions in samples.
    Xact22,
    /// XACT 3 (v42+): header shifted by a tool version word.
    Xact30,
}

/// Codec family named by a format-word tag, before vendor fixups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XactCodec {
    Pcm,
    XboxAdpcm,
    MsAdpcm,
    Xma1,
    Xma2,
    Wma,
    Xwma,
    Atrac3,
    Ogg,
}

/// A bit field inside a packed 32-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub shift: u32,
    pub mask: u32,
}

impl BitField {
    const fn new(shift: u32, mask: u32) -> Self {
        Self { shift, mask }
    }

    pub fn get(self, word: u32) -> u32 {
        (word >> self.shift) & self.mask
    }
}

/// Shift/mask table of an entry's format word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatLayout {
    pub bits_per_sample: BitField,
    /// Absent before XACT 2.
    pub block_align: Option<BitField>,
    pub sample_rate: BitField,
    pub channels: BitField,
    pub tag: BitField,
}

/// Fields unpacked from a format word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatFields {
    /// 0 = 8-bit, 1 = 16-bit for PCM; WMA Pro flag for xWMA.
    pub bits_per_sample: u32,
    pub block_align: u32,
    pub sample_rate: u32,
    pub channels: u32,
    pub tag: u32,
}

impl FormatLayout {
    pub fn unpack(&self, word: u32) -> FormatFields {
        FormatFields {
            bits_per_sample: self.bits_per_sample.get(word),
            block_align: self.block_align.map_or(0, |f| f.get(word)),
            sample_rate: self.sample_rate.get(word),
            channels: self.channels.get(word),
            tag: self.tag.get(word),
        }
    }
}

/// What the first word of an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoWord {
    /// No info word; the entry starts with the format.
    None,
    /// Whole word is entry flags.
    Flags,
    /// Low 4 bits flags, upper 28 bits sample count.
    FlagsAndSamples,
}

/// Unit of an entry's loop region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopUnits {
    /// Byte offset + byte length (XMA packs bit offsets here instead).
    Bytes,
    /// Start sample + sample length.
    Samples,
}

/// Byte offsets of the fields of a non-compact entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLayout {
    pub info: InfoWord,
    pub format_at: u64,
    pub offset_at: u64,
    pub size_at: u64,
    /// Loop start; loop length follows.
    pub loop_at: u64,
    pub loop_units: LoopUnits,
}

/// Segment table position. Absent in XACT 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    /// Offset of the base segment (offset, size) pair; the entry segment
    /// pair follows it.
    pub table_at: u64,
    /// Offset of the wave data segment (offset, size) pair.
    pub payload_at: u64,
    /// Bytes of bank name inside the base segment.
    pub bank_name_size: u64,
}

/// Fixed layout used when there is no segment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyLayout {
    pub stream_count_at: u64,
    pub entry_table_at: u64,
    pub entry_stride: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    Legacy(LegacyLayout),
    Segmented(SegmentLayout),
}

/// One row of the tier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLayout {
    pub tier: Tier,
    /// Highest version in the tier; `None` for the catch-all.
    pub max_version: Option<u32>,
    pub header: HeaderLayout,
    pub entry: EntryLayout,
    pub format: FormatLayout,
    /// Codec per format-word tag.
    pub codecs: &'static [XactCodec],
}

const ENTRY_V1: EntryLayout = EntryLayout {
    info: InfoWord::None,
    format_at: 0x00,
    offset_at: 0x04,
    size_at: 0x08,
    loop_at: 0x0c,
    loop_units: LoopUnits::Bytes,
};

const fn entry(info: InfoWord, loop_units: LoopUnits) -> EntryLayout {
    EntryLayout {
        info,
        format_at: 0x04,
        offset_at: 0x08,
        size_at: 0x0c,
        loop_at: 0x10,
        loop_units,
    }
}

const fn segments(table_at: u64, gap: u64, bank_name_size: u64) -> HeaderLayout {
    HeaderLayout::Segmented(SegmentLayout {
        table_at,
        payload_at: table_at + 0x10 + gap,
        bank_name_size,
    })
}

const FORMAT_V1: FormatLayout = FormatLayout {
    bits_per_sample: BitField::new(31, 0x1),
    block_align: None,
    sample_rate: BitField::new(4, 0x7FF_FFFF),
    channels: BitField::new(1, 0x7),
    tag: BitField::new(0, 0x1),
};

const FORMAT_V3: FormatLayout = FormatLayout {
    bits_per_sample: BitField::new(31, 0x1),
    block_align: None,
    sample_rate: BitField::new(5, 0x3FF_FFFF),
    channels: BitField::new(2, 0x7),
    tag: BitField::new(0, 0x3),
};

const FORMAT_V34: FormatLayout = FormatLayout {
    bits_per_sample: BitField::new(31, 0x1),
    block_align: Some(BitField::new(24, 0xFF)),
    sample_rate: BitField::new(4, 0x7_FFFF),
    channels: BitField::new(1, 0x7),
    tag: BitField::new(0, 0x1),
};

const FORMAT_V35: FormatLayout = FormatLayout {
    bits_per_sample: BitField::new(31, 0x1),
    block_align: Some(BitField::new(23, 0xFF)),
    sample_rate: BitField::new(5, 0x3_FFFF),
    channels: BitField::new(2, 0x7),
    tag: BitField::new(0, 0x3),
};

use XactCodec::*;

/// All tiers, ordered by version. The last row catches everything newer.
pub static TIERS: [TierLayout; 6] = [
    TierLayout {
        tier: Tier::Xact10,
        max_version: Some(1),
        header: HeaderLayout::Legacy(LegacyLayout {
            stream_count_at: 0x0c,
            entry_table_at: 0x50,
            entry_stride: 0x14,
        }),
        entry: ENTRY_V1,
        format: FORMAT_V1,
        codecs: &[Pcm, XboxAdpcm],
    },
    TierLayout {
        tier: Tier::Xact11,
        max_version: Some(3),
        header: segments(0x08, 0x08, 0x10),
        entry: entry(InfoWord::Flags, LoopUnits::Bytes),
        format: FORMAT_V3,
        codecs: &[Pcm, XboxAdpcm, Wma, Ogg],
    },
    TierLayout {
        tier: Tier::Xact20,
        max_version: Some(34),
        header: segments(0x08, 0x10, 0x40),
        entry: entry(InfoWord::FlagsAndSamples, LoopUnits::Bytes),
        format: FORMAT_V34,
        codecs: &[Pcm, Xma1, MsAdpcm],
    },
    TierLayout {
        tier: Tier::Xact21,
        max_version: Some(38),
        header: segments(0x08, 0x10, 0x40),
        entry: entry(InfoWord::FlagsAndSamples, LoopUnits::Bytes),
        format: FORMAT_V35,
        codecs: &[Pcm, Xma2, MsAdpcm],
    },
    TierLayout {
        tier: Tier::Xact22,
        max_version: Some(41),
        header: segments(0x08, 0x10, 0x40),
        entry: entry(InfoWord::FlagsAndSamples, LoopUnits::Samples),
        format: FORMAT_V35,
        codecs: &[Pcm, Xma2, MsAdpcm],
    },
    TierLayout {
        tier: Tier::Xact30,
        max_version: None,
        header: segments(0x0c, 0x10, 0x40),
        entry: entry(InfoWord::FlagsAndSamples, LoopUnits::Samples),
        format: FORMAT_V35,
        codecs: &[Pcm, Xma2, MsAdpcm, Xwma],
    },
];

/// Apply vendor version remaps.
pub fn normalize_version(version: u32) -> u32 {
    match version {
        CRACKDOWN_VERSION => 41,
        v => v,
    }
}

/// Tier layout for an already-normalized version.
pub fn layout_for(version: u32) -> &'static TierLayout {
    TIERS
        .iter()
        .find(|t| t.max_version.is_none_or(|max| version <= max))
        .unwrap_or(&TIERS[TIERS.len() - 1])
}

impl TierLayout {
    pub fn codec_for_tag(&self, tag: u32) -> Option<XactCodec> {
        self.codecs.get(tag as usize).copied()
    }
}
