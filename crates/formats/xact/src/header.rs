use bankprobe_core::{ByteOrder, ByteView, FormatError, Result};
use bitflags::bitflags;

use crate::tier::{
    self, FormatFields, HeaderLayout, InfoWord, LegacyLayout, LoopUnits, SegmentLayout,
    TierLayout,
};

const MAGIC_LE: &[u8; 4] = b"WBND";
const MAGIC_BE: &[u8; 4] = b"DNBW";

bitflags! {
    /// Bank-wide flags from the base segment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BankFlags: u32 {
        const STREAMING = 0x0000_0001;
        const ENTRY_NAMES = 0x0001_0000;
        /// Entries are single packed offset words.
        const COMPACT = 0x0002_0000;
        const SYNC_DISABLED = 0x0004_0000;
        const SEEK_TABLES = 0x0008_0000;
    }
}

bitflags! {
    /// Per-entry flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntryFlags: u32 {
        const READ_AHEAD = 0x1;
        const LOOP_CACHE = 0x2;
        const REMOVE_LOOP_TAIL = 0x4;
        /// The loop region must not be used.
        const IGNORE_LOOP = 0x8;
    }
}

/// Compact entry: `sector_offset:21 | remainder:11`.
const COMPACT_REMAINDER_BITS: u32 = 11;
const COMPACT_REMAINDER_MASK: u32 = 0x7FF;

/// One stream's entry, with offsets made absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawEntry {
    pub flags: EntryFlags,
    /// Sample count from the info word (0 where the tier has none).
    pub num_samples: u32,
    pub format: u32,
    pub stream_offset: u64,
    pub stream_size: u64,
    /// Byte-unit loop region: start and length.
    pub loop_start: u32,
    pub loop_length: u32,
    /// Sample-unit loop region: start and exclusive end.
    pub loop_start_sample: u64,
    pub loop_end_sample: u64,
}

/// Version-agnostic view of a wave bank header and one selected entry.
#[derive(Debug, Clone)]
pub struct BankRecord {
    pub layout: &'static TierLayout,
    /// Version as stored in the file.
    pub raw_version: u32,
    /// Version after vendor remaps.
    pub version: u32,
    pub byte_order: ByteOrder,
    pub flags: BankFlags,
    pub stream_count: u32,
    pub entry_offset: u64,
    pub entry_size: u64,
    pub entry_stride: u64,
    pub alignment: u64,
    pub payload_offset: u64,
    pub payload_size: u64,
    /// 1-based index of the selected stream.
    pub target: u32,
    pub entry: RawEntry,
}

impl BankRecord {
    /// Read the bank header and the entry of `target` (0 = first stream,
    /// otherwise 1-based).
    pub fn parse(view: &dyn ByteView, target: u32) -> Result<Self> {
        let byte_order = detect(view)?;
        let raw_version = view.read_u32(0x04, byte_order)?;
        let version = tier::normalize_version(raw_version);
        let layout = tier::layout_for(version);

        let mut record = Self {
            layout,
            raw_version,
            version,
            byte_order,
            flags: BankFlags::empty(),
            stream_count: 0,
            entry_offset: 0,
            entry_size: 0,
            entry_stride: 0,
            alignment: 0,
            payload_offset: 0,
            payload_size: 0,
            target: 0,
            entry: RawEntry::default(),
        };

        let compact_format = match layout.header {
            HeaderLayout::Legacy(legacy) => {
                record.read_legacy_segments(view, legacy)?;
                0
            }
            HeaderLayout::Segmented(segments) => record.read_segments(view, segments)?,
        };

        record.target = resolve_target(target, record.stream_count)?;
        let entry_pos = record.entry_offset + u64::from(record.target - 1) * record.entry_stride;

        record.entry = if record.flags.contains(BankFlags::COMPACT) {
            record.read_compact_entry(view, entry_pos, compact_format)?
        } else {
            record.read_entry(view, entry_pos)?
        };
        Ok(record)
    }

    /// Format word fields of the selected entry.
    pub fn format_fields(&self) -> FormatFields {
        self.layout.format.unpack(self.entry.format)
    }

    fn read_u32(&self, view: &dyn ByteView, offset: u64) -> Result<u32> {
        view.read_u32(offset, self.byte_order)
    }

    fn read_legacy_segments(&mut self, view: &dyn ByteView, legacy: LegacyLayout) -> Result<()> {
        self.stream_count = self.read_u32(view, legacy.stream_count_at)?;
        self.entry_stride = legacy.entry_stride;
        self.entry_offset = legacy.entry_table_at;
        self.entry_size = self.entry_stride * u64::from(self.stream_count);
        self.payload_offset = self.entry_offset + self.entry_size;
        self.payload_size = view
            .size()
            .checked_sub(self.payload_offset)
            .ok_or_else(|| {
                FormatError::malformed(
                    "xwb",
                    format!("{} entries run past end of file", self.stream_count),
                )
            })?;
        Ok(())
    }

    /// Read the segment table and the base segment. Returns the bank-wide
    /// format word used by compact entries.
    fn read_segments(&mut self, view: &dyn ByteView, segments: SegmentLayout) -> Result<u32> {
        let at = segments.table_at;
        let base_offset = u64::from(self.read_u32(view, at)?);
        self.entry_offset = u64::from(self.read_u32(view, at + 0x08)?);
        self.entry_size = u64::from(self.read_u32(view, at + 0x0c)?);
        self.payload_offset = u64::from(self.read_u32(view, segments.payload_at)?);
        self.payload_size = u64::from(self.read_u32(view, segments.payload_at + 0x04)?);

        // Some vendor banks ship without a base or wave data segment.
        if base_offset == 0 || self.payload_offset == 0 {
            return Err(FormatError::MissingPayload);
        }

        self.flags = BankFlags::from_bits_retain(self.read_u32(view, base_offset)?);
        self.stream_count = self.read_u32(view, base_offset + 0x04)?;

        let after_name = base_offset + 0x08 + segments.bank_name_size;
        self.entry_stride = u64::from(self.read_u32(view, after_name)?);
        // after_name + 0x04: entry name element size
        self.alignment = u64::from(self.read_u32(view, after_name + 0x08)?);
        let compact_format = self.read_u32(view, after_name + 0x0c)?;

        if self.entry_stride == 0 && self.stream_count > 1 {
            return Err(FormatError::malformed("xwb", "zero entry stride"));
        }
        Ok(compact_format)
    }

    fn read_compact_entry(&self, view: &dyn ByteView, pos: u64, format: u32) -> Result<RawEntry> {
        let stream_offset = self.compact_offset(self.read_u32(view, pos)?);
        let payload_end = self.payload_offset + self.payload_size;

        let end = if self.target < self.stream_count {
            let next = self.compact_offset(self.read_u32(view, pos + self.entry_stride)?);
            if next < stream_offset {
                return Err(FormatError::malformed(
                    "xwb",
                    format!("compact entry {} ends before it starts", self.target),
                ));
            }
            next
        } else {
            payload_end
        };

        let stream_size = end.checked_sub(stream_offset).ok_or_else(|| {
            FormatError::malformed(
                "xwb",
                format!("compact entry {} starts past the wave data", self.target),
            )
        })?;

        Ok(RawEntry {
            format,
            stream_offset,
            stream_size,
            ..RawEntry::default()
        })
    }

    fn compact_offset(&self, word: u32) -> u64 {
        let sectors = u64::from(word >> COMPACT_REMAINDER_BITS);
        let remainder = u64::from(word & COMPACT_REMAINDER_MASK);
        self.payload_offset + sectors * self.alignment + remainder
    }

    fn read_entry(&self, view: &dyn ByteView, pos: u64) -> Result<RawEntry> {
        let layout = self.layout.entry;
        let mut entry = RawEntry::default();

        match layout.info {
            InfoWord::None => {}
            InfoWord::Flags => {
                entry.flags = EntryFlags::from_bits_retain(self.read_u32(view, pos)?);
            }
            InfoWord::FlagsAndSamples => {
                let info = self.read_u32(view, pos)?;
                entry.flags = EntryFlags::from_bits_retain(info & 0xF);
                entry.num_samples = (info >> 4) & 0x0FFF_FFFF;
            }
        }

        entry.format = self.read_u32(view, pos + layout.format_at)?;
        entry.stream_offset =
            self.payload_offset + u64::from(self.read_u32(view, pos + layout.offset_at)?);
        entry.stream_size = u64::from(self.read_u32(view, pos + layout.size_at)?);

        let loop_start = self.read_u32(view, pos + layout.loop_at)?;
        let loop_length = self.read_u32(view, pos + layout.loop_at + 0x04)?;
        match layout.loop_units {
            LoopUnits::Bytes => {
                entry.loop_start = loop_start;
                entry.loop_length = loop_length;
            }
            LoopUnits::Samples => {
                entry.loop_start_sample = u64::from(loop_start);
                entry.loop_end_sample = u64::from(loop_start) + u64::from(loop_length);
            }
        }
        Ok(entry)
    }
}

/// Byte order from the magic, or `NotRecognized`.
pub fn detect(view: &dyn ByteView) -> Result<ByteOrder> {
    if view.size() < 0x10 {
        return Err(FormatError::NotRecognized { format: "xwb" });
    }
    match &view.read_tag(0)? {
        MAGIC_LE => Ok(ByteOrder::Little),
        MAGIC_BE => Ok(ByteOrder::Big),
        _ => Err(FormatError::NotRecognized { format: "xwb" }),
    }
}

fn resolve_target(target: u32, stream_count: u32) -> Result<u32> {
    let target = if target == 0 { 1 } else { target };
    if stream_count == 0 || target > stream_count {
        return Err(FormatError::IndexOutOfRange {
            index: target,
            count: stream_count,
        });
    }
    Ok(target)
}
