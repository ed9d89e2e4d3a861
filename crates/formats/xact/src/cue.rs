//! Stream names from the companion sound bank (`.xsb`).
//!
//! The wave bank carries no names. The sound bank maps cues to sounds and
//! sounds to (wavebank, stream) pairs, and stores the cue names. Sound
//! records have a variable size and the position of the stream fields
//! inside complex records is only known from observed files, so a sound
//! bank this reader cannot lay out yields [`FormatError::UnsupportedCueLayout`].

use bankprobe_core::{ByteOrder, ByteView, FormatError, Result};
use tracing::{debug, warn};

use crate::config::BankOptions;
use crate::tier::Tier;

const MAGIC_LE: &[u8; 4] = b"SDBK";
const MAGIC_BE: &[u8; 4] = b"KBDS";

/// Last sound bank version written by XACT 1.
pub const XSB_XACT1_MAX: u16 = 11;
/// Last sound bank version written by XACT 2.
pub const XSB_XACT2_MAX: u16 = 41;

/// XACT 1 sound records are fixed size.
const XACT1_SOUND_SIZE: u64 = 0x14;
const XACT1_SOUNDS_AT: u64 = 0x38;
const SIMPLE_CUE_SIZE: u64 = 0x05;
const COMPLEX_CUE_SIZE: u64 = 0x0f;
const NAME_OFFSET_ENTRY_SIZE: u64 = 0x06;

/// Sound record flag: complex sound.
const SOUND_COMPLEX: u8 = 0x01;

/// What the name lookup needs to know about the wave bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankContext {
    pub tier: Tier,
    pub version: u32,
    pub stream_count: u32,
    /// 1-based stream index being resolved.
    pub target: u32,
}

/// A sound record reduced to what name lookup needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueSound {
    /// Stream index inside its wave bank (0-based).
    pub stream_index: u16,
    /// Owning wave bank within the sound bank.
    pub wavebank: u8,
    /// Absolute offset of the name string, once a cue names this sound.
    pub name_offset: Option<u32>,
    /// Absolute offset of the sound record; cues point at it.
    pub sound_offset: u64,
}

/// Header fields of the sound bank, normalized across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct CueHeader {
    simple_count: u16,
    complex_count: u16,
    simple_offset: u64,
    complex_offset: u64,
    wavebank_count: u8,
    sound_count: u16,
    name_offsets_offset: u64,
    sounds_offset: u64,
}

/// Parsed sound bank.
#[derive(Debug, Clone)]
pub struct CueIndex {
    pub byte_order: ByteOrder,
    pub version: u16,
    pub sounds: Vec<CueSound>,
    /// Sound count per wave bank.
    pub wavebank_sounds: Vec<u32>,
}

impl CueIndex {
    /// Parse the sound bank. `bank_tier` is only used to warn about
    /// mismatched tool generations; parsing continues either way.
    pub fn parse(view: &dyn ByteView, bank_tier: Tier) -> Result<Self> {
        let byte_order = detect(view)?;
        let version = view.read_u16(0x04, byte_order)?;

        if (bank_tier <= Tier::Xact11 && version > XSB_XACT1_MAX)
            || (bank_tier <= Tier::Xact22 && version > XSB_XACT2_MAX)
        {
            warn!(
                xsb_version = version,
                ?bank_tier,
                "sound bank and wave bank come from different XACT versions"
            );
        }

        let header = read_header(view, byte_order, version)?;
        if header.simple_count as u32 + header.complex_count as u32 != header.sound_count as u32
            && version > XSB_XACT1_MAX
        {
            debug!(
                simple = header.simple_count,
                complex = header.complex_count,
                total = header.sound_count,
                "sound count differs from simple + complex cues"
            );
        }

        let mut index = Self {
            byte_order,
            version,
            sounds: Vec::with_capacity(header.sound_count as usize),
            wavebank_sounds: vec![0; header.wavebank_count as usize],
        };
        index.read_sounds(view, &header)?;
        if version > XSB_XACT1_MAX {
            index.read_name_offsets(view, &header)?;
        }
        Ok(index)
    }

    fn read_sounds(&mut self, view: &dyn ByteView, header: &CueHeader) -> Result<()> {
        let order = self.byte_order;
        let mut off = header.sounds_offset;

        for _ in 0..header.sound_count {
            let flag = view.read_u8(off)?;
            let (sound, size) = if self.version <= XSB_XACT1_MAX {
                if flag != 0x01 {
                    return Err(FormatError::UnsupportedCueLayout { flag, offset: off });
                }
                let name_offset = u32::from(view.read_u16(off + 0x04, order)?);
                let sound = CueSound {
                    stream_index: view.read_u16(off + 0x02, order)?,
                    wavebank: 0,
                    name_offset: (name_offset != 0).then_some(name_offset),
                    sound_offset: off,
                };
                (sound, XACT1_SOUND_SIZE)
            } else {
                let size = u64::from(view.read_u16(off + 0x07, order)?);
                let fields_at = stream_fields_offset(view, order, off, flag, size)?;
                let sound = CueSound {
                    stream_index: view.read_u16(off + fields_at, order)?,
                    wavebank: view.read_u8(off + fields_at + 0x02)?,
                    name_offset: None,
                    sound_offset: off,
                };
                (sound, size)
            };

            let Some(count) = self.wavebank_sounds.get_mut(sound.wavebank as usize) else {
                return Err(FormatError::malformed(
                    "xsb",
                    format!("unknown wavebank {} at offset {off:#x}", sound.wavebank),
                ));
            };
            *count += 1;
            self.sounds.push(sound);
            off += size;
        }
        Ok(())
    }

    /// Assign names from the cue tables: simple cues first, then complex
    /// cues, each consuming the next name-offset entry when it points at a
    /// sound that has no name yet.
    fn read_name_offsets(&mut self, view: &dyn ByteView, header: &CueHeader) -> Result<()> {
        let mut names_at = header.name_offsets_offset;
        let tables = [
            (header.simple_offset, header.simple_count, SIMPLE_CUE_SIZE),
            (header.complex_offset, header.complex_count, COMPLEX_CUE_SIZE),
        ];

        for (mut off, count, stride) in tables {
            for _ in 0..count {
                let sound_offset = u64::from(view.read_u32(off + 0x01, self.byte_order)?);
                off += stride;

                let unnamed = self
                    .sounds
                    .iter_mut()
                    .find(|s| s.name_offset.is_none() && s.sound_offset == sound_offset);
                if let Some(sound) = unnamed {
                    let name_offset = view.read_u32(names_at, self.byte_order)?;
                    // names_at + 0x04: u16 index, unused
                    sound.name_offset = (name_offset != 0).then_some(name_offset);
                    names_at += NAME_OFFSET_ENTRY_SIZE;
                }
            }
        }
        Ok(())
    }

    /// Pick the wave bank that the resolved `.xwb` corresponds to.
    ///
    /// An explicit 1-based choice in `options` wins. Otherwise the single
    /// wave bank whose sound count equals the bank's stream count, or the
    /// only wave bank there is. Anything else is ambiguous. Returns a
    /// 0-based wave bank index.
    pub fn select_wavebank(&self, stream_count: u32, options: &BankOptions) -> Result<usize> {
        let wavebanks = self.wavebank_sounds.len();

        let selected = if let Some(choice) = options.wavebank {
            let index = usize::from(choice).wrapping_sub(1);
            if index >= wavebanks {
                return Err(FormatError::malformed(
                    "xsb",
                    format!("wavebank {choice} requested, sound bank has {wavebanks}"),
                ));
            }
            index
        } else {
            let mut matching = self
                .wavebank_sounds
                .iter()
                .enumerate()
                .filter(|&(_, &count)| count == stream_count)
                .map(|(i, _)| i);
            match (matching.next(), matching.next()) {
                (Some(i), None) => i,
                _ if wavebanks == 1 => 0,
                _ if wavebanks == 0 => {
                    return Err(FormatError::malformed("xsb", "sound bank has no wavebanks"))
                }
                _ => {
                    return Err(FormatError::AmbiguousWavebank {
                        wavebanks,
                        streams: stream_count,
                    })
                }
            }
        };

        if self.wavebank_sounds[selected] == 0 {
            return Err(FormatError::malformed(
                "xsb",
                format!("selected wavebank {} has no sounds", selected + 1),
            ));
        }
        Ok(selected)
    }

    /// Find the sound for `stream_index` (0-based) in `wavebank`, starting
    /// at the configured start sound.
    pub fn find_sound(
        &self,
        wavebank: usize,
        stream_index: u32,
        stream_count: u32,
        options: &BankOptions,
    ) -> Result<Option<&CueSound>> {
        let start = match options.start_sound {
            Some(start) if start > 0 => {
                let sounds = self.wavebank_sounds.get(wavebank).copied().unwrap_or(0);
                let available = sounds.saturating_sub(start - 1);
                if available < stream_count {
                    return Err(FormatError::malformed(
                        "xsb",
                        format!(
                            "start sound {start} leaves {available} sounds for {stream_count} streams"
                        ),
                    ));
                }
                (start - 1) as usize
            }
            _ => 0,
        };

        Ok(self.sounds.iter().skip(start).find(|s| {
            usize::from(s.wavebank) == wavebank && u32::from(s.stream_index) == stream_index
        }))
    }
}

/// Byte order from the sound bank magic.
fn detect(view: &dyn ByteView) -> Result<ByteOrder> {
    if view.size() < 0x08 {
        return Err(FormatError::NotRecognized { format: "xsb" });
    }
    match &view.read_tag(0)? {
        MAGIC_LE => Ok(ByteOrder::Little),
        MAGIC_BE => Ok(ByteOrder::Big),
        _ => Err(FormatError::NotRecognized { format: "xsb" }),
    }
}

fn read_header(view: &dyn ByteView, order: ByteOrder, version: u16) -> Result<CueHeader> {
    let u16_at = |at| view.read_u16(at, order);
    let u32_at = |at| view.read_u32(at, order).map(u64::from);

    if version <= XSB_XACT1_MAX {
        return Ok(CueHeader {
            wavebank_count: 1,
            sound_count: u16_at(0x1e)?,
            sounds_offset: XACT1_SOUNDS_AT,
            ..CueHeader::default()
        });
    }

    // XACT 3 inserts 10 bytes before the counts and 8 before the name tables.
    let (counts_at, wavebanks_at, tables_at, names_at) = if version <= XSB_XACT2_MAX {
        (0x09, 0x11, 0x1a, 0x3a)
    } else {
        (0x13, 0x1b, 0x22, 0x42)
    };

    Ok(CueHeader {
        simple_count: u16_at(counts_at)?,
        complex_count: u16_at(counts_at + 0x02)?,
        wavebank_count: view.read_u8(wavebanks_at)?,
        sound_count: u16_at(wavebanks_at + 0x01)?,
        simple_offset: u32_at(tables_at)?,
        complex_offset: u32_at(tables_at + 0x04)?,
        name_offsets_offset: u32_at(names_at)?,
        sounds_offset: u32_at(names_at + 0x04)?,
    })
}

/// Offset of the stream index / wavebank fields inside a sound record.
///
/// Simple sounds keep them right after the 9-byte record header. For
/// complex sounds the offset is worked back from the record size; the
/// rules below match every bank seen so far and nothing more.
pub fn stream_fields_offset(
    view: &dyn ByteView,
    order: ByteOrder,
    record_at: u64,
    flag: u8,
    size: u64,
) -> Result<u64> {
    if flag & SOUND_COMPLEX == 0 {
        return Ok(0x09);
    }
    if !matches!(flag, 0x01 | 0x03 | 0x05 | 0x07) {
        return Err(FormatError::UnsupportedCueLayout {
            flag,
            offset: record_at,
        });
    }
    if size < 0x08 {
        return Err(FormatError::malformed(
            "xsb",
            format!("complex sound of {size} bytes at {record_at:#x}"),
        ));
    }

    if size == 0x49 {
        // Only seen in Eschatos.
        return Ok(0x23);
    }
    if size % 2 == 1 && view.read_u16(record_at + size - 0x02, order)? != 0 {
        // 7 unknown trailing bytes
        return size.checked_sub(0x08 + 0x07).ok_or_else(|| {
            FormatError::malformed(
                "xsb",
                format!("complex sound of {size} bytes at {record_at:#x} has no room for its tail"),
            )
        });
    }
    Ok(size - 0x08)
}

/// Resolve the name of `bank.target` from a parsed-on-demand sound bank.
pub fn resolve_stream_name(
    view: &dyn ByteView,
    bank: &BankContext,
    options: &BankOptions,
) -> Result<Option<String>> {
    let index = CueIndex::parse(view, bank.tier)?;

    let sound_count: u32 = index.wavebank_sounds.iter().sum();
    if sound_count < bank.stream_count {
        debug!(
            xsb_sounds = sound_count,
            xwb_streams = bank.stream_count,
            "sound bank has fewer sounds than the wave bank has streams"
        );
    }

    let wavebank = index.select_wavebank(bank.stream_count, options)?;
    let Some(sound) = index.find_sound(
        wavebank,
        bank.target.saturating_sub(1),
        bank.stream_count,
        options,
    )?
    else {
        return Ok(None);
    };
    match sound.name_offset {
        Some(offset) => view.read_cstring(u64::from(offset), options.max_name_len),
        None => Ok(None),
    }
}
