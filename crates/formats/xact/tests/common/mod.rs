//! Builders for synthetic wave banks and sound banks.
#![allow(dead_code)]

pub const PCM: u32 = 0;
pub const ADPCM: u32 = 1;
pub const XMA: u32 = 1;
pub const MSADPCM: u32 = 2;
pub const XWMA: u32 = 3;
pub const OGG: u32 = 3;

/// Growable buffer with patch-at-offset writes in either byte order.
pub struct Buf {
    pub data: Vec<u8>,
    pub big_endian: bool,
}

impl Buf {
    pub fn new(size: usize, big_endian: bool) -> Self {
        Self {
            data: vec![0; size],
            big_endian,
        }
    }

    fn reserve(&mut self, end: usize) {
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
    }

    pub fn bytes(&mut self, at: usize, bytes: &[u8]) {
        self.reserve(at + bytes.len());
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn u8(&mut self, at: usize, v: u8) {
        self.bytes(at, &[v]);
    }

    pub fn u16(&mut self, at: usize, v: u16) {
        let b = if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        };
        self.bytes(at, &b);
    }

    pub fn u32(&mut self, at: usize, v: u32) {
        let b = if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        };
        self.bytes(at, &b);
    }
}

// ── Format words ────────────────────────────────────────────────────

/// XACT 1.0 (v1).
pub fn format_v1(tag: u32, channels: u32, rate: u32, bits: u32) -> u32 {
    (bits << 31) | (rate << 4) | (channels << 1) | tag
}

/// XACT 1.1 (v2-3).
pub fn format_v3(tag: u32, channels: u32, rate: u32, bits: u32) -> u32 {
    (bits << 31) | (rate << 5) | (channels << 2) | tag
}

/// XACT 2.0 (v4-34). Block align shares bit 31 with bits-per-sample.
pub fn format_v34(tag: u32, channels: u32, rate: u32, align: u32) -> u32 {
    (align << 24) | (rate << 4) | (channels << 1) | tag
}

/// XACT 2.1 and later.
pub fn format_v35(tag: u32, channels: u32, rate: u32, align: u32, bits: u32) -> u32 {
    (bits << 31) | (align << 23) | (rate << 5) | (channels << 2) | tag
}

// ── Wave banks ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub flags: u32,
    pub num_samples: u32,
    pub format: u32,
    /// Relative to the wave data segment.
    pub offset: u32,
    pub size: u32,
    pub loop_start: u32,
    pub loop_length: u32,
}

#[derive(Debug, Clone)]
pub struct Bank {
    pub version: u32,
    pub big_endian: bool,
    pub flags: u32,
    pub alignment: u32,
    pub compact_format: u32,
    pub entries: Vec<Entry>,
    /// Compact words, used instead of `entries` when set.
    pub compact: Vec<u32>,
    pub payload: Vec<u8>,
}

pub const BASE_AT: usize = 0x100;
pub const ENTRIES_AT: usize = 0x200;
pub const PAYLOAD_AT: usize = 0x800;
const ENTRY_STRIDE: usize = 0x18;

impl Bank {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            big_endian: false,
            flags: 0,
            alignment: 0x800,
            compact_format: 0,
            entries: Vec::new(),
            compact: Vec::new(),
            payload: Vec::new(),
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn entry(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Offset where the wave data starts in the built file.
    pub fn payload_offset(&self) -> usize {
        if self.version <= 1 {
            0x50 + 0x14 * self.entries.len()
        } else {
            PAYLOAD_AT
        }
    }

    pub fn build(&self) -> Vec<u8> {
        if self.version <= 1 {
            self.build_legacy()
        } else {
            self.build_segmented()
        }
    }

    fn magic(&self, buf: &mut Buf) {
        buf.bytes(0, if self.big_endian { b"DNBW" } else { b"WBND" });
        buf.u32(0x04, self.version);
    }

    fn build_legacy(&self) -> Vec<u8> {
        let mut buf = Buf::new(0x50, self.big_endian);
        self.magic(&mut buf);
        buf.u32(0x0c, self.entries.len() as u32);
        for (i, e) in self.entries.iter().enumerate() {
            let at = 0x50 + 0x14 * i;
            buf.u32(at, e.format);
            buf.u32(at + 0x04, e.offset);
            buf.u32(at + 0x08, e.size);
            buf.u32(at + 0x0c, e.loop_start);
            buf.u32(at + 0x10, e.loop_length);
        }
        let payload_at = self.payload_offset();
        buf.bytes(payload_at, &self.payload);
        buf.reserve(payload_at);
        buf.data
    }

    fn build_segmented(&self) -> Vec<u8> {
        let mut buf = Buf::new(PAYLOAD_AT, self.big_endian);
        self.magic(&mut buf);

        let layout_version = if self.version == 0x87 { 41 } else { self.version };
        let table_at = if layout_version >= 42 { 0x0c } else { 0x08 };
        let (gap, name_size) = if layout_version <= 3 {
            (0x08, 0x10)
        } else {
            (0x10, 0x40)
        };

        let compact = !self.compact.is_empty();
        let (count, stride) = if compact {
            (self.compact.len(), 4)
        } else {
            (self.entries.len(), ENTRY_STRIDE)
        };

        buf.u32(table_at, BASE_AT as u32);
        buf.u32(table_at + 0x04, (0x18 + name_size) as u32);
        buf.u32(table_at + 0x08, ENTRIES_AT as u32);
        buf.u32(table_at + 0x0c, (count * stride) as u32);
        let payload_pair = table_at + 0x10 + gap;
        buf.u32(payload_pair, PAYLOAD_AT as u32);
        buf.u32(payload_pair + 0x04, self.payload.len() as u32);

        let flags = self.flags | if compact { 0x0002_0000 } else { 0 };
        buf.u32(BASE_AT, flags);
        buf.u32(BASE_AT + 0x04, count as u32);
        buf.bytes(BASE_AT + 0x08, b"synthetic");
        let after_name = BASE_AT + 0x08 + name_size;
        buf.u32(after_name, stride as u32);
        buf.u32(after_name + 0x04, 0x40);
        buf.u32(after_name + 0x08, self.alignment);
        buf.u32(after_name + 0x0c, self.compact_format);

        if compact {
            for (i, word) in self.compact.iter().enumerate() {
                buf.u32(ENTRIES_AT + 4 * i, *word);
            }
        } else {
            for (i, e) in self.entries.iter().enumerate() {
                let at = ENTRIES_AT + ENTRY_STRIDE * i;
                let info = if layout_version <= 3 {
                    e.flags
                } else {
                    (e.num_samples << 4) | (e.flags & 0xF)
                };
                buf.u32(at, info);
                buf.u32(at + 0x04, e.format);
                buf.u32(at + 0x08, e.offset);
                buf.u32(at + 0x0c, e.size);
                buf.u32(at + 0x10, e.loop_start);
                buf.u32(at + 0x14, e.loop_length);
            }
        }

        buf.bytes(PAYLOAD_AT, &self.payload);
        buf.data
    }
}

// ── XMA ─────────────────────────────────────────────────────────────

/// One 2048-byte XMA packet: a zero header (first frame right after it, no
/// packet skip), `frames` frames of `frame_bits` bits, then the end marker.
pub fn xma_packet(frames: usize, frame_bits: u64) -> Vec<u8> {
    let mut bytes = vec![0u8; 2048];
    let mut bit = 32u64;
    for _ in 0..frames {
        put_bits(&mut bytes, bit, frame_bits, 15);
        bit += frame_bits;
    }
    put_bits(&mut bytes, bit, 0x7FFF, 15);
    bytes
}

/// MSB-first write of `bits` bits at an absolute bit offset.
fn put_bits(bytes: &mut [u8], at: u64, value: u64, bits: u32) {
    for i in 0..u64::from(bits) {
        if (value >> (u64::from(bits) - 1 - i)) & 1 == 1 {
            let pos = at + i;
            bytes[(pos / 8) as usize] |= 0x80 >> (pos % 8);
        }
    }
}

/// Bank loop end field for XMA: `end_bit:28 | end_sub:2 | start_sub:2`,
/// subframes stored minus one.
pub fn xma_loop_end(end_bit: u32, start_subframe: u32, end_subframe: u32) -> u32 {
    (end_bit << 4) | ((end_subframe - 1) << 2) | (start_subframe - 1)
}

// ── Sound banks ─────────────────────────────────────────────────────

/// A sound record of an XACT 2/3 sound bank.
#[derive(Debug, Clone)]
pub struct Sound {
    pub wavebank: u8,
    pub stream_index: u16,
    /// Cue name; `None` leaves the sound without a cue.
    pub name: Option<String>,
    /// Complex sound flag value; 0 builds a simple sound.
    pub complex_flag: u8,
}

impl Sound {
    pub fn simple(wavebank: u8, stream_index: u16, name: &str) -> Self {
        Self {
            wavebank,
            stream_index,
            name: Some(name.to_owned()),
            complex_flag: 0,
        }
    }
}

/// XACT 2 (`version <= 41`) or XACT 3 sound bank.
///
/// Simple sounds are 0x0c bytes with stream fields at +9. Complex sounds
/// are 0x20 bytes with stream fields at +0x18. By default simple cues
/// reference simple sounds, complex cues reference complex sounds, and
/// each cue gets one name-offset entry in cue order.
#[derive(Debug, Clone)]
pub struct SoundBank {
    pub version: u16,
    pub wavebanks: u8,
    pub big_endian: bool,
    pub sounds: Vec<Sound>,
    /// Explicit simple cues as (sound index, name), replacing the default
    /// one-cue-per-named-sound tables. No complex cues are written then.
    pub simple_cues: Option<Vec<(usize, String)>>,
}

pub const SOUNDS_AT: usize = 0x100;

impl SoundBank {
    pub fn new(version: u16, wavebanks: u8, sounds: &[Sound]) -> Self {
        Self {
            version,
            wavebanks,
            big_endian: false,
            sounds: sounds.to_vec(),
            simple_cues: None,
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn simple_cues(mut self, cues: &[(usize, &str)]) -> Self {
        self.simple_cues = Some(cues.iter().map(|&(i, n)| (i, n.to_owned())).collect());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = Buf::new(0x60, self.big_endian);
        buf.bytes(0, if self.big_endian { b"KBDS" } else { b"SDBK" });
        buf.u16(0x04, self.version);

        let (counts_at, wavebanks_at, tables_at, names_at) = if self.version <= 41 {
            (0x09, 0x11, 0x1a, 0x3a)
        } else {
            (0x13, 0x1b, 0x22, 0x42)
        };

        let mut offsets = Vec::new();
        let mut at = SOUNDS_AT;
        for s in &self.sounds {
            let size = if s.complex_flag == 0 { 0x0c } else { 0x20 };
            let fields = if s.complex_flag == 0 { 0x09 } else { 0x18 };
            buf.u8(at, s.complex_flag);
            buf.u16(at + 0x07, size as u16);
            buf.u16(at + fields, s.stream_index);
            buf.u8(at + fields + 0x02, s.wavebank);
            offsets.push(at);
            at += size;
        }

        let (simple, complex): (Vec<(usize, String)>, Vec<(usize, String)>) =
            match &self.simple_cues {
                Some(cues) => (
                    cues.iter().map(|(i, n)| (offsets[*i], n.clone())).collect(),
                    Vec::new(),
                ),
                None => {
                    let named = || {
                        offsets
                            .iter()
                            .zip(&self.sounds)
                            .filter_map(|(&o, s)| s.name.clone().map(|n| (o, n, s.complex_flag)))
                    };
                    (
                        named().filter(|c| c.2 == 0).map(|(o, n, _)| (o, n)).collect(),
                        named().filter(|c| c.2 != 0).map(|(o, n, _)| (o, n)).collect(),
                    )
                }
            };

        let simple_at = at;
        for (i, (sound_at, _)) in simple.iter().enumerate() {
            buf.u32(simple_at + 5 * i + 1, *sound_at as u32);
        }
        let complex_at = simple_at + 5 * simple.len();
        for (i, (sound_at, _)) in complex.iter().enumerate() {
            buf.u32(complex_at + 0x0f * i + 1, *sound_at as u32);
        }

        let cue_count = simple.len() + complex.len();
        let name_offsets_at = complex_at + 0x0f * complex.len();
        let mut strings_at = name_offsets_at + 6 * cue_count;
        for (i, (_, name)) in simple.iter().chain(&complex).enumerate() {
            buf.u32(name_offsets_at + 6 * i, strings_at as u32);
            buf.bytes(strings_at, name.as_bytes());
            buf.u8(strings_at + name.len(), 0);
            strings_at += name.len() + 1;
        }

        buf.u16(counts_at, simple.len() as u16);
        buf.u16(counts_at + 0x02, complex.len() as u16);
        buf.u8(wavebanks_at, self.wavebanks);
        buf.u16(wavebanks_at + 0x01, self.sounds.len() as u16);
        buf.u32(tables_at, simple_at as u32);
        buf.u32(tables_at + 0x04, complex_at as u32);
        buf.u32(names_at, name_offsets_at as u32);
        buf.u32(names_at + 0x04, SOUNDS_AT as u32);
        buf.data
    }
}

/// Little-endian sound bank with the default cue tables.
pub fn build_sound_bank(version: u16, wavebanks: u8, sounds: &[Sound]) -> Vec<u8> {
    SoundBank::new(version, wavebanks, sounds).build()
}

/// XACT 1 sound bank: fixed 0x14-byte records at 0x38, names via u16 offsets.
pub fn build_xact1_sound_bank(names: &[&str]) -> Vec<u8> {
    let mut buf = Buf::new(0x38, false);
    buf.bytes(0, b"SDBK");
    buf.u16(0x04, 11);
    buf.u16(0x1e, names.len() as u16);

    let mut strings_at = 0x38 + 0x14 * names.len();
    for (i, name) in names.iter().enumerate() {
        let at = 0x38 + 0x14 * i;
        buf.u8(at, 0x01);
        buf.u16(at + 0x02, i as u16);
        buf.u16(at + 0x04, strings_at as u16);
        buf.bytes(strings_at, name.as_bytes());
        buf.u8(strings_at + name.len(), 0);
        strings_at += name.len() + 1;
    }
    buf.data
}
