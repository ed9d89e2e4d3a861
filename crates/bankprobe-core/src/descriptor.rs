use std::fmt;

use crate::error::{FormatError, Result};
use crate::view::ByteOrder;

/// Longest stream name kept in a descriptor, in bytes.
pub const MAX_STREAM_NAME: usize = 255;

/// Codec of a resolved stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "snake_case"))]
pub enum CodecKind {
    Pcm8,
    Pcm16,
    /// Xbox IMA ADPCM, 36-byte blocks per channel.
    XboxAdpcm,
    MsAdpcm,
    Xma1,
    Xma2,
    /// WMA v1, self-framed.
    Wma,
    /// WMA v2 / WMA Pro packed without a RIFF header.
    Xwma,
    Atrac3,
    /// Ogg Vorbis stored in a bank by a vendor extension.
    VendorOgg,
    /// 3DO squareroot-delta-exact, 8 bits per sample.
    Sdx2,
}

impl CodecKind {
    /// Whether the stream length in the container counts compressed bytes.
    ///
    /// Only the vendor Ogg extension breaks this: its size field holds the
    /// decoded PCM byte count.
    pub fn size_is_compressed_bytes(self) -> bool {
        self != Self::VendorOgg
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pcm8 => "PCM8",
            Self::Pcm16 => "PCM16",
            Self::XboxAdpcm => "Xbox ADPCM",
            Self::MsAdpcm => "MS ADPCM",
            Self::Xma1 => "XMA1",
            Self::Xma2 => "XMA2",
            Self::Wma => "WMA",
            Self::Xwma => "xWMA",
            Self::Atrac3 => "ATRAC3",
            Self::VendorOgg => "Ogg Vorbis",
            Self::Sdx2 => "SDX2",
        };
        f.write_str(name)
    }
}

/// Decoder parameters derived from header bits that a RIFF-style decoder
/// front end needs but the container never stores directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "snake_case"))]
pub enum CodecSetup {
    #[default]
    None,
    Xma2 {
        block_size: u32,
        block_count: u32,
    },
    Xwma {
        avg_bytes_per_second: u32,
        block_align: u32,
        /// WMA Pro (WMAudio3) rather than WMAudio2.
        pro: bool,
    },
    Atrac3 {
        joint_stereo: bool,
    },
}

/// Normalized description of one stream inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StreamDescriptor {
    pub codec: CodecKind,
    pub channel_count: u16,
    pub sample_rate: u32,
    pub num_samples: u64,
    pub loop_enabled: bool,
    pub loop_start_sample: u64,
    /// Exclusive.
    pub loop_end_sample: u64,
    /// Absolute offset of the stream bytes in the container.
    pub data_offset: u64,
    pub data_size: u64,
    /// Codec frame size in bytes, 0 if not applicable.
    pub block_align: u32,
    /// Per-channel interleave in bytes, 0 if the stream is not interleaved.
    pub interleave_unit: u32,
    pub byte_order: ByteOrder,
    /// Number of streams in the container.
    pub stream_count: u32,
    pub setup: CodecSetup,
    pub stream_name: Option<String>,
}

impl StreamDescriptor {
    /// Check the byte range and loop invariants against the container size.
    pub fn validate(&self, container_size: u64) -> Result<()> {
        if self.channel_count == 0 {
            return Err(FormatError::malformed("stream", "zero channels"));
        }
        if self.sample_rate == 0 {
            return Err(FormatError::malformed("stream", "zero sample rate"));
        }
        if self.codec.size_is_compressed_bytes() {
            let end = self.data_offset.checked_add(self.data_size);
            if end.is_none_or(|end| end > container_size) {
                return Err(FormatError::malformed(
                    "stream",
                    format!(
                        "data {:#x}+{:#x} exceeds container size {:#x}",
                        self.data_offset, self.data_size, container_size
                    ),
                ));
            }
        }
        if self.loop_enabled
            && (self.loop_start_sample > self.loop_end_sample
                || self.loop_end_sample > self.num_samples)
        {
            return Err(FormatError::malformed(
                "stream",
                format!(
                    "loop {}..{} outside {} samples",
                    self.loop_start_sample, self.loop_end_sample, self.num_samples
                ),
            ));
        }
        Ok(())
    }

    /// Duration in seconds, for display.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_samples as f64 / f64::from(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_descriptor() -> StreamDescriptor {
        StreamDescriptor {
            codec: CodecKind::Pcm16,
            channel_count: 2,
            sample_rate: 44100,
            num_samples: 1000,
            loop_enabled: true,
            loop_start_sample: 100,
            loop_end_sample: 1000,
            data_offset: 0x800,
            data_size: 4000,
            block_align: 4,
            interleave_unit: 2,
            byte_order: ByteOrder::Little,
            stream_count: 1,
            setup: CodecSetup::None,
            stream_name: None,
        }
    }

    #[test]
    fn valid_descriptor_passes() {
        assert!(pcm_descriptor().validate(0x800 + 4000).is_ok());
    }

    #[test]
    fn data_past_end_fails() {
        let err = pcm_descriptor().validate(0x800 + 3999).unwrap_err();
        assert!(matches!(err, FormatError::MalformedHeader { .. }));
    }

    #[test]
    fn vendor_ogg_skips_range_check() {
        let mut d = pcm_descriptor();
        d.codec = CodecKind::VendorOgg;
        d.loop_enabled = false;
        assert!(d.validate(16).is_ok());
    }

    #[test]
    fn loop_past_end_fails() {
        let mut d = pcm_descriptor();
        d.loop_end_sample = 1001;
        assert!(d.validate(u64::MAX).is_err());
        d.loop_enabled = false;
        assert!(d.validate(u64::MAX).is_ok());
    }

    #[test]
    fn duration() {
        let d = pcm_descriptor();
        assert!((d.duration_secs() - 1000.0 / 44100.0).abs() < 1e-9);
    }
}
