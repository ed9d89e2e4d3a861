//! XACT wave bank (`.xwb`) reader.
//!
//! Resolves one stream of a wave bank into a [`StreamDescriptor`]. Header
//! revisions from XACT 1.0 through XACT 3 are handled by the layout table
//! in [`tier`]; vendor variants (Crackdown, Techland ATRAC3, Oddworld Ogg)
//! are fixed up in [`codec`]. Stream names come from the companion sound
//! bank (`.xsb`) when one is supplied.

pub mod codec;
pub mod config;
pub mod cue;
pub mod header;
pub mod tier;

use std::path::{Path, PathBuf};

use bankprobe_core::view::has_extension;
use bankprobe_core::{ByteView, CodecKind, FormatError, Result, StreamDescriptor};
use tracing::{debug, warn};

pub use config::BankOptions;
pub use cue::{BankContext, CueIndex};
pub use header::{BankFlags, BankRecord, EntryFlags};
pub use tier::Tier;

/// Resolve stream `target_index` (1-based; 0 means the first stream) with
/// default options.
pub fn resolve_bank(
    container: &dyn ByteView,
    target_index: u32,
    index_file: Option<&dyn ByteView>,
) -> Result<StreamDescriptor> {
    resolve_bank_with(container, target_index, index_file, &BankOptions::default())
}

/// Resolve stream `target_index` of a wave bank.
///
/// Failing to read a name from `index_file` is not an error: the stream
/// resolves with `stream_name: None`.
pub fn resolve_bank_with(
    container: &dyn ByteView,
    target_index: u32,
    index_file: Option<&dyn ByteView>,
    options: &BankOptions,
) -> Result<StreamDescriptor> {
    if !has_extension(container, "xwb") {
        return Err(FormatError::NotRecognized { format: "xwb" });
    }

    let record = BankRecord::parse(container, target_index)?;
    let derived = codec::derive(container, &record)?;
    debug!(
        version = record.raw_version,
        tier = ?record.layout.tier,
        streams = record.stream_count,
        target = record.target,
        codec = %derived.codec,
        "resolved wave bank entry"
    );

    // Ogg sizes are vendor-defined; the remaining codecs must fit the
    // wave data segment.
    if derived.codec != CodecKind::VendorOgg {
        let segment_end = record.payload_offset + record.payload_size;
        let stream_end = derived.stream_offset + derived.stream_size;
        if segment_end > container.size() {
            return Err(FormatError::malformed(
                "xwb",
                format!(
                    "wave data segment ends at {segment_end:#x}, file is {:#x}",
                    container.size()
                ),
            ));
        }
        if stream_end > segment_end {
            return Err(FormatError::malformed(
                "xwb",
                format!(
                    "stream {} ends at {stream_end:#x}, past the wave data segment",
                    record.target
                ),
            ));
        }
    }

    let mut descriptor = StreamDescriptor {
        codec: derived.codec,
        channel_count: derived.channels,
        sample_rate: derived.sample_rate,
        num_samples: derived.num_samples,
        loop_enabled: derived.loop_enabled,
        loop_start_sample: derived.loop_start_sample,
        loop_end_sample: derived.loop_end_sample,
        data_offset: derived.stream_offset,
        data_size: derived.stream_size,
        block_align: derived.block_align,
        interleave_unit: derived.interleave_unit,
        byte_order: record.byte_order,
        stream_count: record.stream_count,
        setup: derived.setup,
        stream_name: None,
    };
    descriptor.validate(container.size())?;

    if let Some(index_file) = index_file {
        let bank = BankContext {
            tier: record.layout.tier,
            version: record.version,
            stream_count: record.stream_count,
            target: record.target,
        };
        descriptor.stream_name = match cue::resolve_stream_name(index_file, &bank, options) {
            Ok(name) => name,
            Err(err) => {
                warn!(error = %err, "could not read stream name from sound bank");
                None
            }
        };
    }

    Ok(descriptor)
}

/// Path of the sound bank that usually sits next to a wave bank.
pub fn companion_path(bank_path: &Path) -> PathBuf {
    bank_path.with_extension("xsb")
}
